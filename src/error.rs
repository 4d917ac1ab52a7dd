use thiserror::Error;

/// A filter whose pattern could not be used for matching.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("invalid regex '{pattern}': {message}")]
    Compile { pattern: String, message: String },
    #[error("regex '{pattern}' failed while matching: {message}")]
    Exec { pattern: String, message: String },
}

/// Rejected configuration updates. The snapshot the update was applied to is
/// left as it was.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no filter with id '{0}'")]
    UnknownFilter(String),
    #[error("no group named '{0}'")]
    UnknownGroup(String),
    #[error("no range with id '{0}'")]
    UnknownRange(String),
    #[error("a group named '{0}' already exists")]
    DuplicateGroup(String),
    #[error("group name must not be empty")]
    EmptyGroupName,
    #[error("filter id '{0}' is used more than once")]
    DuplicateFilterId(String),
    #[error("range id '{0}' is already in use")]
    DuplicateRange(String),
    #[error("range name must not be empty")]
    EmptyRangeName,
    #[error("the default range cannot be deleted")]
    DefaultRange,
    #[error("invalid range: start {start}, end {end}")]
    InvalidRange { start: i64, end: i64 },
    #[error("filter field '{0}' cannot be changed")]
    ImmutableField(String),
    #[error("unknown filter field '{0}'")]
    UnknownField(String),
    #[error("filter field '{field}' expects a {expected} value")]
    FieldType { field: String, expected: &'static str },
}

/// Precondition failures of the matched-lines view. These are reported to the
/// user as information and never change the document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("No active editor to apply filter to.")]
    NoActiveDocument,
    #[error("Document is already filtered.")]
    AlreadyProjected,
    #[error("No original document content saved to restore.")]
    NothingToRestore,
}
