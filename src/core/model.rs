use crate::constants::{
    EXAMPLE_BACKGROUND, EXAMPLE_FOREGROUND, NEW_FILTER_BACKGROUND, NEW_FILTER_FOREGROUND,
    NEW_FILTER_PATTERN,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Reserved id of the whole-document range. It is never stored in
/// [`Configuration::ranges`].
pub const DEFAULT_RANGE_ID: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub id: String,
    pub pattern: String,
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub foreground: String,
    #[serde(default)]
    pub background: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub highlight_whole_line: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Filter {
    /// A filter as created from the "add filter" action.
    pub fn new(id: String) -> Self {
        Self {
            id,
            pattern: NEW_FILTER_PATTERN.to_string(),
            regex: false,
            case_sensitive: false,
            foreground: NEW_FILTER_FOREGROUND.to_string(),
            background: NEW_FILTER_BACKGROUND.to_string(),
            enabled: true,
            bold: false,
            italic: false,
            highlight_whole_line: true,
        }
    }

    /// Whether this filter takes part in matching at all.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.pattern.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGroup {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub collapsed: bool,
}

impl FilterGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            filters: Vec::new(),
            collapsed: false,
        }
    }

    /// Filters that contribute to matching: the group is enabled and the
    /// filter itself is enabled with a non-empty pattern.
    pub fn active_filters(&self) -> impl Iterator<Item = &Filter> {
        self.filters
            .iter()
            .filter(move |f| self.enabled && f.is_active())
    }
}

/// A named line interval. `start` and `end` are 0-based and inclusive;
/// `end == -1` means "to the end of the document".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub id: String,
    pub name: String,
    pub start: i64,
    pub end: i64,
}

impl Range {
    pub fn is_valid_bounds(start: i64, end: i64) -> bool {
        start >= 0 && (end == -1 || end >= start)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default)]
    pub groups: Vec<FilterGroup>,
    #[serde(default)]
    pub ranges: Vec<Range>,
    #[serde(default = "default_range_id")]
    pub active_range_id: String,
}

fn default_range_id() -> String {
    DEFAULT_RANGE_ID.to_string()
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            ranges: Vec::new(),
            active_range_id: default_range_id(),
        }
    }
}

impl Configuration {
    /// The configuration written on first run, when no groups exist yet.
    pub fn seeded() -> Self {
        let mut example = FilterGroup::new("Example Group");
        example.filters.push(Filter {
            id: generate_id("id", |_| false),
            pattern: "ERROR".to_string(),
            regex: false,
            case_sensitive: false,
            foreground: EXAMPLE_FOREGROUND.to_string(),
            background: EXAMPLE_BACKGROUND.to_string(),
            enabled: true,
            bold: false,
            italic: false,
            highlight_whole_line: false,
        });
        Self {
            groups: vec![example],
            ..Self::default()
        }
    }

    pub fn filters(&self) -> impl Iterator<Item = &Filter> {
        self.groups.iter().flat_map(|g| g.filters.iter())
    }

    pub fn find_filter(&self, id: &str) -> Option<&Filter> {
        self.filters().find(|f| f.id == id)
    }

    pub fn find_group(&self, name: &str) -> Option<&FilterGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn find_range(&self, id: &str) -> Option<&Range> {
        self.ranges.iter().find(|r| r.id == id)
    }

    pub(crate) fn filter_mut(&mut self, id: &str) -> Option<&mut Filter> {
        self.groups
            .iter_mut()
            .flat_map(|g| g.filters.iter_mut())
            .find(|f| f.id == id)
    }

    pub(crate) fn group_mut(&mut self, name: &str) -> Option<&mut FilterGroup> {
        self.groups.iter_mut().find(|g| g.name == name)
    }

    /// Name for a newly added group: `Group N` with N one past the current
    /// group count, bumped until no other group uses it.
    pub fn next_group_name(&self) -> String {
        let mut n = self.groups.len() + 1;
        loop {
            let name = format!("Group {}", n);
            if self.find_group(&name).is_none() {
                return name;
            }
            n += 1;
        }
    }

    pub fn new_filter_id(&self) -> String {
        generate_id("id", |id| self.find_filter(id).is_some())
    }

    pub fn new_range_id(&self) -> String {
        generate_id("range", |id| {
            id == DEFAULT_RANGE_ID || self.find_range(id).is_some()
        })
    }
}

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Produce `<prefix>-<base36>` from the current time and a process-wide
/// sequence, retrying while `taken` reports a collision.
pub fn generate_id(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let micros = chrono::Local::now().timestamp_micros().unsigned_abs();
        let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}-{}{}", prefix, to_base36(micros), to_base36(seq));
        if !taken(&id) {
            return id;
        }
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
