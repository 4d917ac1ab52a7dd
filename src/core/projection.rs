//! Matched-lines view.
//!
//! A projection replaces a document's text with only the lines matched by the
//! active filters, each prefixed with its 1-based original line number
//! (`"42: text"`). The pre-projection text is saved verbatim and substituted
//! back on exit, so leaving the view never re-derives content.

use super::model::FilterGroup;
use super::range::LineBounds;
use crate::document::Document;
use crate::error::ViewError;
use crate::filter::{match_line, PatternCache};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use tracing::{debug, info};

static PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+):\s?").unwrap());

/// Split a projected line into its 0-based original line number and the byte
/// length of the `N: ` prefix.
pub fn split_prefix(line: &str) -> Option<(usize, usize)> {
    let caps = PREFIX.captures(line)?;
    let number: usize = caps.get(1)?.as_str().parse().ok()?;
    let original = number.checked_sub(1)?;
    Some((original, caps.get(0)?.end()))
}

pub fn format_line(original: usize, text: &str) -> String {
    format!("{}: {}", original + 1, text)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub text: String,
    /// Original line index for each projected line, in projected order.
    pub origins: Vec<usize>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// original line -> projected line.
    pub fn line_map(&self) -> BTreeMap<usize, usize> {
        self.origins
            .iter()
            .enumerate()
            .map(|(projected, &original)| (original, projected))
            .collect()
    }

    pub fn original_line_of(&self, projected: usize) -> Option<usize> {
        self.origins.get(projected).copied()
    }

    /// Projected line whose original line is closest to `original`. On ties
    /// the first one found wins.
    pub fn nearest_projected_line(&self, original: usize) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (projected, &origin) in self.origins.iter().enumerate() {
            let distance = origin.abs_diff(original);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((projected, distance));
            }
        }
        best.map(|(projected, _)| projected)
    }
}

/// Build the matched-lines text for `document`. A line is kept when it lies
/// within `bounds` and any enabled filter of any enabled group matches it.
pub fn project(
    document: &Document,
    groups: &[FilterGroup],
    bounds: LineBounds,
    cache: &mut PatternCache,
) -> Projection {
    let mut lines = Vec::new();
    let mut origins = Vec::new();
    for idx in bounds.indices() {
        let Some(text) = document.line(idx) else {
            break;
        };
        let matched = groups
            .iter()
            .flat_map(|g| g.active_filters())
            .any(|f| match_line(text, f, cache).matched);
        if matched {
            lines.push(format_line(idx, text));
            origins.push(idx);
        }
    }
    Projection {
        text: lines.join("\n"),
        origins,
    }
}

#[derive(Debug, Clone)]
pub struct ProjectionSession {
    pub saved_text: String,
    pub saved_cursor: usize,
    pub projection: Projection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entered {
    /// Where the cursor should move in the projected text, if anything matched.
    pub cursor: Option<usize>,
    pub matched_lines: usize,
}

/// At most one projection per document, keyed by document uri.
#[derive(Debug, Default)]
pub struct Projector {
    sessions: HashMap<String, ProjectionSession>,
}

impl Projector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_projected(&self, uri: &str) -> bool {
        self.sessions.contains_key(uri)
    }

    pub fn session(&self, uri: &str) -> Option<&ProjectionSession> {
        self.sessions.get(uri)
    }

    pub fn enter(
        &mut self,
        document: &mut Document,
        groups: &[FilterGroup],
        bounds: LineBounds,
        cursor_line: usize,
        cache: &mut PatternCache,
    ) -> Result<Entered, ViewError> {
        if self.is_projected(document.uri()) {
            return Err(ViewError::AlreadyProjected);
        }
        let projection = project(document, groups, bounds, cache);
        let entered = Entered {
            cursor: projection.nearest_projected_line(cursor_line),
            matched_lines: projection.origins.len(),
        };
        let saved_text = document.text().to_string();
        document.set_text(projection.text.clone());
        info!(
            target: "projection",
            uri = document.uri(),
            matched = entered.matched_lines,
            "entered matched-lines view"
        );
        self.sessions.insert(
            document.uri().to_string(),
            ProjectionSession {
                saved_text,
                saved_cursor: cursor_line,
                projection,
            },
        );
        Ok(entered)
    }

    /// Put the saved text back and return the cursor line recorded on entry.
    pub fn exit(&mut self, document: &mut Document) -> Result<usize, ViewError> {
        let session = self
            .sessions
            .remove(document.uri())
            .ok_or(ViewError::NothingToRestore)?;
        document.set_text(session.saved_text);
        info!(target: "projection", uri = document.uri(), "restored original content");
        Ok(session.saved_cursor)
    }

    /// Drop a session without restoring, e.g. when its document is closed.
    pub fn forget(&mut self, uri: &str) {
        if self.sessions.remove(uri).is_some() {
            debug!(target: "projection", uri, "projection forgotten");
        }
    }
}
