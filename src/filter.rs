use crate::core::model::Filter;
use crate::error::PatternError;
use fancy_regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Byte range `[start, end)` of one match within a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
}

/// Result of running one filter over one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineMatch {
    pub matched: bool,
    pub spans: Vec<MatchSpan>,
}

impl LineMatch {
    fn from_spans(spans: Vec<MatchSpan>) -> Self {
        Self {
            matched: !spans.is_empty(),
            spans,
        }
    }
}

/// The fields of a [`Filter`] that determine how it compiles. A cached
/// compilation is reused only while all three are unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternKey {
    pub pattern: String,
    pub case_sensitive: bool,
    pub regex: bool,
}

impl PatternKey {
    pub fn of(filter: &Filter) -> Self {
        Self {
            pattern: filter.pattern.clone(),
            case_sensitive: filter.case_sensitive,
            regex: filter.regex,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CompiledPattern {
    /// `needle` is already lower-cased when matching case-insensitively.
    Literal { needle: String, case_sensitive: bool },
    Regex(Regex),
    Invalid(PatternError),
}

impl CompiledPattern {
    pub fn compile(key: &PatternKey) -> Self {
        if !key.regex {
            let needle = if key.case_sensitive {
                key.pattern.clone()
            } else {
                key.pattern.to_lowercase()
            };
            return CompiledPattern::Literal {
                needle,
                case_sensitive: key.case_sensitive,
            };
        }
        let source = if key.case_sensitive {
            key.pattern.clone()
        } else {
            format!("(?i){}", key.pattern)
        };
        match Regex::new(&source) {
            Ok(re) => CompiledPattern::Regex(re),
            Err(e) => {
                let err = PatternError::Compile {
                    pattern: key.pattern.clone(),
                    message: e.to_string(),
                };
                warn!(target: "filter", error = %err, "pattern disabled");
                CompiledPattern::Invalid(err)
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, CompiledPattern::Invalid(_))
    }

    /// All non-overlapping, non-empty matches in `line`.
    pub fn find_all(&self, line: &str) -> Result<Vec<MatchSpan>, PatternError> {
        match self {
            CompiledPattern::Literal {
                needle,
                case_sensitive,
            } => Ok(find_literal(line, needle, *case_sensitive)),
            CompiledPattern::Regex(re) => {
                let mut spans = Vec::new();
                for m in re.find_iter(line) {
                    let m = m.map_err(|e| PatternError::Exec {
                        pattern: re.as_str().to_string(),
                        message: e.to_string(),
                    })?;
                    if m.end() > m.start() {
                        spans.push(MatchSpan {
                            start: m.start(),
                            end: m.end(),
                        });
                    }
                }
                Ok(spans)
            }
            CompiledPattern::Invalid(e) => Err(e.clone()),
        }
    }

    pub fn match_line(&self, line: &str) -> Result<LineMatch, PatternError> {
        self.find_all(line).map(LineMatch::from_spans)
    }
}

fn find_literal(line: &str, needle: &str, case_sensitive: bool) -> Vec<MatchSpan> {
    if needle.is_empty() {
        return Vec::new();
    }
    if case_sensitive {
        return scan(line, needle);
    }
    let lowered = line.to_lowercase();
    let spans = scan(&lowered, needle);
    if !lowering_shifts_offsets(line) {
        return spans;
    }
    // Some character changed width when lower-cased; translate back to `line` offsets.
    let origin = lowered_origins(line);
    spans
        .into_iter()
        .map(|s| {
            let last = origin[s.end - 1];
            let last_len = line[last..].chars().next().map_or(0, char::len_utf8);
            MatchSpan {
                start: origin[s.start],
                end: last + last_len,
            }
        })
        .collect()
}

/// True when any character's lower-case form has a different UTF-8 width.
/// Equal total lengths are not enough: one character may grow while another
/// shrinks.
fn lowering_shifts_offsets(line: &str) -> bool {
    line.chars()
        .any(|c| c.to_lowercase().map(char::len_utf8).sum::<usize>() != c.len_utf8())
}

fn scan(haystack: &str, needle: &str) -> Vec<MatchSpan> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        spans.push(MatchSpan { start, end });
        from = end;
    }
    spans
}

/// For each byte of `line.to_lowercase()`, the byte offset in `line` of the
/// character it came from.
fn lowered_origins(line: &str) -> Vec<usize> {
    let mut origin = Vec::with_capacity(line.len() + 1);
    for (offset, ch) in line.char_indices() {
        let width: usize = ch.to_lowercase().map(char::len_utf8).sum();
        origin.extend(std::iter::repeat(offset).take(width));
    }
    origin.push(line.len());
    origin
}

/// Compiled patterns keyed by [`PatternKey`]. Editing a filter's pattern,
/// case flag or regex flag produces a new key, so stale compilations are
/// never reused; keys not touched during a pass are evicted by
/// [`PatternCache::end_pass`].
#[derive(Debug, Default)]
pub struct PatternCache {
    entries: HashMap<PatternKey, CompiledPattern>,
    used: HashSet<PatternKey>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, filter: &Filter) -> &CompiledPattern {
        let key = PatternKey::of(filter);
        self.used.insert(key.clone());
        self.entries
            .entry(key)
            .or_insert_with_key(CompiledPattern::compile)
    }

    pub fn begin_pass(&mut self) {
        self.used.clear();
    }

    pub fn end_pass(&mut self) {
        let before = self.entries.len();
        let used = std::mem::take(&mut self.used);
        self.entries.retain(|key, _| used.contains(key));
        if self.entries.len() != before {
            debug!(target: "filter", evicted = before - self.entries.len(), "pattern cache pruned");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Match one line against one filter. Invalid patterns yield no match.
pub fn match_line(line: &str, filter: &Filter, cache: &mut PatternCache) -> LineMatch {
    if filter.pattern.is_empty() {
        return LineMatch::default();
    }
    cache.get(filter).match_line(line).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(pattern: &str, regex: bool, case_sensitive: bool) -> Filter {
        let mut f = Filter::new("f".into());
        f.pattern = pattern.to_string();
        f.regex = regex;
        f.case_sensitive = case_sensitive;
        f
    }

    fn texts<'a>(line: &'a str, m: &LineMatch) -> Vec<&'a str> {
        m.spans.iter().map(|s| &line[s.start..s.end]).collect()
    }

    #[test]
    fn test_case_insensitive_literal() {
        let mut cache = PatternCache::new();
        let m = match_line("ERROR: failed", &filter("error", false, false), &mut cache);
        assert!(m.matched);
        assert_eq!(m.spans, vec![MatchSpan { start: 0, end: 5 }]);
    }

    #[test]
    fn test_case_sensitive_literal_misses() {
        let mut cache = PatternCache::new();
        let m = match_line("ERROR: failed", &filter("error", false, true), &mut cache);
        assert!(!m.matched);
    }

    #[test]
    fn test_literal_finds_non_overlapping_occurrences() {
        let mut cache = PatternCache::new();
        let line = "aaaa";
        let m = match_line(line, &filter("aa", false, true), &mut cache);
        assert_eq!(
            m.spans,
            vec![MatchSpan { start: 0, end: 2 }, MatchSpan { start: 2, end: 4 }]
        );
    }

    #[test]
    fn test_regex_all_matches() {
        let mut cache = PatternCache::new();
        let line = "id-42 id-7";
        let m = match_line(line, &filter(r"\d+", true, false), &mut cache);
        assert_eq!(texts(line, &m), vec!["42", "7"]);
    }

    #[test]
    fn test_regex_case_insensitive_keeps_escape_meaning() {
        let mut cache = PatternCache::new();
        let line = "AB12";
        let m = match_line(line, &filter(r"\D+", true, false), &mut cache);
        assert_eq!(texts(line, &m), vec!["AB"]);
    }

    #[test]
    fn test_regex_lookahead() {
        let mut cache = PatternCache::new();
        let line = "foobar foobaz";
        let m = match_line(line, &filter(r"foo(?=baz)", true, true), &mut cache);
        assert_eq!(m.spans, vec![MatchSpan { start: 7, end: 10 }]);
    }

    #[test]
    fn test_invalid_regex_is_no_match() {
        let mut cache = PatternCache::new();
        let f = filter("(unclosed", true, true);
        assert!(!match_line("(unclosed", &f, &mut cache).matched);
        assert!(!cache.get(&f).is_valid());
    }

    #[test]
    fn test_zero_width_regex_does_not_match() {
        let mut cache = PatternCache::new();
        assert!(!match_line("abc", &filter("^", true, true), &mut cache).matched);
    }

    #[test]
    fn test_empty_pattern_never_matches() {
        let mut cache = PatternCache::new();
        assert!(!match_line("anything", &filter("", false, false), &mut cache).matched);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_length_changing_lowercase_maps_offsets_back() {
        let mut cache = PatternCache::new();
        // 'İ' lower-cases to two characters, shifting later offsets.
        let line = "İx error";
        let m = match_line(line, &filter("error", false, false), &mut cache);
        assert_eq!(texts(line, &m), vec!["error"]);
    }

    #[test]
    fn test_offsetting_width_changes_still_map_back() {
        let mut cache = PatternCache::new();
        // 'İ' grows by one byte and 'ẞ' shrinks by one, so the totals agree.
        let line = "İxẞ";
        assert_eq!(line.len(), line.to_lowercase().len());
        let m = match_line(line, &filter("x", false, false), &mut cache);
        assert_eq!(m.spans, vec![MatchSpan { start: 2, end: 3 }]);
        assert_eq!(texts(line, &m), vec!["x"]);

        let m = match_line(line, &filter("ß", false, false), &mut cache);
        assert_eq!(texts(line, &m), vec!["ẞ"]);
    }

    #[test]
    fn test_cache_key_changes_with_flags() {
        let mut cache = PatternCache::new();
        let mut f = filter("a.c", false, true);
        assert!(!match_line("abc", &f, &mut cache).matched);
        f.regex = true;
        assert!(match_line("abc", &f, &mut cache).matched);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_end_pass_evicts_unused() {
        let mut cache = PatternCache::new();
        let a = filter("a", false, true);
        let b = filter("b", false, true);
        cache.begin_pass();
        cache.get(&a);
        cache.get(&b);
        cache.end_pass();
        assert_eq!(cache.len(), 2);
        cache.begin_pass();
        cache.get(&a);
        cache.end_pass();
        assert_eq!(cache.len(), 1);
    }
}
