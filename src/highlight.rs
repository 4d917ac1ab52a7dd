use crate::core::model::FilterGroup;
use crate::core::projection::split_prefix;
use crate::core::range::LineBounds;
use crate::document::Document;
use crate::filter::{CompiledPattern, MatchSpan, PatternCache};
use crate::style::{self, StyleDescriptor, StyleFingerprint};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// filter id -> number of lines (not occurrences) that matched.
pub type MatchCounts = BTreeMap<String, usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DecorationSpan {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

/// One renderer-level decoration: a distinct look and every span wearing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleGroup {
    pub fingerprint: StyleFingerprint,
    pub descriptor: StyleDescriptor,
    pub spans: Vec<DecorationSpan>,
}

/// Style groups in application order (group order, then filter order). When
/// spans overlap, the group applied later is drawn on top.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecorationPlan {
    pub groups: Vec<StyleGroup>,
}

impl DecorationPlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn span_count(&self) -> usize {
        self.groups.iter().map(|g| g.spans.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Highlights {
    pub plan: DecorationPlan,
    pub counts: MatchCounts,
}

/// What kind of buffer is being decorated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// The document as the user wrote it; bounds index its lines directly.
    Source,
    /// A matched-lines projection. Each line carries an `N: ` prefix that is
    /// skipped for matching, and bounds apply to the original line number.
    Projected,
}

pub fn compute(
    document: &Document,
    groups: &[FilterGroup],
    bounds: LineBounds,
    view: ViewKind,
    cache: &mut PatternCache,
) -> Highlights {
    compute_cancellable(document, groups, bounds, view, cache, &mut || false).unwrap_or_default()
}

/// Like [`compute`], but polls `should_abort` between lines and returns
/// `None` as soon as it reports true.
pub fn compute_cancellable(
    document: &Document,
    groups: &[FilterGroup],
    bounds: LineBounds,
    view: ViewKind,
    cache: &mut PatternCache,
    should_abort: &mut dyn FnMut() -> bool,
) -> Option<Highlights> {
    let candidates = candidate_lines(document, bounds, view);
    debug!(
        target: "highlight",
        start = bounds.start,
        end = bounds.end,
        ?view,
        lines = candidates.len(),
        "computing highlights"
    );

    let mut counts: MatchCounts = groups
        .iter()
        .flat_map(|g| g.filters.iter())
        .map(|f| (f.id.clone(), 0))
        .collect();
    let mut buckets: Vec<StyleGroup> = Vec::new();
    let mut bucket_of: HashMap<StyleFingerprint, usize> = HashMap::new();

    cache.begin_pass();
    for group in groups {
        for filter in group.active_filters() {
            let fingerprint = StyleFingerprint::of(filter);
            let bucket = *bucket_of.entry(fingerprint.clone()).or_insert_with(|| {
                buckets.push(StyleGroup {
                    descriptor: style::resolve(&fingerprint),
                    fingerprint,
                    spans: Vec::new(),
                });
                buckets.len() - 1
            });

            let compiled = cache.get(filter);
            if !compiled.is_valid() {
                debug!(target: "highlight", filter = %filter.id, "skipping invalid pattern");
                continue;
            }
            match sweep(document, &candidates, compiled, should_abort) {
                Sweep::Done { spans, lines } => {
                    counts.insert(filter.id.clone(), lines);
                    buckets[bucket].spans.extend(spans);
                }
                Sweep::Failed(err) => {
                    warn!(target: "highlight", filter = %filter.id, error = %err, "filter dropped for this pass");
                }
                Sweep::Aborted => {
                    cache.end_pass();
                    debug!(target: "highlight", "sweep superseded");
                    return None;
                }
            }
        }
    }
    cache.end_pass();

    for bucket in &mut buckets {
        if bucket.fingerprint.whole_line {
            bucket.spans = whole_lines(document, &bucket.spans);
        }
    }
    buckets.retain(|b| !b.spans.is_empty());

    Some(Highlights {
        plan: DecorationPlan { groups: buckets },
        counts,
    })
}

enum Sweep {
    Done {
        spans: Vec<DecorationSpan>,
        lines: usize,
    },
    Failed(crate::error::PatternError),
    Aborted,
}

/// Run one filter over every candidate line. Spans are collected locally so a
/// filter that fails mid-way contributes nothing.
fn sweep(
    document: &Document,
    candidates: &[(usize, usize)],
    compiled: &CompiledPattern,
    should_abort: &mut dyn FnMut() -> bool,
) -> Sweep {
    let mut spans = Vec::new();
    let mut lines = 0;
    for &(line, offset) in candidates {
        if should_abort() {
            return Sweep::Aborted;
        }
        let Some(text) = document.line(line) else {
            continue;
        };
        let found = match compiled.find_all(&text[offset..]) {
            Ok(found) => found,
            Err(err) => return Sweep::Failed(err),
        };
        if found.is_empty() {
            continue;
        }
        lines += 1;
        spans.extend(found.into_iter().map(|MatchSpan { start, end }| DecorationSpan {
            line,
            start: start + offset,
            end: end + offset,
        }));
    }
    Sweep::Done { spans, lines }
}

/// `(line index, byte offset where matching starts)` for each line to scan.
fn candidate_lines(document: &Document, bounds: LineBounds, view: ViewKind) -> Vec<(usize, usize)> {
    match view {
        ViewKind::Source => bounds
            .indices()
            .filter(|&i| i < document.line_count())
            .map(|i| (i, 0))
            .collect(),
        ViewKind::Projected => document
            .lines()
            .enumerate()
            // A line without a prefix has no original line number, so no
            // range contains it.
            .filter_map(|(i, text)| {
                let (original, prefix_len) = split_prefix(text)?;
                bounds.contains(original).then_some((i, prefix_len))
            })
            .collect(),
    }
}

fn whole_lines(document: &Document, spans: &[DecorationSpan]) -> Vec<DecorationSpan> {
    let mut seen = HashSet::new();
    spans
        .iter()
        .filter(|s| seen.insert(s.line))
        .map(|s| DecorationSpan {
            line: s.line,
            start: 0,
            end: document.line(s.line).map_or(0, str::len),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Filter;

    fn filter(id: &str, pattern: &str) -> Filter {
        let mut f = Filter::new(id.into());
        f.pattern = pattern.to_string();
        f.highlight_whole_line = false;
        f.foreground = "#ff0000ff".to_string();
        f.background = String::new();
        f
    }

    fn group(name: &str, filters: Vec<Filter>) -> FilterGroup {
        let mut g = FilterGroup::new(name);
        g.filters = filters;
        g
    }

    fn doc(text: &str) -> Document {
        Document::new("mem://test", text)
    }

    fn run(document: &Document, groups: &[FilterGroup]) -> Highlights {
        let mut cache = PatternCache::new();
        compute(
            document,
            groups,
            LineBounds::whole(document.line_count()),
            ViewKind::Source,
            &mut cache,
        )
    }

    #[test]
    fn test_counts_lines_not_occurrences() {
        let d = doc("error error\nok\nerror");
        let h = run(&d, &[group("g", vec![filter("a", "error")])]);
        assert_eq!(h.counts["a"], 2);
        assert_eq!(h.plan.span_count(), 3);
    }

    #[test]
    fn test_regex_two_spans_one_line() {
        let d = doc("id-42 id-7");
        let mut f = filter("a", r"\d+");
        f.regex = true;
        let h = run(&d, &[group("g", vec![f])]);
        assert_eq!(h.counts["a"], 1);
        let spans = &h.plan.groups[0].spans;
        assert_eq!(spans.len(), 2);
        assert_eq!(&d.line(0).unwrap()[spans[0].start..spans[0].end], "42");
        assert_eq!(&d.line(0).unwrap()[spans[1].start..spans[1].end], "7");
    }

    #[test]
    fn test_identical_styles_merge() {
        let d = doc("alpha\nbeta\ngamma");
        let h = run(
            &d,
            &[group("g", vec![filter("a", "alpha"), filter("b", "beta")])],
        );
        assert_eq!(h.plan.groups.len(), 1);
        let lines: Vec<usize> = h.plan.groups[0].spans.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![0, 1]);
    }

    #[test]
    fn test_distinct_styles_keep_application_order() {
        let d = doc("alpha beta");
        let mut b = filter("b", "beta");
        b.bold = true;
        let h = run(&d, &[group("g", vec![filter("a", "alpha"), b])]);
        assert_eq!(h.plan.groups.len(), 2);
        assert!(!h.plan.groups[0].fingerprint.bold);
        assert!(h.plan.groups[1].fingerprint.bold);
    }

    #[test]
    fn test_disabled_group_keeps_count_entries() {
        let d = doc("error");
        let mut g = group("g", vec![filter("a", "error")]);
        let enabled = run(&d, std::slice::from_ref(&g));
        g.enabled = false;
        let disabled = run(&d, std::slice::from_ref(&g));
        assert_eq!(disabled.counts.get("a"), Some(&0));
        assert!(disabled.plan.is_empty());
        g.enabled = true;
        assert_eq!(run(&d, std::slice::from_ref(&g)), enabled);
    }

    #[test]
    fn test_disabled_filter_does_not_touch_group_flag() {
        let d = doc("error");
        let mut f = filter("a", "error");
        f.enabled = false;
        let h = run(&d, &[group("g", vec![f])]);
        assert_eq!(h.counts["a"], 0);
        assert!(h.plan.is_empty());
    }

    #[test]
    fn test_whole_line_collapses_per_line() {
        let d = doc("x error error\nfine");
        let mut f = filter("a", "error");
        f.highlight_whole_line = true;
        let h = run(&d, &[group("g", vec![f])]);
        assert_eq!(
            h.plan.groups[0].spans,
            vec![DecorationSpan { line: 0, start: 0, end: 13 }]
        );
        assert_eq!(h.counts["a"], 1);
    }

    #[test]
    fn test_overlapping_filters_each_record_spans() {
        let d = doc("error");
        let mut b = filter("b", "err");
        b.italic = true;
        let h = run(&d, &[group("g", vec![filter("a", "error"), b])]);
        assert_eq!(h.plan.groups.len(), 2);
        assert_eq!(h.counts["a"], 1);
        assert_eq!(h.counts["b"], 1);
    }

    #[test]
    fn test_invalid_regex_isolated() {
        let d = doc("abc\nabc");
        let mut bad = filter("bad", "(abc");
        bad.regex = true;
        let h = run(&d, &[group("g", vec![bad, filter("good", "abc")])]);
        assert_eq!(h.counts["bad"], 0);
        assert_eq!(h.counts["good"], 2);
    }

    #[test]
    fn test_range_restricts_lines() {
        let d = doc("hit\nhit\nhit\nhit");
        let mut cache = PatternCache::new();
        let h = compute(
            &d,
            &[group("g", vec![filter("a", "hit")])],
            LineBounds { start: 1, end: 2 },
            ViewKind::Source,
            &mut cache,
        );
        assert_eq!(h.counts["a"], 2);
        let lines: Vec<usize> = h.plan.groups[0].spans.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![1, 2]);
    }

    #[test]
    fn test_projected_view_strips_prefix_and_offsets_spans() {
        let d = doc("3: error here\n10: 10 errors");
        let mut cache = PatternCache::new();
        let mut f = filter("a", r"\d+");
        f.regex = true;
        let h = compute(
            &d,
            &[group("g", vec![f])],
            LineBounds::whole(20),
            ViewKind::Projected,
            &mut cache,
        );
        // The line-number prefix is never matched.
        assert_eq!(h.counts["a"], 1);
        assert_eq!(
            h.plan.groups[0].spans,
            vec![DecorationSpan { line: 1, start: 4, end: 6 }]
        );
    }

    #[test]
    fn test_projected_view_applies_bounds_to_original_numbers() {
        let d = doc("2: error\n9: error");
        let mut cache = PatternCache::new();
        let h = compute(
            &d,
            &[group("g", vec![filter("a", "error")])],
            LineBounds { start: 0, end: 4 },
            ViewKind::Projected,
            &mut cache,
        );
        assert_eq!(h.counts["a"], 1);
        assert_eq!(h.plan.groups[0].spans[0].line, 0);
    }

    #[test]
    fn test_projected_view_skips_lines_without_prefix() {
        let d = doc("1: error\nerror typed by hand\n3: error");
        let mut cache = PatternCache::new();
        let h = compute(
            &d,
            &[group("g", vec![filter("a", "error")])],
            LineBounds { start: 2, end: 5 },
            ViewKind::Projected,
            &mut cache,
        );
        assert_eq!(h.counts["a"], 1);
        let lines: Vec<usize> = h.plan.groups[0].spans.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![2]);
    }

    #[test]
    fn test_backtrack_limit_drops_only_that_filter() {
        // The first line matches "x"; the second exhausts the backtrack limit.
        let d = doc(&format!("x ab\n{}", "ab".repeat(40)));
        let mut slow = filter("slow", "(?:(a|b|ab)*(?=c))|x");
        slow.regex = true;
        slow.case_sensitive = true;
        slow.bold = true;
        let h = run(
            &d,
            &[
                group("first", vec![slow]),
                group("second", vec![filter("ok", "ab")]),
            ],
        );
        assert_eq!(h.counts["slow"], 0);
        assert_eq!(h.counts["ok"], 2);
        assert_eq!(h.plan.groups.len(), 1);
        assert!(!h.plan.groups[0].fingerprint.bold);
    }

    #[test]
    fn test_abort_returns_none() {
        let d = doc("a\nb\nc");
        let mut cache = PatternCache::new();
        let mut polls = 0;
        let result = compute_cancellable(
            &d,
            &[group("g", vec![filter("a", "a")])],
            LineBounds::whole(3),
            ViewKind::Source,
            &mut cache,
            &mut || {
                polls += 1;
                polls > 1
            },
        );
        assert!(result.is_none());
    }
}
