use super::model::{Range, DEFAULT_RANGE_ID};

/// Inclusive, 0-based line interval. Empty when `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineBounds {
    pub start: usize,
    pub end: usize,
}

impl LineBounds {
    pub fn whole(line_count: usize) -> Self {
        Self {
            start: 0,
            end: line_count.saturating_sub(1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }

    /// Half-open index range suitable for iteration.
    pub fn indices(&self) -> std::ops::Range<usize> {
        if self.is_empty() {
            self.start..self.start
        } else {
            self.start..self.end + 1
        }
    }
}

/// Map the active range id onto concrete bounds for a document of
/// `line_count` lines. Unknown ids and the reserved default id cover the whole
/// document.
pub fn resolve(active_range_id: &str, ranges: &[Range], line_count: usize) -> LineBounds {
    if active_range_id == DEFAULT_RANGE_ID {
        return LineBounds::whole(line_count);
    }
    match ranges.iter().find(|r| r.id == active_range_id) {
        Some(range) => clamp(range, line_count),
        None => LineBounds::whole(line_count),
    }
}

fn clamp(range: &Range, line_count: usize) -> LineBounds {
    let last = line_count.saturating_sub(1);
    let start = range.start.max(0) as usize;
    let end = if range.end >= 0 {
        (range.end as usize).min(last)
    } else {
        last
    };
    LineBounds { start, end }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(id: &str, start: i64, end: i64) -> Range {
        Range {
            id: id.to_string(),
            name: id.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_open_end_runs_to_last_line() {
        let ranges = vec![range("r", 5, -1)];
        assert_eq!(resolve("r", &ranges, 10), LineBounds { start: 5, end: 9 });
    }

    #[test]
    fn test_end_is_inclusive() {
        let ranges = vec![range("r", 0, 3)];
        let bounds = resolve("r", &ranges, 10);
        assert_eq!(bounds, LineBounds { start: 0, end: 3 });
        assert_eq!(bounds.indices(), 0..4);
    }

    #[test]
    fn test_missing_range_falls_back_to_whole_document() {
        let ranges = vec![range("r", 2, 3)];
        assert_eq!(resolve("gone", &ranges, 7), LineBounds { start: 0, end: 6 });
        assert_eq!(resolve("default", &ranges, 7), LineBounds { start: 0, end: 6 });
    }

    #[test]
    fn test_end_clamped_to_document() {
        let ranges = vec![range("r", 2, 100)];
        assert_eq!(resolve("r", &ranges, 5), LineBounds { start: 2, end: 4 });
    }

    #[test]
    fn test_start_past_end_of_document_is_empty() {
        let ranges = vec![range("r", 20, -1)];
        let bounds = resolve("r", &ranges, 5);
        assert!(bounds.is_empty());
        assert_eq!(bounds.indices().count(), 0);
    }
}
