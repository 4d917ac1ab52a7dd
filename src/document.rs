//! Line-addressable text buffer.
//!
//! The full text is kept verbatim so a matched-lines view can be undone by
//! substituting the saved text back. Line views never include the `\n`
//! terminator or a trailing `\r`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    uri: String,
    text: String,
    line_starts: Vec<usize>,
}

impl Document {
    pub fn new(uri: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let line_starts = index_lines(&text);
        Self {
            uri: uri.into(),
            text,
            line_starts,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.line_starts = index_lines(&self.text);
    }

    /// Always at least one: an empty document has a single empty line.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn line(&self, idx: usize) -> Option<&str> {
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        let line = &self.text[start..end];
        Some(line.strip_suffix('\r').unwrap_or(line))
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        (0..self.line_count()).filter_map(move |i| self.line(i))
    }
}

/// Number of lines `text` would have as a [`Document`].
pub fn count_lines(text: &str) -> usize {
    text.matches('\n').count() + 1
}

fn index_lines(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_has_one_line() {
        let doc = Document::new("mem://a", "");
        assert_eq!(doc.line_count(), 1);
        assert_eq!(doc.line(0), Some(""));
        assert_eq!(doc.line(1), None);
    }

    #[test]
    fn test_trailing_newline_adds_empty_line() {
        let doc = Document::new("mem://a", "one\ntwo\n");
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.lines().collect::<Vec<_>>(), vec!["one", "two", ""]);
    }

    #[test]
    fn test_crlf_is_hidden_from_lines_but_kept_in_text() {
        let doc = Document::new("mem://a", "a\r\nb");
        assert_eq!(doc.line(0), Some("a"));
        assert_eq!(doc.line(1), Some("b"));
        assert_eq!(doc.text(), "a\r\nb");
    }

    #[test]
    fn test_count_lines_matches_document() {
        for text in ["", "a", "a\n", "a\r\nb\n\n"] {
            assert_eq!(count_lines(text), Document::new("x", text).line_count());
        }
    }

    #[test]
    fn test_set_text_reindexes() {
        let mut doc = Document::new("mem://a", "x");
        doc.set_text("x\ny\nz");
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.line(2), Some("z"));
    }
}
