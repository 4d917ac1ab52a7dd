use crossterm::event::KeyCode;

/// What a key did to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Editing,
    Submit(String),
    Cancel,
}

/// Single-line prompt with a char-indexed cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    pub title: String,
    pub text: String,
    pub cursor: usize,
}

impl TextInput {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.chars().count();
        Self {
            title: title.into(),
            text,
            cursor,
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Edit {
        match code {
            KeyCode::Enter => return Edit::Submit(self.text.clone()),
            KeyCode::Esc => return Edit::Cancel,
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.len()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.len(),
            KeyCode::Char(c) => {
                let at = self.byte_index(self.cursor);
                self.text.insert(at, c);
                self.cursor += 1;
            }
            KeyCode::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                let at = self.byte_index(self.cursor);
                self.text.remove(at);
            }
            KeyCode::Delete if self.cursor < self.len() => {
                let at = self.byte_index(self.cursor);
                self.text.remove(at);
            }
            _ => {}
        }
        Edit::Editing
    }

    /// Cursor column in terminal cells, for placing the terminal cursor.
    pub fn cursor_column(&self) -> u16 {
        u16::try_from(self.cursor).unwrap_or(u16::MAX)
    }

    fn len(&self) -> usize {
        self.text.chars().count()
    }

    fn byte_index(&self, char_idx: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_idx)
            .map_or(self.text.len(), |(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(input: &mut TextInput, s: &str) {
        for c in s.chars() {
            input.handle_key(KeyCode::Char(c));
        }
    }

    #[test]
    fn test_insert_at_cursor() {
        let mut input = TextInput::new("Pattern", "ERR");
        input.handle_key(KeyCode::Home);
        type_str(&mut input, "é:");
        assert_eq!(input.text, "é:ERR");
        assert_eq!(input.cursor, 2);
    }

    #[test]
    fn test_backspace_and_delete() {
        let mut input = TextInput::new("Pattern", "abc");
        input.handle_key(KeyCode::Backspace);
        assert_eq!(input.text, "ab");
        input.handle_key(KeyCode::Home);
        input.handle_key(KeyCode::Delete);
        assert_eq!(input.text, "b");
        input.handle_key(KeyCode::Backspace);
        assert_eq!(input.text, "b");
    }

    #[test]
    fn test_submit_and_cancel() {
        let mut input = TextInput::new("Range name", "");
        type_str(&mut input, "tail");
        assert_eq!(input.handle_key(KeyCode::Enter), Edit::Submit("tail".into()));
        assert_eq!(input.handle_key(KeyCode::Esc), Edit::Cancel);
    }
}
