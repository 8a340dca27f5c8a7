use std::cmp::Ordering;

/// Line-based gap buffer holding the document source while it is edited.
/// `before` holds the lines above the gap, `after` the lines below it in
/// reverse order, so edits around the cursor stay cheap.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    before: Vec<String>,
    after: Vec<String>,
    /// Whether the text ended with a newline when loaded
    trailing_newline: bool,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self {
            before: vec![String::new()],
            after: Vec::new(),
            trailing_newline: false,
        }
    }
}

impl TextBuffer {
    pub fn from_text(text: &str) -> Self {
        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);
        let before: Vec<String> = body
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();
        Self {
            before,
            after: Vec::new(),
            trailing_newline,
        }
    }

    /// The full text, newline-joined, with the original trailing newline.
    pub fn text(&self) -> String {
        let mut out = self.lines().join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    #[inline]
    pub fn line_count(&self) -> usize {
        self.before.len() + self.after.len()
    }

    #[inline]
    fn gap_pos(&self) -> usize {
        self.before.len()
    }

    fn move_gap_to(&mut self, row: usize) {
        let current = self.gap_pos();
        match row.cmp(&current) {
            Ordering::Equal => {}
            Ordering::Less => {
                for _ in row..current {
                    if let Some(line) = self.before.pop() {
                        self.after.push(line);
                    }
                }
            }
            Ordering::Greater => {
                let target = row.min(self.line_count());
                for _ in current..target {
                    if let Some(line) = self.after.pop() {
                        self.before.push(line);
                    }
                }
            }
        }
    }

    pub fn line(&self, row: usize) -> Option<&str> {
        let gap_pos = self.gap_pos();
        if row < gap_pos {
            self.before.get(row).map(|s| s.as_str())
        } else {
            let after_idx = self.after.len().checked_sub(row - gap_pos + 1)?;
            self.after.get(after_idx).map(|s| s.as_str())
        }
    }

    fn line_mut(&mut self, row: usize) -> Option<&mut String> {
        self.move_gap_to(row + 1);
        self.before.get_mut(row)
    }

    /// Length of `row` in characters.
    pub fn line_len(&self, row: usize) -> usize {
        self.line(row).map_or(0, |l| l.chars().count())
    }

    pub fn lines(&self) -> Vec<&str> {
        self.before
            .iter()
            .chain(self.after.iter().rev())
            .map(String::as_str)
            .collect()
    }

    pub fn insert_char(&mut self, row: usize, col: usize, c: char) {
        if let Some(line) = self.line_mut(row) {
            let byte_idx = char_to_byte_index(line, col);
            line.insert(byte_idx, c);
        }
    }

    pub fn delete_char(&mut self, row: usize, col: usize) -> Option<char> {
        let line = self.line_mut(row)?;
        if col >= line.chars().count() {
            return None;
        }
        let byte_idx = char_to_byte_index(line, col);
        Some(line.remove(byte_idx))
    }

    /// Break `row` at `col`; the remainder becomes the next line.
    pub fn split_line(&mut self, row: usize, col: usize) -> bool {
        self.move_gap_to(row + 1);
        if let Some(line) = self.before.get_mut(row) {
            let byte_idx = char_to_byte_index(line, col);
            let remainder = line.split_off(byte_idx);
            self.before.push(remainder);
            return true;
        }
        false
    }

    pub fn join_with_previous(&mut self, row: usize) -> bool {
        if row == 0 || row >= self.line_count() {
            return false;
        }
        self.move_gap_to(row + 1);
        let Some(current_line) = self.before.pop() else {
            return false;
        };
        match self.before.last_mut() {
            Some(prev_line) => {
                prev_line.push_str(&current_line);
                true
            }
            None => {
                self.before.push(current_line);
                false
            }
        }
    }
}

fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices().nth(char_idx).map(|(i, _)| i).unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer() {
        let buf = TextBuffer::default();
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.line(0), Some(""));
        assert_eq!(buf.text(), "");
    }

    #[test]
    fn test_text_round_trips_trailing_newline() {
        assert_eq!(TextBuffer::from_text("a\nb\n").text(), "a\nb\n");
        assert_eq!(TextBuffer::from_text("a\nb").text(), "a\nb");
        assert_eq!(TextBuffer::from_text("a\r\nb\r\n").text(), "a\nb\n");
        assert_eq!(TextBuffer::from_text("a\n\n").line_count(), 2);
    }

    #[test]
    fn test_insert_and_delete_char() {
        let mut buf = TextBuffer::from_text("héllo");
        buf.insert_char(0, 5, '!');
        assert_eq!(buf.line(0), Some("héllo!"));
        assert_eq!(buf.delete_char(0, 1), Some('é'));
        assert_eq!(buf.line(0), Some("hllo!"));
        assert_eq!(buf.delete_char(0, 10), None);
    }

    #[test]
    fn test_split_line() {
        let mut buf = TextBuffer::from_text("hello world\nnext");
        buf.split_line(0, 5);
        assert_eq!(buf.lines(), vec!["hello", " world", "next"]);
    }

    #[test]
    fn test_join_lines() {
        let mut buf = TextBuffer::from_text("hello\n world\nlast");
        assert!(buf.join_with_previous(1));
        assert_eq!(buf.lines(), vec!["hello world", "last"]);
        assert!(!buf.join_with_previous(0));
        assert!(!buf.join_with_previous(5));
    }

    #[test]
    fn test_edits_away_from_gap() {
        let mut buf = TextBuffer::from_text("a\nb\nc\nd");
        buf.insert_char(3, 1, '!');
        buf.insert_char(0, 0, '>');
        assert_eq!(buf.text(), ">a\nb\nc\nd!");
    }
}
