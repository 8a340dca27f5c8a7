//! The editable source pane.

mod buffer;
mod cursor;
mod input;

pub use buffer::TextBuffer;
pub use cursor::apply_move;
pub use input::{process_key, InputAction};

use crate::scroll::{ScrollMetrics, ScrollPane};

#[derive(Debug, Clone, Default)]
pub struct Editor {
    buffer: TextBuffer,
    cursor: (usize, usize),
    scroll_top: usize,
    view_height: usize,
}

impl Editor {
    #[cfg(test)]
    pub fn from_text(text: &str) -> Self {
        Self {
            buffer: TextBuffer::from_text(text),
            ..Self::default()
        }
    }

    /// Replace the whole text, keeping cursor and scroll where they still fit.
    pub fn set_text(&mut self, text: &str) {
        self.buffer = TextBuffer::from_text(text);
        let last_row = self.buffer.line_count().saturating_sub(1);
        let row = self.cursor.0.min(last_row);
        self.cursor = (row, self.cursor.1.min(self.buffer.line_len(row)));
        self.scroll_top = self.scroll_top.min(self.max_scroll());
    }

    pub fn text(&self) -> String {
        self.buffer.text()
    }

    pub fn lines(&self) -> Vec<&str> {
        self.buffer.lines()
    }

    #[cfg(test)]
    pub fn line_count(&self) -> usize {
        self.buffer.line_count()
    }

    pub fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn set_view_height(&mut self, height: usize) {
        self.view_height = height;
        self.scroll_top = self.scroll_top.min(self.max_scroll());
    }

    /// Apply a key action. Returns `true` when the text changed.
    pub fn apply(&mut self, action: InputAction) -> bool {
        let (row, col) = self.cursor;
        let changed = match action {
            InputAction::InsertChar(c) => {
                self.buffer.insert_char(row, col, c);
                self.cursor = (row, col + 1);
                true
            }
            InputAction::InsertNewline => {
                let split = self.buffer.split_line(row, col);
                if split {
                    self.cursor = (row + 1, 0);
                }
                split
            }
            InputAction::DeleteChar => {
                if col < self.buffer.line_len(row) {
                    self.buffer.delete_char(row, col).is_some()
                } else {
                    self.buffer.join_with_previous(row + 1)
                }
            }
            InputAction::DeleteCharBefore => {
                if col > 0 {
                    let deleted = self.buffer.delete_char(row, col - 1).is_some();
                    if deleted {
                        self.cursor = (row, col - 1);
                    }
                    deleted
                } else if row > 0 {
                    let joined_at = self.buffer.line_len(row - 1);
                    let joined = self.buffer.join_with_previous(row);
                    if joined {
                        self.cursor = (row - 1, joined_at);
                    }
                    joined
                } else {
                    false
                }
            }
            InputAction::Move(movement) => {
                self.cursor = apply_move(&self.buffer, self.cursor, movement, self.view_height);
                false
            }
            InputAction::None => false,
        };
        self.reveal_cursor();
        changed
    }

    /// Put `row` at the top of the view, as far as the text allows.
    pub fn scroll_to(&mut self, row: usize) {
        self.scroll_top = row.min(self.max_scroll());
    }

    /// Scroll by `delta` rows without touching the cursor.
    pub fn scroll_by(&mut self, delta: isize) {
        self.scroll_to(self.scroll_top.saturating_add_signed(delta));
    }

    fn max_scroll(&self) -> usize {
        self.buffer.line_count().saturating_sub(self.view_height)
    }

    fn reveal_cursor(&mut self) {
        let row = self.cursor.0;
        if row < self.scroll_top {
            self.scroll_top = row;
        } else if self.view_height > 0 && row >= self.scroll_top + self.view_height {
            self.scroll_top = row + 1 - self.view_height;
        }
    }
}

impl ScrollPane for Editor {
    fn metrics(&self) -> ScrollMetrics {
        ScrollMetrics::new(self.scroll_top, self.buffer.line_count(), self.view_height)
    }

    fn scroll_to_fraction(&mut self, fraction: f64) {
        let offset = self.metrics().offset_for_fraction(fraction).round() as usize;
        self.scroll_to(offset);
    }
}
