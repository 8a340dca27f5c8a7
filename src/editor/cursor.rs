use super::buffer::TextBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMove {
    Forward,
    Back,
    Up,
    Down,
    Head,
    End,
    PageUp,
    PageDown,
    Top,
    Bottom,
}

/// Where the cursor at `(row, col)` lands after `movement`. `page` is the
/// number of rows a page move covers.
pub fn apply_move(buffer: &TextBuffer, (row, col): (usize, usize), movement: CursorMove, page: usize) -> (usize, usize) {
    let last_row = buffer.line_count().saturating_sub(1);
    let clamp_col = |row: usize, col: usize| col.min(buffer.line_len(row));

    match movement {
        CursorMove::Forward => {
            if col < buffer.line_len(row) {
                (row, col + 1)
            } else if row < last_row {
                (row + 1, 0)
            } else {
                (row, col)
            }
        }
        CursorMove::Back => {
            if col > 0 {
                (row, col - 1)
            } else if row > 0 {
                (row - 1, buffer.line_len(row - 1))
            } else {
                (row, col)
            }
        }
        CursorMove::Up => {
            let row = row.saturating_sub(1);
            (row, clamp_col(row, col))
        }
        CursorMove::Down => {
            let row = (row + 1).min(last_row);
            (row, clamp_col(row, col))
        }
        CursorMove::Head => (row, 0),
        CursorMove::End => (row, buffer.line_len(row)),
        CursorMove::PageUp => {
            let row = row.saturating_sub(page.max(1));
            (row, clamp_col(row, col))
        }
        CursorMove::PageDown => {
            let row = (row + page.max(1)).min(last_row);
            (row, clamp_col(row, col))
        }
        CursorMove::Top => (0, 0),
        CursorMove::Bottom => (last_row, buffer.line_len(last_row)),
    }
}
