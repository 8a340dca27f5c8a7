use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::{is_focused, pane_block};
use crate::app::{App, Focus};
use crate::markdown::Palette;

pub fn render_editor(f: &mut Frame, app: &mut App, area: Rect) {
    app.editor_area = area;
    let focused = is_focused(app, Focus::Editor);
    let title = if app.document.is_dirty() { "source [+]" } else { "source" };
    let block = pane_block(title, focused);
    let inner = block.inner(area);
    f.render_widget(block, area);

    app.editor.set_view_height(inner.height as usize);
    let top = app.editor.scroll_top();

    let lines: Vec<Line> = app
        .editor
        .lines()
        .into_iter()
        .skip(top)
        .take(inner.height as usize)
        .map(|line| source_line(line, &app.palette))
        .collect();
    f.render_widget(Paragraph::new(lines), inner);

    if focused {
        let (row, col) = app.editor.cursor();
        if row >= top && row < top + inner.height as usize {
            let display_col = app
                .editor
                .lines()
                .get(row)
                .map(|line| line.chars().take(col).count())
                .unwrap_or(0);
            let x = inner.x + display_col as u16;
            let y = inner.y + (row - top) as u16;
            if x < inner.x + inner.width {
                f.set_cursor_position((x, y));
            }
        }
    }
}

/// Light markup hints for a raw source line.
fn source_line(line: &str, palette: &Palette) -> Line<'static> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    let style = if (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ') {
        Style::default()
            .fg(palette.heading_colors[hashes - 1])
            .add_modifier(Modifier::BOLD)
    } else if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
        Style::default().fg(palette.code_color)
    } else if trimmed.starts_with('>') {
        Style::default().fg(palette.blockquote_color)
    } else if trimmed == "---" {
        Style::default().fg(palette.rule_color)
    } else {
        Style::default()
    };
    Line::from(Span::styled(line.to_string(), style))
}
