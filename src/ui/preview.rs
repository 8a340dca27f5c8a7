use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::{is_focused, pane_block};
use crate::app::{App, Focus};

pub fn render_preview(f: &mut Frame, app: &mut App, area: Rect) {
    app.preview_area = area;
    let title = app.document.file_name().unwrap_or_else(|| "preview".to_string());
    let block = pane_block(&title, is_focused(app, Focus::Preview));
    let inner = block.inner(area);
    f.render_widget(block, area);

    app.layout_preview(inner.width, inner.height);

    if app.pipeline.tree().is_none() {
        let placeholder = if app.pipeline.is_converting() {
            "rendering…"
        } else {
            "nothing to show"
        };
        let text = Line::from(Span::styled(
            placeholder,
            Style::default().fg(app.palette.muted).add_modifier(Modifier::ITALIC),
        ));
        f.render_widget(Paragraph::new(text), inner);
        return;
    }

    let top = app.preview.scroll_top();
    let visible: Vec<Line> = app
        .preview
        .layout
        .lines
        .iter()
        .skip(top)
        .take(inner.height as usize)
        .cloned()
        .collect();
    f.render_widget(Paragraph::new(visible), inner);
}
