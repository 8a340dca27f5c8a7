use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
    Frame,
};

use super::{is_focused, pane_block};
use crate::app::{App, Focus};

pub fn render_outline(f: &mut Frame, app: &mut App, area: Rect) {
    let anchors = app.pipeline.anchors();
    let visible = app.outline.visible(anchors);
    let active = app.tracker.active();
    let palette = &app.palette;

    let title = if visible.len() == anchors.len() {
        format!("outline {}", anchors.len())
    } else {
        format!("outline {}/{}", visible.len(), anchors.len())
    };
    let block = pane_block(&title, is_focused(app, Focus::Outline));
    let max_width = block.inner(area).width as usize;

    let items: Vec<ListItem> = visible
        .iter()
        .map(|anchor| {
            let indent = "  ".repeat(anchor.level.saturating_sub(1) as usize);
            let available = max_width.saturating_sub(indent.chars().count() + 1);
            let text = if anchor.text.chars().count() > available {
                let cut: String = anchor.text.chars().take(available.saturating_sub(1)).collect();
                format!("{}…", cut)
            } else {
                anchor.text.clone()
            };

            let color = palette.heading_colors[(anchor.level.clamp(1, 6) - 1) as usize];
            let mut style = Style::default().fg(color);
            if active == Some(anchor.id.as_str()) {
                style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
            }
            ListItem::new(Line::from(vec![
                Span::raw(indent),
                Span::styled(text, style),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("›");

    f.render_stateful_widget(list, area, &mut app.outline.list_state);
}
