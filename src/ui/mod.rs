mod editor;
mod outline;
mod preview;
mod status_bar;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders},
    Frame,
};

use crate::app::{App, Focus, ViewMode};

pub use editor::render_editor;
pub use outline::render_outline;
pub use preview::render_preview;
pub use status_bar::render_status_bar;

const OUTLINE_WIDTH: u16 = 28;

pub fn render(f: &mut Frame, app: &mut App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(f.area());
    let (body, status) = (rows[0], rows[1]);

    let body = if app.outline.collapsed || body.width <= OUTLINE_WIDTH * 2 {
        app.outline_area = Rect::default();
        body
    } else {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(OUTLINE_WIDTH), Constraint::Min(1)])
            .split(body);
        app.outline_area = columns[0];
        render_outline(f, app, columns[0]);
        columns[1]
    };

    match app.view_mode {
        ViewMode::Preview => {
            app.editor_area = Rect::default();
            render_preview(f, app, body);
        }
        ViewMode::Edit => {
            app.preview_area = Rect::default();
            render_editor(f, app, body);
        }
        ViewMode::Split => {
            let halves = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(body);
            render_editor(f, app, halves[0]);
            render_preview(f, app, halves[1]);
        }
    }

    render_status_bar(f, app, status);
}

/// Bordered frame for a pane, highlighted while it has focus.
fn pane_block(title: &str, focused: bool) -> Block<'static> {
    let color = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

fn is_focused(app: &App, focus: Focus) -> bool {
    app.focus == focus
}
