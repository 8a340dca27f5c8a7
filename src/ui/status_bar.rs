use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, StatusLevel};

const BACKGROUND: Color = Color::Rgb(30, 30, 40);
const SEPARATOR: Color = Color::DarkGray;
const FOREGROUND: Color = Color::Gray;

pub fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let path = app
        .document
        .path()
        .map(|p| {
            let path_str = p.to_string_lossy().to_string();
            if let Some(home) = dirs::home_dir() {
                let home_str = home.to_string_lossy().to_string();
                if path_str.starts_with(&home_str) {
                    return path_str.replacen(&home_str, "~", 1);
                }
            }
            path_str
        })
        .unwrap_or_else(|| "[scratch]".to_string());

    let brand = Span::styled(
        " mdpane ",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    );
    let separator = || Span::styled("›", Style::default().fg(SEPARATOR));
    let mode = Span::styled(
        format!(" {} ", app.view_mode.label().to_lowercase()),
        Style::default().fg(FOREGROUND),
    );

    let mut left = vec![brand, separator(), mode];
    if app.keys.is_pending() {
        left.push(separator());
        left.push(Span::styled(
            " g ",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    }
    left.push(separator());
    let dirty = if app.document.is_dirty() { " [+]" } else { "" };
    left.push(Span::styled(
        format!(" {}{}", path, dirty),
        Style::default().fg(FOREGROUND),
    ));
    if app.document.changed_on_disk() {
        left.push(Span::styled(
            " (changed on disk)",
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(status) = &app.status {
        let color = match status.level {
            StatusLevel::Info => Color::Green,
            StatusLevel::Warning => Color::Yellow,
            StatusLevel::Error => Color::Red,
        };
        left.push(Span::styled(" › ", Style::default().fg(SEPARATOR)));
        left.push(Span::styled(
            status.text.clone(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
    }

    let mut right = Vec::new();
    if app.pipeline.last_error().is_some() {
        right.push(Span::styled(
            "last good render  ",
            Style::default().fg(Color::Yellow),
        ));
    }
    let (found, missing, pending) = app.pipeline.assets().summary();
    if found + missing + pending > 0 {
        let color = if missing > 0 {
            app.palette.missing_color
        } else {
            app.palette.muted
        };
        let mut summary = format!("images: {} found, {} missing", found, missing);
        if pending > 0 {
            summary.push_str(&format!(", {} pending", pending));
        }
        summary.push_str("  ");
        right.push(Span::styled(summary, Style::default().fg(color)));
    }
    right.push(Span::styled(
        format!("{} words", app.document.word_count()),
        Style::default().fg(FOREGROUND),
    ));
    if app.view_mode.mounts_preview() {
        right.push(Span::styled(
            format!("  {}%", app.progress()),
            Style::default().fg(FOREGROUND),
        ));
    }
    right.push(Span::styled("  ^q quit ", Style::default().fg(FOREGROUND)));

    let left_width: usize = left.iter().map(|s| s.content.chars().count()).sum();
    let right_width: usize = right.iter().map(|s| s.content.chars().count()).sum();
    let padding = (area.width as usize).saturating_sub(left_width + right_width);

    let bg_style = Style::default().bg(BACKGROUND);
    let mut spans = left;
    spans.push(Span::styled(" ".repeat(padding), bg_style));
    spans.extend(right);

    f.render_widget(Paragraph::new(Line::from(spans)).style(bg_style), area);
}
