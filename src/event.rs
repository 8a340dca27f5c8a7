use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEventKind};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::app::App;
use crate::ui;

/// Longest wait for input while background work may still reply.
const BUSY_POLL: Duration = Duration::from_millis(30);
const IDLE_POLL: Duration = Duration::from_millis(250);

pub fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui::render(f, app))?;

        if app.should_quit {
            return Ok(());
        }

        if event::poll(poll_timeout(app, Instant::now()))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    app.handle_key(key, Instant::now());
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse, Instant::now()),
                _ => {}
            }
        }

        app.tick(Instant::now());
    }
}

/// Sleep until the next timer is due, but never so long that service replies
/// sit unseen.
fn poll_timeout(app: &App, now: Instant) -> Duration {
    let cap = if app.is_busy() { BUSY_POLL } else { IDLE_POLL };
    match app.next_deadline() {
        Some(deadline) => deadline.saturating_duration_since(now).min(cap),
        None => cap,
    }
}
