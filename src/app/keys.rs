//! Keyboard navigation for the preview, including the two-key `gg`.
//!
//! The pending first `g` lives in an explicit state with a timestamp and
//! expires on its own; nothing outside this type remembers the last key.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::mode::ViewMode;

/// Rows moved by `j`/`k`.
pub const LINE_STEP: isize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    ScrollBy(isize),
    HalfPageDown,
    HalfPageUp,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SequenceState {
    Idle,
    PendingG { since: Instant },
}

#[derive(Debug, Clone)]
pub struct KeySequence {
    state: SequenceState,
    timeout: Duration,
}

impl KeySequence {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: SequenceState::Idle,
            timeout,
        }
    }

    pub fn feed(&mut self, c: char, now: Instant) -> Option<NavCommand> {
        self.tick(now);
        let pending = matches!(self.state, SequenceState::PendingG { .. });
        self.state = SequenceState::Idle;

        match c {
            'g' if pending => Some(NavCommand::Top),
            'g' => {
                self.state = SequenceState::PendingG { since: now };
                None
            }
            'G' => Some(NavCommand::Bottom),
            'j' => Some(NavCommand::ScrollBy(LINE_STEP)),
            'k' => Some(NavCommand::ScrollBy(-LINE_STEP)),
            'd' => Some(NavCommand::HalfPageDown),
            'u' => Some(NavCommand::HalfPageUp),
            _ => None,
        }
    }

    /// Drop an expired pending `g`. Returns `true` if one expired.
    pub fn tick(&mut self, now: Instant) -> bool {
        if let SequenceState::PendingG { since } = self.state {
            if now.duration_since(since) >= self.timeout {
                self.state = SequenceState::Idle;
                return true;
            }
        }
        false
    }

    pub fn is_pending(&self) -> bool {
        self.state != SequenceState::Idle
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            SequenceState::Idle => None,
            SequenceState::PendingG { since } => Some(since + self.timeout),
        }
    }

    pub fn reset(&mut self) {
        self.state = SequenceState::Idle;
    }
}

/// `Ctrl+Shift+P/E/S`, or `Alt+p/e/s` where the terminal swallows the former.
pub fn view_mode_shortcut(key: &KeyEvent) -> Option<ViewMode> {
    let KeyCode::Char(c) = key.code else {
        return None;
    };
    let ctrl_shift = key.modifiers.contains(KeyModifiers::CONTROL | KeyModifiers::SHIFT);
    let alt = key.modifiers.contains(KeyModifiers::ALT)
        && !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::SHIFT)
        && !c.is_ascii_uppercase();
    if !(ctrl_shift || alt) {
        return None;
    }
    match c.to_ascii_lowercase() {
        'p' => Some(ViewMode::Preview),
        'e' => Some(ViewMode::Edit),
        's' => Some(ViewMode::Split),
        _ => None,
    }
}
