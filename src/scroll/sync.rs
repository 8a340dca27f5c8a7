//! Keeps the editor and preview at the same scroll fraction in split mode.
//!
//! Moving one pane moves the other, which the other reports as a scroll of
//! its own. The lock below makes sure that echo is dropped instead of being
//! fed back, so the two panes never chase each other.

use std::time::{Duration, Instant};

use super::metrics::ScrollPane;
use crate::timer::{earliest, Debounce};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pane {
    Editor,
    Preview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    DrivenByEditor,
    DrivenByPreview,
}

impl SyncState {
    fn driven_by(pane: Pane) -> Self {
        match pane {
            Pane::Editor => SyncState::DrivenByEditor,
            Pane::Preview => SyncState::DrivenByPreview,
        }
    }

    pub fn owner(self) -> Option<Pane> {
        match self {
            SyncState::Idle => None,
            SyncState::DrivenByEditor => Some(Pane::Editor),
            SyncState::DrivenByPreview => Some(Pane::Preview),
        }
    }
}

pub struct ScrollSynchronizer {
    state: SyncState,
    release: Debounce,
    release_owner: Option<Pane>,
    settle: Debounce,
    /// Pane that most recently reported a position
    last_known: Option<Pane>,
    enabled: bool,
}

impl ScrollSynchronizer {
    pub fn new(release_after: Duration, settle_after: Duration) -> Self {
        Self {
            state: SyncState::Idle,
            release: Debounce::new(release_after),
            release_owner: None,
            settle: Debounce::new(settle_after),
            last_known: None,
            enabled: false,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SyncState {
        self.state
    }

    #[cfg(test)]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turned on when both panes are mounted. Entering schedules a one-shot
    /// alignment once layout has settled.
    pub fn set_enabled(&mut self, enabled: bool, now: Instant) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            self.settle.arm(now);
        } else {
            self.settle.cancel();
            self.release.cancel();
            self.release_owner = None;
            self.state = SyncState::Idle;
        }
    }

    /// A pane scrolled. Returns `true` if the other pane was moved.
    pub fn on_scroll(
        &mut self,
        source: Pane,
        now: Instant,
        editor: &mut dyn ScrollPane,
        preview: &mut dyn ScrollPane,
    ) -> bool {
        if !self.enabled {
            self.last_known = Some(source);
            return false;
        }
        if let Some(owner) = self.state.owner() {
            if owner != source {
                log::trace!("ignoring {:?} scroll while {:?} holds the lock", source, owner);
                return false;
            }
        }
        self.last_known = Some(source);
        self.drive(source, now, editor, preview);
        true
    }

    pub fn tick(&mut self, now: Instant, editor: &mut dyn ScrollPane, preview: &mut dyn ScrollPane) {
        if self.release.fire(now) {
            if self.state.owner() == self.release_owner {
                self.state = SyncState::Idle;
            }
            self.release_owner = None;
        }
        if self.settle.fire(now) && self.enabled {
            let source = self.last_known.unwrap_or(Pane::Editor);
            log::debug!("aligning panes from {:?} after entering split view", source);
            self.drive(source, now, editor, preview);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([self.release.deadline(), self.settle.deadline()])
    }

    fn drive(&mut self, source: Pane, now: Instant, editor: &mut dyn ScrollPane, preview: &mut dyn ScrollPane) {
        self.state = SyncState::driven_by(source);
        self.release_owner = Some(source);
        self.release.arm(now);
        match source {
            Pane::Editor => preview.scroll_to_fraction(editor.metrics().fraction()),
            Pane::Preview => editor.scroll_to_fraction(preview.metrics().fraction()),
        }
    }
}
