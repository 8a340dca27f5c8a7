use serde::{Deserialize, Serialize};

/// Which panes are mounted. Changed only by explicit user action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Preview,
    Edit,
    Split,
}

impl ViewMode {
    pub fn mounts_preview(self) -> bool {
        matches!(self, ViewMode::Preview | ViewMode::Split)
    }

    pub fn mounts_editor(self) -> bool {
        matches!(self, ViewMode::Edit | ViewMode::Split)
    }

    /// Both panes are mounted, so scrolling is synchronized.
    pub fn syncs_scroll(self) -> bool {
        self == ViewMode::Split
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Preview => "PREVIEW",
            ViewMode::Edit => "EDIT",
            ViewMode::Split => "SPLIT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Preview,
    Editor,
    Outline,
}

impl Focus {
    /// Next focus target among what `mode` mounts, plus the outline when shown.
    pub fn cycle(self, mode: ViewMode, outline_visible: bool) -> Focus {
        let mut order = Vec::with_capacity(3);
        if mode.mounts_editor() {
            order.push(Focus::Editor);
        }
        if mode.mounts_preview() {
            order.push(Focus::Preview);
        }
        if outline_visible {
            order.push(Focus::Outline);
        }
        match order.iter().position(|f| *f == self) {
            Some(i) => order[(i + 1) % order.len()],
            None => order.first().copied().unwrap_or(Focus::Preview),
        }
    }

    /// Where focus belongs after switching to `mode`.
    pub fn settle(self, mode: ViewMode) -> Focus {
        match (self, mode) {
            (Focus::Editor, ViewMode::Preview) => Focus::Preview,
            (Focus::Preview, ViewMode::Edit) => Focus::Editor,
            (Focus::Outline, _) => Focus::Outline,
            (focus, _) => focus,
        }
    }
}
