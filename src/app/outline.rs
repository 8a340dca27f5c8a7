use ratatui::widgets::ListState;

use crate::markdown::Anchor;

/// Selection and level filters of the outline panel.
#[derive(Debug, Clone, Default)]
pub struct OutlineState {
    pub list_state: ListState,
    pub collapsed: bool,
    /// Index 0 is level 1
    hidden_levels: [bool; 6],
}

impl OutlineState {
    pub fn new(collapsed: bool) -> Self {
        Self {
            collapsed,
            ..Self::default()
        }
    }

    pub fn is_level_hidden(&self, level: u8) -> bool {
        level_index(level).is_some_and(|i| self.hidden_levels[i])
    }

    pub fn toggle_level(&mut self, level: u8) {
        if let Some(i) = level_index(level) {
            self.hidden_levels[i] = !self.hidden_levels[i];
            self.list_state.select(None);
        }
    }

    pub fn visible<'a>(&self, anchors: &'a [Anchor]) -> Vec<&'a Anchor> {
        anchors
            .iter()
            .filter(|a| !self.is_level_hidden(a.level))
            .collect()
    }

    pub fn toggle_collapsed(&mut self) {
        self.collapsed = !self.collapsed;
    }

    pub fn next(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1) % count,
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn previous(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => count - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    pub fn first(&mut self, count: usize) {
        if count > 0 {
            self.list_state.select(Some(0));
        }
    }

    pub fn last(&mut self, count: usize) {
        if count > 0 {
            self.list_state.select(Some(count - 1));
        }
    }

    /// Id of the selected entry among `anchors` after filtering.
    pub fn selected_id(&self, anchors: &[Anchor]) -> Option<String> {
        let index = self.list_state.selected()?;
        self.visible(anchors).get(index).map(|a| a.id.clone())
    }

    /// Follow the active anchor, if it is shown.
    pub fn select_id(&mut self, anchors: &[Anchor], id: &str) {
        if let Some(i) = self.visible(anchors).iter().position(|a| a.id == id) {
            self.list_state.select(Some(i));
        }
    }

    /// Drop a selection that no longer points at an entry.
    pub fn clamp(&mut self, count: usize) {
        match self.list_state.selected() {
            Some(_) if count == 0 => self.list_state.select(None),
            Some(i) if i >= count => self.list_state.select(Some(count - 1)),
            _ => {}
        }
    }
}

fn level_index(level: u8) -> Option<usize> {
    (1..=6).contains(&level).then(|| level as usize - 1)
}
