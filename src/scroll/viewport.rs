//! Which heading the reader is currently looking at.
//!
//! A heading counts as reached once its row enters the top fifth of the
//! preview. Of the headings inside that band the one nearest the top wins;
//! with none inside, the previous answer stands.

use std::time::{Duration, Instant};

use crate::markdown::AnchorRow;
use crate::timer::Debounce;

/// Share of the viewport height, from the top, that counts as "reached".
const BAND_PERCENT: usize = 20;

/// Rows left above a heading after jumping to it.
pub const JUMP_OFFSET: usize = 2;

pub struct ViewportTracker {
    observed: Vec<AnchorRow>,
    intersecting: Vec<AnchorRow>,
    active: Option<String>,
    refresh: Debounce,
}

impl ViewportTracker {
    pub fn new(refresh_after: Duration) -> Self {
        Self {
            observed: Vec::new(),
            intersecting: Vec::new(),
            active: None,
            refresh: Debounce::new(refresh_after),
        }
    }

    /// Rendered content changed; re-observe once it stops changing.
    pub fn content_changed(&mut self, now: Instant) {
        self.refresh.arm(now);
    }

    /// Picks up `rows` if the refresh delay has run out. Returns `true` when
    /// the observed set was replaced.
    pub fn tick(&mut self, now: Instant, rows: &[AnchorRow]) -> bool {
        if !self.refresh.fire(now) {
            return false;
        }
        self.observe_rows(rows);
        true
    }

    /// Replace the observed anchors right away.
    pub fn observe_rows(&mut self, rows: &[AnchorRow]) {
        self.observed = rows.to_vec();
        self.intersecting.clear();
        let still_present = self
            .active
            .as_deref()
            .is_some_and(|id| self.observed.iter().any(|a| a.id == id));
        if !still_present {
            self.active = None;
        }
    }

    /// Recompute the active anchor for a viewport starting at `scroll_top`.
    /// Returns `true` if it changed.
    pub fn observe(&mut self, scroll_top: usize, viewport_height: usize) -> bool {
        let band = (viewport_height * BAND_PERCENT / 100).max(1);
        let bottom = scroll_top + band;

        self.intersecting = self
            .observed
            .iter()
            .filter(|a| a.row >= scroll_top && a.row < bottom)
            .cloned()
            .collect();

        let nearest = self
            .intersecting
            .iter()
            .min_by_key(|a| a.row - scroll_top)
            .map(|a| a.id.clone());

        match nearest {
            Some(id) if self.active.as_deref() != Some(id.as_str()) => {
                self.active = Some(id);
                true
            }
            _ => false,
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Force the active anchor, e.g. after jumping to it from the outline.
    pub fn set_active(&mut self, id: &str) {
        self.active = Some(id.to_string());
    }

    #[cfg(test)]
    fn intersecting(&self) -> Vec<&str> {
        self.intersecting.iter().map(|a| a.id.as_str()).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.refresh.deadline()
    }

    pub fn reset(&mut self) {
        self.observed.clear();
        self.intersecting.clear();
        self.active = None;
        self.refresh.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(pairs: &[(&str, usize)]) -> Vec<AnchorRow> {
        pairs
            .iter()
            .map(|(id, row)| AnchorRow {
                id: id.to_string(),
                row: *row,
            })
            .collect()
    }

    fn tracker(pairs: &[(&str, usize)]) -> ViewportTracker {
        let mut tracker = ViewportTracker::new(Duration::from_millis(300));
        tracker.observe_rows(&rows(pairs));
        tracker
    }

    #[test]
    fn test_closest_to_top_wins() {
        let mut t = tracker(&[("a", 0), ("b", 3), ("c", 6), ("d", 40)]);
        assert!(t.observe(2, 50));
        assert_eq!(t.active(), Some("b"));
        assert_eq!(t.intersecting(), vec!["b", "c"]);
    }

    #[test]
    fn test_only_upper_band_counts() {
        let mut t = tracker(&[("a", 0), ("b", 30)]);
        t.observe(0, 50);
        assert_eq!(t.active(), Some("a"));

        // "b" is on screen but below the band.
        assert!(!t.observe(5, 50));
        assert_eq!(t.active(), Some("a"));

        assert!(t.observe(25, 50));
        assert_eq!(t.active(), Some("b"));
    }

    #[test]
    fn test_empty_band_keeps_previous() {
        let mut t = tracker(&[("a", 0), ("b", 100)]);
        t.observe(0, 20);
        assert!(!t.observe(50, 20));
        assert_eq!(t.active(), Some("a"));
        assert!(t.intersecting().is_empty());
    }

    #[test]
    fn test_tiny_viewport_still_has_a_band() {
        let mut t = tracker(&[("a", 7)]);
        t.observe(7, 2);
        assert_eq!(t.active(), Some("a"));
    }

    #[test]
    fn test_refresh_is_debounced() {
        let now = Instant::now();
        let mut t = ViewportTracker::new(Duration::from_millis(300));
        t.content_changed(now);
        t.content_changed(now + Duration::from_millis(200));

        let fresh = rows(&[("new", 0)]);
        assert!(!t.tick(now + Duration::from_millis(300), &fresh));
        assert!(t.tick(now + Duration::from_millis(500), &fresh));
        t.observe(0, 10);
        assert_eq!(t.active(), Some("new"));
    }

    #[test]
    fn test_vanished_anchor_is_dropped() {
        let mut t = tracker(&[("a", 0)]);
        t.observe(0, 10);
        t.observe_rows(&rows(&[("b", 4)]));
        assert_eq!(t.active(), None);
    }
}
