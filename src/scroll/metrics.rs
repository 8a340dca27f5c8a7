/// Scroll geometry of one pane, in rows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn new(scroll_top: usize, scroll_height: usize, client_height: usize) -> Self {
        Self {
            scroll_top: scroll_top as f64,
            scroll_height: scroll_height as f64,
            client_height: client_height as f64,
        }
    }

    /// How far a pane can scroll. Zero when the content fits.
    pub fn range(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }

    /// Position as a share of the scrollable range, always in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        let range = self.range();
        if range <= 0.0 {
            return 0.0;
        }
        let fraction = self.scroll_top / range;
        if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Offset that puts this pane at `fraction` of its own range.
    pub fn offset_for_fraction(&self, fraction: f64) -> f64 {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.range() * fraction
    }
}

/// A scrollable surface the synchronizer can read and drive.
pub trait ScrollPane {
    fn metrics(&self) -> ScrollMetrics;

    /// Move to `fraction` of the scrollable range.
    fn scroll_to_fraction(&mut self, fraction: f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_midpoint() {
        let m = ScrollMetrics::new(45, 100, 10);
        assert!((m.fraction() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_short_content_is_zero() {
        let shorter = ScrollMetrics::new(0, 5, 20);
        assert_eq!(shorter.fraction(), 0.0);
        let exact = ScrollMetrics::new(3, 20, 20);
        assert_eq!(exact.fraction(), 0.0);
        assert!(!ScrollMetrics::default().fraction().is_nan());
    }

    #[test]
    fn test_fraction_clamped() {
        assert_eq!(ScrollMetrics::new(500, 100, 10).fraction(), 1.0);
        let negative = ScrollMetrics {
            scroll_top: -4.0,
            scroll_height: 100.0,
            client_height: 10.0,
        };
        assert_eq!(negative.fraction(), 0.0);
    }

    #[test]
    fn test_offset_for_fraction() {
        let m = ScrollMetrics::new(0, 210, 10);
        assert_eq!(m.offset_for_fraction(0.25), 50.0);
        assert_eq!(m.offset_for_fraction(2.0), 200.0);
        assert_eq!(m.offset_for_fraction(f64::NAN), 0.0);
    }
}
