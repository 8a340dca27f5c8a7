use std::time::{Duration, Instant};

/// Single-shot timer driven by the event loop clock.
///
/// Arming an armed timer pushes its deadline out (a new event supersedes the
/// pending one), and a timer fires at most once per arming.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` exactly once after the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Earliest of several optional deadlines, used to size the event-loop poll.
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    deadlines.into_iter().flatten().min()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_fires_once_after_delay() {
        let start = Instant::now();
        let mut timer = Debounce::new(ms(100));
        timer.arm(start);

        assert!(!timer.fire(start + ms(99)));
        assert!(timer.fire(start + ms(100)));
        assert!(!timer.fire(start + ms(200)));
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_rearm_supersedes_pending_deadline() {
        let start = Instant::now();
        let mut timer = Debounce::new(ms(300));
        timer.arm(start);
        timer.arm(start + ms(200));

        assert!(!timer.fire(start + ms(300)));
        assert!(timer.fire(start + ms(500)));
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut timer = Debounce::new(ms(10));
        timer.arm(start);
        timer.cancel();

        assert!(!timer.fire(start + ms(50)));
        assert_eq!(timer.deadline(), None);
    }

    #[test]
    fn test_earliest() {
        let start = Instant::now();
        let found = earliest([None, Some(start + ms(5)), Some(start + ms(2))]);
        assert_eq!(found, Some(start + ms(2)));
        assert_eq!(earliest([None, None]), None);
    }
}
