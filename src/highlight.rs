use std::time::{Duration, Instant};

/// Marks the most recently added column for a fixed time.
///
/// Scheduling a new column replaces the previous deadline, so an earlier
/// add can never clear the highlight of a later one.
#[derive(Debug, Clone)]
pub struct Highlight {
    duration: Duration,
    current: Option<(String, Instant)>,
}

impl Highlight {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            current: None,
        }
    }

    pub fn schedule(&mut self, column: impl Into<String>, now: Instant) {
        self.current = Some((column.into(), now + self.duration));
    }

    pub fn cancel(&mut self) {
        self.current = None;
    }

    pub fn column(&self) -> Option<&str> {
        self.current.as_ref().map(|(c, _)| c.as_str())
    }

    /// The highlighted column if its deadline has not passed at `now`.
    pub fn active(&self, now: Instant) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|(_, deadline)| now < *deadline)
            .map(|(c, _)| c.as_str())
    }

    /// Drops an expired highlight. Returns true when something was cleared.
    pub fn expire(&mut self, now: Instant) -> bool {
        let expired = matches!(&self.current, Some((_, deadline)) if now >= *deadline);
        if expired {
            self.current = None;
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clears_after_deadline() {
        let start = Instant::now();
        let mut hl = Highlight::new(Duration::from_secs(5));
        hl.schedule("note", start);
        assert_eq!(hl.active(start + Duration::from_secs(4)), Some("note"));
        assert!(!hl.expire(start + Duration::from_secs(4)));
        assert!(hl.expire(start + Duration::from_secs(5)));
        assert_eq!(hl.column(), None);
    }

    #[test]
    fn newer_add_restarts_timer() {
        let start = Instant::now();
        let mut hl = Highlight::new(Duration::from_secs(5));
        hl.schedule("a", start);
        hl.schedule("b", start + Duration::from_secs(3));
        // first deadline has passed but the second one has not
        assert!(!hl.expire(start + Duration::from_secs(6)));
        assert_eq!(hl.active(start + Duration::from_secs(6)), Some("b"));
        assert!(hl.expire(start + Duration::from_secs(8)));
    }
}
