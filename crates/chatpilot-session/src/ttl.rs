//! Idle-time tracking for history expiry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Last-access times per session.
#[derive(Debug)]
pub(crate) struct TtlTracker {
    access_times: HashMap<String, Instant>,
    ttl: Option<Duration>,
}

impl TtlTracker {
    pub(crate) fn new(ttl: Option<Duration>) -> Self {
        Self {
            access_times: HashMap::new(),
            ttl,
        }
    }

    /// Reset the idle timer of `session_id`.
    pub(crate) fn touch(&mut self, session_id: &str) {
        match self.access_times.get_mut(session_id) {
            Some(at) => *at = Instant::now(),
            None => {
                self.access_times
                    .insert(session_id.to_string(), Instant::now());
            }
        }
    }

    /// Whether `session_id` has been idle longer than the TTL. Untracked
    /// sessions never count as expired.
    pub(crate) fn is_expired(&self, session_id: &str) -> bool {
        match (self.ttl, self.access_times.get(session_id)) {
            (Some(ttl), Some(last_access)) => last_access.elapsed() > ttl,
            _ => false,
        }
    }

    pub(crate) fn remove(&mut self, session_id: &str) {
        self.access_times.remove(session_id);
    }

    /// Stop tracking every expired session and return their ids.
    pub(crate) fn drain_expired(&mut self) -> Vec<String> {
        let Some(ttl) = self.ttl else {
            return Vec::new();
        };
        let now = Instant::now();
        let expired: Vec<String> = self
            .access_times
            .iter()
            .filter(|(_, at)| now.duration_since(**at) > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.access_times.remove(id);
        }
        expired
    }

    pub(crate) fn len(&self) -> usize {
        self.access_times.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_no_ttl_never_expires() {
        let mut tracker = TtlTracker::new(None);
        tracker.touch("s1");
        assert!(!tracker.is_expired("s1"));
        assert!(tracker.drain_expired().is_empty());
    }

    #[test]
    fn test_untracked_is_not_expired() {
        let tracker = TtlTracker::new(Some(Duration::from_millis(1)));
        assert!(!tracker.is_expired("unknown"));
    }

    #[test]
    fn test_touch_resets_timer() {
        let mut tracker = TtlTracker::new(Some(Duration::from_millis(80)));
        tracker.touch("s1");
        thread::sleep(Duration::from_millis(50));
        tracker.touch("s1");
        thread::sleep(Duration::from_millis(50));
        assert!(!tracker.is_expired("s1"));
    }

    #[test]
    fn test_drain_expired() {
        let mut tracker = TtlTracker::new(Some(Duration::from_millis(10)));
        tracker.touch("s1");
        tracker.touch("s2");
        thread::sleep(Duration::from_millis(25));

        assert!(tracker.is_expired("s1"));
        let mut expired = tracker.drain_expired();
        expired.sort();
        assert_eq!(expired, vec!["s1".to_string(), "s2".to_string()]);
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_remove() {
        let mut tracker = TtlTracker::new(Some(Duration::from_secs(60)));
        tracker.touch("s1");
        tracker.touch("s2");
        tracker.remove("s1");
        assert_eq!(tracker.len(), 1);
    }
}
