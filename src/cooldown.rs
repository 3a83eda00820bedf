//! Per-action cooldown gate.
//!
//! Check-and-set: a granted permit immediately re-arms the timer, so two
//! checks for the same key inside one window can never both succeed. Only the
//! loop thread touches the table; if the loop is ever parallelized, calls for
//! the same key must stay serialized to keep that guarantee.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct CooldownTable {
    last_grant: HashMap<String, Instant>,
}

impl CooldownTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and stamps the grant time if `cooldown` has elapsed since
    /// the last grant for `key` (or the key was never granted).
    pub fn permit(&mut self, key: &str, cooldown: Duration) -> bool {
        self.permit_at(key, cooldown, Instant::now())
    }

    /// Testable core of `permit` with an explicit clock.
    pub fn permit_at(&mut self, key: &str, cooldown: Duration, now: Instant) -> bool {
        match self.last_grant.get(key) {
            Some(&last) if now.duration_since(last) < cooldown => false,
            _ => {
                self.last_grant.insert(key.to_string(), now);
                true
            }
        }
    }

    /// Seconds remaining before `key` may fire again, zero if ready.
    pub fn remaining(&self, key: &str, cooldown: Duration, now: Instant) -> Duration {
        match self.last_grant.get(key) {
            Some(&last) => cooldown.saturating_sub(now.duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_permit_granted_second_denied() {
        let mut table = CooldownTable::new();
        let t0 = Instant::now();
        let window = Duration::from_secs(5);

        assert!(table.permit_at("water", window, t0));
        // Within the window: denied, timer untouched
        assert!(!table.permit_at("water", window, t0 + Duration::from_secs(2)));
        // After the window: granted again
        assert!(table.permit_at("water", window, t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_keys_are_independent() {
        let mut table = CooldownTable::new();
        let t0 = Instant::now();
        let window = Duration::from_secs(5);

        assert!(table.permit_at("parasite_ТЛЯ", window, t0));
        assert!(table.permit_at("parasite_ТРИПС", window, t0));
        assert!(!table.permit_at("parasite_ТЛЯ", window, t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_denied_check_does_not_reset_timer() {
        let mut table = CooldownTable::new();
        let t0 = Instant::now();
        let window = Duration::from_secs(4);

        assert!(table.permit_at("water", window, t0));
        assert!(!table.permit_at("water", window, t0 + Duration::from_secs(3)));
        // 4s after the grant (not after the denied check) the key is ready
        assert!(table.permit_at("water", window, t0 + Duration::from_secs(4)));
    }

    #[test]
    fn test_remaining() {
        let mut table = CooldownTable::new();
        let t0 = Instant::now();
        let window = Duration::from_secs(10);

        assert_eq!(table.remaining("water", window, t0), Duration::ZERO);
        table.permit_at("water", window, t0);
        assert_eq!(
            table.remaining("water", window, t0 + Duration::from_secs(4)),
            Duration::from_secs(6)
        );
    }
}
