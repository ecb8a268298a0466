use std::collections::VecDeque;
use std::num::NonZeroU32;

use tokio::time::{Duration, Instant};

use super::Quota;

/// Records when recent requests were dispatched, to enforce a [`Quota`] over a
/// sliding window.
///
/// Only dispatch _start_ times are recorded; a request which is still in
/// flight when the window passes no longer counts against the quota.
#[derive(Clone, Debug)]
pub struct RateLedger {
    limit: NonZeroU32,
    window: Duration,
    dispatched: VecDeque<Instant>,
}

impl RateLedger {
    pub fn new(quota: Quota) -> Self {
        Self {
            limit: quota.limit,
            window: quota.window,
            dispatched: VecDeque::new(),
        }
    }

    /// The number of dispatches recorded in the window ending at `now`.
    pub fn count(&mut self, now: Instant) -> usize {
        self.evict(now);
        self.dispatched.len()
    }

    /// If the quota is exhausted at `now`, the [`Instant`] when the oldest
    /// recorded dispatch leaves the window. `None` if a request may be
    /// dispatched immediately.
    pub fn available_at(&mut self, now: Instant) -> Option<Instant> {
        if self.count(now) < self.limit.get() as usize {
            return None;
        }

        self.dispatched.front().map(|&oldest| oldest + self.window)
    }

    /// Record a dispatch at `now`.
    pub fn record(&mut self, now: Instant) {
        debug_assert!(
            self.dispatched.back().map_or(true, |&last| last <= now),
            "dispatch instants recorded out of order"
        );

        self.dispatched.push_back(now);
    }

    /// Drop every entry at least one window old.
    fn evict(&mut self, now: Instant) {
        while let Some(&oldest) = self.dispatched.front() {
            if now.saturating_duration_since(oldest) < self.window {
                break;
            }
            self.dispatched.pop_front();
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::{Quota, RateLedger};

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn under_quota() {
        let t = Instant::now();
        let mut ledger = RateLedger::new(Quota::per_minute(3).unwrap());

        ledger.record(t);
        ledger.record(t + Duration::from_secs(1));

        assert_eq!(ledger.count(t + Duration::from_secs(1)), 2);
        assert_eq!(ledger.available_at(t + Duration::from_secs(1)), None);
    }

    #[test]
    fn exhausted() {
        let t = Instant::now();
        let mut ledger = RateLedger::new(Quota::per_minute(2).unwrap());

        ledger.record(t);
        ledger.record(t + Duration::from_secs(10));

        let now = t + Duration::from_secs(15);
        assert_eq!(ledger.available_at(now), Some(t + MINUTE));
        // 60s - (15s since the oldest dispatch)
        assert_eq!(
            ledger.available_at(now).unwrap() - now,
            Duration::from_secs(45)
        );
    }

    #[test]
    fn eviction() {
        let t = Instant::now();
        let mut ledger = RateLedger::new(Quota::per_minute(2).unwrap());

        ledger.record(t);
        ledger.record(t + Duration::from_secs(30));

        assert_eq!(ledger.count(t + MINUTE - Duration::from_millis(1)), 2);
        // an entry exactly one window old no longer counts
        assert_eq!(ledger.count(t + MINUTE), 1);
        assert_eq!(ledger.available_at(t + MINUTE), None);
        assert_eq!(ledger.count(t + Duration::from_secs(90)), 0);
    }

    #[test]
    fn custom_window() {
        let t = Instant::now();
        let quota = Quota::new(1, Duration::from_secs(5)).unwrap();
        let mut ledger = RateLedger::new(quota);

        ledger.record(t);
        assert_eq!(ledger.available_at(t), Some(t + Duration::from_secs(5)));
        assert_eq!(ledger.available_at(t + Duration::from_secs(5)), None);
    }

    #[test]
    fn longest_window() {
        let t = Instant::now();
        let mut ledger = RateLedger::new(Quota::new(1, Quota::MAX_WINDOW).unwrap());

        ledger.record(t);
        assert_eq!(ledger.available_at(t + MINUTE), Some(t + Quota::MAX_WINDOW));
    }

    #[test]
    fn huge_limit() {
        let t = Instant::now();
        let mut ledger = RateLedger::new(Quota::per_minute(u32::MAX).unwrap());

        for n in 0..1000 {
            ledger.record(t + Duration::from_millis(n));
        }
        assert_eq!(ledger.count(t + Duration::from_secs(1)), 1000);
        assert_eq!(ledger.available_at(t + Duration::from_secs(1)), None);
    }
}
