//! Injected time source.
//!
//! Finalization depends on the current time, so the oracle never reads the
//! system clock directly. Production uses [`SystemClock`]; tests drive a
//! [`ManualClock`] forward deterministically.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use strike_types::Timestamp;

/// A source of the current Unix time in seconds.
pub trait Clock: fmt::Debug + Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// give another to the oracle.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Move time forward by `secs`.
    pub fn advance(&self, secs: u64) {
        // fetch_update never fails when the closure always returns Some.
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                Some(t.saturating_add(secs))
            });
    }

    /// Jump to `timestamp`. Time never moves backwards; earlier targets are ignored.
    pub fn increase_to(&self, timestamp: Timestamp) {
        self.now.fetch_max(timestamp, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_recent() {
        // Anything after 2023-11-14 is plausible.
        assert!(SystemClock.now() > 1_700_000_000);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(1_000);
        clock.advance(60);
        assert_eq!(clock.now(), 1_060);
    }

    #[test]
    fn test_manual_clock_is_monotonic() {
        let clock = ManualClock::new(1_000);
        clock.increase_to(2_000);
        assert_eq!(clock.now(), 2_000);

        clock.increase_to(1_500);
        assert_eq!(clock.now(), 2_000);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(0);
        let handle = clock.clone();
        handle.advance(5);
        assert_eq!(clock.now(), 5);
    }
}
