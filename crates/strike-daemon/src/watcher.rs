//! Settlement finalization watcher.
//!
//! Finalization is a pure function of time, so nothing inside the oracle
//! fires when a lock window closes. The watcher closes that gap: each poll
//! collects every record whose finalization instant falls in
//! `(last_poll, now]`.
//!
//! ## Exactly once
//!
//! Consecutive poll intervals are disjoint and contiguous, and a record's
//! finalization instant never changes once submitted, so each record belongs
//! to exactly one batch. `last_poll` only advances through
//! [`FinalizationWatcher::commit`], after the batch has been emitted, and is
//! persisted in the `watcher_last_poll` setting between runs.

use std::sync::Arc;

use rusqlite::Connection;
use strike_db::queries::{oracle as oracle_db, settings};
use strike_oracle::{Clock, Oracle};
use strike_types::events::OracleEvent;
use strike_types::Timestamp;

use crate::events::{Event, EventBus};

/// Records that became final during one poll interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizationBatch {
    pub events: Vec<OracleEvent>,
    /// Upper bound of the interval; becomes `last_poll` on commit.
    pub polled_at: Timestamp,
}

/// Tracks how far finalization announcements have progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizationWatcher {
    last_poll: Timestamp,
}

impl FinalizationWatcher {
    /// Resume from a previously persisted `last_poll`. Zero starts from scratch.
    pub fn new(last_poll: Timestamp) -> Self {
        Self { last_poll }
    }

    /// Resume from the progress stored in the database.
    pub fn resume(conn: &Connection) -> strike_db::Result<Self> {
        let last_poll = settings::get_u64(conn, settings::WATCHER_LAST_POLL, 0)?;
        Ok(Self::new(last_poll))
    }

    pub fn last_poll(&self) -> Timestamp {
        self.last_poll
    }

    /// Collect records that became final since the last committed poll.
    ///
    /// Does not advance `last_poll`; polling again without a commit returns
    /// the same records. If the oracle's clock is behind `last_poll` the
    /// batch is empty.
    pub fn poll(&self, oracle: &Oracle) -> FinalizationBatch {
        let now = oracle.now();
        if now <= self.last_poll {
            return FinalizationBatch {
                events: Vec::new(),
                polled_at: self.last_poll,
            };
        }

        let lock_window = oracle.lock_window();
        let events: Vec<OracleEvent> = oracle
            .records()
            .filter_map(|row| {
                let finalized_at = row.record().finalizes_at(lock_window)?;
                (finalized_at > self.last_poll && finalized_at <= now).then_some(
                    OracleEvent::ExpiryPriceFinalized {
                        asset: row.asset,
                        expiry: row.expiry,
                        price: row.price,
                        finalized_at,
                    },
                )
            })
            .collect();

        tracing::debug!(
            from = self.last_poll,
            to = now,
            finalized = events.len(),
            "finalization poll"
        );

        FinalizationBatch {
            events,
            polled_at: now,
        }
    }

    /// Mark `batch` as announced. `last_poll` never moves backwards.
    pub fn commit(&mut self, batch: &FinalizationBatch) {
        self.last_poll = self.last_poll.max(batch.polled_at);
    }
}

/// One watcher tick: reload the oracle, announce, persist progress.
///
/// An event that cannot be wrapped is logged and skipped; the rest of the
/// batch is still emitted. Returns the number of events emitted.
pub(crate) fn poll_once(
    conn: &Connection,
    clock: &Arc<dyn Clock>,
    watcher: &mut FinalizationWatcher,
    event_bus: &EventBus,
) -> anyhow::Result<usize> {
    let Some(state) = oracle_db::load_state(conn)? else {
        return Ok(0);
    };
    let oracle = Oracle::from_state(state, clock.clone());

    let batch = watcher.poll(&oracle);
    let mut emitted = 0;
    for finalized in &batch.events {
        match Event::from_oracle(finalized, batch.polled_at) {
            Ok(event) => {
                event_bus.emit(event);
                emitted += 1;
            }
            Err(e) => {
                tracing::error!(
                    asset = ?finalized.asset(),
                    "dropping finalization event: {e}"
                );
            }
        }
    }

    watcher.commit(&batch);
    settings::set(
        conn,
        settings::WATCHER_LAST_POLL,
        &watcher.last_poll().to_string(),
    )?;
    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use strike_oracle::ManualClock;
    use strike_types::Address;

    use super::*;

    const EXPIRY: Timestamp = 1_706_256_000;
    const OWNER: Address = Address::repeat_byte(0x01);

    fn setup() -> (Oracle, ManualClock) {
        let clock = ManualClock::new(EXPIRY);
        let oracle = Oracle::with_lock_window(
            Address::repeat_byte(0x0a),
            OWNER,
            60,
            Arc::new(clock.clone()),
        );
        (oracle, clock)
    }

    /// Poll and commit in one step, as the daemon does after emitting.
    fn poll_and_commit(watcher: &mut FinalizationWatcher, oracle: &Oracle) -> Vec<OracleEvent> {
        let batch = watcher.poll(oracle);
        watcher.commit(&batch);
        batch.events
    }

    #[test]
    fn test_announces_once_after_lock_window() {
        let (mut oracle, clock) = setup();
        let asset = Address::repeat_byte(0xa1);
        let mut watcher = FinalizationWatcher::new(0);

        clock.increase_to(EXPIRY + 1);
        oracle
            .set_expiry_price_direct(OWNER, asset, EXPIRY, 100_000_000)
            .expect("submit");

        assert!(poll_and_commit(&mut watcher, &oracle).is_empty());

        clock.increase_to(EXPIRY + 60);
        assert!(poll_and_commit(&mut watcher, &oracle).is_empty());

        clock.increase_to(EXPIRY + 61);
        assert_eq!(
            poll_and_commit(&mut watcher, &oracle),
            vec![OracleEvent::ExpiryPriceFinalized {
                asset,
                expiry: EXPIRY,
                price: 100_000_000,
                finalized_at: EXPIRY + 61,
            }]
        );

        clock.advance(3600);
        assert!(poll_and_commit(&mut watcher, &oracle).is_empty());
    }

    #[test]
    fn test_uncommitted_batch_is_repeated() {
        let (mut oracle, clock) = setup();
        clock.increase_to(EXPIRY + 1);
        oracle
            .set_expiry_price_direct(OWNER, Address::repeat_byte(0xa1), EXPIRY, 1)
            .expect("submit");
        clock.increase_to(EXPIRY + 100);

        let mut watcher = FinalizationWatcher::new(0);
        let first = watcher.poll(&oracle);
        assert_eq!(first.events.len(), 1);
        assert_eq!(watcher.last_poll(), 0);

        assert_eq!(watcher.poll(&oracle), first);
        watcher.commit(&first);
        assert_eq!(watcher.last_poll(), EXPIRY + 100);
        assert!(watcher.poll(&oracle).events.is_empty());
    }

    #[test]
    fn test_catch_up_after_gap() {
        let (mut oracle, clock) = setup();
        clock.increase_to(EXPIRY + 1);
        for byte in [0xa1, 0xa2, 0xa3] {
            oracle
                .set_expiry_price_direct(OWNER, Address::repeat_byte(byte), EXPIRY, 1)
                .expect("submit");
        }

        let mut watcher = FinalizationWatcher::new(EXPIRY);
        clock.advance(10_000);
        assert_eq!(poll_and_commit(&mut watcher, &oracle).len(), 3);
        assert_eq!(watcher.last_poll(), EXPIRY + 10_001);
    }

    #[test]
    fn test_clock_behind_last_poll() {
        let (oracle, _clock) = setup();
        let mut watcher = FinalizationWatcher::new(EXPIRY + 500);
        let batch = watcher.poll(&oracle);
        assert!(batch.events.is_empty());
        watcher.commit(&batch);
        assert_eq!(watcher.last_poll(), EXPIRY + 500);
    }

    // ---------------------------------------------------------------
    // Daemon tick against SQLite
    // ---------------------------------------------------------------

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_poll_once_persists_and_survives_restart() {
        let (mut oracle, clock) = setup();
        let mut conn = strike_db::open_memory().expect("open");
        let dyn_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        clock.increase_to(EXPIRY + 1);
        oracle
            .set_expiry_price_direct(OWNER, Address::repeat_byte(0xa1), EXPIRY, 100_000_000)
            .expect("submit");
        oracle_db::save_state(&mut conn, &oracle.state()).expect("save");

        let mut watcher = FinalizationWatcher::resume(&conn).expect("resume");
        assert_eq!(poll_once(&conn, &dyn_clock, &mut watcher, &bus).expect("tick"), 0);

        clock.increase_to(EXPIRY + 61);
        assert_eq!(poll_once(&conn, &dyn_clock, &mut watcher, &bus).expect("tick"), 1);
        assert_eq!(
            settings::get_u64(&conn, settings::WATCHER_LAST_POLL, 0).expect("setting"),
            EXPIRY + 61
        );

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "ExpiryPriceFinalized");
        assert_eq!(events[0].payload["price"], "100000000");

        // Restart: a fresh watcher built from the stored setting stays quiet.
        let mut restarted = FinalizationWatcher::resume(&conn).expect("resume");
        clock.advance(30);
        assert_eq!(
            poll_once(&conn, &dyn_clock, &mut restarted, &bus).expect("tick"),
            0
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_poll_once_emits_whole_batch_with_large_price() {
        let (mut oracle, clock) = setup();
        let mut conn = strike_db::open_memory().expect("open");
        let dyn_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let large = u128::from(u64::MAX) + 1;
        clock.increase_to(EXPIRY);
        oracle
            .set_expiry_price_direct(OWNER, Address::repeat_byte(0xa1), EXPIRY, large)
            .expect("submit large");
        oracle
            .set_expiry_price_direct(OWNER, Address::repeat_byte(0xb1), EXPIRY, 100_000_000)
            .expect("submit");
        oracle_db::save_state(&mut conn, &oracle.state()).expect("save");

        let mut watcher = FinalizationWatcher::resume(&conn).expect("resume");
        clock.increase_to(EXPIRY + 60);
        assert_eq!(poll_once(&conn, &dyn_clock, &mut watcher, &bus).expect("tick"), 2);

        let prices: Vec<String> = drain(&mut rx)
            .iter()
            .map(|e| e.payload["price"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(prices, vec![large.to_string(), "100000000".to_string()]);

        clock.advance(60);
        assert_eq!(poll_once(&conn, &dyn_clock, &mut watcher, &bus).expect("tick"), 0);
    }

    #[test]
    fn test_poll_once_without_state() {
        let conn = strike_db::open_memory().expect("open");
        let dyn_clock: Arc<dyn Clock> = Arc::new(ManualClock::new(EXPIRY));
        let mut watcher = FinalizationWatcher::new(0);
        let bus = EventBus::new(4);
        assert_eq!(poll_once(&conn, &dyn_clock, &mut watcher, &bus).expect("tick"), 0);
        assert_eq!(watcher.last_poll(), 0);
    }
}
