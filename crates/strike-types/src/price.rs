//! Expiry price records and the persisted oracle layout.

use serde::{Deserialize, Serialize};

use crate::{Address, Price, Timestamp};

/// A price submitted for one (asset, expiry) pair.
///
/// `submitted_at == 0` means nothing has been submitted yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub price: Price,
    pub submitted_at: Timestamp,
}

impl PriceRecord {
    /// The unset record returned for unknown keys.
    pub const UNSET: PriceRecord = PriceRecord {
        price: 0,
        submitted_at: 0,
    };

    pub fn is_submitted(&self) -> bool {
        self.submitted_at != 0
    }

    /// Timestamp at which this record becomes final, or `None` if unsubmitted.
    pub fn finalizes_at(&self, lock_window: u64) -> Option<Timestamp> {
        if !self.is_submitted() {
            return None;
        }
        Some(self.submitted_at.saturating_add(lock_window))
    }

    /// Whether the record is final at `now`.
    ///
    /// Recomputed on every call from `submitted_at`; there is no cached flag.
    pub fn is_finalized(&self, now: Timestamp, lock_window: u64) -> bool {
        self.finalizes_at(lock_window)
            .is_some_and(|finalizes_at| now >= finalizes_at)
    }
}

/// Row of the `PricerAssignment` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricerAssignment {
    pub asset: Address,
    pub pricer: Address,
}

/// Per-pricer delay after expiry before that pricer may submit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockingPeriod {
    pub pricer: Address,
    pub seconds: u64,
}

/// Row of the `PriceRecord` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPrice {
    pub asset: Address,
    pub expiry: Timestamp,
    pub price: Price,
    pub submitted_at: Timestamp,
}

impl StoredPrice {
    pub fn record(&self) -> PriceRecord {
        PriceRecord {
            price: self.price,
            submitted_at: self.submitted_at,
        }
    }
}

/// Complete persisted state of one oracle instance.
///
/// Rows are kept in key order so two snapshots of the same oracle compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleState {
    /// Identity of the oracle itself, checked by pricers before writing.
    pub address: Address,
    pub owner: Address,
    /// Finalization window in seconds.
    pub lock_window: u64,
    #[serde(default)]
    pub pricers: Vec<PricerAssignment>,
    #[serde(default)]
    pub writers: Vec<Address>,
    #[serde(default)]
    pub locking_periods: Vec<LockingPeriod>,
    #[serde(default)]
    pub records: Vec<StoredPrice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_record_never_finalizes() {
        let record = PriceRecord::UNSET;
        assert!(!record.is_submitted());
        assert_eq!(record.finalizes_at(60), None);
        assert!(!record.is_finalized(u64::MAX, 0));
    }

    #[test]
    fn test_finalization_boundary() {
        let record = PriceRecord {
            price: 100_000_000,
            submitted_at: 1_000,
        };
        assert_eq!(record.finalizes_at(60), Some(1_060));
        assert!(!record.is_finalized(1_000, 60));
        assert!(!record.is_finalized(1_059, 60));
        assert!(record.is_finalized(1_060, 60));
        assert!(record.is_finalized(5_000, 60));
    }

    #[test]
    fn test_zero_window_finalizes_immediately() {
        let record = PriceRecord {
            price: 1,
            submitted_at: 10,
        };
        assert!(record.is_finalized(10, 0));
    }

    #[test]
    fn test_finalizes_at_saturates() {
        let record = PriceRecord {
            price: 1,
            submitted_at: u64::MAX - 1,
        };
        assert_eq!(record.finalizes_at(60), Some(u64::MAX));
    }

    #[test]
    fn test_state_defaults_missing_tables() {
        let json = serde_json::json!({
            "address": "0101010101010101010101010101010101010101",
            "owner": "0202020202020202020202020202020202020202",
            "lock_window": 60,
        });
        let state: OracleState = serde_json::from_value(json).expect("deserialize");
        assert_eq!(state.owner, Address::repeat_byte(2));
        assert!(state.pricers.is_empty());
        assert!(state.records.is_empty());
    }
}
