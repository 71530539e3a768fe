//! Events emitted by oracle mutations and by the settlement watcher.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::{Address, Price, Timestamp};

/// Everything observable that changes oracle state.
///
/// Prices serialize as decimal strings; they do not fit a JSON number.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleEvent {
    PricerUpdated {
        asset: Address,
        pricer: Address,
    },
    ExpiryPriceUpdated {
        asset: Address,
        expiry: Timestamp,
        #[serde_as(as = "DisplayFromStr")]
        price: Price,
        submitted_at: Timestamp,
        /// Pricer or writer that made the submission.
        submitter: Address,
    },
    /// Not emitted by the oracle itself; finalization is a pure read. The
    /// watcher produces this once per record after the lock window passes.
    ExpiryPriceFinalized {
        asset: Address,
        expiry: Timestamp,
        #[serde_as(as = "DisplayFromStr")]
        price: Price,
        finalized_at: Timestamp,
    },
    WriterUpdated {
        writer: Address,
        enabled: bool,
    },
    LockingPeriodUpdated {
        pricer: Address,
        seconds: u64,
    },
    OwnershipTransferred {
        previous: Address,
        new_owner: Address,
    },
}

impl OracleEvent {
    /// Stable name used as the event type on the daemon's event bus.
    pub fn name(&self) -> &'static str {
        match self {
            OracleEvent::PricerUpdated { .. } => "PricerUpdated",
            OracleEvent::ExpiryPriceUpdated { .. } => "ExpiryPriceUpdated",
            OracleEvent::ExpiryPriceFinalized { .. } => "ExpiryPriceFinalized",
            OracleEvent::WriterUpdated { .. } => "WriterUpdated",
            OracleEvent::LockingPeriodUpdated { .. } => "LockingPeriodUpdated",
            OracleEvent::OwnershipTransferred { .. } => "OwnershipTransferred",
        }
    }

    /// The asset this event concerns, if any.
    pub fn asset(&self) -> Option<Address> {
        match self {
            OracleEvent::PricerUpdated { asset, .. }
            | OracleEvent::ExpiryPriceUpdated { asset, .. }
            | OracleEvent::ExpiryPriceFinalized { asset, .. } => Some(*asset),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let event = OracleEvent::WriterUpdated {
            writer: Address::repeat_byte(1),
            enabled: true,
        };
        assert_eq!(event.name(), "WriterUpdated");
        assert_eq!(event.asset(), None);
    }

    #[test]
    fn test_event_asset() {
        let asset = Address::repeat_byte(7);
        let event = OracleEvent::ExpiryPriceFinalized {
            asset,
            expiry: 1_706_256_000,
            price: 100_000_000,
            finalized_at: 1_706_256_061,
        };
        assert_eq!(event.asset(), Some(asset));
    }

    #[test]
    fn test_event_serializes_snake_case() {
        let event = OracleEvent::PricerUpdated {
            asset: Address::repeat_byte(1),
            pricer: Address::repeat_byte(2),
        };
        let value = serde_json::to_value(&event).expect("serialize");
        assert!(value.get("pricer_updated").is_some());
    }

    #[test]
    fn test_price_beyond_u64_serializes_as_string() {
        let price = u128::from(u64::MAX) + 1;
        let event = OracleEvent::ExpiryPriceFinalized {
            asset: Address::repeat_byte(7),
            expiry: 1_706_256_000,
            price,
            finalized_at: 1_706_256_061,
        };
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(
            value["expiry_price_finalized"]["price"],
            "18446744073709551616"
        );

        let back: OracleEvent = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, event);
    }
}
