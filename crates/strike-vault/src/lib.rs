//! # strike-vault
//!
//! Round bookkeeping of an options vault, reduced to the part that depends on
//! the oracle: a round may only be closed once the expiry prices of both its
//! underlying and its strike asset are final.
//!
//! ## Modules
//!
//! - [`round`]: commit-and-close / roll-to-next-option state machine

use strike_types::{Address, Timestamp};

pub mod round;

pub use round::{RoundSettlement, RoundStage, RoundVault, VaultParams, VaultState};

/// Error types for vault round operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VaultError {
    /// The round's expiry is still in the future.
    #[error("expiry {expiry} not reached, current time {current_time}")]
    ExpiryNotReached {
        /// Expiry of the open round.
        expiry: Timestamp,
        /// The current time.
        current_time: Timestamp,
    },

    /// The oracle has no final price for an asset at the round's expiry.
    #[error("price for {asset} at {expiry} is not finalized")]
    PriceNotFinalized {
        /// Asset without a final price.
        asset: Address,
        /// Expiry being settled.
        expiry: Timestamp,
    },

    /// The round has already been committed.
    #[error("round {0} already committed")]
    AlreadyCommitted(u64),

    /// The round has not been committed yet.
    #[error("round {0} not committed")]
    NotCommitted(u64),

    /// Invalid vault parameters.
    #[error("invalid vault params: {0}")]
    InvalidParams(String),

    /// A settlement ratio was requested against a zero strike price.
    #[error("strike price is zero")]
    ZeroStrikePrice,

    /// Arithmetic overflow.
    #[error("arithmetic overflow in round calculation")]
    Overflow,
}

/// Convenience result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
