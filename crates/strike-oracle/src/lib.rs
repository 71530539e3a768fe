//! # strike-oracle
//!
//! Expiry price oracle with delayed finalization.
//!
//! An owner assigns exactly one pricer per asset. The assigned pricer submits
//! a price for an expiry timestamp; the oracle keeps it pending for a fixed
//! lock window and reports it finalized afterwards. Finalization is computed
//! from the submission time on every read.
//!
//! ## Modules
//!
//! - [`oracle`]: pricer registry, price records and the gated write paths
//! - [`clock`]: injected time source
//! - [`source`]: read-only interface consumed by vaults

use std::fmt;

use strike_types::{Address, Timestamp};

pub mod clock;
pub mod oracle;
pub mod source;

pub use clock::{Clock, ManualClock, SystemClock};
pub use oracle::Oracle;
pub use source::ExpiryPriceSource;

/// Capability a caller must hold for a gated oracle operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The oracle owner.
    Owner,
    /// The pricer currently assigned to `asset`.
    AssetPricer { asset: Address },
    /// The owner or an owner-enabled protocol writer.
    Writer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::AssetPricer { asset } => write!(f, "pricer for asset {asset}"),
            Role::Writer => write!(f, "price writer"),
        }
    }
}

/// Error types for oracle operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OracleError {
    /// Caller lacks the role required by the operation.
    #[error("unauthorized: {caller} is not the {role}")]
    Unauthorized {
        /// The rejected caller.
        caller: Address,
        /// The role the operation requires.
        role: Role,
    },

    /// A price already exists for this (asset, expiry).
    #[error("expiry price already submitted for {asset} at {expiry}")]
    AlreadySubmitted {
        /// Asset of the existing record.
        asset: Address,
        /// Expiry of the existing record.
        expiry: Timestamp,
    },

    /// Zero is the unset sentinel and cannot be submitted.
    #[error("price must be non-zero")]
    ZeroPrice,

    /// The pricer's locking period after expiry has not elapsed.
    #[error("locking period active for {asset} at {expiry}: opens at {unlocks_at}, current time {current_time}")]
    LockingPeriodActive {
        /// Asset being priced.
        asset: Address,
        /// Requested expiry.
        expiry: Timestamp,
        /// First timestamp at which the pricer may submit.
        unlocks_at: Timestamp,
        /// The current time.
        current_time: Timestamp,
    },

    /// Direct writes are only accepted once the expiry has passed.
    #[error("expiry {expiry} not reached, current time {current_time}")]
    ExpiryNotReached {
        /// Requested expiry.
        expiry: Timestamp,
        /// The current time.
        current_time: Timestamp,
    },

    /// The clock reads zero, which would store the unsubmitted sentinel.
    #[error("clock reads zero; submission time would be indistinguishable from unset")]
    ClockNotSet,

    /// The zero address was supplied where a real identity is required.
    #[error("invalid address: {0}")]
    InvalidAddress(&'static str),
}

/// Convenience result type for oracle operations.
pub type Result<T> = std::result::Result<T, OracleError>;
