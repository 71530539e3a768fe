//! # strike-pricer
//!
//! Pricer adapters that turn an upstream feed reading into an oracle expiry
//! price.
//!
//! Each pricer is bound at construction to one asset, one feed, one oracle and
//! one bot identity. Only the bot may trigger a submission, and the pricer can
//! only ever write the price of its own asset.
//!
//! ## Modules
//!
//! - [`feed`]: upstream feed interface and an in-memory feed
//! - [`scale`]: fixed-point rescaling between decimal bases
//! - [`chainlink`]: round-based pricer adapter

use strike_oracle::OracleError;
use strike_types::Address;

pub mod chainlink;
pub mod feed;
pub mod scale;

pub use chainlink::ChainlinkPricer;
pub use feed::{MemoryFeed, PriceFeed, RoundData};

/// Error types for pricer operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PricerError {
    /// Caller is not the pricer's bound bot.
    #[error("unauthorized: {caller} is not the pricer bot")]
    Unauthorized {
        /// The rejected caller.
        caller: Address,
    },

    /// The feed has no data for the requested round.
    #[error("no upstream data for round {round_id:?}")]
    UpstreamDataUnavailable {
        /// Requested round; `None` when the latest round was requested.
        round_id: Option<u64>,
    },

    /// The feed reported a non-positive answer.
    #[error("invalid answer {answer} for round {round_id}")]
    InvalidAnswer {
        /// Round carrying the answer.
        round_id: u64,
        /// The raw answer.
        answer: i128,
    },

    /// The oracle passed in is not the one this pricer is bound to.
    #[error("oracle mismatch: bound to {expected}, got {actual}")]
    OracleMismatch {
        /// The bound oracle.
        expected: Address,
        /// The oracle that was passed in.
        actual: Address,
    },

    /// Rescaling overflowed.
    #[error("arithmetic overflow while scaling price")]
    Overflow,

    /// The zero address was supplied for a binding.
    #[error("invalid address: {0}")]
    InvalidAddress(&'static str),

    /// The oracle rejected the submission.
    #[error("oracle rejected price: {0}")]
    Oracle(#[from] OracleError),
}

/// Convenience result type for pricer operations.
pub type Result<T> = std::result::Result<T, PricerError>;
