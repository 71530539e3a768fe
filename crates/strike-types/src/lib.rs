//! # strike-types
//!
//! Shared domain types used across the Strike workspace: identities, price
//! records, the persisted oracle layout and oracle events.

pub mod address;
pub mod events;
pub mod price;

pub use address::Address;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Unsigned fixed-point price. Zero means "unset".
pub type Price = u128;

/// Decimals of every price stored in the oracle.
pub const PRICE_DECIMALS: u8 = 8;

/// One whole unit at [`PRICE_DECIMALS`] (1.0 = 100,000,000).
pub const PRICE_BASE: Price = 100_000_000;

/// Default finalization window in seconds.
///
/// A submitted expiry price stays pending for this long before consumers may
/// treat it as settlement-final.
pub const DEFAULT_LOCK_WINDOW_SECS: u64 = 60;
