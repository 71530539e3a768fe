//! Read-only view of expiry prices, as consumed by settlement logic.

use strike_types::{Address, Price, Timestamp};

use crate::Oracle;

/// Anything that can answer "what is the price of `asset` at `expiry`, and is
/// it final?".
///
/// A `false` flag means the price must not be used for settlement, whatever
/// its value.
pub trait ExpiryPriceSource {
    fn get_expiry_price(&self, asset: Address, expiry: Timestamp) -> (Price, bool);
}

impl ExpiryPriceSource for Oracle {
    fn get_expiry_price(&self, asset: Address, expiry: Timestamp) -> (Price, bool) {
        Oracle::get_expiry_price(self, asset, expiry)
    }
}

impl<S: ExpiryPriceSource + ?Sized> ExpiryPriceSource for &S {
    fn get_expiry_price(&self, asset: Address, expiry: Timestamp) -> (Price, bool) {
        (**self).get_expiry_price(asset, expiry)
    }
}
