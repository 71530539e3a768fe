//! Fixed-point rescaling between decimal bases.

use crate::{PricerError, Result};

/// Rescale `value` from `from_decimals` to `to_decimals`.
///
/// Scaling down truncates toward zero.
///
/// # Errors
///
/// - [`PricerError::Overflow`] if the scale factor or the result exceeds `u128`
///
/// # Examples
///
/// ```
/// use strike_pricer::scale::scale_price;
///
/// // 1 unit at 0 decimals is 100,000,000 at 8 decimals.
/// assert_eq!(scale_price(1, 0, 8).unwrap(), 100_000_000);
/// // 1.5 at 18 decimals is 150,000,000 at 8 decimals.
/// assert_eq!(scale_price(1_500_000_000_000_000_000, 18, 8).unwrap(), 150_000_000);
/// ```
pub fn scale_price(value: u128, from_decimals: u8, to_decimals: u8) -> Result<u128> {
    if from_decimals == to_decimals {
        return Ok(value);
    }

    let exponent = u32::from(from_decimals.abs_diff(to_decimals));
    let factor = 10u128.checked_pow(exponent).ok_or(PricerError::Overflow)?;

    if from_decimals > to_decimals {
        Ok(value / factor)
    } else {
        value.checked_mul(factor).ok_or(PricerError::Overflow)
    }
}
