//! Vault round state machine.
//!
//! ## Round Flow
//!
//! 1. A round is `Open` until its expiry
//! 2. After expiry, the oracle receives the expiry prices (pending)
//! 3. Once both prices are final, [`RoundVault::commit_and_close`] locks the
//!    settlement and moves the round to `Committed`
//! 4. [`RoundVault::roll_to_next_option`] advances the round counter by one and
//!    opens the next round at the following expiry
//!
//! A price that is present but not final is treated exactly like a missing one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strike_oracle::{Clock, ExpiryPriceSource};
use strike_types::{Address, Price, Timestamp, PRICE_BASE};

use crate::{Result, VaultError};

/// One week in seconds, the usual round length.
pub const WEEKLY_ROUND_SECS: u64 = 7 * 24 * 3600;

/// Fixed vault parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultParams {
    /// Asset the options are written on.
    pub underlying: Address,
    /// Asset the strike is denominated in.
    pub strike_asset: Address,
    /// Seconds between consecutive expiries.
    pub round_duration: u64,
}

/// Stage of the current round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStage {
    Open,
    Committed,
}

/// Settlement prices locked in when a round is closed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSettlement {
    pub round: u64,
    pub expiry: Timestamp,
    pub underlying_price: Price,
    pub strike_price: Price,
    pub committed_at: Timestamp,
}

impl RoundSettlement {
    /// Underlying price expressed in strike-asset units, at 8 decimals.
    ///
    /// # Errors
    ///
    /// - [`VaultError::ZeroStrikePrice`] if `strike_price` is zero
    /// - [`VaultError::Overflow`] if the scaled underlying price overflows
    pub fn underlying_in_strike(&self) -> Result<Price> {
        if self.strike_price == 0 {
            return Err(VaultError::ZeroStrikePrice);
        }
        self.underlying_price
            .checked_mul(PRICE_BASE)
            .map(|scaled| scaled / self.strike_price)
            .ok_or(VaultError::Overflow)
    }
}

/// Mutable round state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    /// Current round number, starting at 1.
    pub round: u64,
    pub current_expiry: Timestamp,
    pub stage: RoundStage,
    pub last_settlement: Option<RoundSettlement>,
}

/// Round consumer of oracle expiry prices.
#[derive(Debug)]
pub struct RoundVault {
    params: VaultParams,
    state: VaultState,
    clock: Arc<dyn Clock>,
}

impl RoundVault {
    /// Open round 1 expiring at `first_expiry`.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidParams`] for a zero asset or a zero round duration
    pub fn new(params: VaultParams, first_expiry: Timestamp, clock: Arc<dyn Clock>) -> Result<Self> {
        if params.underlying.is_zero() || params.strike_asset.is_zero() {
            return Err(VaultError::InvalidParams("assets must be non-zero".to_string()));
        }
        if params.round_duration == 0 {
            return Err(VaultError::InvalidParams(
                "round duration must be non-zero".to_string(),
            ));
        }

        Ok(Self {
            params,
            state: VaultState {
                round: 1,
                current_expiry: first_expiry,
                stage: RoundStage::Open,
                last_settlement: None,
            },
            clock,
        })
    }

    pub fn params(&self) -> &VaultParams {
        &self.params
    }

    pub fn state(&self) -> &VaultState {
        &self.state
    }

    pub fn round(&self) -> u64 {
        self.state.round
    }

    /// Read the final settlement prices of the current round and close it.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AlreadyCommitted`] if the round is already closed
    /// - [`VaultError::ExpiryNotReached`] if the expiry is in the future
    /// - [`VaultError::PriceNotFinalized`] if either price is missing or pending
    pub fn commit_and_close<S: ExpiryPriceSource>(&mut self, source: &S) -> Result<RoundSettlement> {
        if self.state.stage == RoundStage::Committed {
            return Err(VaultError::AlreadyCommitted(self.state.round));
        }

        let now = self.clock.now();
        let expiry = self.state.current_expiry;
        if now < expiry {
            return Err(VaultError::ExpiryNotReached {
                expiry,
                current_time: now,
            });
        }

        let underlying_price = final_price(source, self.params.underlying, expiry)?;
        let strike_price = final_price(source, self.params.strike_asset, expiry)?;

        let settlement = RoundSettlement {
            round: self.state.round,
            expiry,
            underlying_price,
            strike_price,
            committed_at: now,
        };
        self.state.stage = RoundStage::Committed;
        self.state.last_settlement = Some(settlement.clone());

        tracing::info!(
            round = settlement.round,
            expiry,
            underlying_price,
            strike_price,
            "round committed and closed"
        );
        Ok(settlement)
    }

    /// Advance to the next round. Returns the new round number.
    ///
    /// The next expiry is one `round_duration` later, skipping whole periods
    /// that are already in the past.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotCommitted`] if the current round has not been closed
    /// - [`VaultError::Overflow`] on round or timestamp overflow
    pub fn roll_to_next_option(&mut self) -> Result<u64> {
        if self.state.stage != RoundStage::Committed {
            return Err(VaultError::NotCommitted(self.state.round));
        }

        let next_expiry = next_expiry_after(
            self.state.current_expiry,
            self.params.round_duration,
            self.clock.now(),
        )?;
        let next_round = self
            .state
            .round
            .checked_add(1)
            .ok_or(VaultError::Overflow)?;

        self.state.round = next_round;
        self.state.current_expiry = next_expiry;
        self.state.stage = RoundStage::Open;

        tracing::info!(round = next_round, expiry = next_expiry, "rolled to next option");
        Ok(next_round)
    }
}

fn final_price<S: ExpiryPriceSource>(source: &S, asset: Address, expiry: Timestamp) -> Result<Price> {
    match source.get_expiry_price(asset, expiry) {
        (price, true) => Ok(price),
        (price, false) => {
            tracing::debug!(asset = %asset, expiry, price, "expiry price not final yet");
            Err(VaultError::PriceNotFinalized { asset, expiry })
        }
    }
}

/// First `expiry + k * duration` (k >= 1) that is strictly after `now`.
fn next_expiry_after(expiry: Timestamp, duration: u64, now: Timestamp) -> Result<Timestamp> {
    let next = expiry.checked_add(duration).ok_or(VaultError::Overflow)?;
    if next > now {
        return Ok(next);
    }
    let skipped = (now - next) / duration + 1;
    skipped
        .checked_mul(duration)
        .and_then(|offset| next.checked_add(offset))
        .ok_or(VaultError::Overflow)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use strike_oracle::ManualClock;

    use super::*;

    const EXPIRY: Timestamp = 1_706_256_000;
    const BNB: Address = Address::repeat_byte(0xbb);
    const BUSD: Address = Address::repeat_byte(0xe9);

    /// Fixed answers keyed by (asset, expiry).
    #[derive(Default)]
    struct FixedPrices(HashMap<(Address, Timestamp), (Price, bool)>);

    impl ExpiryPriceSource for FixedPrices {
        fn get_expiry_price(&self, asset: Address, expiry: Timestamp) -> (Price, bool) {
            self.0.get(&(asset, expiry)).copied().unwrap_or((0, false))
        }
    }

    fn vault(now: Timestamp) -> (RoundVault, ManualClock) {
        let clock = ManualClock::new(now);
        let params = VaultParams {
            underlying: BNB,
            strike_asset: BUSD,
            round_duration: WEEKLY_ROUND_SECS,
        };
        let vault = RoundVault::new(params, EXPIRY, Arc::new(clock.clone())).expect("vault");
        (vault, clock)
    }

    fn final_prices() -> FixedPrices {
        let mut prices = FixedPrices::default();
        prices.0.insert((BNB, EXPIRY), (30_000_000_000, true));
        prices.0.insert((BUSD, EXPIRY), (100_000_000, true));
        prices
    }

    #[test]
    fn test_new_vault_opens_round_one() {
        let (vault, _clock) = vault(EXPIRY - 10);
        assert_eq!(vault.round(), 1);
        assert_eq!(vault.state().stage, RoundStage::Open);
        assert_eq!(vault.state().current_expiry, EXPIRY);
        assert!(vault.state().last_settlement.is_none());
    }

    #[test]
    fn test_invalid_params() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let params = VaultParams {
            underlying: BNB,
            strike_asset: BUSD,
            round_duration: 0,
        };
        assert!(RoundVault::new(params, EXPIRY, clock.clone()).is_err());

        let params = VaultParams {
            underlying: Address::ZERO,
            strike_asset: BUSD,
            round_duration: WEEKLY_ROUND_SECS,
        };
        assert!(RoundVault::new(params, EXPIRY, clock).is_err());
    }

    #[test]
    fn test_commit_before_expiry_rejected() {
        let (mut vault, _clock) = vault(EXPIRY - 1);
        let err = vault
            .commit_and_close(&final_prices())
            .expect_err("too early");
        assert!(matches!(err, VaultError::ExpiryNotReached { .. }));
    }

    #[test]
    fn test_pending_price_blocks_commit() {
        let (mut vault, _clock) = vault(EXPIRY + 10);
        let mut prices = final_prices();
        // Non-zero but provisional.
        prices.0.insert((BUSD, EXPIRY), (100_000_000, false));

        let err = vault.commit_and_close(&prices).expect_err("pending");
        assert_eq!(
            err,
            VaultError::PriceNotFinalized {
                asset: BUSD,
                expiry: EXPIRY
            }
        );
        assert_eq!(vault.state().stage, RoundStage::Open);
    }

    #[test]
    fn test_missing_price_blocks_commit() {
        let (mut vault, _clock) = vault(EXPIRY + 10);
        let err = vault
            .commit_and_close(&FixedPrices::default())
            .expect_err("missing");
        assert_eq!(
            err,
            VaultError::PriceNotFinalized {
                asset: BNB,
                expiry: EXPIRY
            }
        );
    }

    #[test]
    fn test_commit_then_roll_advances_one_round() {
        let (mut vault, _clock) = vault(EXPIRY + 100);
        let settlement = vault.commit_and_close(&final_prices()).expect("commit");
        assert_eq!(settlement.round, 1);
        assert_eq!(settlement.underlying_price, 30_000_000_000);
        assert_eq!(settlement.strike_price, 100_000_000);
        assert_eq!(settlement.committed_at, EXPIRY + 100);
        assert_eq!(vault.state().stage, RoundStage::Committed);

        let round = vault.roll_to_next_option().expect("roll");
        assert_eq!(round, 2);
        assert_eq!(vault.round(), 2);
        assert_eq!(vault.state().stage, RoundStage::Open);
        assert_eq!(vault.state().current_expiry, EXPIRY + WEEKLY_ROUND_SECS);
        assert_eq!(vault.state().last_settlement, Some(settlement));
    }

    #[test]
    fn test_double_commit_rejected() {
        let (mut vault, _clock) = vault(EXPIRY + 100);
        vault.commit_and_close(&final_prices()).expect("commit");
        assert_eq!(
            vault.commit_and_close(&final_prices()),
            Err(VaultError::AlreadyCommitted(1))
        );
    }

    #[test]
    fn test_roll_requires_commit() {
        let (mut vault, _clock) = vault(EXPIRY + 100);
        assert_eq!(vault.roll_to_next_option(), Err(VaultError::NotCommitted(1)));
        assert_eq!(vault.round(), 1);
    }

    #[test]
    fn test_late_roll_skips_past_expiries() {
        let (mut vault, clock) = vault(EXPIRY + 100);
        vault.commit_and_close(&final_prices()).expect("commit");

        // Two and a half weeks late.
        clock.increase_to(EXPIRY + 2 * WEEKLY_ROUND_SECS + WEEKLY_ROUND_SECS / 2);
        vault.roll_to_next_option().expect("roll");
        assert_eq!(vault.round(), 2);
        assert_eq!(vault.state().current_expiry, EXPIRY + 3 * WEEKLY_ROUND_SECS);
    }

    #[test]
    fn test_next_expiry_exact_boundary() {
        // `now` equal to the candidate expiry is not "after" it.
        let next = next_expiry_after(1_000, 100, 1_100).expect("next");
        assert_eq!(next, 1_200);
        assert_eq!(next_expiry_after(1_000, 100, 1_050).expect("next"), 1_100);
    }

    #[test]
    fn test_underlying_in_strike() {
        let settlement = RoundSettlement {
            round: 1,
            expiry: EXPIRY,
            underlying_price: 30_000_000_000,
            strike_price: 99_990_000,
            committed_at: EXPIRY,
        };
        // 300 / 0.9999 = 300.03000300...
        assert_eq!(settlement.underlying_in_strike().expect("ratio"), 30_003_000_300);
    }

    #[test]
    fn test_underlying_in_strike_errors() {
        let mut settlement = RoundSettlement {
            round: 1,
            expiry: EXPIRY,
            underlying_price: 30_000_000_000,
            strike_price: 0,
            committed_at: EXPIRY,
        };
        assert_eq!(
            settlement.underlying_in_strike().expect_err("zero strike"),
            VaultError::ZeroStrikePrice
        );

        settlement.strike_price = 1;
        settlement.underlying_price = Price::MAX;
        assert_eq!(
            settlement.underlying_in_strike().expect_err("overflow"),
            VaultError::Overflow
        );
    }
}
