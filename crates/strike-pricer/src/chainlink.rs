//! Round-based pricer adapter.
//!
//! The bot names an expiry and a feed round; the pricer reads that round,
//! rescales the answer to the oracle's [`PRICE_DECIMALS`] and submits it as
//! the expiry price of its bound asset.

use strike_oracle::Oracle;
use strike_types::{Address, Price, Timestamp, PRICE_DECIMALS};

use crate::feed::{PriceFeed, RoundData};
use crate::scale::scale_price;
use crate::{PricerError, Result};

/// Pricer bound to one asset, one feed, one oracle and one bot.
///
/// All bindings are fixed at construction.
#[derive(Debug, Clone)]
pub struct ChainlinkPricer<F> {
    /// Identity this pricer uses when writing to the oracle.
    address: Address,
    bot: Address,
    asset: Address,
    oracle: Address,
    feed: F,
}

impl<F: PriceFeed> ChainlinkPricer<F> {
    /// Create a pricer.
    ///
    /// # Errors
    ///
    /// - [`PricerError::InvalidAddress`] if any binding is the zero address
    pub fn new(address: Address, bot: Address, asset: Address, feed: F, oracle: Address) -> Result<Self> {
        for (name, value) in [
            ("pricer", address),
            ("bot", bot),
            ("asset", asset),
            ("aggregator", feed.address()),
            ("oracle", oracle),
        ] {
            if value.is_zero() {
                return Err(PricerError::InvalidAddress(name));
            }
        }

        Ok(Self {
            address,
            bot,
            asset,
            oracle,
            feed,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn bot(&self) -> Address {
        self.bot
    }

    pub fn asset(&self) -> Address {
        self.asset
    }

    /// Identity of the upstream feed.
    pub fn aggregator(&self) -> Address {
        self.feed.address()
    }

    pub fn oracle(&self) -> Address {
        self.oracle
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    /// Read round `round_id` and submit it as the price of the bound asset at
    /// `expiry`. Returns the submitted price.
    ///
    /// # Errors
    ///
    /// - [`PricerError::Unauthorized`] if `caller` is not the bot, checked first
    /// - [`PricerError::OracleMismatch`] if `oracle` is not the bound oracle
    /// - [`PricerError::UpstreamDataUnavailable`] if the feed has no such round
    /// - [`PricerError::InvalidAnswer`] if the round's answer is not positive
    /// - [`PricerError::Oracle`] if the oracle rejects the submission
    pub fn set_expiry_price_in_oracle(
        &self,
        caller: Address,
        oracle: &mut Oracle,
        expiry: Timestamp,
        round_id: u64,
    ) -> Result<Price> {
        if caller != self.bot {
            tracing::warn!(caller = %caller, pricer = %self.address, "rejected pricer call from non-bot");
            return Err(PricerError::Unauthorized { caller });
        }
        if oracle.address() != self.oracle {
            return Err(PricerError::OracleMismatch {
                expected: self.oracle,
                actual: oracle.address(),
            });
        }

        let round = self
            .feed
            .round_data(round_id)
            .ok_or(PricerError::UpstreamDataUnavailable {
                round_id: Some(round_id),
            })?;
        let price = self.scaled_answer(&round)?;

        oracle.set_expiry_price(self.address, self.asset, expiry, price)?;

        tracing::info!(
            asset = %self.asset,
            expiry,
            round_id,
            round_updated_at = round.updated_at,
            price,
            "pricer pushed expiry price"
        );
        Ok(price)
    }

    /// Latest feed answer at [`PRICE_DECIMALS`].
    ///
    /// # Errors
    ///
    /// - [`PricerError::UpstreamDataUnavailable`] if the feed is empty
    /// - [`PricerError::InvalidAnswer`] if the answer is not positive
    pub fn get_price(&self) -> Result<Price> {
        let round = self
            .feed
            .latest_round_data()
            .ok_or(PricerError::UpstreamDataUnavailable { round_id: None })?;
        self.scaled_answer(&round)
    }

    /// Price and update time of `round_id` at [`PRICE_DECIMALS`].
    ///
    /// # Errors
    ///
    /// - [`PricerError::UpstreamDataUnavailable`] if the feed has no such round
    /// - [`PricerError::InvalidAnswer`] if the answer is not positive
    pub fn get_historical_price(&self, round_id: u64) -> Result<(Price, Timestamp)> {
        let round = self
            .feed
            .round_data(round_id)
            .ok_or(PricerError::UpstreamDataUnavailable {
                round_id: Some(round_id),
            })?;
        Ok((self.scaled_answer(&round)?, round.updated_at))
    }

    fn scaled_answer(&self, round: &RoundData) -> Result<Price> {
        let raw = u128::try_from(round.answer)
            .ok()
            .filter(|v| *v > 0)
            .ok_or(PricerError::InvalidAnswer {
                round_id: round.round_id,
                answer: round.answer,
            })?;
        scale_price(raw, self.feed.decimals(), PRICE_DECIMALS)
    }
}
