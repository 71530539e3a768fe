//! Upstream price feed interface.
//!
//! A feed is a sequence of rounds, each carrying a signed answer at the feed's
//! own decimal precision. Real deployments implement [`PriceFeed`] against an
//! aggregator; [`MemoryFeed`] keeps rounds in memory for tests and replays.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strike_types::{Address, Timestamp};

/// One aggregator round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    pub round_id: u64,
    /// Raw answer at the feed's decimals. Non-positive answers are invalid.
    pub answer: i128,
    pub started_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Read access to an upstream feed.
pub trait PriceFeed: fmt::Debug {
    /// Identity of the feed.
    fn address(&self) -> Address;

    /// Decimals of the feed's answers.
    fn decimals(&self) -> u8;

    /// Data for `round_id`, or `None` if the feed has no such round.
    fn round_data(&self, round_id: u64) -> Option<RoundData>;

    /// The most recent round, or `None` if the feed is empty.
    fn latest_round_data(&self) -> Option<RoundData>;
}

/// In-memory feed.
#[derive(Clone, Debug)]
pub struct MemoryFeed {
    address: Address,
    decimals: u8,
    rounds: BTreeMap<u64, RoundData>,
}

impl MemoryFeed {
    pub fn new(address: Address, decimals: u8) -> Self {
        Self {
            address,
            decimals,
            rounds: BTreeMap::new(),
        }
    }

    /// Builder form of [`push_round`](MemoryFeed::push_round).
    pub fn with_round(mut self, answer: i128, updated_at: Timestamp) -> Self {
        self.push_round(answer, updated_at);
        self
    }

    /// Append a round after the latest one and return its id. Ids start at 1.
    pub fn push_round(&mut self, answer: i128, updated_at: Timestamp) -> u64 {
        let round_id = self
            .rounds
            .keys()
            .next_back()
            .map_or(1, |last| last.saturating_add(1));
        self.insert_round(RoundData {
            round_id,
            answer,
            started_at: updated_at,
            updated_at,
        });
        round_id
    }

    /// Insert or replace a round with an explicit id.
    pub fn insert_round(&mut self, round: RoundData) {
        self.rounds.insert(round.round_id, round);
    }

    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }
}

impl PriceFeed for MemoryFeed {
    fn address(&self) -> Address {
        self.address
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn round_data(&self, round_id: u64) -> Option<RoundData> {
        self.rounds.get(&round_id).copied()
    }

    fn latest_round_data(&self) -> Option<RoundData> {
        self.rounds.values().next_back().copied()
    }
}

impl<F: PriceFeed + ?Sized> PriceFeed for std::sync::Arc<F> {
    fn address(&self) -> Address {
        (**self).address()
    }

    fn decimals(&self) -> u8 {
        (**self).decimals()
    }

    fn round_data(&self, round_id: u64) -> Option<RoundData> {
        (**self).round_data(round_id)
    }

    fn latest_round_data(&self) -> Option<RoundData> {
        (**self).latest_round_data()
    }
}
