//! The expiry price oracle.
//!
//! Two tables make up the persisted state:
//!
//! - `PricerAssignment[asset] -> pricer`, mutated only by the owner
//! - `PriceRecord[asset][expiry] -> (price, submitted_at)`, written once
//!
//! Writes come through two separately gated paths. [`Oracle::set_expiry_price`]
//! accepts only the pricer currently assigned to the asset.
//! [`Oracle::set_expiry_price_direct`] is the protocol-level path reserved for
//! the owner and owner-enabled writers. Both refuse to overwrite an existing
//! record.
//!
//! ## Finalization
//!
//! A record is final iff `submitted_at != 0 && now >= submitted_at + lock_window`.
//! The flag is derived on every read, so it flips exactly once and never reverts.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use strike_types::events::OracleEvent;
use strike_types::price::{LockingPeriod, OracleState, PriceRecord, PricerAssignment, StoredPrice};
use strike_types::{Address, Price, Timestamp, DEFAULT_LOCK_WINDOW_SECS};

use crate::clock::Clock;
use crate::{OracleError, Result, Role};

/// Expiry price registry with delayed finalization.
///
/// Every successful mutation appends an [`OracleEvent`] to an internal
/// buffer. The buffer is unbounded; owners must call
/// [`Oracle::drain_events`] periodically.
#[derive(Debug)]
pub struct Oracle {
    /// Identity of this oracle, used by pricers to check their binding.
    address: Address,
    owner: Address,
    /// Seconds a submitted price stays pending.
    lock_window: u64,
    pricers: BTreeMap<Address, Address>,
    writers: BTreeSet<Address>,
    locking_periods: BTreeMap<Address, u64>,
    records: BTreeMap<(Address, Timestamp), PriceRecord>,
    clock: Arc<dyn Clock>,
    /// Events from successful mutations, not yet drained. Grows until
    /// [`Oracle::drain_events`] is called.
    events: Vec<OracleEvent>,
}

impl Oracle {
    /// Create an empty oracle with the default lock window.
    pub fn new(address: Address, owner: Address, clock: Arc<dyn Clock>) -> Self {
        Self::with_lock_window(address, owner, DEFAULT_LOCK_WINDOW_SECS, clock)
    }

    /// Create an empty oracle with a custom lock window.
    pub fn with_lock_window(
        address: Address,
        owner: Address,
        lock_window: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            address,
            owner,
            lock_window,
            pricers: BTreeMap::new(),
            writers: BTreeSet::new(),
            locking_periods: BTreeMap::new(),
            records: BTreeMap::new(),
            clock,
            events: Vec::new(),
        }
    }

    /// Rebuild an oracle from its persisted state.
    ///
    /// Zero-price rows and rows that were never submitted carry no
    /// information and are skipped.
    pub fn from_state(state: OracleState, clock: Arc<dyn Clock>) -> Self {
        let mut oracle = Self::with_lock_window(state.address, state.owner, state.lock_window, clock);

        oracle.pricers = state
            .pricers
            .into_iter()
            .map(|row| (row.asset, row.pricer))
            .collect();
        oracle.writers = state.writers.into_iter().collect();
        oracle.locking_periods = state
            .locking_periods
            .into_iter()
            .map(|row| (row.pricer, row.seconds))
            .collect();
        oracle.records = state
            .records
            .into_iter()
            .filter(|row| row.price != 0 && row.submitted_at != 0)
            .map(|row| ((row.asset, row.expiry), row.record()))
            .collect();

        tracing::debug!(
            oracle = %oracle.address,
            pricers = oracle.pricers.len(),
            records = oracle.records.len(),
            "oracle restored from state"
        );
        oracle
    }

    /// Export the full persisted layout, rows in key order.
    pub fn state(&self) -> OracleState {
        OracleState {
            address: self.address,
            owner: self.owner,
            lock_window: self.lock_window,
            pricers: self
                .pricers
                .iter()
                .map(|(asset, pricer)| PricerAssignment {
                    asset: *asset,
                    pricer: *pricer,
                })
                .collect(),
            writers: self.writers.iter().copied().collect(),
            locking_periods: self
                .locking_periods
                .iter()
                .map(|(pricer, seconds)| LockingPeriod {
                    pricer: *pricer,
                    seconds: *seconds,
                })
                .collect(),
            records: self.records().collect(),
        }
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn lock_window(&self) -> u64 {
        self.lock_window
    }

    /// Current time as seen by this oracle.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Pricer assigned to `asset`, or [`Address::ZERO`] if none.
    pub fn get_pricer(&self, asset: Address) -> Address {
        self.pricers.get(&asset).copied().unwrap_or(Address::ZERO)
    }

    pub fn is_writer(&self, identity: Address) -> bool {
        self.writers.contains(&identity)
    }

    /// Seconds after expiry before `pricer` may submit. Zero unless configured.
    pub fn locking_period(&self, pricer: Address) -> u64 {
        self.locking_periods.get(&pricer).copied().unwrap_or(0)
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Price for `(asset, expiry)` and whether it is final.
    ///
    /// Never fails: unknown keys read as `(0, false)`.
    pub fn get_expiry_price(&self, asset: Address, expiry: Timestamp) -> (Price, bool) {
        let record = self.expiry_record(asset, expiry);
        let finalized = record.is_finalized(self.now(), self.lock_window);
        (record.price, finalized)
    }

    /// Raw record for `(asset, expiry)`, [`PriceRecord::UNSET`] if absent.
    pub fn expiry_record(&self, asset: Address, expiry: Timestamp) -> PriceRecord {
        self.records
            .get(&(asset, expiry))
            .copied()
            .unwrap_or(PriceRecord::UNSET)
    }

    /// Whether the lock window for `(asset, expiry)` has elapsed.
    pub fn is_lock_window_over(&self, asset: Address, expiry: Timestamp) -> bool {
        self.get_expiry_price(asset, expiry).1
    }

    /// All submitted records in (asset, expiry) order.
    pub fn records(&self) -> impl Iterator<Item = StoredPrice> + '_ {
        self.records
            .iter()
            .map(|((asset, expiry), record)| StoredPrice {
                asset: *asset,
                expiry: *expiry,
                price: record.price,
                submitted_at: record.submitted_at,
            })
    }

    /// Submitted records still inside their lock window.
    pub fn pending_records(&self) -> Vec<StoredPrice> {
        let now = self.now();
        self.records()
            .filter(|row| !row.record().is_finalized(now, self.lock_window))
            .collect()
    }

    // ---------------------------------------------------------------
    // Owner-gated administration
    // ---------------------------------------------------------------

    /// Assign `pricer` to `asset`, replacing any previous assignment.
    ///
    /// Existing records are untouched; only future submissions are affected.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unauthorized`] if `caller` is not the owner
    /// - [`OracleError::InvalidAddress`] if `asset` is the zero address
    pub fn set_asset_pricer(&mut self, caller: Address, asset: Address, pricer: Address) -> Result<()> {
        self.require_owner(caller)?;
        if asset.is_zero() {
            return Err(OracleError::InvalidAddress("asset"));
        }

        let previous = self.pricers.insert(asset, pricer);
        tracing::info!(
            asset = %asset,
            pricer = %pricer,
            previous = ?previous,
            "asset pricer updated"
        );
        self.events.push(OracleEvent::PricerUpdated { asset, pricer });
        Ok(())
    }

    /// Enable or disable a protocol-level writer for the direct write path.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unauthorized`] if `caller` is not the owner
    /// - [`OracleError::InvalidAddress`] if `writer` is the zero address
    pub fn set_price_writer(&mut self, caller: Address, writer: Address, enabled: bool) -> Result<()> {
        self.require_owner(caller)?;
        if writer.is_zero() {
            return Err(OracleError::InvalidAddress("writer"));
        }

        if enabled {
            self.writers.insert(writer);
        } else {
            self.writers.remove(&writer);
        }
        tracing::info!(writer = %writer, enabled, "price writer updated");
        self.events.push(OracleEvent::WriterUpdated { writer, enabled });
        Ok(())
    }

    /// Set how long after expiry `pricer` must wait before submitting.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unauthorized`] if `caller` is not the owner
    pub fn set_locking_period(&mut self, caller: Address, pricer: Address, seconds: u64) -> Result<()> {
        self.require_owner(caller)?;

        if seconds == 0 {
            self.locking_periods.remove(&pricer);
        } else {
            self.locking_periods.insert(pricer, seconds);
        }
        tracing::info!(pricer = %pricer, seconds, "locking period updated");
        self.events
            .push(OracleEvent::LockingPeriodUpdated { pricer, seconds });
        Ok(())
    }

    /// Hand ownership to `new_owner`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unauthorized`] if `caller` is not the owner
    /// - [`OracleError::InvalidAddress`] if `new_owner` is the zero address
    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> Result<()> {
        self.require_owner(caller)?;
        if new_owner.is_zero() {
            return Err(OracleError::InvalidAddress("new owner"));
        }

        let previous = std::mem::replace(&mut self.owner, new_owner);
        tracing::info!(previous = %previous, new_owner = %new_owner, "oracle ownership transferred");
        self.events.push(OracleEvent::OwnershipTransferred {
            previous,
            new_owner,
        });
        Ok(())
    }

    // ---------------------------------------------------------------
    // Price submission
    // ---------------------------------------------------------------

    /// Submit the price of `asset` at `expiry` as its assigned pricer.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unauthorized`] if `caller` is not the assigned pricer
    /// - [`OracleError::ZeroPrice`] if `price` is zero
    /// - [`OracleError::LockingPeriodActive`] if the pricer's locking period has not elapsed
    /// - [`OracleError::ClockNotSet`] if the clock reads zero
    /// - [`OracleError::AlreadySubmitted`] if a record already exists
    pub fn set_expiry_price(
        &mut self,
        caller: Address,
        asset: Address,
        expiry: Timestamp,
        price: Price,
    ) -> Result<()> {
        let pricer = self.get_pricer(asset);
        if pricer.is_zero() || caller != pricer {
            tracing::warn!(caller = %caller, asset = %asset, "rejected expiry price from unassigned pricer");
            return Err(OracleError::Unauthorized {
                caller,
                role: Role::AssetPricer { asset },
            });
        }
        if price == 0 {
            return Err(OracleError::ZeroPrice);
        }

        let now = self.now();
        let unlocks_at = expiry.saturating_add(self.locking_period(pricer));
        if now < unlocks_at {
            return Err(OracleError::LockingPeriodActive {
                asset,
                expiry,
                unlocks_at,
                current_time: now,
            });
        }

        self.write_record(caller, asset, expiry, price, now)
    }

    /// Submit the price of `asset` at `expiry` through the protocol-level path.
    ///
    /// Independent of the asset's pricer assignment.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unauthorized`] if `caller` is neither the owner nor a writer
    /// - [`OracleError::ZeroPrice`] if `price` is zero
    /// - [`OracleError::ExpiryNotReached`] if `expiry` is in the future
    /// - [`OracleError::ClockNotSet`] if the clock reads zero
    /// - [`OracleError::AlreadySubmitted`] if a record already exists
    pub fn set_expiry_price_direct(
        &mut self,
        caller: Address,
        asset: Address,
        expiry: Timestamp,
        price: Price,
    ) -> Result<()> {
        if caller != self.owner && !self.writers.contains(&caller) {
            tracing::warn!(caller = %caller, asset = %asset, "rejected direct expiry price");
            return Err(OracleError::Unauthorized {
                caller,
                role: Role::Writer,
            });
        }
        if price == 0 {
            return Err(OracleError::ZeroPrice);
        }

        let now = self.now();
        if now < expiry {
            return Err(OracleError::ExpiryNotReached {
                expiry,
                current_time: now,
            });
        }

        self.write_record(caller, asset, expiry, price, now)
    }

    /// Take the events emitted since the last call, leaving the buffer empty.
    pub fn drain_events(&mut self) -> Vec<OracleEvent> {
        std::mem::take(&mut self.events)
    }

    fn write_record(
        &mut self,
        submitter: Address,
        asset: Address,
        expiry: Timestamp,
        price: Price,
        now: Timestamp,
    ) -> Result<()> {
        // submitted_at == 0 means unset.
        if now == 0 {
            return Err(OracleError::ClockNotSet);
        }
        if self.records.contains_key(&(asset, expiry)) {
            return Err(OracleError::AlreadySubmitted { asset, expiry });
        }

        self.records.insert(
            (asset, expiry),
            PriceRecord {
                price,
                submitted_at: now,
            },
        );
        tracing::info!(
            asset = %asset,
            expiry,
            price,
            submitter = %submitter,
            finalizes_at = now.saturating_add(self.lock_window),
            "expiry price submitted"
        );
        self.events.push(OracleEvent::ExpiryPriceUpdated {
            asset,
            expiry,
            price,
            submitted_at: now,
            submitter,
        });
        Ok(())
    }

    fn require_owner(&self, caller: Address) -> Result<()> {
        if caller != self.owner {
            tracing::warn!(caller = %caller, "rejected owner-only oracle call");
            return Err(OracleError::Unauthorized {
                caller,
                role: Role::Owner,
            });
        }
        Ok(())
    }
}
