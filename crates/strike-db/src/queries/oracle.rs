//! Whole-oracle persistence.
//!
//! [`save_state`] writes an [`OracleState`] in one transaction. Administrative
//! tables are replaced wholesale; price rows are only ever added.

use rusqlite::{Connection, OptionalExtension};
use strike_types::price::{LockingPeriod, OracleState};
use strike_types::Address;

use crate::queries::{prices, pricers};
use crate::{address_column, Result};

/// Persist `state`.
pub fn save_state(conn: &mut Connection, state: &OracleState) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT OR REPLACE INTO oracle_settings (id, address, owner, lock_window)
         VALUES (1, ?1, ?2, ?3)",
        rusqlite::params![
            state.address.as_bytes().as_slice(),
            state.owner.as_bytes().as_slice(),
            state.lock_window as i64,
        ],
    )?;

    tx.execute("DELETE FROM pricer_assignments", [])?;
    for row in &state.pricers {
        pricers::set(&tx, &row.asset, &row.pricer)?;
    }

    tx.execute("DELETE FROM price_writers", [])?;
    for writer in &state.writers {
        tx.execute(
            "INSERT INTO price_writers (writer) VALUES (?1)",
            [writer.as_bytes().as_slice()],
        )?;
    }

    tx.execute("DELETE FROM locking_periods", [])?;
    for row in &state.locking_periods {
        tx.execute(
            "INSERT INTO locking_periods (pricer, seconds) VALUES (?1, ?2)",
            rusqlite::params![row.pricer.as_bytes().as_slice(), row.seconds as i64],
        )?;
    }

    let mut added = 0usize;
    for row in &state.records {
        if prices::insert(&tx, row)? {
            added += 1;
        }
    }

    tx.commit()?;

    tracing::debug!(
        oracle = %state.address,
        pricers = state.pricers.len(),
        records = state.records.len(),
        added,
        "oracle state saved"
    );
    Ok(())
}

/// Load the persisted oracle, or `None` if nothing has been saved yet.
pub fn load_state(conn: &Connection) -> Result<Option<OracleState>> {
    let header = conn
        .query_row(
            "SELECT address, owner, lock_window FROM oracle_settings WHERE id = 1",
            [],
            |row| {
                Ok((
                    address_column(row, 0)?,
                    address_column(row, 1)?,
                    row.get::<_, i64>(2)? as u64,
                ))
            },
        )
        .optional()?;

    let Some((address, owner, lock_window)) = header else {
        return Ok(None);
    };

    Ok(Some(OracleState {
        address,
        owner,
        lock_window,
        pricers: pricers::list(conn)?,
        writers: list_writers(conn)?,
        locking_periods: list_locking_periods(conn)?,
        records: prices::list(conn)?,
    }))
}

fn list_writers(conn: &Connection) -> Result<Vec<Address>> {
    let mut stmt = conn.prepare("SELECT writer FROM price_writers ORDER BY writer")?;
    let rows = stmt
        .query_map([], |row| address_column(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn list_locking_periods(conn: &Connection) -> Result<Vec<LockingPeriod>> {
    let mut stmt = conn.prepare("SELECT pricer, seconds FROM locking_periods ORDER BY pricer")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(LockingPeriod {
                pricer: address_column(row, 0)?,
                seconds: row.get::<_, i64>(1)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
