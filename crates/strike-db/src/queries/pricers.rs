//! `PricerAssignment` table.

use rusqlite::Connection;
use strike_types::price::PricerAssignment;
use strike_types::Address;

use crate::{address_column, Result};

/// Assign `pricer` to `asset`, replacing any previous row.
pub fn set(conn: &Connection, asset: &Address, pricer: &Address) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO pricer_assignments (asset, pricer) VALUES (?1, ?2)",
        rusqlite::params![asset.as_bytes().as_slice(), pricer.as_bytes().as_slice()],
    )?;
    Ok(())
}

/// All assignments ordered by asset.
pub fn list(conn: &Connection) -> Result<Vec<PricerAssignment>> {
    let mut stmt = conn.prepare("SELECT asset, pricer FROM pricer_assignments ORDER BY asset")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(PricerAssignment {
                asset: address_column(row, 0)?,
                pricer: address_column(row, 1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
