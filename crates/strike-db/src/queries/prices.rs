//! `PriceRecord` table.
//!
//! Rows are write-once: inserting an existing (asset, expiry) is a no-op.

use rusqlite::{Connection, Row};
use strike_types::price::StoredPrice;

use crate::{address_column, price_column, Result};

/// Insert a price row. Returns `false` if the (asset, expiry) row already existed.
pub fn insert(conn: &Connection, row: &StoredPrice) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO expiry_prices (asset, expiry, price, submitted_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            row.asset.as_bytes().as_slice(),
            row.expiry as i64,
            row.price.to_string(),
            row.submitted_at as i64,
        ],
    )?;
    Ok(inserted == 1)
}

/// All rows ordered by (asset, expiry).
pub fn list(conn: &Connection) -> Result<Vec<StoredPrice>> {
    let mut stmt = conn.prepare(
        "SELECT asset, expiry, price, submitted_at FROM expiry_prices
         ORDER BY asset, expiry",
    )?;

    let rows = stmt
        .query_map([], price_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn price_row(row: &Row<'_>) -> rusqlite::Result<StoredPrice> {
    Ok(StoredPrice {
        asset: address_column(row, 0)?,
        expiry: row.get::<_, i64>(1)? as u64,
        price: price_column(row, 2)?,
        submitted_at: row.get::<_, i64>(3)? as u64,
    })
}
