//! # strike-db
//!
//! SQLite persistence for the Strike oracle.
//! Manages the single database at `$STRIKE_DATA_DIR/strike.db`.
//!
//! ## Schema
//!
//! - WAL mode mandatory
//! - Addresses stored as 20-byte BLOBs
//! - Prices stored as decimal TEXT (they do not fit in SQLite's INTEGER)
//! - All timestamps are Unix epoch seconds
//! - Schema version stored in `PRAGMA user_version`

pub mod migrations;
pub mod queries;
pub mod schema;

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use strike_types::{Address, Price};

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the Strike database at the given path.
///
/// Configures WAL mode and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

/// Read an address column.
pub(crate) fn address_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Address> {
    let bytes: Vec<u8> = row.get(idx)?;
    Address::from_slice(&bytes)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, Box::new(e)))
}

/// Read a decimal TEXT price column.
pub(crate) fn price_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Price> {
    let text: String = row.get(idx)?;
    text.parse::<Price>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
