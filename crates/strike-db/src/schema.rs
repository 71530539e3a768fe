//! SQL schema definitions.

/// Complete schema for the v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Oracle administration
-- ============================================================

CREATE TABLE IF NOT EXISTS oracle_settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    address BLOB NOT NULL,
    owner BLOB NOT NULL,
    lock_window INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS price_writers (
    writer BLOB PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS locking_periods (
    pricer BLOB PRIMARY KEY,
    seconds INTEGER NOT NULL
);

-- ============================================================
-- PricerAssignment[asset]
-- ============================================================

CREATE TABLE IF NOT EXISTS pricer_assignments (
    asset BLOB PRIMARY KEY,
    pricer BLOB NOT NULL
);

-- ============================================================
-- PriceRecord[asset][expiry]
-- ============================================================

CREATE TABLE IF NOT EXISTS expiry_prices (
    asset BLOB NOT NULL,
    expiry INTEGER NOT NULL,
    price TEXT NOT NULL,
    submitted_at INTEGER NOT NULL,
    PRIMARY KEY (asset, expiry)
);

CREATE INDEX IF NOT EXISTS idx_expiry_prices_submitted
    ON expiry_prices(submitted_at);

-- ============================================================
-- Daemon settings
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
