//! Export database schema
//!
//! Tables are keyed the way records are identified during the crawl:
//! auctions by id, lots by (auction, lot), images by (auction, lot, url).

/// SQL schema for the export database
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS auctions (
    auction_id TEXT PRIMARY KEY,
    url TEXT,
    number TEXT,
    city TEXT,
    yard TEXT,
    organizer TEXT,
    status TEXT,
    ends_at TEXT
);

CREATE TABLE IF NOT EXISTS lots (
    auction_id TEXT,
    lot_id TEXT,
    description_short TEXT,
    brand_model TEXT,
    year INTEGER,
    situation TEXT,
    start_bid REAL,
    ends_at TEXT,
    lot_url TEXT,
    requires_login INTEGER,
    raw_text TEXT,
    PRIMARY KEY (auction_id, lot_id)
);

CREATE TABLE IF NOT EXISTS images (
    auction_id TEXT,
    lot_id TEXT,
    url TEXT,
    PRIMARY KEY (auction_id, lot_id, url)
);
"#;

/// Creates the export tables if they do not exist
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
