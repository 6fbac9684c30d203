//! SQLite export of auctions, lots and images

use crate::model::{AuctionListing, ImageReference, LotRecord};
use crate::output::csv_writer::format_datetime;
use crate::output::schema::initialize_schema;
use crate::Result;
use rusqlite::{params, Connection};
use std::path::Path;

/// Upserts exported records into `data.sqlite`
pub struct SqliteExporter {
    conn: Connection,
}

impl SqliteExporter {
    /// Opens (or creates) the database and its tables
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Writes every record with `INSERT OR REPLACE` in one transaction
    pub fn upsert(
        &mut self,
        auctions: &[AuctionListing],
        lots: &[LotRecord],
        images: &[ImageReference],
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO auctions
                 (auction_id, url, number, city, yard, organizer, status, ends_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for a in auctions {
                stmt.execute(params![
                    a.auction_id,
                    a.url,
                    a.number,
                    a.city,
                    a.yard,
                    a.organizer,
                    a.status,
                    format_datetime(a.ends_at),
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO lots
                 (auction_id, lot_id, description_short, brand_model, year, situation,
                  start_bid, ends_at, lot_url, requires_login, raw_text)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for l in lots {
                let requires_login_int = if l.requires_login { 1 } else { 0 };
                stmt.execute(params![
                    l.auction_id,
                    l.lot_id,
                    l.description_short,
                    l.brand_model,
                    l.year,
                    l.situation,
                    l.start_bid,
                    format_datetime(l.ends_at),
                    l.lot_url,
                    requires_login_int,
                    l.raw_text,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO images (auction_id, lot_id, url) VALUES (?1, ?2, ?3)",
            )?;
            for i in images {
                stmt.execute(params![i.auction_id, i.lot_id, i.url])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
