//! Output module for aggregate files and exports
//!
//! This module handles:
//! - JSON arrays written by the crawl and read back by later phases
//! - CSV exports of auctions, lots and images
//! - The optional SQLite export database

mod csv_writer;
mod json;
mod schema;
mod sqlite;

pub use csv_writer::{write_auctions_csv, write_images_csv, write_lots_csv, LIST_SEPARATOR};
pub use json::{read_json, write_json};
pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::SqliteExporter;

use crate::model::{ImageReference, LotRecord};

/// Image rows for every lot, in lot order
pub fn collect_images(lots: &[LotRecord]) -> Vec<ImageReference> {
    lots.iter().flat_map(LotRecord::image_references).collect()
}
