//! Durable crawl state
//!
//! - `CheckpointStore`: completed pages per auction, rewritten after every page
//! - `LotLog`: append-only per-auction record log used for resume

mod checkpoint;
mod lot_log;

pub use checkpoint::{CheckpointState, CheckpointStore};
pub use lot_log::{append_jsonl, LotLog, LotLogEntry};
