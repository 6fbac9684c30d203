//! Canonical records produced by the crawler
//!
//! - `AuctionListing`: an auction discovered on the listing page
//! - `LotRecord`: a single lot, normalized regardless of source
//! - `LotSet`: id-keyed, last-write-wins collection of lots
//! - `ImageReference`: (auction, lot, url) rows materialized at export

mod auction;
mod lot;

pub use auction::AuctionListing;
pub use lot::{ImageReference, LotRecord, LotSet, LotSource};
