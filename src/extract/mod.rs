//! Heuristic extraction of canonical records
//!
//! Extraction targets unstable markup and arbitrary JSON shapes, so every
//! function here is best-effort: unparseable fields become `None` and a
//! page with no recognizable records yields an empty list, never an error.

pub mod auction;
pub mod html;
pub mod json;
pub mod text;

pub use auction::{count_detail_links, parse_auction_cards, parse_auction_details};
pub use html::extract_lots_from_html;
pub use json::{extract_lots_from_json, get_total_pages};
