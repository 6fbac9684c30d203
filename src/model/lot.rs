use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Where a lot observation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LotSource {
    /// A JSON endpoint discovered while rendering
    Api,
    /// Rendered or static HTML
    Html,
}

/// A single lot within an auction, in canonical form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotRecord {
    pub auction_id: String,

    /// Unique within the auction's final record set
    pub lot_id: String,

    pub description_short: String,

    #[serde(default)]
    pub brand_model: Option<String>,

    #[serde(default)]
    pub year: Option<i32>,

    #[serde(default)]
    pub situation: Option<String>,

    #[serde(default)]
    pub start_bid: Option<f64>,

    #[serde(default)]
    pub ends_at: Option<NaiveDateTime>,

    #[serde(default)]
    pub lot_url: Option<String>,

    #[serde(default)]
    pub image_urls: Vec<String>,

    #[serde(default)]
    pub requires_login: bool,

    #[serde(default)]
    pub raw_text: Option<String>,
}

impl LotRecord {
    /// Creates a record with only identity and description set
    pub fn new(
        auction_id: impl Into<String>,
        lot_id: impl Into<String>,
        description_short: impl Into<String>,
    ) -> Self {
        Self {
            auction_id: auction_id.into(),
            lot_id: lot_id.into(),
            description_short: description_short.into(),
            brand_model: None,
            year: None,
            situation: None,
            start_bid: None,
            ends_at: None,
            lot_url: None,
            image_urls: Vec::new(),
            requires_login: false,
            raw_text: None,
        }
    }

    /// Derives the image rows for this lot
    pub fn image_references(&self) -> Vec<ImageReference> {
        self.image_urls
            .iter()
            .map(|url| ImageReference {
                auction_id: self.auction_id.clone(),
                lot_id: self.lot_id.clone(),
                url: url.clone(),
            })
            .collect()
    }
}

/// An image belonging to a lot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub auction_id: String,
    pub lot_id: String,
    pub url: String,
}

/// Lots keyed by `lot_id`
///
/// Inserting an id that is already present replaces the stored record
/// (last write wins) while keeping its original position.
#[derive(Debug, Clone, Default)]
pub struct LotSet {
    lots: IndexMap<String, LotRecord>,
}

impl LotSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a lot, returning the record it replaced if any
    pub fn insert(&mut self, lot: LotRecord) -> Option<LotRecord> {
        self.lots.insert(lot.lot_id.clone(), lot)
    }

    pub fn get(&self, lot_id: &str) -> Option<&LotRecord> {
        self.lots.get(lot_id)
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LotRecord> {
        self.lots.values()
    }

    pub fn into_vec(self) -> Vec<LotRecord> {
        self.lots.into_values().collect()
    }
}

impl Extend<LotRecord> for LotSet {
    fn extend<I: IntoIterator<Item = LotRecord>>(&mut self, iter: I) {
        for lot in iter {
            self.insert(lot);
        }
    }
}

impl FromIterator<LotRecord> for LotSet {
    fn from_iter<I: IntoIterator<Item = LotRecord>>(iter: I) -> Self {
        let mut set = LotSet::new();
        set.extend(iter);
        set
    }
}
