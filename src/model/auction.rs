use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// An auction (a batched sale event) found on the site's listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionListing {
    /// Stable identifier derived from the detail URL
    pub auction_id: String,

    /// Detail page URL
    pub url: String,

    #[serde(default)]
    pub number: Option<String>,

    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub yard: Option<String>,

    #[serde(default)]
    pub organizer: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    /// Closing date/time, site local
    #[serde(default)]
    pub ends_at: Option<NaiveDateTime>,
}

impl AuctionListing {
    /// Creates a listing with only its identity fields set
    pub fn new(auction_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            auction_id: auction_id.into(),
            url: url.into(),
            number: None,
            city: None,
            yard: None,
            organizer: None,
            status: None,
            ends_at: None,
        }
    }

    /// Returns a new listing where every field absent in `self` is taken
    /// from `other`. Fields already set are never overwritten.
    pub fn filled_from(&self, other: &AuctionListing) -> AuctionListing {
        AuctionListing {
            auction_id: self.auction_id.clone(),
            url: self.url.clone(),
            number: self.number.clone().or_else(|| other.number.clone()),
            city: self.city.clone().or_else(|| other.city.clone()),
            yard: self.yard.clone().or_else(|| other.yard.clone()),
            organizer: self.organizer.clone().or_else(|| other.organizer.clone()),
            status: self.status.clone().or_else(|| other.status.clone()),
            ends_at: self.ends_at.or(other.ends_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filled_from_preserves_present_fields() {
        let mut discovered = AuctionListing::new("a1", "https://example.com/a1");
        discovered.city = Some("Belo Horizonte".to_string());

        let mut parsed = AuctionListing::new("a1", "https://example.com/a1");
        parsed.city = Some("Contagem".to_string());
        parsed.yard = Some("Patio Central".to_string());

        let enriched = discovered.filled_from(&parsed);
        assert_eq!(enriched.city.as_deref(), Some("Belo Horizonte"));
        assert_eq!(enriched.yard.as_deref(), Some("Patio Central"));
        assert_eq!(enriched.number, None);
    }
}
