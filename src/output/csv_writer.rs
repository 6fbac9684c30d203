//! CSV exports with a header row per file

use crate::model::{AuctionListing, ImageReference, LotRecord};
use crate::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::Path;

/// Separator for multi-valued cells
pub const LIST_SEPARATOR: &str = " | ";

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Serialize)]
struct AuctionRow<'a> {
    auction_id: &'a str,
    url: &'a str,
    number: Option<&'a str>,
    city: Option<&'a str>,
    yard: Option<&'a str>,
    organizer: Option<&'a str>,
    status: Option<&'a str>,
    ends_at: Option<String>,
}

#[derive(Serialize)]
struct LotRow<'a> {
    auction_id: &'a str,
    lot_id: &'a str,
    description_short: &'a str,
    brand_model: Option<&'a str>,
    year: Option<i32>,
    situation: Option<&'a str>,
    start_bid: Option<f64>,
    ends_at: Option<String>,
    lot_url: Option<&'a str>,
    image_urls: String,
    requires_login: bool,
    raw_text: Option<&'a str>,
}

pub(crate) fn format_datetime(value: Option<NaiveDateTime>) -> Option<String> {
    value.map(|dt| dt.format(DATETIME_FORMAT).to_string())
}

fn write_rows<T, I>(path: &Path, rows: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_auctions_csv(path: &Path, auctions: &[AuctionListing]) -> Result<()> {
    write_rows(
        path,
        auctions.iter().map(|a| AuctionRow {
            auction_id: &a.auction_id,
            url: &a.url,
            number: a.number.as_deref(),
            city: a.city.as_deref(),
            yard: a.yard.as_deref(),
            organizer: a.organizer.as_deref(),
            status: a.status.as_deref(),
            ends_at: format_datetime(a.ends_at),
        }),
    )
}

pub fn write_lots_csv(path: &Path, lots: &[LotRecord]) -> Result<()> {
    write_rows(
        path,
        lots.iter().map(|l| LotRow {
            auction_id: &l.auction_id,
            lot_id: &l.lot_id,
            description_short: &l.description_short,
            brand_model: l.brand_model.as_deref(),
            year: l.year,
            situation: l.situation.as_deref(),
            start_bid: l.start_bid,
            ends_at: format_datetime(l.ends_at),
            lot_url: l.lot_url.as_deref(),
            image_urls: l.image_urls.join(LIST_SEPARATOR),
            requires_login: l.requires_login,
            raw_text: l.raw_text.as_deref(),
        }),
    )
}

pub fn write_images_csv(path: &Path, images: &[ImageReference]) -> Result<()> {
    write_rows(path, images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn test_lots_csv_joins_images() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lots.csv");

        let mut lot = LotRecord::new("a1", "12", "Lote 12");
        lot.image_urls = vec!["https://x/1.jpg".to_string(), "https://x/2.jpg".to_string()];
        lot.ends_at = NaiveDate::from_ymd_opt(2025, 11, 20).and_then(|d| d.and_hms_opt(14, 0, 0));
        write_lots_csv(&path, &[lot]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "auction_id");
        assert_eq!(&headers[9], "image_urls");

        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[9], "https://x/1.jpg | https://x/2.jpg");
        assert_eq!(&record[7], "2025-11-20T14:00:00");
        assert_eq!(&record[10], "false");
    }

    #[test]
    fn test_images_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("images.csv");
        let image = ImageReference {
            auction_id: "a1".to_string(),
            lot_id: "12".to_string(),
            url: "https://x/1.jpg".to_string(),
        };
        write_images_csv(&path, &[image]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "auction_id,lot_id,url\na1,12,https://x/1.jpg\n");
    }
}
