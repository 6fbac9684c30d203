//! Lot extraction from rendered or static listing markup
//!
//! Tier 1 reads the site's known card structure. Tier 2 is a generic scan
//! used only when no known card is present; it trades precision for
//! resilience to markup drift. Both are best-effort and never fail.

use crate::extract::text::{
    element_lines, element_text, norm_text, parse_datetime_loose, parse_year, safe_float,
    truncate_chars, PRICE_PATTERN,
};
use crate::model::{LotRecord, LotSet};
use crate::url::{resolve, slugify};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Maximum length of `description_short`
pub const DESCRIPTION_MAX_CHARS: usize = 180;

/// Status phrases recognized when the header carries no explicit situation
pub const SITUATION_VOCABULARY: &[&str] = &[
    "sem reserva",
    "com reserva",
    "sucata",
    "recuperável",
    "recuperavel",
    "não circula",
    "nao circula",
    "circula",
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector should parse")
}

static CARD: Lazy<Selector> = Lazy::new(|| selector("div.card.listaLotes"));
static CARD_HEADER: Lazy<Selector> = Lazy::new(|| selector("div.card-body b"));
static HEADER_SPAN: Lazy<Selector> = Lazy::new(|| selector("span"));
static BRAND_MODEL: Lazy<Selector> = Lazy::new(|| selector("div.row div.col-12.text-center b"));
static WITH_ID: Lazy<Selector> = Lazy::new(|| selector("[id]"));
static IMAGE: Lazy<Selector> = Lazy::new(|| selector("img[src]"));
static ONCLICK_SPAN: Lazy<Selector> = Lazy::new(|| selector("span[onclick]"));
static LINK: Lazy<Selector> = Lazy::new(|| selector("a"));
static GENERIC_BLOCK: Lazy<Selector> = Lazy::new(|| selector("div, article"));

static LOT_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bLote\s*([0-9]+[a-zA-Z0-9\-\.]*)\b").expect("lot number regex should compile")
});
static GENERIC_LOT_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bLote\s*[:#-]?\s*([0-9]+[a-zA-Z0-9\-\.]*)\b")
        .expect("generic lot number regex should compile")
});
static HEADER_SITUATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bLote\s*[0-9]+[a-zA-Z0-9\-\.]*\s*-\s+(.+)$")
        .expect("header situation regex should compile")
});
static LOT_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\blote\b").expect("lot word regex should compile"));
static DETAIL_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/lotes/detalhes/\d+").expect("detail path regex should compile"));
static GENERIC_SITUATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)sem reserva|com reserva|sucata|recuper[áa]vel|n[aã]o circula|circula")
        .expect("situation regex should compile")
});
static CLOSING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(encerramento|encerra)\b\s*[:\-]?\s*(.+)$").expect("closing regex should compile")
});
static CLOSING_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)encerr").expect("closing word regex should compile"));

/// Extracts lots from a listing page, de-duplicated by id
///
/// `page_url` is the base for relative image and detail links.
pub fn extract_lots_from_html(html: &str, auction_id: &str, page_url: &str) -> Vec<LotRecord> {
    let document = Html::parse_document(html);

    let cards: Vec<_> = document.select(&CARD).collect();
    let lots: LotSet = if cards.is_empty() {
        document
            .select(&GENERIC_BLOCK)
            .filter_map(|block| parse_generic_block(&block, auction_id, page_url))
            .collect()
    } else {
        cards
            .iter()
            .map(|card| parse_site_card(card, auction_id, page_url))
            .collect()
    };

    lots.into_vec()
}

fn parse_site_card(card: &ElementRef<'_>, auction_id: &str, page_url: &str) -> LotRecord {
    let card_text = element_text(card);
    let card_id = card
        .value()
        .attr("id")
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let header = card.select(&CARD_HEADER).next();
    let header_text = header.map(|h| element_text(&h)).filter(|t| !t.is_empty());

    let lot_number = LOT_NUMBER
        .captures(header_text.as_deref().unwrap_or(&card_text))
        .map(|c| c[1].to_string());

    let situation = header
        .and_then(|h| h.select(&HEADER_SPAN).nth(1))
        .map(|span| element_text(&span))
        .filter(|s| !s.is_empty())
        .or_else(|| {
            header_text
                .as_deref()
                .and_then(|t| HEADER_SITUATION.captures(t))
                .map(|c| c[1].trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .or_else(|| {
            let lower = card_text.to_lowercase();
            SITUATION_VOCABULARY
                .iter()
                .find(|k| lower.contains(*k))
                .map(|k| k.to_string())
        });

    let brand_model_full = card
        .select(&BRAND_MODEL)
        .map(|b| element_text(&b))
        .find(|t| !t.is_empty() && !LOT_WORD.is_match(t));

    let year = brand_model_full
        .as_deref()
        .and_then(parse_year)
        .or_else(|| parse_year(&card_text));

    let brand_model = brand_model_full.map(|full| match year {
        Some(y) => strip_trailing_year(&full, y),
        None => full,
    });

    let start_bid = card_id
        .and_then(|id| {
            let target = format!("valor_atual_lote_{id}");
            card.select(&WITH_ID)
                .find(|el| el.value().attr("id") == Some(target.as_str()))
        })
        .and_then(|el| safe_float(&element_text(&el)))
        .or_else(|| {
            PRICE_PATTERN
                .find(&card_text)
                .and_then(|m| safe_float(m.as_str()))
        });

    let image_urls = collect_images(card, page_url);

    let lot_url = card
        .select(&ONCLICK_SPAN)
        .next()
        .and_then(|span| span.value().attr("onclick"))
        .and_then(|onclick| DETAIL_PATH.find(onclick))
        .and_then(|m| resolve(page_url, m.as_str()));

    let requires_login = card.select(&LINK).any(|a| {
        let label = element_text(&a).to_lowercase();
        let href = a.value().attr("href").unwrap_or("").to_lowercase();
        label.contains("login obrigat") || href.contains("/ssc/login/login")
    });

    let lot_id = card_id
        .map(str::to_string)
        .or_else(|| lot_number.clone())
        .unwrap_or_else(|| {
            synthesize_id(header_text.as_deref().unwrap_or(&card_text))
        });

    let description = header_text
        .clone()
        .or_else(|| lot_number.map(|n| format!("Lote {n}")))
        .unwrap_or_else(|| card_text.clone());

    let mut lot = LotRecord::new(
        auction_id,
        lot_id,
        truncate_chars(&description, DESCRIPTION_MAX_CHARS),
    );
    lot.brand_model = brand_model;
    lot.year = year;
    lot.situation = situation;
    lot.start_bid = start_bid;
    lot.lot_url = lot_url;
    lot.image_urls = image_urls;
    lot.requires_login = requires_login;
    lot.raw_text = Some(card_text);
    lot
}

fn parse_generic_block(block: &ElementRef<'_>, auction_id: &str, page_url: &str) -> Option<LotRecord> {
    let text = element_text(block);
    let lower = text.to_lowercase();
    if text.is_empty() || !lower.contains("lote") {
        return None;
    }

    let lot_id = GENERIC_LOT_NUMBER
        .captures(&text)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| synthesize_id(&text));

    let situation = GENERIC_SITUATION
        .find(&lower)
        .map(|m| m.as_str().to_string());

    let start_bid = PRICE_PATTERN
        .find(&text)
        .and_then(|m| safe_float(m.as_str()));

    let ends_at = CLOSING
        .captures(&text)
        .and_then(|c| parse_datetime_loose(&c[2]));

    let brand_model = element_lines(block)
        .into_iter()
        .take(6)
        .find(|line| {
            !LOT_WORD.is_match(line)
                && !PRICE_PATTERN.is_match(line)
                && !CLOSING_WORD.is_match(line)
                && line.chars().count() >= 3
        });

    let lot_url = block.select(&LINK).find_map(|a| {
        let href = a.value().attr("href")?;
        let label = element_text(&a).to_lowercase();
        if href.to_lowercase().contains("lote") || label.contains("detal") {
            resolve(page_url, href)
        } else {
            None
        }
    });

    let mut lot = LotRecord::new(
        auction_id,
        lot_id,
        truncate_chars(&text, DESCRIPTION_MAX_CHARS),
    );
    lot.brand_model = brand_model;
    lot.year = parse_year(&text);
    lot.situation = situation;
    lot.start_bid = start_bid;
    lot.ends_at = ends_at;
    lot.lot_url = lot_url;
    lot.image_urls = collect_images(block, page_url);
    lot.requires_login = lower.contains("login") && lower.contains("obrig");
    lot.raw_text = Some(text);
    Some(lot)
}

fn collect_images(element: &ElementRef<'_>, page_url: &str) -> Vec<String> {
    element
        .select(&IMAGE)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| resolve(page_url, src))
        .collect()
}

/// Deterministic id from the first 60 characters of text
fn synthesize_id(text: &str) -> String {
    let slug = slugify(&truncate_chars(text, 60));
    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}

fn strip_trailing_year(full: &str, year: i32) -> String {
    let trimmed = norm_text(full);
    let stripped = trimmed
        .strip_suffix(&year.to_string())
        .filter(|rest| rest.is_empty() || rest.ends_with(char::is_whitespace))
        .map(str::trim_end);
    match stripped {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => trimmed,
    }
}
