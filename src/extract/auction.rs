//! Auction discovery and metadata parsing
//!
//! Listing pages show one card per auction with a "Detalhes" link; metadata
//! is mined from the card text with label patterns. Detail pages get the
//! same mining over the whole document.

use crate::extract::text::{element_text, norm_text, parse_datetime_loose};
use crate::model::AuctionListing;
use crate::url::{resolve, slugify};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Ancestors accepted as an auction card container
const CONTAINER_TAGS: &[&str] = &["div", "article", "section", "li"];

/// How many levels above the link the container search goes
const CONTAINER_SEARCH_DEPTH: usize = 4;

pub const STATUS_VOCABULARY: &[&str] = &["publicado", "aberto", "encerrado", "finalizado", "em andamento"];

const CITY_LABELS: &[&str] = &["cidade", "munic[ií]pio", "local"];
const YARD_LABELS: &[&str] = &["p[aá]tio", "patio"];
const ORGANIZER_LABELS: &[&str] = &["organizador", "leiloeiro"];
const DETAIL_CLOSING_LABELS: &[&str] = &[
    "encerramento",
    "encerra",
    "data/hora",
    "data e hora",
    "t[ée]rmino",
    "termino",
];

static LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a").expect("link selector should parse"));
static BODY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("body selector should parse"));

static AUCTION_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(leil[aã]o)\s*(n[ºo]\.?|n\b|n\s*o)?\s*[:\-]?\s*([0-9]{1,10}(?:/[0-9]{2,4})?)\b")
        .expect("auction number regex should compile")
});

static CARD_CLOSING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(encerramento|encerra)\b\s*[:\-]?\s*(.+)$")
        .expect("card closing regex should compile")
});

fn label_patterns(labels: &[&str]) -> Vec<Regex> {
    labels
        .iter()
        .map(|label| {
            Regex::new(&format!(
                r"(?i)\b{label}\b\s*[:\-]?\s*(.+?)(?:$|\s{{2,}}|\b[A-Za-z]+\b\s*[:\-])"
            ))
            .expect("label regex should compile")
        })
        .collect()
}

static CITY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| label_patterns(CITY_LABELS));
static YARD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| label_patterns(YARD_LABELS));
static ORGANIZER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| label_patterns(ORGANIZER_LABELS));
static DETAIL_CLOSING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    DETAIL_CLOSING_LABELS
        .iter()
        .map(|label| {
            Regex::new(&format!(r"(?i)\b{label}\b\s*[:\-]?\s*(.+?)(?:$|\s{{2,}})"))
                .expect("closing label regex should compile")
        })
        .collect()
});

fn extract_kv(text: &str, patterns: &[Regex]) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(text)
            .map(|c| norm_text(&c[1]))
            .filter(|v| !v.is_empty())
    })
}

pub fn guess_auction_number(text: &str) -> Option<String> {
    AUCTION_NUMBER.captures(text).map(|c| c[3].to_string())
}

pub fn guess_status(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    STATUS_VOCABULARY
        .iter()
        .find(|k| lower.contains(*k))
        .map(|k| k.to_string())
}

fn card_container<'a>(link: ElementRef<'a>) -> ElementRef<'a> {
    let mut container = link;
    for _ in 0..CONTAINER_SEARCH_DEPTH {
        if CONTAINER_TAGS.contains(&container.value().name()) {
            break;
        }
        match container.parent().and_then(ElementRef::wrap) {
            Some(parent) => container = parent,
            None => break,
        }
    }
    container
}

/// Number of "Detalhes" links on the page, duplicates included
pub fn count_detail_links(html: &str) -> usize {
    Html::parse_document(html)
        .select(&LINK)
        .filter(|link| is_detail_link(link))
        .count()
}

fn is_detail_link(link: &ElementRef<'_>) -> bool {
    element_text(link).to_lowercase().contains("detalhes")
}

/// Parses auction cards from the listing page, de-duplicated by URL
pub fn parse_auction_cards(html: &str, base_url: &str) -> Vec<AuctionListing> {
    let document = Html::parse_document(html);
    let mut auctions: IndexMap<String, AuctionListing> = IndexMap::new();

    for link in document.select(&LINK) {
        if !is_detail_link(&link) {
            continue;
        }
        let Some(url) = link
            .value()
            .attr("href")
            .and_then(|href| resolve(base_url, href))
        else {
            continue;
        };

        let block = element_text(&card_container(link));

        let mut auction = AuctionListing::new(slugify(&url), url.clone());
        auction.number = guess_auction_number(&block);
        auction.city = extract_kv(&block, &CITY_PATTERNS);
        auction.yard = extract_kv(&block, &YARD_PATTERNS);
        auction.organizer = extract_kv(&block, &ORGANIZER_PATTERNS);
        auction.status = guess_status(&block);
        auction.ends_at = CARD_CLOSING
            .captures(&block)
            .and_then(|c| parse_datetime_loose(&c[2]));

        auctions.insert(url, auction);
    }

    auctions.into_values().collect()
}

fn detail_closing(text: &str) -> Option<NaiveDateTime> {
    DETAIL_CLOSING_PATTERNS
        .iter()
        .find_map(|re| re.captures(text).and_then(|c| parse_datetime_loose(&c[1])))
}

/// Parses an auction detail page; only fields absent in `auction` are filled
pub fn parse_auction_details(html: &str, auction: &AuctionListing) -> AuctionListing {
    let document = Html::parse_document(html);
    let text = document
        .select(&BODY)
        .next()
        .map(|body| element_text(&body))
        .unwrap_or_else(|| element_text(&document.root_element()));

    let mut parsed = AuctionListing::new(auction.auction_id.clone(), auction.url.clone());
    parsed.number = guess_auction_number(&text);
    parsed.city = extract_kv(&text, &CITY_PATTERNS);
    parsed.yard = extract_kv(&text, &YARD_PATTERNS);
    parsed.organizer = extract_kv(&text, &ORGANIZER_PATTERNS);
    parsed.status = guess_status(&text);
    parsed.ends_at = detail_closing(&text);

    auction.filled_from(&parsed)
}
