//! Text normalization and value parsing shared by the extractors

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::ElementRef;

static WHITESPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

static YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("year regex should compile"));

/// First currency-prefixed amount, e.g. `R$ 1.234,56`
pub static PRICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"R\$\s*[0-9\.,]+").expect("price regex should compile"));

static DAY_FIRST_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})(?:\D{1,5}(\d{1,2})[:hH](\d{2})(?::(\d{2}))?)?")
        .expect("day-first date regex should compile")
});

static ISO_DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})(?:[T\s](\d{1,2}):(\d{2})(?::(\d{2}))?)?")
        .expect("iso date regex should compile")
});

/// Collapses whitespace runs to single spaces and trims
pub fn norm_text(text: &str) -> String {
    WHITESPACE_PATTERN.replace_all(text.trim(), " ").into_owned()
}

/// Normalized text content of an element, text nodes joined by spaces
pub fn element_text(element: &ElementRef<'_>) -> String {
    norm_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Non-empty normalized lines of an element's text nodes
pub fn element_lines(element: &ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .flat_map(|t| t.split('\n'))
        .map(norm_text)
        .filter(|l| !l.is_empty())
        .collect()
}

/// First standalone 19xx/20xx token
pub fn parse_year(text: &str) -> Option<i32> {
    YEAR_PATTERN
        .captures(text)
        .and_then(|c| c[1].parse().ok())
}

/// Parses a Brazilian-formatted amount: `R$ 1.234,56` -> `1234.56`
pub fn safe_float(text: &str) -> Option<f64> {
    let cleaned: String = text
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Finds the first `dd/mm/yyyy [hh:mm[:ss]]` or `yyyy-mm-dd[ hh:mm[:ss]]`
/// anywhere in `text`
pub fn parse_datetime_loose(text: &str) -> Option<NaiveDateTime> {
    if let Some(c) = DAY_FIRST_PATTERN.captures(text) {
        if let Some(dt) = build_datetime(&c, 3, 2, 1) {
            return Some(dt);
        }
    }
    ISO_DATE_PATTERN
        .captures(text)
        .and_then(|c| build_datetime(&c, 1, 2, 3))
}

fn build_datetime(c: &Captures<'_>, year: usize, month: usize, day: usize) -> Option<NaiveDateTime> {
    let num = |i: usize| c.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let date = NaiveDate::from_ymd_opt(c[year].parse().ok()?, num(month)?, num(day)?)?;
    date.and_hms_opt(num(4).unwrap_or(0), num(5).unwrap_or(0), num(6).unwrap_or(0))
}

/// Truncates to at most `max` characters
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
