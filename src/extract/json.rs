//! Lot extraction from arbitrary JSON payloads
//!
//! Payload shapes vary between endpoints, so fields are resolved through
//! alias tables: each alias is tried with an exact key match first, then
//! case-insensitively. Null values never satisfy a lookup.

use crate::extract::html::DESCRIPTION_MAX_CHARS;
use crate::extract::text::{parse_datetime_loose, parse_year, safe_float, truncate_chars};
use crate::model::LotRecord;
use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};

/// Keys likely to hold the record list
pub const CONTAINER_KEYS: &[&str] = &[
    "items", "content", "data", "result", "results", "registros", "lotes", "lots", "rows",
];

pub const ID_KEYS: &[&str] = &[
    "lotId",
    "loteId",
    "id",
    "lote",
    "numeroLote",
    "numLote",
    "codigoLote",
    "codigo",
    "numero",
];

pub const DESCRIPTION_KEYS: &[&str] = &[
    "descricaoCurta",
    "descricao",
    "descricaoResumida",
    "nome",
    "titulo",
    "title",
];

pub const BRAND_KEYS: &[&str] = &["marcaModelo", "marca_modelo", "marca", "brand"];

pub const MODEL_KEYS: &[&str] = &["modelo", "model"];

pub const YEAR_KEYS: &[&str] = &[
    "ano",
    "anoModelo",
    "ano_modelo",
    "anoFabricacao",
    "ano_fabricacao",
    "year",
];

pub const SITUATION_KEYS: &[&str] = &["situacao", "status", "tipo", "categoria"];

pub const START_BID_KEYS: &[&str] = &[
    "lanceInicial",
    "valorInicial",
    "valorMinimo",
    "precoInicial",
    "startBid",
];

pub const ENDS_AT_KEYS: &[&str] = &["dataEncerramento", "encerramento", "fim", "endsAt"];

pub const URL_KEYS: &[&str] = &["url", "link", "detalheUrl", "detailsUrl"];

pub const IMAGE_LIST_KEYS: &[&str] = &["imagens", "images", "fotos", "fotosUrl", "photos"];

/// Keys of an image object holding its URL
pub const IMAGE_URL_KEYS: &[&str] = &["url", "src", "caminho", "path"];

pub const TOTAL_PAGES_KEYS: &[&str] = &["totalPages", "total_pages", "paginas", "qtdPaginas", "lastPage"];

/// Epoch values above this are milliseconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e10;

/// Looks up the first non-null value among `keys`
pub fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| object.get(*k).filter(|v| !v.is_null()))
        .or_else(|| {
            keys.iter().find_map(|k| {
                object
                    .iter()
                    .find(|(name, v)| name.eq_ignore_ascii_case(k) && !v.is_null())
                    .map(|(_, v)| v)
            })
        })
}

fn has_key(object: &Map<String, Value>, keys: &[&str]) -> bool {
    object
        .keys()
        .any(|name| keys.iter().any(|k| name.eq_ignore_ascii_case(k)))
}

/// Scalar rendering used for ids and free text
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value.map(value_to_string).filter(|s| !s.is_empty())
}

fn candidate_lists<'a>(value: &'a Value, out: &mut Vec<&'a Vec<Value>>) {
    let object = match value {
        Value::Array(items) => {
            out.push(items);
            return;
        }
        Value::Object(object) => object,
        _ => return,
    };

    for key in CONTAINER_KEYS {
        let found = object
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, v)| v);
        match found {
            Some(Value::Array(items)) => out.push(items),
            Some(nested @ Value::Object(_)) => candidate_lists(nested, out),
            _ => {}
        }
    }

    for v in object.values() {
        if let Value::Array(items) = v {
            if matches!(
                items.first(),
                Some(Value::Object(_) | Value::String(_) | Value::Number(_))
            ) {
                out.push(items);
            }
        }
    }
}

/// A list is plausible when its first object has both an id-like and a
/// description-like key
fn looks_like_lots(sample: &Map<String, Value>) -> bool {
    let has_id = has_key(sample, ID_KEYS);
    let has_description = sample
        .keys()
        .any(|k| k.to_lowercase().contains("desc"))
        || has_key(sample, DESCRIPTION_KEYS)
        || has_key(sample, BRAND_KEYS)
        || has_key(sample, MODEL_KEYS);
    has_id && has_description
}

/// Converts the first plausible record list in `payload` to lots
///
/// Returns an empty vector when no list qualifies.
pub fn extract_lots_from_json(payload: &Value, auction_id: &str) -> Vec<LotRecord> {
    let mut lists = Vec::new();
    candidate_lists(payload, &mut lists);

    for items in lists {
        let objects: Vec<&Map<String, Value>> = items.iter().filter_map(Value::as_object).collect();
        let Some(sample) = objects.first() else {
            continue;
        };
        if !looks_like_lots(sample) {
            continue;
        }

        let lots: Vec<LotRecord> = objects
            .iter()
            .map(|item| lot_from_object(item, auction_id))
            .collect();
        if !lots.is_empty() {
            return lots;
        }
    }

    Vec::new()
}

fn lot_from_object(item: &Map<String, Value>, auction_id: &str) -> LotRecord {
    let lot_id = non_empty_string(lookup(item, ID_KEYS)).unwrap_or_else(|| "unknown".to_string());
    let description = non_empty_string(lookup(item, DESCRIPTION_KEYS))
        .unwrap_or_else(|| "(sem descrição)".to_string());

    let brand = non_empty_string(lookup(item, BRAND_KEYS));
    let model = non_empty_string(lookup(item, MODEL_KEYS));
    let brand_model = match (brand, model) {
        (Some(b), Some(m)) => Some(format!("{b} {m}")),
        (b, m) => b.or(m),
    };

    let mut lot = LotRecord::new(
        auction_id,
        lot_id,
        truncate_chars(&description, DESCRIPTION_MAX_CHARS),
    );
    lot.brand_model = brand_model;
    lot.year = lookup(item, YEAR_KEYS).and_then(|v| parse_year(&value_to_string(v)));
    lot.situation = non_empty_string(lookup(item, SITUATION_KEYS));
    lot.start_bid = lookup(item, START_BID_KEYS).and_then(parse_amount);
    lot.ends_at = lookup(item, ENDS_AT_KEYS).and_then(parse_json_datetime);
    lot.lot_url = non_empty_string(lookup(item, URL_KEYS));
    lot.image_urls = lookup(item, IMAGE_LIST_KEYS)
        .and_then(Value::as_array)
        .map(|images| images.iter().filter_map(image_url).collect())
        .unwrap_or_default();
    lot
}

fn image_url(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(object) => non_empty_string(lookup(object, IMAGE_URL_KEYS)),
        _ => None,
    }
}

/// Numbers are taken as-is; strings go through currency cleanup
pub fn parse_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => safe_float(s),
        _ => None,
    }
}

/// Accepts RFC 3339 / ISO-8601 strings, epoch seconds or milliseconds, and
/// finally a loose date search
///
/// Offset-aware timestamps keep their own wall-clock time; epoch values are
/// read as UTC.
pub fn parse_json_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(n) => {
            let raw = n.as_f64()?;
            let seconds = if raw > EPOCH_MILLIS_THRESHOLD {
                raw / 1000.0
            } else {
                raw
            };
            let whole = seconds.trunc();
            let nanos = ((seconds - whole) * 1e9).round() as u32;
            DateTime::from_timestamp(whole as i64, nanos.min(999_999_999)).map(|dt| dt.naive_utc())
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.naive_local())
                .ok()
                .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok())
                .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
                .or_else(|| parse_datetime_loose(s))
        }
        _ => None,
    }
}

/// Reads a top-level total-pages field
pub fn get_total_pages(payload: &Value) -> Option<u32> {
    let object = payload.as_object()?;
    match lookup(object, TOTAL_PAGES_KEYS)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
