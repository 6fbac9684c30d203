//! Rewriting a captured API request to ask for another page

use serde_json::Value;
use url::Url;

/// Query keys recognized as a page number, in priority order
pub const PAGE_QUERY_KEYS: &[&str] = &["page", "pagina", "pageNumber", "pageIndex", "p"];

/// Body keys recognized as a page number, in priority order
pub const PAGE_BODY_KEYS: &[&str] = &["page", "pagina", "pageNumber", "pageIndex"];

/// Returns `url` with its page parameter set to `page`
///
/// A recognized page key is rewritten in place; otherwise an
/// `offset`/`limit` pair is rewritten to `offset = (page - 1) * limit`.
/// `None` means the URL carries no pagination parameters at all.
pub fn paginate_url(url: &str, page: u32) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let page_key = PAGE_QUERY_KEYS
        .iter()
        .find(|key| pairs.iter().any(|(k, _)| k == *key));

    if let Some(key) = page_key {
        for (k, v) in pairs.iter_mut() {
            if k == key {
                *v = page.to_string();
            }
        }
    } else {
        let limit: u64 = pairs
            .iter()
            .find(|(k, _)| k == "limit")
            .and_then(|(_, v)| v.trim().parse().ok())?;
        let offset = pairs.iter_mut().find(|(k, _)| k == "offset")?;
        offset.1 = (u64::from(page.saturating_sub(1)) * limit).to_string();
    }

    parsed.query_pairs_mut().clear().extend_pairs(pairs.iter());
    Some(parsed.to_string())
}

/// Returns the JSON request body with its page field set to `page`
///
/// Same rules as [`paginate_url`]. `None` when the body is absent, not a
/// JSON object, or has no recognized pagination fields.
pub fn paginate_payload(body: Option<&str>, page: u32) -> Option<String> {
    let mut payload: Value = serde_json::from_str(body?.trim()).ok()?;
    let object = payload.as_object_mut()?;

    if let Some(key) = PAGE_BODY_KEYS.iter().find(|k| object.contains_key(**k)) {
        object.insert((*key).to_string(), Value::from(page));
    } else {
        let limit = match object.get("limit")? {
            Value::Number(n) => n.as_u64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        if !object.contains_key("offset") {
            return None;
        }
        object.insert(
            "offset".to_string(),
            Value::from(u64::from(page.saturating_sub(1)) * limit),
        );
    }

    serde_json::to_string(&payload).ok()
}
