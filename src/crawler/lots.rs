//! Endpoint selection and page bounds for lot collection

use crate::crawler::fetcher::ApiRequest;
use crate::extract::extract_lots_from_json;
use crate::model::LotRecord;
use crate::render::CapturedResponse;
use crate::url::{paginate_payload, paginate_url};

/// Page cap applied to dry runs
pub const DRY_RUN_MAX_PAGES: u32 = 2;

/// Picks the captured response yielding the most lots
///
/// Ties keep the earliest capture. `None` when no capture yields any lot.
pub fn select_best_endpoint<'a, I>(
    captured: I,
    auction_id: &str,
) -> Option<(&'a CapturedResponse, Vec<LotRecord>)>
where
    I: IntoIterator<Item = &'a CapturedResponse>,
{
    let mut best: Option<(&CapturedResponse, Vec<LotRecord>)> = None;
    for response in captured {
        let lots = extract_lots_from_json(&response.payload, auction_id);
        let best_len = best.as_ref().map_or(0, |(_, l)| l.len());
        if lots.len() > best_len {
            best = Some((response, lots));
        }
    }
    best
}

/// The effective `max_pages`, with the dry-run cap applied
pub fn page_limit(max_pages: Option<u32>, dry_run: bool) -> Option<u32> {
    if dry_run {
        Some(max_pages.unwrap_or(DRY_RUN_MAX_PAGES).min(DRY_RUN_MAX_PAGES))
    } else {
        max_pages
    }
}

/// Last page to request from a JSON endpoint
pub fn target_pages(total: Option<u32>, limit: Option<u32>, ceiling: u32) -> u32 {
    match (total, limit) {
        (Some(total), Some(limit)) => total.min(limit),
        (Some(total), None) => total,
        (None, Some(limit)) => limit,
        (None, None) => ceiling,
    }
}

/// Rewrites the captured request for `page`
///
/// `None` when the method is neither GET nor POST or the request carries
/// no recognizable pagination parameter.
pub fn page_request(template: &ApiRequest, page: u32) -> Option<ApiRequest> {
    if template.is_get() {
        let url = paginate_url(&template.url, page)?;
        Some(ApiRequest {
            url,
            ..template.clone()
        })
    } else if template.is_post() {
        let body = paginate_payload(template.body.as_deref(), page)?;
        let mut request = ApiRequest {
            body: Some(body),
            ..template.clone()
        };
        if !request
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        {
            request
                .headers
                .push(("Content-Type".to_string(), "application/json".to_string()));
        }
        Some(request)
    } else {
        None
    }
}
