//! Network observation for rendered pages
//!
//! Response metadata is always written to the audit logs. Parsed bodies only
//! live in the in-memory buffer and are never persisted.

use crate::crawler::{is_sensitive_header, ApiRequest};
use crate::state::append_jsonl;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Post bodies longer than this are logged as `<redacted>`
const MAX_LOGGED_POST_DATA: usize = 50_000;

const REDACTED: &str = "<redacted>";

/// A response reported by a render context
#[derive(Debug, Clone)]
pub struct ObservedResponse {
    pub request: ApiRequest,
    pub status: u16,
    pub content_type: String,
    /// Response body as text, when the browser could provide it
    pub body: Option<String>,
}

impl ObservedResponse {
    pub fn is_json(&self) -> bool {
        self.content_type.to_ascii_lowercase().contains("json")
    }
}

/// Receives responses drained from a render context
pub trait ResponseObserver: Send {
    fn on_response(&mut self, response: ObservedResponse);
}

/// A JSON response kept for endpoint scoring
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub request: ApiRequest,
    pub status: u16,
    pub content_type: String,
    pub payload: Value,
}

#[derive(Serialize)]
struct NetworkEntry<'a> {
    url: &'a str,
    status: u16,
    content_type: &'a str,
}

#[derive(Serialize)]
struct EndpointEntry<'a> {
    url: &'a str,
    status: u16,
    content_type: &'a str,
    method: &'a str,
    request_headers: IndexMap<&'a str, &'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_data: Option<&'a str>,
}

/// Bounded buffer of the most recent JSON responses, plus audit logging
#[derive(Debug)]
pub struct NetworkCapture {
    limit: usize,
    captured: VecDeque<CapturedResponse>,
    network_log: PathBuf,
    endpoint_log: Option<PathBuf>,
}

impl NetworkCapture {
    /// Keeps at most `limit` parsed responses; metadata goes to `network_log`
    pub fn new(limit: usize, network_log: impl Into<PathBuf>) -> Self {
        Self {
            limit,
            captured: VecDeque::with_capacity(limit.min(256)),
            network_log: network_log.into(),
            endpoint_log: None,
        }
    }

    /// Also writes request details to a per-auction endpoint log
    pub fn with_endpoint_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.endpoint_log = Some(path.into());
        self
    }

    /// Captured responses, oldest first
    pub fn captured(&self) -> impl Iterator<Item = &CapturedResponse> {
        self.captured.iter()
    }

    pub fn len(&self) -> usize {
        self.captured.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captured.is_empty()
    }

    fn write_logs(&self, response: &ObservedResponse) {
        let entry = NetworkEntry {
            url: &response.request.url,
            status: response.status,
            content_type: &response.content_type,
        };
        log_append(&self.network_log, &entry);

        if let Some(path) = &self.endpoint_log {
            let request = &response.request;
            let request_headers = request
                .headers
                .iter()
                .map(|(name, value)| {
                    let value = if is_sensitive_header(name) {
                        REDACTED
                    } else {
                        value.as_str()
                    };
                    (name.as_str(), value)
                })
                .collect();
            let post_data = request.body.as_deref().filter(|b| !b.is_empty()).map(|b| {
                if b.len() > MAX_LOGGED_POST_DATA {
                    REDACTED
                } else {
                    b
                }
            });

            let entry = EndpointEntry {
                url: &request.url,
                status: response.status,
                content_type: &response.content_type,
                method: &request.method,
                request_headers,
                post_data,
            };
            log_append(path, &entry);
        }
    }
}

fn log_append<T: Serialize>(path: &Path, entry: &T) {
    if let Err(e) = append_jsonl(path, entry) {
        tracing::warn!("Failed to write {}: {}", path.display(), e);
    }
}

impl ResponseObserver for NetworkCapture {
    fn on_response(&mut self, response: ObservedResponse) {
        if !response.is_json() {
            return;
        }
        self.write_logs(&response);

        let Some(payload) = response
            .body
            .as_deref()
            .and_then(|body| serde_json::from_str::<Value>(body).ok())
        else {
            tracing::debug!("Unparseable JSON body from {}", response.request.url);
            return;
        };

        if self.limit == 0 {
            return;
        }
        if self.captured.len() == self.limit {
            self.captured.pop_front();
        }
        self.captured.push_back(CapturedResponse {
            request: response.request,
            status: response.status,
            content_type: response.content_type,
            payload,
        });
    }
}
