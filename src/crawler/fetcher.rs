//! Plain-HTTP fetch layer
//!
//! Every request issued here goes through the shared rate limiter and the
//! retry policy. Robots checks are the caller's job, since the robots file
//! itself is fetched through this layer.

use crate::config::Config;
use crate::crawler::rate_limit::RateLimiter;
use crate::crawler::retry::RetryPolicy;
use crate::{CrawlError, Result};
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use std::sync::Arc;

/// Request headers that are never written to audit logs nor replayed
pub const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Headers managed by the client itself when a captured request is replayed
const CLIENT_MANAGED_HEADERS: &[&str] = &["host", "content-length", "user-agent", "connection"];

pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// A request observed in the browser, replayable over plain HTTP
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn is_post(&self) -> bool {
        self.method.eq_ignore_ascii_case("POST")
    }
}

/// A completed response with its body read as text
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type.to_ascii_lowercase().contains("json")
    }
}

/// Builds an HTTP client identified by the configured user agent
pub fn build_http_client(config: &Config) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.user_agent())
        .timeout(config.crawler.timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Rate-limited, retrying plain-HTTP fetcher
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(client: Client, limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        Self {
            client,
            limiter,
            retry,
        }
    }

    /// Builds the client from config and shares the given limiter
    pub fn from_config(config: &Config, limiter: Arc<RateLimiter>) -> Result<Self> {
        let client = build_http_client(config).map_err(|e| CrawlError::from_reqwest("", e))?;
        Ok(Self::new(client, limiter, RetryPolicy::from(&config.retry)))
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// GETs a page, treating any non-2xx status as an error
    ///
    /// Timeouts, connection failures and 5xx responses are retried.
    pub async fn get_text(&self, url: &str) -> Result<HttpResponse> {
        let response = self
            .retry
            .retry(
                || self.execute(ApiRequest::get(url)),
                CrawlError::is_transient,
            )
            .await?;

        if !response.is_success() {
            return Err(CrawlError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }

    /// Reissues a captured API request
    ///
    /// Client-side statuses (4xx) are returned to the caller, not raised;
    /// server-side statuses are retried and surface as errors once attempts
    /// are exhausted.
    pub async fn send(&self, request: &ApiRequest) -> Result<HttpResponse> {
        self.retry
            .retry(|| self.execute(request.clone()), CrawlError::is_transient)
            .await
    }

    async fn execute(&self, request: ApiRequest) -> Result<HttpResponse> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| CrawlError::HttpStatus {
                url: request.url.clone(),
                status: 405,
            })?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            if name.starts_with(':')
                || is_sensitive_header(name)
                || CLIENT_MANAGED_HEADERS
                    .iter()
                    .any(|h| h.eq_ignore_ascii_case(name))
            {
                continue;
            }
            // Browser-reported headers occasionally carry values reqwest rejects
            if let (Ok(n), Ok(v)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                builder = builder.header(n, v);
            }
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        self.limiter.wait().await;
        tracing::debug!("{} {}", request.method, request.url);

        let response = builder
            .send()
            .await
            .map_err(|e| CrawlError::from_reqwest(&request.url, e))?;

        let status = response.status().as_u16();
        if status >= 500 {
            return Err(CrawlError::HttpStatus {
                url: request.url,
                status,
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| CrawlError::from_reqwest(&request.url, e))?;

        Ok(HttpResponse {
            url: final_url,
            status,
            content_type,
            body,
        })
    }
}
