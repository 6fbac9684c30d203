//! Crawler module for fetching and orchestration
//!
//! This module contains the core crawling logic, including:
//! - Plain-HTTP fetching with retry and backoff
//! - Global rate limiting shared by HTTP and browser traffic
//! - Endpoint selection and page bounds for lot collection
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
pub mod lots;
mod rate_limit;
mod retry;

pub use coordinator::{Coordinator, CrawlReport, FetchStrategy};
pub use fetcher::{
    build_http_client, is_sensitive_header, ApiRequest, HttpFetcher, HttpResponse,
    SENSITIVE_HEADERS,
};
pub use rate_limit::{RateLimiter, MIN_RATE_PER_SEC};
pub use retry::RetryPolicy;

use crate::config::Config;
use crate::render::Renderer;
use std::sync::Arc;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Load robots.txt and the checkpoint
/// 2. Discover and enrich auctions
/// 3. Collect lots per auction, resuming completed pages
/// 4. Write `auctions.json` and `lots.json`
pub async fn crawl(config: Config, renderer: Arc<dyn Renderer>) -> crate::Result<CrawlReport> {
    let mut coordinator = Coordinator::new(config, renderer)?;
    coordinator.run().await
}
