//! Crawler coordinator - main crawl orchestration logic
//!
//! A run goes through three phases:
//! - discovery of auctions on the site root;
//! - metadata enrichment from each auction's detail page;
//! - lot collection per auction, JSON endpoint first, HTML pagination second.
//!
//! Every phase tries the fetch strategies in `FetchStrategy::ORDER` and stops
//! at the first one that succeeds. Completed pages are checkpointed so an
//! interrupted run resumes without refetching them.

use crate::config::Config;
use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::lots::{page_limit, page_request, select_best_endpoint, target_pages};
use crate::crawler::rate_limit::RateLimiter;
use crate::extract::{
    count_detail_links, extract_lots_from_html, extract_lots_from_json, get_total_pages,
    parse_auction_cards, parse_auction_details,
};
use crate::model::{AuctionListing, LotRecord, LotSet, LotSource};
use crate::output::write_json;
use crate::render::{NetworkCapture, PageControl, RenderContext, Renderer};
use crate::robots::RobotsPolicy;
use crate::state::{CheckpointStore, LotLog};
use crate::{CrawlError, Result};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Bounded wait for the first "Detalhes" link on the listing page
const DETAIL_LINKS_WAIT: Duration = Duration::from_secs(5);

/// Bounded wait for new cards after a "load more" click
const LOAD_MORE_WAIT: Duration = Duration::from_secs(3);

/// Bounded wait for the previous page's first lot to disappear
const STALE_CONTENT_WAIT: Duration = Duration::from_secs(5);

const DETAIL_LINKS_PRESENT: &str = "Array.from(document.querySelectorAll('a'))\
    .some(a => (a.innerText || '').toLowerCase().includes('detalhes'))";

/// How a page is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Browser-driven: scripts run, network traffic is observed
    Rendered,
    /// One request, static parse
    PlainHttp,
}

impl FetchStrategy {
    /// Strategies in the order they are attempted
    pub const ORDER: [FetchStrategy; 2] = [FetchStrategy::Rendered, FetchStrategy::PlainHttp];
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStrategy::Rendered => write!(f, "rendered"),
            FetchStrategy::PlainHttp => write!(f, "plain-http"),
        }
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub auctions: usize,
    pub lots: usize,
    pub failed_auctions: usize,
}

/// What the JSON-first attempt achieved for an auction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiOutcome {
    /// No captured response yielded lots
    NoEndpoint,
    /// The endpoint answered 401/403
    AuthRequired,
    Collected,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    fetcher: HttpFetcher,
    renderer: Arc<dyn Renderer>,
    robots: RobotsPolicy,
    checkpoint: CheckpointStore,
}

impl Coordinator {
    /// Creates a coordinator with an HTTP fetcher built from `config`
    ///
    /// The fetcher's rate limiter is the one limiter for the whole run.
    pub fn new(config: Config, renderer: Arc<dyn Renderer>) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::new(config.crawler.rate_limit_per_sec));
        let fetcher = HttpFetcher::from_config(&config, limiter)?;
        Self::with_fetcher(config, fetcher, renderer)
    }

    /// Creates a coordinator around an existing fetcher
    pub fn with_fetcher(
        config: Config,
        fetcher: HttpFetcher,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self> {
        let robots = RobotsPolicy::new(
            &config.crawler.base_url,
            config.user_agent.crawler_name.clone(),
        )?;
        let checkpoint = CheckpointStore::new(config.output.checkpoint_path());

        Ok(Self {
            config,
            fetcher,
            renderer,
            robots,
            checkpoint,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn robots(&self) -> &RobotsPolicy {
        &self.robots
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    /// Creates the output directory, loads robots.txt and the checkpoint
    pub async fn init(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.config.output.output_dir)?;
        self.robots.load(&self.fetcher).await;
        self.checkpoint.load()?;
        Ok(())
    }

    /// Runs a complete crawl: discover, enrich, collect, write aggregates
    pub async fn run(&mut self) -> Result<CrawlReport> {
        self.init().await?;

        let discovered = self.discover_auctions().await?;
        tracing::info!("Discovered {} auctions", discovered.len());

        let mut auctions = Vec::with_capacity(discovered.len());
        for auction in &discovered {
            auctions.push(self.enrich_auction(auction).await);
        }
        write_json(&self.config.output.output_dir.join("auctions.json"), &auctions)?;

        let mut report = CrawlReport {
            auctions: auctions.len(),
            ..CrawlReport::default()
        };
        let mut all_lots: Vec<LotRecord> = Vec::new();

        for auction in &auctions {
            match self.collect_lots(auction).await {
                Ok(lots) => {
                    tracing::info!("Auction {}: {} lots", auction.auction_id, lots.len());
                    all_lots.extend(lots.into_vec());
                }
                Err(e) => {
                    tracing::error!("Failed to collect lots for {}: {}", auction.auction_id, e);
                    report.failed_auctions += 1;
                }
            }
        }

        write_json(&self.config.output.output_dir.join("lots.json"), &all_lots)?;
        report.lots = all_lots.len();
        tracing::info!("Total lots collected: {}", report.lots);

        Ok(report)
    }

    fn respects_robots(&self, url: &str) -> bool {
        let allowed = self.robots.can_fetch(url);
        if !allowed {
            tracing::warn!("Blocked by robots.txt: {}", url);
        }
        allowed
    }

    fn timeout(&self) -> Duration {
        self.config.crawler.timeout()
    }

    fn network_capture(&self, limit: usize) -> NetworkCapture {
        NetworkCapture::new(limit, self.config.output.network_log_path())
    }

    /// Opens a tab on `url` and waits for it to settle
    async fn open_page(&self, url: &str) -> Result<Box<dyn RenderContext>> {
        let mut ctx = self.renderer.new_context().await?;
        self.fetcher.limiter().wait().await;

        if let Err(e) = ctx.navigate(url, self.timeout()).await {
            close_context(ctx).await;
            return Err(e.into());
        }
        if let Err(e) = ctx.wait_for_idle(self.timeout()).await {
            close_context(ctx).await;
            return Err(e.into());
        }
        Ok(ctx)
    }

    // Discover

    /// Finds auctions on the site root, truncated to `max_auctions`
    pub async fn discover_auctions(&self) -> Result<Vec<AuctionListing>> {
        let base_url = self.config.crawler.base_url.clone();
        if !self.respects_robots(&base_url) {
            return Ok(Vec::new());
        }

        let mut last_error = None;
        for strategy in FetchStrategy::ORDER {
            let html = match strategy {
                FetchStrategy::Rendered => self.render_listing(&base_url).await,
                FetchStrategy::PlainHttp => self.fetcher.get_text(&base_url).await.map(|r| r.body),
            };
            match html {
                Ok(html) => {
                    let mut auctions = parse_auction_cards(&html, &base_url);
                    if let Some(max) = self.config.crawler.max_auctions {
                        auctions.truncate(max);
                    }
                    tracing::debug!("Discovery via {} found {} auctions", strategy, auctions.len());
                    return Ok(auctions);
                }
                Err(e) => {
                    tracing::warn!("Discovery via {} failed: {}", strategy, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CrawlError::Render("no fetch strategy".to_string())))
    }

    async fn render_listing(&self, url: &str) -> Result<String> {
        let mut ctx = self.open_page(url).await?;
        let result = self.expand_listing(ctx.as_mut()).await;
        close_context(ctx).await;
        result
    }

    /// Clicks "load more" until it disappears or stops producing cards
    ///
    /// A failing click or wait ends the expansion; whatever has rendered so
    /// far is still returned.
    async fn expand_listing(&self, ctx: &mut dyn RenderContext) -> Result<String> {
        let _ = ctx.wait_for(DETAIL_LINKS_PRESENT, DETAIL_LINKS_WAIT).await;

        for click in 1..=self.config.crawler.load_more_clicks {
            match self.load_more(ctx).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::info!("Load-more click {} failed: {}", click, e);
                    break;
                }
            }
        }

        let mut capture = self.network_capture(0);
        ctx.drain_responses(&mut capture).await?;
        Ok(ctx.get_html().await?)
    }

    /// One "load more" click; true when it revealed new detail links
    async fn load_more(&self, ctx: &mut dyn RenderContext) -> Result<bool> {
        let before = count_detail_links(&ctx.get_html().await?);

        self.fetcher.limiter().wait().await;
        if !ctx.click(PageControl::LoadMore).await? {
            return Ok(false);
        }
        ctx.wait_for_idle(self.timeout()).await?;

        let more_links = format!(
            "Array.from(document.querySelectorAll('a'))\
             .filter(a => (a.innerText || '').toLowerCase().includes('detalhes'))\
             .length > {before}"
        );
        ctx.wait_for(&more_links, LOAD_MORE_WAIT).await?;

        let after = count_detail_links(&ctx.get_html().await?);
        Ok(after > before)
    }

    // Enrich

    /// Fills absent auction fields from its detail page
    ///
    /// Failures are logged and leave the auction unchanged.
    pub async fn enrich_auction(&self, auction: &AuctionListing) -> AuctionListing {
        if !self.respects_robots(&auction.url) {
            return auction.clone();
        }

        for strategy in FetchStrategy::ORDER {
            let html = match strategy {
                FetchStrategy::Rendered => self.render_detail(auction).await,
                FetchStrategy::PlainHttp => {
                    self.fetcher.get_text(&auction.url).await.map(|r| r.body)
                }
            };
            match html {
                Ok(html) => return parse_auction_details(&html, auction),
                Err(e) => tracing::info!(
                    "Enrichment of {} via {} failed: {}",
                    auction.auction_id,
                    strategy,
                    e
                ),
            }
        }

        auction.clone()
    }

    async fn render_detail(&self, auction: &AuctionListing) -> Result<String> {
        let mut ctx = self.open_page(&auction.url).await?;
        let mut capture = self
            .network_capture(0)
            .with_endpoint_log(self.config.output.endpoint_log_path(&auction.auction_id));

        let result = match ctx.drain_responses(&mut capture).await {
            Ok(()) => ctx.get_html().await.map_err(CrawlError::from),
            Err(e) => Err(e.into()),
        };
        close_context(ctx).await;
        result
    }

    // Collect lots

    /// Collects every lot of `auction`, merged with lots from earlier runs
    pub async fn collect_lots(&mut self, auction: &AuctionListing) -> Result<LotSet> {
        if !self.respects_robots(&auction.url) {
            return Ok(LotSet::new());
        }

        let log = LotLog::new(self.config.output.lot_log_path(&auction.auction_id));
        let mut lots = log.load();
        if !lots.is_empty() {
            tracing::info!(
                "Resuming {} with {} previously collected lots",
                auction.auction_id,
                lots.len()
            );
        }

        let mut last_error = None;
        for strategy in FetchStrategy::ORDER {
            let result = match strategy {
                FetchStrategy::Rendered => self.collect_rendered(auction, &log, &mut lots).await,
                FetchStrategy::PlainHttp => self.collect_plain(auction, &log, &mut lots).await,
            };
            match result {
                Ok(()) => return Ok(lots),
                Err(e) => {
                    tracing::warn!(
                        "Lot collection for {} via {} failed: {}",
                        auction.auction_id,
                        strategy,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CrawlError::Render("no fetch strategy".to_string())))
    }

    async fn collect_rendered(
        &mut self,
        auction: &AuctionListing,
        log: &LotLog,
        lots: &mut LotSet,
    ) -> Result<()> {
        let mut ctx = self.open_page(&auction.url).await?;
        let result = self.collect_in_page(ctx.as_mut(), auction, log, lots).await;
        close_context(ctx).await;
        result
    }

    async fn collect_in_page(
        &mut self,
        ctx: &mut dyn RenderContext,
        auction: &AuctionListing,
        log: &LotLog,
        lots: &mut LotSet,
    ) -> Result<()> {
        let mut capture = self
            .network_capture(self.config.crawler.json_capture_limit)
            .with_endpoint_log(self.config.output.endpoint_log_path(&auction.auction_id));
        ctx.drain_responses(&mut capture).await?;

        let result = match self.collect_from_api(&capture, auction, log, lots).await? {
            ApiOutcome::Collected => Ok(()),
            ApiOutcome::NoEndpoint | ApiOutcome::AuthRequired => {
                self.collect_from_html(ctx, &mut capture, auction, log, lots)
                    .await
            }
        };

        // Traffic fired since the last drain still goes to the audit log
        if let Err(e) = ctx.drain_responses(&mut capture).await {
            tracing::debug!("Final network drain for {} failed: {}", auction.auction_id, e);
        }
        result
    }

    /// Paginates the best JSON endpoint seen while rendering
    async fn collect_from_api(
        &mut self,
        capture: &NetworkCapture,
        auction: &AuctionListing,
        log: &LotLog,
        lots: &mut LotSet,
    ) -> Result<ApiOutcome> {
        let auction_id = auction.auction_id.as_str();
        let Some((best, first_page)) = select_best_endpoint(capture.captured(), auction_id) else {
            tracing::debug!("No lot endpoint among {} JSON responses", capture.len());
            return Ok(ApiOutcome::NoEndpoint);
        };
        tracing::info!(
            "Using JSON endpoint {} {} for {} ({} lots on page 1)",
            best.request.method,
            best.request.url,
            auction_id,
            first_page.len()
        );

        if !self.checkpoint.is_page_done(auction_id, 1) {
            log.append(1, &first_page, LotSource::Api)?;
            self.checkpoint.complete_page(auction_id, 1)?;
        }
        lots.extend(first_page);

        let total = get_total_pages(&best.payload);
        let limit = page_limit(self.config.crawler.max_pages, self.config.crawler.dry_run);
        let target = target_pages(total, limit, self.config.crawler.page_ceiling);
        let template = best.request.clone();

        for page in 2..=target {
            if self.checkpoint.is_page_done(auction_id, page) {
                continue;
            }
            let Some(request) = page_request(&template, page) else {
                tracing::debug!("Endpoint {} has no page parameter", template.url);
                break;
            };
            if !self.respects_robots(&request.url) {
                break;
            }

            let response = match self.fetcher.send(&request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::info!("API pagination error auction={} page={} ({})", auction_id, page, e);
                    break;
                }
            };
            if matches!(response.status, 401 | 403) {
                tracing::info!(
                    "API requires authentication for {} (status {}), falling back to HTML",
                    auction_id,
                    response.status
                );
                return Ok(ApiOutcome::AuthRequired);
            }
            if !response.is_success() {
                tracing::info!(
                    "API page fetch failed auction={} page={} status={}",
                    auction_id,
                    page,
                    response.status
                );
                break;
            }
            let Ok(payload) = serde_json::from_str::<Value>(&response.body) else {
                tracing::info!("API page {} for {} is not JSON", page, auction_id);
                break;
            };

            let page_lots = extract_lots_from_json(&payload, auction_id);
            if page_lots.is_empty() && total.is_none() {
                tracing::debug!("Empty page {} ends pagination for {}", page, auction_id);
                break;
            }

            log.append(page, &page_lots, LotSource::Api)?;
            lots.extend(page_lots);
            self.checkpoint.complete_page(auction_id, page)?;
        }

        Ok(ApiOutcome::Collected)
    }

    /// Extracts lots from the rendered page, clicking through pagination
    async fn collect_from_html(
        &mut self,
        ctx: &mut dyn RenderContext,
        capture: &mut NetworkCapture,
        auction: &AuctionListing,
        log: &LotLog,
        lots: &mut LotSet,
    ) -> Result<()> {
        let auction_id = auction.auction_id.as_str();

        if !self.checkpoint.is_page_done(auction_id, 1) {
            let page_lots = current_page_lots(ctx, auction_id).await?;
            log.append(1, &page_lots, LotSource::Html)?;
            lots.extend(page_lots);
            self.checkpoint.complete_page(auction_id, 1)?;
        }

        let limit = page_limit(self.config.crawler.max_pages, self.config.crawler.dry_run)
            .unwrap_or(self.config.crawler.page_ceiling);
        let mut current = 1;

        while current < limit {
            let next = current + 1;
            if self.checkpoint.is_page_done(auction_id, next) {
                current = next;
                continue;
            }

            let before_url = ctx.get_url().await?;
            let before_first = current_page_lots(ctx, auction_id)
                .await
                .ok()
                .and_then(|page_lots| page_lots.into_iter().next())
                .map(|lot| lot.lot_id);

            if !self.advance(ctx, next).await {
                break;
            }
            ctx.wait_for_idle(self.timeout()).await?;
            ctx.drain_responses(capture).await?;

            if ctx.get_url().await? == before_url {
                if let Some(previous) = before_first {
                    let gone = format!(
                        "!(document.body ? document.body.innerText : '').includes({})",
                        Value::from(previous)
                    );
                    if !ctx.wait_for(&gone, STALE_CONTENT_WAIT).await.unwrap_or(false) {
                        tracing::debug!("Page {} of {} may still show stale lots", next, auction_id);
                    }
                }
            }

            let page_lots = current_page_lots(ctx, auction_id).await?;
            log.append(next, &page_lots, LotSource::Html)?;
            lots.extend(page_lots);
            self.checkpoint.complete_page(auction_id, next)?;
            current = next;
        }

        Ok(())
    }

    /// Clicks the control for page `next`; false when none is actionable
    async fn advance(&self, ctx: &mut dyn RenderContext, next: u32) -> bool {
        for control in [PageControl::PageNumber(next), PageControl::NextPage] {
            self.fetcher.limiter().wait().await;
            match ctx.click(control).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => tracing::debug!("Click on {:?} failed: {}", control, e),
            }
        }
        false
    }

    /// One static fetch of the auction page; page 1 only
    async fn collect_plain(
        &mut self,
        auction: &AuctionListing,
        log: &LotLog,
        lots: &mut LotSet,
    ) -> Result<()> {
        let auction_id = auction.auction_id.as_str();
        if self.checkpoint.is_page_done(auction_id, 1) {
            return Ok(());
        }

        let response = self.fetcher.get_text(&auction.url).await?;
        let page_lots = extract_lots_from_html(&response.body, auction_id, &auction.url);
        log.append(1, &page_lots, LotSource::Html)?;
        lots.extend(page_lots);
        self.checkpoint.complete_page(auction_id, 1)?;
        Ok(())
    }
}

async fn current_page_lots(ctx: &mut dyn RenderContext, auction_id: &str) -> Result<Vec<LotRecord>> {
    let html = ctx.get_html().await?;
    let url = ctx.get_url().await?;
    Ok(extract_lots_from_html(&html, auction_id, &url))
}

async fn close_context(ctx: Box<dyn RenderContext>) {
    if let Err(e) = ctx.close().await {
        tracing::debug!("Failed to close browser tab: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_order() {
        assert_eq!(
            FetchStrategy::ORDER,
            [FetchStrategy::Rendered, FetchStrategy::PlainHttp]
        );
        assert_eq!(FetchStrategy::PlainHttp.to_string(), "plain-http");
    }

    #[test]
    fn test_report_default() {
        let report = CrawlReport::default();
        assert_eq!(report.auctions + report.lots + report.failed_auctions, 0);
    }
}
