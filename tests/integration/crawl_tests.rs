//! Integration tests for complete crawl workflows
//!
//! The site is served by wiremock; browser tabs are replaced by a scripted
//! renderer that serves fixed HTML pages and replays captured JSON traffic.

use async_trait::async_trait;
use leilao_crawler::config::Config;
use leilao_crawler::crawler::{ApiRequest, Coordinator, HttpFetcher, RateLimiter, RetryPolicy};
use leilao_crawler::model::{AuctionListing, LotRecord, LotSet, LotSource};
use leilao_crawler::render::{
    NoopRenderer, ObservedResponse, PageControl, RenderContext, Renderer, ResponseObserver,
};
use leilao_crawler::state::{CheckpointStore, LotLog};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One scripted browser page: HTML per pagination step plus JSON traffic
#[derive(Clone, Default)]
struct ScriptedPage {
    html_pages: Vec<String>,
    /// Traffic observed while the page loads
    responses: Vec<ObservedResponse>,
    /// Traffic fired when a click reveals step `i`
    step_responses: HashMap<usize, Vec<ObservedResponse>>,
    /// Step whose load-more click fails with an error
    broken_step: Option<usize>,
}

#[derive(Default)]
struct ScriptedRenderer {
    pages: HashMap<String, ScriptedPage>,
    load_more_clicks: Arc<AtomicUsize>,
}

impl ScriptedRenderer {
    fn with_page(mut self, url: &str, page: ScriptedPage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn new_context(&self) -> anyhow::Result<Box<dyn RenderContext>> {
        Ok(Box::new(ScriptedContext {
            pages: self.pages.clone(),
            url: String::new(),
            current: None,
            index: 0,
            pending: Vec::new(),
            load_more_clicks: Arc::clone(&self.load_more_clicks),
        }))
    }
}

struct ScriptedContext {
    pages: HashMap<String, ScriptedPage>,
    url: String,
    current: Option<ScriptedPage>,
    /// Zero-based pagination step currently displayed
    index: usize,
    pending: Vec<ObservedResponse>,
    load_more_clicks: Arc<AtomicUsize>,
}

impl ScriptedContext {
    fn page(&self) -> anyhow::Result<&ScriptedPage> {
        self.current
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no page loaded"))
    }
}

#[async_trait]
impl RenderContext for ScriptedContext {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> anyhow::Result<()> {
        let page = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("navigation failed: {url}"))?;
        self.url = url.to_string();
        self.pending = page.responses.clone();
        self.current = Some(page);
        self.index = 0;
        Ok(())
    }

    async fn wait_for_idle(&self, _timeout: Duration) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn wait_for(&self, _predicate: &str, _timeout: Duration) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn click(&mut self, control: PageControl) -> anyhow::Result<bool> {
        let steps = self.page()?.html_pages.len();
        let target = match control {
            PageControl::PageNumber(n) => n as usize - 1,
            PageControl::NextPage => self.index + 1,
            PageControl::LoadMore => {
                self.load_more_clicks.fetch_add(1, Ordering::SeqCst);
                self.index + 1
            }
        };
        if target >= steps {
            return Ok(false);
        }
        if self.page()?.broken_step == Some(target) {
            anyhow::bail!("element detached while clicking");
        }
        self.index = target;
        let fired = self.page()?.step_responses.get(&target).cloned();
        self.pending.extend(fired.unwrap_or_default());
        Ok(true)
    }

    async fn get_html(&self) -> anyhow::Result<String> {
        Ok(self
            .page()?
            .html_pages
            .get(self.index)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_url(&self) -> anyhow::Result<String> {
        Ok(self.url.clone())
    }

    async fn drain_responses(&mut self, observer: &mut dyn ResponseObserver) -> anyhow::Result<()> {
        for response in self.pending.drain(..) {
            observer.on_response(response);
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}

fn test_config(server: &MockServer, output: &TempDir) -> Config {
    let mut config = Config::default();
    config.crawler.base_url = format!("{}/", server.uri());
    config.crawler.rate_limit_per_sec = 0.0;
    config.output.output_dir = output.path().to_path_buf();
    config
}

fn coordinator(config: Config, renderer: Arc<dyn Renderer>) -> Coordinator {
    let client = leilao_crawler::crawler::build_http_client(&config).unwrap();
    let retry = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
        jitter: 0.0,
    };
    let fetcher = HttpFetcher::new(client, Arc::new(RateLimiter::unlimited()), retry);
    Coordinator::with_fetcher(config, fetcher, renderer).unwrap()
}

fn lot_card(id: &str, body: &str) -> String {
    format!(
        r#"<div class="card listaLotes" id="{id}">
             <div class="card-body"><b>Lote {id} - CONSERVADO</b>{body}</div>
           </div>"#
    )
}

fn html_page(cards: &[String]) -> String {
    format!("<html><body>{}</body></html>", cards.concat())
}

fn api_payload(ids: &[u32], total_pages: Option<u32>) -> Value {
    let items: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "descricao": format!("FIAT UNO {id}"), "lanceInicial": 1000 + id}))
        .collect();
    match total_pages {
        Some(total) => json!({"items": items, "totalPages": total}),
        None => json!({"items": items}),
    }
}

fn observed(url: &str, payload: &Value) -> ObservedResponse {
    ObservedResponse {
        request: ApiRequest::get(url),
        status: 200,
        content_type: "application/json; charset=utf-8".to_string(),
        body: Some(payload.to_string()),
    }
}

fn lot_ids(lots: &LotSet) -> Vec<String> {
    lots.iter().map(|lot| lot.lot_id.clone()).collect()
}

async fn mount_api_page(server: &MockServer, page: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api/lotes"))
        .and(query_param("page", page))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_plain_http_crawl_end_to_end() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /\n"))
        .mount(&server)
        .await;

    let listing = r#"<html><body>
        <div class="leilao"><h3>Leilão nº 45/2025</h3><p>Cidade: Uberlandia</p>
          <a href="/leilao/45">Detalhes</a></div>
        <div class="leilao"><h3>Leilão nº 46/2025</h3>
          <a href="/leilao/46">Detalhes</a></div>
    </body></html>"#;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing)
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let auction_page = html_page(&[
        lot_card("4501", "<p>HONDA/CG 160 FAN 2019</p><p>R$ 2.500,00</p>"),
        lot_card("4502", r#"<p>R$ 900,00</p><a href="/ssc/login/login">Login</a>"#),
    ]);
    Mock::given(method("GET"))
        .and(path("/leilao/45"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(auction_page)
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/leilao/46"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut coordinator = coordinator(test_config(&server, &output), Arc::new(NoopRenderer));
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.auctions, 2);
    assert_eq!(report.lots, 2);
    assert_eq!(report.failed_auctions, 1);

    let auctions: Vec<AuctionListing> =
        serde_json::from_str(&std::fs::read_to_string(output.path().join("auctions.json")).unwrap())
            .unwrap();
    assert_eq!(auctions.len(), 2);
    assert!(auctions[0].url.ends_with("/leilao/45"));

    let lots: Vec<LotRecord> =
        serde_json::from_str(&std::fs::read_to_string(output.path().join("lots.json")).unwrap())
            .unwrap();
    let ids: Vec<_> = lots.iter().map(|l| l.lot_id.as_str()).collect();
    assert_eq!(ids, vec!["4501", "4502"]);
    assert!(lots[1].requires_login);

    let auction_id = &auctions[0].auction_id;
    assert!(coordinator.checkpoint().is_page_done(auction_id, 1));
    assert!(!coordinator.checkpoint().is_page_done(&auctions[1].auction_id, 1));

    let log = std::fs::read_to_string(
        coordinator.config().output.lot_log_path(auction_id),
    )
    .unwrap();
    assert_eq!(log.lines().count(), 2);
    assert!(log.lines().all(|line| line.contains(r#""source":"html""#)));
}

#[tokio::test]
async fn test_robots_disallow_blocks_everything() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let mut coordinator = coordinator(test_config(&server, &output), Arc::new(NoopRenderer));
    let report = coordinator.run().await.unwrap();
    assert_eq!(report.auctions, 0);
    assert_eq!(report.lots, 0);

    let auction = AuctionListing::new("a1", format!("{}/leilao/1", server.uri()));
    let lots = coordinator.collect_lots(&auction).await.unwrap();
    assert!(lots.is_empty());
}

#[tokio::test]
async fn test_api_pagination_stops_on_empty_page_without_total() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    let auction_url = format!("{}/leilao/1", server.uri());
    let api_url = format!("{}/api/lotes?leilao=1&page=1", server.uri());

    mount_api_page(
        &server,
        "2",
        ResponseTemplate::new(200).set_body_json(api_payload(&[3], None)),
    )
    .await;
    mount_api_page(
        &server,
        "3",
        ResponseTemplate::new(200).set_body_json(json!({"items": []})),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/lotes"))
        .and(query_param("page", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(api_payload(&[9], None)))
        .expect(0)
        .mount(&server)
        .await;

    let renderer = ScriptedRenderer::default().with_page(
        &auction_url,
        ScriptedPage {
            html_pages: vec![html_page(&[lot_card("777", "")])],
            responses: vec![
                observed(&format!("{}/api/menu", server.uri()), &json!({"menu": ["a"]})),
                observed(&api_url, &api_payload(&[1, 2], None)),
            ],
            ..ScriptedPage::default()
        },
    );

    let mut coordinator = coordinator(test_config(&server, &output), Arc::new(renderer));
    coordinator.init().await.unwrap();
    let auction = AuctionListing::new("a1", auction_url);
    let lots = coordinator.collect_lots(&auction).await.unwrap();

    assert_eq!(lot_ids(&lots), vec!["1", "2", "3"]);
    assert_eq!(lots.get("3").and_then(|l| l.start_bid), Some(1003.0));

    let checkpoint = coordinator.checkpoint();
    assert!(checkpoint.is_page_done("a1", 1));
    assert!(checkpoint.is_page_done("a1", 2));
    assert!(!checkpoint.is_page_done("a1", 3));

    let log = std::fs::read_to_string(coordinator.config().output.lot_log_path("a1")).unwrap();
    assert!(log.lines().all(|line| line.contains(r#""source":"api""#)));

    let endpoints =
        std::fs::read_to_string(coordinator.config().output.endpoint_log_path("a1")).unwrap();
    assert!(endpoints.contains("/api/lotes"));
}

#[tokio::test]
async fn test_api_pagination_with_total_continues_past_empty_page() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    let auction_url = format!("{}/leilao/2", server.uri());
    let api_url = format!("{}/api/lotes?page=1", server.uri());

    mount_api_page(
        &server,
        "2",
        ResponseTemplate::new(200).set_body_json(json!({"items": [], "totalPages": 3})),
    )
    .await;
    mount_api_page(
        &server,
        "3",
        ResponseTemplate::new(200).set_body_json(api_payload(&[5], Some(3))),
    )
    .await;

    let renderer = ScriptedRenderer::default().with_page(
        &auction_url,
        ScriptedPage {
            html_pages: vec![html_page(&[])],
            responses: vec![observed(&api_url, &api_payload(&[1], Some(3)))],
            ..ScriptedPage::default()
        },
    );

    let mut coordinator = coordinator(test_config(&server, &output), Arc::new(renderer));
    coordinator.init().await.unwrap();
    let auction = AuctionListing::new("a2", auction_url);
    let lots = coordinator.collect_lots(&auction).await.unwrap();

    assert_eq!(lot_ids(&lots), vec!["1", "5"]);
    for page in 1..=3 {
        assert!(coordinator.checkpoint().is_page_done("a2", page));
    }
}

#[tokio::test]
async fn test_max_pages_bounds_api_pagination() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    let auction_url = format!("{}/leilao/3", server.uri());
    let api_url = format!("{}/api/lotes?page=1", server.uri());

    mount_api_page(
        &server,
        "2",
        ResponseTemplate::new(200).set_body_json(api_payload(&[2], Some(10))),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/lotes"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(api_payload(&[3], Some(10))))
        .expect(0)
        .mount(&server)
        .await;

    let renderer = ScriptedRenderer::default().with_page(
        &auction_url,
        ScriptedPage {
            html_pages: vec![html_page(&[])],
            responses: vec![observed(&api_url, &api_payload(&[1], Some(10)))],
            ..ScriptedPage::default()
        },
    );

    let mut config = test_config(&server, &output);
    config.crawler.dry_run = true;
    let mut coordinator = coordinator(config, Arc::new(renderer));
    coordinator.init().await.unwrap();
    let lots = coordinator
        .collect_lots(&AuctionListing::new("a3", auction_url))
        .await
        .unwrap();

    assert_eq!(lot_ids(&lots), vec!["1", "2"]);
}

#[tokio::test]
async fn test_auth_required_falls_back_to_html() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    let auction_url = format!("{}/leilao/4", server.uri());
    let api_url = format!("{}/api/lotes?page=1", server.uri());

    mount_api_page(&server, "2", ResponseTemplate::new(401)).await;

    let renderer = ScriptedRenderer::default().with_page(
        &auction_url,
        ScriptedPage {
            html_pages: vec![
                html_page(&[lot_card("101", "<p>R$ 100,00</p>")]),
                html_page(&[lot_card("103", "<p>R$ 300,00</p>")]),
            ],
            responses: vec![observed(&api_url, &api_payload(&[1, 2], None))],
            ..ScriptedPage::default()
        },
    );

    let mut coordinator = coordinator(test_config(&server, &output), Arc::new(renderer));
    coordinator.init().await.unwrap();
    let lots = coordinator
        .collect_lots(&AuctionListing::new("a4", auction_url))
        .await
        .unwrap();

    // Page 1 came from the API, so only page 2 is read from HTML
    assert_eq!(lot_ids(&lots), vec!["1", "2", "103"]);
    assert!(coordinator.checkpoint().is_page_done("a4", 2));
}

#[tokio::test]
async fn test_html_pagination_dedups_last_write_wins() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    let auction_url = format!("{}/leilao/5", server.uri());

    let renderer = ScriptedRenderer::default().with_page(
        &auction_url,
        ScriptedPage {
            html_pages: vec![
                html_page(&[
                    lot_card("10", "<p>R$ 100,00</p>"),
                    lot_card("11", "<p>R$ 110,00</p>"),
                ]),
                html_page(&[lot_card("10", "<p>R$ 250,00</p>")]),
            ],
            responses: Vec::new(),
            ..ScriptedPage::default()
        },
    );

    let mut coordinator = coordinator(test_config(&server, &output), Arc::new(renderer));
    coordinator.init().await.unwrap();
    let lots = coordinator
        .collect_lots(&AuctionListing::new("a5", auction_url))
        .await
        .unwrap();

    assert_eq!(lot_ids(&lots), vec!["10", "11"]);
    assert_eq!(lots.get("10").and_then(|l| l.start_bid), Some(250.0));
    assert!(coordinator.checkpoint().is_page_done("a5", 2));
    assert!(!coordinator.checkpoint().is_page_done("a5", 3));
}

#[tokio::test]
async fn test_resume_skips_completed_pages() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    let auction_url = format!("{}/leilao/6", server.uri());

    Mock::given(method("GET"))
        .and(path("/leilao/6"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html_page(&[lot_card("2", "")])))
        .expect(0)
        .mount(&server)
        .await;

    let config = test_config(&server, &output);

    // A previous run completed page 1
    let mut store = CheckpointStore::new(config.output.checkpoint_path());
    store.complete_page("a6", 1).unwrap();
    let log = LotLog::new(config.output.lot_log_path("a6"));
    log.append(1, &[LotRecord::new("a6", "1", "Lote 1")], LotSource::Html)
        .unwrap();

    let mut coordinator = coordinator(config, Arc::new(NoopRenderer));
    coordinator.init().await.unwrap();
    let lots = coordinator
        .collect_lots(&AuctionListing::new("a6", auction_url))
        .await
        .unwrap();

    assert_eq!(lot_ids(&lots), vec!["1"]);
    assert_eq!(log.load().len(), 1);
}

#[tokio::test]
async fn test_json_traffic_during_html_pagination_is_logged() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    let auction_url = format!("{}/leilao/7", server.uri());
    let widget_url = format!("{}/api/widget-after-click", server.uri());

    let renderer = ScriptedRenderer::default().with_page(
        &auction_url,
        ScriptedPage {
            html_pages: vec![
                html_page(&[lot_card("1", "")]),
                html_page(&[lot_card("2", "")]),
            ],
            step_responses: HashMap::from([(1, vec![observed(&widget_url, &json!({"ok": true}))])]),
            ..ScriptedPage::default()
        },
    );

    let mut coordinator = coordinator(test_config(&server, &output), Arc::new(renderer));
    coordinator.init().await.unwrap();
    let lots = coordinator
        .collect_lots(&AuctionListing::new("a7", auction_url))
        .await
        .unwrap();
    assert_eq!(lot_ids(&lots), vec!["1", "2"]);

    let network =
        std::fs::read_to_string(coordinator.config().output.network_log_path()).unwrap();
    assert_eq!(network.lines().count(), 1);
    assert!(network.contains("/api/widget-after-click"));
}

fn listing_step(numbers: std::ops::RangeInclusive<u32>) -> String {
    let cards: Vec<String> = numbers
        .map(|n| {
            format!(
                r#"<div class="leilao"><h3>Leilão nº {n}/2025</h3>
                     <a href="/leilao/{n}">Detalhes</a></div>"#
            )
        })
        .collect();
    html_page(&cards)
}

#[tokio::test]
async fn test_rendered_discovery_stops_at_click_budget() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    let mut config = test_config(&server, &output);
    config.crawler.load_more_clicks = 3;

    // Every click reveals one more auction, more steps than the budget allows
    let renderer = ScriptedRenderer::default().with_page(
        &config.crawler.base_url,
        ScriptedPage {
            html_pages: (1..=6).map(|last| listing_step(1..=last)).collect(),
            ..ScriptedPage::default()
        },
    );
    let clicks = Arc::clone(&renderer.load_more_clicks);

    let mut coordinator = coordinator(config, Arc::new(renderer));
    coordinator.init().await.unwrap();
    let auctions = coordinator.discover_auctions().await.unwrap();

    let urls: Vec<_> = auctions.iter().map(|a| a.url.clone()).collect();
    let expected: Vec<_> = (1..=4)
        .map(|n| format!("{}/leilao/{n}", server.uri()))
        .collect();
    assert_eq!(urls, expected);
    assert_eq!(clicks.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_load_more_without_new_cards_ends_expansion() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    let config = test_config(&server, &output);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_step(1..=9)))
        .expect(0)
        .mount(&server)
        .await;

    let renderer = ScriptedRenderer::default().with_page(
        &config.crawler.base_url,
        ScriptedPage {
            html_pages: vec![
                listing_step(1..=2),
                listing_step(1..=2),
                listing_step(1..=5),
            ],
            ..ScriptedPage::default()
        },
    );
    let clicks = Arc::clone(&renderer.load_more_clicks);

    let mut coordinator = coordinator(config, Arc::new(renderer));
    coordinator.init().await.unwrap();
    let auctions = coordinator.discover_auctions().await.unwrap();

    assert_eq!(auctions.len(), 2);
    assert_eq!(clicks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_load_more_error_keeps_expanded_listing() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    let config = test_config(&server, &output);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_step(1..=9)))
        .expect(0)
        .mount(&server)
        .await;

    let renderer = ScriptedRenderer::default().with_page(
        &config.crawler.base_url,
        ScriptedPage {
            html_pages: vec![
                listing_step(1..=2),
                listing_step(1..=3),
                listing_step(1..=4),
            ],
            broken_step: Some(2),
            ..ScriptedPage::default()
        },
    );

    let mut coordinator = coordinator(config, Arc::new(renderer));
    coordinator.init().await.unwrap();
    let auctions = coordinator.discover_auctions().await.unwrap();

    assert_eq!(auctions.len(), 3);
}
