//! Chromium-based renderer using chromiumoxide.

use super::{ObservedResponse, PageControl, RenderContext, Renderer, ResponseObserver};
use crate::crawler::ApiRequest;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventRequestWillBeSent, EventResponseReceived, GetRequestPostDataParams,
    GetResponseBodyParams, Headers, RequestId,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Overrides the browser binary lookup
pub const CHROMIUM_PATH_ENV: &str = "LEILAO_CHROMIUM_PATH";

/// How long the network must stay silent before a page counts as idle
const NETWORK_QUIET: Duration = Duration::from_millis(500);

const POLL_INTERVAL: Duration = Duration::from_millis(150);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    ["google-chrome", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
}

impl ChromiumRenderer {
    /// Launches Chromium identified by `user_agent`
    pub async fn new(headless: bool, user_agent: &str) -> Result<Self> {
        let chrome_path = find_chromium()
            .with_context(|| format!("Chromium not found; set {CHROMIUM_PATH_ENV}"))?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={user_agent}"));
        builder = if headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self { browser })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        let activity = Arc::new(Activity::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .context("failed to listen for requests")?;
        let responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .context("failed to listen for responses")?;

        let requests = requests.map(|event| NetworkEvent::from_request(&event));
        let responses = responses.map(|event| NetworkEvent::from_response(&event));
        let forward_activity = Arc::clone(&activity);
        tokio::spawn(async move {
            let mut events = futures::stream::select(requests, responses);
            while let Some(event) = events.next().await {
                forward_activity.touch();
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        Ok(Box::new(ChromiumContext {
            page,
            events: rx,
            requests: HashMap::new(),
            activity,
        }))
    }
}

enum NetworkEvent {
    Request { id: String, request: ApiRequest },
    Response(ResponseMeta),
}

/// Response metadata; the body is fetched later over CDP
#[derive(Debug, Clone, PartialEq)]
struct ResponseMeta {
    id: String,
    url: String,
    status: u16,
    content_type: String,
}

impl NetworkEvent {
    fn from_request(event: &EventRequestWillBeSent) -> Self {
        NetworkEvent::Request {
            id: event.request_id.inner().clone(),
            request: ApiRequest {
                method: event.request.method.clone(),
                url: event.request.url.clone(),
                headers: header_pairs(&event.request.headers),
                body: None,
            },
        }
    }

    fn from_response(event: &EventResponseReceived) -> Self {
        let response = &event.response;
        let content_type = header_pairs(&response.headers)
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value)
            .unwrap_or_else(|| response.mime_type.clone());
        NetworkEvent::Response(ResponseMeta {
            id: event.request_id.inner().clone(),
            url: response.url.clone(),
            status: u16::try_from(response.status).unwrap_or(0),
            content_type,
        })
    }
}

/// Pairs every JSON response with the request that produced it
///
/// All requests in `events` are indexed before any response is resolved, so
/// a response queued ahead of its request still finds it. Unknown ids fall
/// back to a GET of the response URL.
fn pair_responses(
    requests: &mut HashMap<String, ApiRequest>,
    events: Vec<NetworkEvent>,
) -> Vec<(ApiRequest, ResponseMeta)> {
    let mut responses = Vec::new();
    for event in events {
        match event {
            NetworkEvent::Request { id, request } => {
                requests.insert(id, request);
            }
            NetworkEvent::Response(meta) => {
                if meta.content_type.to_ascii_lowercase().contains("json") {
                    responses.push(meta);
                }
            }
        }
    }

    responses
        .into_iter()
        .map(|meta| {
            let request = requests
                .get(&meta.id)
                .cloned()
                .unwrap_or_else(|| ApiRequest::get(meta.url.clone()));
            (request, meta)
        })
        .collect()
}

/// Timestamp of the most recent network event
struct Activity {
    origin: Instant,
    last_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let now = self.origin.elapsed().as_millis() as u64;
        self.last_ms.store(now, Ordering::Relaxed);
    }

    fn quiet_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_ms.load(Ordering::Relaxed));
        self.origin.elapsed().saturating_sub(last)
    }
}

/// A single Chromium tab with its network event feed.
pub struct ChromiumContext {
    page: Page,
    events: mpsc::UnboundedReceiver<NetworkEvent>,
    /// Requests seen so far, by CDP request id
    requests: HashMap<String, ApiRequest>,
    activity: Arc<Activity>,
}

impl ChromiumContext {
    async fn eval_bool(&self, script: &str) -> bool {
        match self.page.evaluate(script).await {
            Ok(result) => result.into_value::<bool>().unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn response_body(&self, request_id: &RequestId) -> Option<String> {
        let response = self
            .page
            .execute(GetResponseBodyParams::new(request_id.clone()))
            .await
            .ok()?;
        if response.result.base64_encoded {
            return None;
        }
        Some(response.result.body.clone())
    }

    async fn post_data(&self, request_id: &RequestId) -> Option<String> {
        self.page
            .execute(GetRequestPostDataParams::new(request_id.clone()))
            .await
            .ok()
            .map(|response| response.result.post_data.clone())
    }
}

fn header_pairs(headers: &Headers) -> Vec<(String, String)> {
    headers
        .inner()
        .as_object()
        .map(|object| {
            object
                .iter()
                .map(|(name, value)| {
                    let value = value
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| value.to_string());
                    (name.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn control_script(control: PageControl) -> String {
    let (selector, predicate) = match control {
        PageControl::LoadMore => ("button", r"/carregar|mais/i.test(t)".to_string()),
        PageControl::PageNumber(n) => ("a, button", format!("t === '{n}'")),
        PageControl::NextPage => ("a", r"/próx|next|>+/i.test(t)".to_string()),
    };
    format!(
        r#"(() => {{
            const norm = s => (s || '').replace(/\s+/g, ' ').trim();
            const el = Array.from(document.querySelectorAll('{selector}'))
                .filter(e => e.offsetParent !== null && !e.disabled)
                .find(e => {{ const t = norm(e.innerText); return {predicate}; }});
            if (!el) return false;
            el.scrollIntoView({{ block: 'center' }});
            el.click();
            return true;
        }})()"#
    )
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {
                let _ = tokio::time::timeout(timeout, self.page.wait_for_navigation()).await;
                Ok(())
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {}ms", timeout.as_millis()),
        }
    }

    async fn wait_for_idle(&self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let loaded = self.eval_bool("document.readyState === 'complete'").await;
            if loaded && self.activity.quiet_for() >= NETWORK_QUIET {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for(&self, predicate: &str, timeout: Duration) -> Result<bool> {
        let script = format!("Boolean({predicate})");
        let deadline = Instant::now() + timeout;
        loop {
            if self.eval_bool(&script).await {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&mut self, control: PageControl) -> Result<bool> {
        let result = self
            .page
            .evaluate(control_script(control))
            .await
            .context("click script failed")?;
        Ok(result.into_value::<bool>().unwrap_or(false))
    }

    async fn get_html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))
    }

    async fn get_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn drain_responses(&mut self, observer: &mut dyn ResponseObserver) -> Result<()> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }

        for (mut request, meta) in pair_responses(&mut self.requests, events) {
            let request_id = RequestId::new(meta.id);
            if !request.is_get() {
                request.body = self.post_data(&request_id).await;
            }
            let body = self.response_body(&request_id).await;

            observer.on_response(ObservedResponse {
                request,
                status: meta.status,
                content_type: meta.content_type,
                body,
            });
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumContext { page, .. } = *self;
        let _ = page.close().await;
        Ok(())
    }
}
