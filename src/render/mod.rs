//! Browser rendering abstraction
//!
//! The crawler drives pages through the `Renderer` / `RenderContext` pair so
//! the orchestration logic never depends on a concrete browser. Headless
//! Chromium is the production engine; `NoopRenderer` makes every render
//! attempt fail so the crawl degrades to plain HTTP.

pub mod chromium;
mod observer;

pub use chromium::{find_chromium, ChromiumRenderer};
pub use observer::{CapturedResponse, NetworkCapture, ObservedResponse, ResponseObserver};

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// An on-page control the crawler can activate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageControl {
    /// A button labelled "carregar" / "mais" on the auction listing
    LoadMore,
    /// A link or button whose whole label is the given page number
    PageNumber(u32),
    /// A link labelled "próx", "next" or a run of `>`
    NextPage,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Opens a new tab. Network traffic is recorded from this point on.
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
}

/// A single browser tab.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigates and waits for the document to load, bounded by `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Waits until the page has loaded and the network has been quiet for
    /// a short while. Returns `false` on timeout.
    async fn wait_for_idle(&self, timeout: Duration) -> Result<bool>;

    /// Polls a JavaScript boolean expression until it holds. Returns
    /// `false` on timeout.
    async fn wait_for(&self, predicate: &str, timeout: Duration) -> Result<bool>;

    /// Clicks the first matching control. Returns `false` when none is
    /// present or it cannot be clicked.
    async fn click(&mut self, control: PageControl) -> Result<bool>;

    async fn get_html(&self) -> Result<String>;

    async fn get_url(&self) -> Result<String>;

    /// Hands every JSON-bearing response seen since the last drain to
    /// `observer`, oldest first.
    async fn drain_responses(&mut self, observer: &mut dyn ResponseObserver) -> Result<()>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// A renderer for hosts without a browser.
///
/// Every context request fails, so each fetch takes the plain-HTTP strategy.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("browser not available, HTTP-only mode"))
    }
}
