use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for a crawl run
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub retry: RetryConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Site root; discovery starts here and robots.txt is read from its origin
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Global outbound request rate (requests per second, <= 0 disables)
    #[serde(rename = "rate-limit")]
    pub rate_limit_per_sec: f64,

    /// Per-operation timeout in seconds
    #[serde(rename = "timeout")]
    pub timeout_secs: f64,

    /// Run the browser without a visible window
    pub headless: bool,

    /// Collect at most 1-2 pages per auction
    #[serde(rename = "dry-run")]
    pub dry_run: bool,

    #[serde(rename = "max-auctions")]
    pub max_auctions: Option<usize>,

    #[serde(rename = "max-pages")]
    pub max_pages: Option<u32>,

    /// Maximum "load more" clicks during discovery
    #[serde(rename = "load-more-clicks")]
    pub load_more_clicks: u32,

    /// Number of most recent JSON responses kept for endpoint scoring
    #[serde(rename = "json-capture-limit")]
    pub json_capture_limit: usize,

    /// Highest page visited when neither a total nor `max-pages` bounds the run
    #[serde(rename = "page-ceiling")]
    pub page_ceiling: u32,
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://leilao.detran.mg.gov.br/".to_string(),
            rate_limit_per_sec: 0.5,
            timeout_secs: 30.0,
            headless: false,
            dry_run: false,
            max_auctions: None,
            max_pages: None,
            load_more_clicks: 6,
            json_capture_limit: 200,
            page_ceiling: 50,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Product token; also the agent matched against robots.txt groups
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// Free-form note appended to the user agent string
    pub comment: String,
}

impl UserAgentConfig {
    /// Format: `name/version (+comment)`
    pub fn user_agent(&self) -> String {
        if self.comment.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, self.comment
            )
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "detran-leilao-crawler".to_string(),
            crawler_version: "0.1".to_string(),
            comment: "ethical; respects robots.txt".to_string(),
        }
    }
}

/// Backoff parameters for transient failures
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Fraction in [0, 1]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 750,
            max_delay_ms: 8_000,
            jitter: 0.25,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for aggregate outputs, raw logs and the checkpoint
    #[serde(rename = "output-dir")]
    pub output_dir: PathBuf,
}

impl OutputConfig {
    pub fn checkpoint_path(&self) -> PathBuf {
        self.output_dir.join(".checkpoint").join("state.json")
    }

    pub fn network_log_path(&self) -> PathBuf {
        self.output_dir.join("network.jsonl")
    }

    pub fn auction_dir(&self, auction_id: &str) -> PathBuf {
        self.output_dir.join("raw").join(auction_id)
    }

    pub fn lot_log_path(&self, auction_id: &str) -> PathBuf {
        self.auction_dir(auction_id).join("lots.jsonl")
    }

    pub fn endpoint_log_path(&self, auction_id: &str) -> PathBuf {
        self.auction_dir(auction_id).join("api_endpoints.jsonl")
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data"),
        }
    }
}
