use crate::crawler::HttpFetcher;
use crate::robots::ParsedRobots;
use url::Url;

/// Lifecycle of the robots gate
#[derive(Debug, Clone)]
pub enum RobotsState {
    /// `load()` has not run yet; everything is allowed
    NotLoaded,
    Loaded(ParsedRobots),
    /// The file could not be fetched; behaves exactly like allow-all
    LoadFailed,
}

/// Fail-open permission gate built from the site's robots.txt
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    robots_url: String,
    agent: String,
    state: RobotsState,
}

impl RobotsPolicy {
    /// `agent` is the product token matched against `User-agent` groups
    pub fn new(base_url: &str, agent: impl Into<String>) -> crate::Result<Self> {
        let base = Url::parse(base_url)?;
        let robots_url = base.join("/robots.txt")?;
        Ok(Self {
            robots_url: robots_url.to_string(),
            agent: agent.into(),
            state: RobotsState::NotLoaded,
        })
    }

    /// Builds a policy already in the `Loaded` state
    pub fn from_content(base_url: &str, agent: impl Into<String>, content: &str) -> crate::Result<Self> {
        let mut policy = Self::new(base_url, agent)?;
        policy.state = RobotsState::Loaded(ParsedRobots::from_content(content));
        Ok(policy)
    }

    pub fn robots_url(&self) -> &str {
        &self.robots_url
    }

    pub fn state(&self) -> &RobotsState {
        &self.state
    }

    /// Fetches and parses robots.txt once; any failure leaves the gate open
    pub async fn load(&mut self, fetcher: &HttpFetcher) {
        match fetcher.get_text(&self.robots_url).await {
            Ok(response) => {
                tracing::info!("robots.txt loaded from {}", self.robots_url);
                self.state = RobotsState::Loaded(ParsedRobots::from_content(&response.body));
            }
            Err(e) => {
                tracing::warn!("robots.txt unavailable ({}), proceeding fail-open", e);
                self.state = RobotsState::LoadFailed;
            }
        }
    }

    pub fn can_fetch(&self, url: &str) -> bool {
        match &self.state {
            RobotsState::NotLoaded | RobotsState::LoadFailed => true,
            RobotsState::Loaded(robots) => robots.is_allowed(url, &self.agent),
        }
    }
}
