//! Thin wrapper over the `robotstxt` matcher

use robotstxt::DefaultMatcher;

/// A robots.txt body ready for rule evaluation
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    content: String,
}

impl ParsedRobots {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks `url` (absolute, or a path) against the group for `agent`
    ///
    /// An empty body allows everything; lines the matcher does not
    /// understand are ignored by it.
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, agent, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_disallow_all() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /");
        assert!(!robots.is_allowed("https://leilao.example/", "detran-leilao-crawler"));
        assert!(!robots.is_allowed("/lotes", "detran-leilao-crawler"));
    }

    #[test]
    fn test_parse_disallow_specific() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /ssc/");
        assert!(robots.is_allowed("https://leilao.example/leilao/1", "bot"));
        assert!(!robots.is_allowed("https://leilao.example/ssc/login/login", "bot"));
    }

    #[test]
    fn test_parse_allow_overrides_disallow() {
        let content = "User-agent: *\nDisallow: /api\nAllow: /api/public";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed("/api/lotes", "bot"));
        assert!(robots.is_allowed("/api/public/lotes", "bot"));
    }

    #[test]
    fn test_agent_specific_group() {
        let content =
            "User-agent: detran-leilao-crawler\nDisallow: /\n\nUser-agent: *\nAllow: /";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed("/page", "detran-leilao-crawler"));
        assert!(robots.is_allowed("/page", "other-bot"));
    }

    #[test]
    fn test_garbage_and_empty_bodies_allow() {
        assert!(ParsedRobots::from_content("not a robots file {{{").is_allowed("/x", "bot"));
        assert!(ParsedRobots::from_content("").is_allowed("/x", "bot"));
    }
}
