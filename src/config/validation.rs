use crate::config::types::{Config, CrawlerConfig, RetryConfig, UserAgentConfig};
use crate::crawler::MIN_RATE_PER_SEC;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_retry_config(&config.retry)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if !config.rate_limit_per_sec.is_finite() {
        return Err(ConfigError::Validation(format!(
            "rate_limit must be a finite number, got {}",
            config.rate_limit_per_sec
        )));
    }

    let rate = config.rate_limit_per_sec;
    if rate > 0.0 && rate < MIN_RATE_PER_SEC {
        return Err(ConfigError::Validation(format!(
            "rate_limit must be <= 0 (disabled) or >= {}, got {}",
            MIN_RATE_PER_SEC, rate
        )));
    }

    if !(config.timeout_secs.is_finite() && config.timeout_secs > 0.0) {
        return Err(ConfigError::Validation(format!(
            "timeout must be > 0 seconds, got {}",
            config.timeout_secs
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    if config.json_capture_limit == 0 {
        return Err(ConfigError::Validation(
            "json_capture_limit must be >= 1".to_string(),
        ));
    }

    if config.page_ceiling == 0 {
        return Err(ConfigError::Validation(
            "page_ceiling must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters, '-' and '_', got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_version cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if !(0.0..=1.0).contains(&config.jitter) {
        return Err(ConfigError::Validation(format!(
            "jitter must be between 0 and 1, got {}",
            config.jitter
        )));
    }

    if config.max_delay_ms < config.base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "max_delay_ms ({}) must be >= base_delay_ms ({})",
            config.max_delay_ms, config.base_delay_ms
        )));
    }

    Ok(())
}
