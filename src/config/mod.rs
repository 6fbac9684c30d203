//! Configuration module for the crawler
//!
//! Settings come from an optional TOML file; every key has a default and the
//! command line may override individual values before validation.
//!
//! # Example
//!
//! ```no_run
//! use leilao_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Crawling {}", config.crawler.base_url);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, CrawlerConfig, OutputConfig, RetryConfig, UserAgentConfig};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
