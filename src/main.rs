//! Leilao-Crawler main entry point
//!
//! This is the command-line interface for the auction lot harvester.

use clap::{Args, Parser, Subcommand};
use leilao_crawler::config::{load_config_with_hash, validate, Config};
use leilao_crawler::crawler::crawl;
use leilao_crawler::filter::{load_filters_config, FilterEngine};
use leilao_crawler::model::{AuctionListing, LotRecord};
use leilao_crawler::output::{
    collect_images, read_json, write_auctions_csv, write_images_csv, write_json, write_lots_csv,
    SqliteExporter,
};
use leilao_crawler::render::{ChromiumRenderer, NoopRenderer, Renderer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Leilao-Crawler: a polite auction lot harvester
///
/// Discovers auctions, collects their lots (JSON endpoint first, HTML
/// second) while respecting robots.txt and a global rate limit, then
/// filters and exports the results.
#[derive(Parser, Debug)]
#[command(name = "leilao-crawler")]
#[command(version)]
#[command(about = "A polite auction lot harvester", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect auctions and lots
    Crawl(CrawlArgs),
    /// Filter lots using a YAML/JSON criteria file
    Filter(FilterArgs),
    /// Export CSV/JSON and optionally SQLite
    Export(ExportArgs),
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Directory for aggregate outputs, raw logs and the checkpoint
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Optional TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long)]
    headless: bool,

    /// Collect at most 2 pages per auction
    #[arg(long)]
    dry_run: bool,

    #[arg(long, value_name = "N")]
    max_auctions: Option<usize>,

    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Requests per second (<= 0 disables limiting)
    #[arg(long, value_name = "RPS")]
    rate_limit: Option<f64>,

    /// Per-operation timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<f64>,
}

#[derive(Args, Debug)]
struct FilterArgs {
    #[arg(long, value_name = "DIR")]
    input_dir: PathBuf,

    /// Filters file (.yaml/.yml or .json)
    #[arg(long, value_name = "FILE")]
    filters: PathBuf,

    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(long, value_name = "DIR")]
    input_dir: PathBuf,

    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Also write data.sqlite
    #[arg(long)]
    sqlite: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Crawl(args) => handle_crawl(args).await,
        Command::Filter(args) => handle_filter(args),
        Command::Export(args) => handle_export(args),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("leilao_crawler=info,warn"),
            1 => EnvFilter::new("leilao_crawler=debug,info"),
            2 => EnvFilter::new("leilao_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file (if any) and applies command-line overrides
fn build_config(args: &CrawlArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path).map_err(|e| {
                tracing::error!("Failed to load configuration: {}", e);
                e
            })?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    config.output.output_dir = args.output_dir.clone();
    config.crawler.headless |= args.headless;
    config.crawler.dry_run |= args.dry_run;
    if args.max_auctions.is_some() {
        config.crawler.max_auctions = args.max_auctions;
    }
    if args.max_pages.is_some() {
        config.crawler.max_pages = args.max_pages;
    }
    if let Some(rate) = args.rate_limit {
        config.crawler.rate_limit_per_sec = rate;
    }
    if let Some(timeout) = args.timeout {
        config.crawler.timeout_secs = timeout;
    }

    validate(&config)?;
    Ok(config)
}

/// Launches Chromium, or falls back to plain HTTP when it is unavailable
async fn build_renderer(config: &Config) -> Arc<dyn Renderer> {
    match ChromiumRenderer::new(config.crawler.headless, &config.user_agent.user_agent()).await {
        Ok(renderer) => Arc::new(renderer),
        Err(e) => {
            tracing::warn!("Browser unavailable ({:#}), continuing in HTTP-only mode", e);
            Arc::new(NoopRenderer)
        }
    }
}

/// Handles the crawl command
async fn handle_crawl(args: CrawlArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(&args)?;

    tracing::info!(
        "Crawling {} into {} (rate {} req/s, dry run: {})",
        config.crawler.base_url,
        config.output.output_dir.display(),
        config.crawler.rate_limit_per_sec,
        config.crawler.dry_run
    );

    let renderer = build_renderer(&config).await;

    match crawl(config, renderer).await {
        Ok(report) => {
            tracing::info!(
                "Crawl completed: {} auctions, {} lots, {} failed auctions",
                report.auctions,
                report.lots,
                report.failed_auctions
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the filter command: lots.json -> lots.filtered.json
fn handle_filter(args: FilterArgs) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&args.output_dir)?;

    let lots: Vec<LotRecord> = read_json(&args.input_dir.join("lots.json"))?;
    let total = lots.len();

    let engine = FilterEngine::new(load_filters_config(&args.filters)?);
    let kept = engine.filter(lots);

    write_json(&args.output_dir.join("lots.filtered.json"), &kept)?;

    // Keep auction metadata next to the filtered lots
    let auctions = args.input_dir.join("auctions.json");
    if auctions.exists() {
        std::fs::copy(&auctions, args.output_dir.join("auctions.json"))?;
    }

    tracing::info!("Filtered lots: {} -> {}", total, kept.len());
    Ok(())
}

/// Prefers `lots.filtered.json` over `lots.json`
fn lots_input(input_dir: &Path) -> PathBuf {
    let filtered = input_dir.join("lots.filtered.json");
    if filtered.exists() {
        filtered
    } else {
        input_dir.join("lots.json")
    }
}

/// Handles the export command
fn handle_export(args: ExportArgs) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&args.output_dir)?;

    let auctions: Vec<AuctionListing> = read_json(&args.input_dir.join("auctions.json"))?;
    let lots: Vec<LotRecord> = read_json(&lots_input(&args.input_dir))?;
    let images = collect_images(&lots);

    let out = &args.output_dir;
    write_auctions_csv(&out.join("auctions.csv"), &auctions)?;
    write_lots_csv(&out.join("lots.csv"), &lots)?;
    write_images_csv(&out.join("images.csv"), &images)?;

    write_json(&out.join("auctions.json"), &auctions)?;
    write_json(&out.join("lots.json"), &lots)?;
    write_json(&out.join("images.json"), &images)?;

    if args.sqlite {
        let db_path = out.join("data.sqlite");
        let mut exporter = SqliteExporter::open(&db_path)?;
        exporter.upsert(&auctions, &lots, &images)?;
        tracing::info!("SQLite exported: {}", db_path.display());
    }

    tracing::info!(
        "Exported {} auctions, {} lots, {} images to {}",
        auctions.len(),
        lots.len(),
        images.len(),
        out.display()
    );
    Ok(())
}
