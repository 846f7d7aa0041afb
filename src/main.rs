use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use post_relay::config::{Config, SourceKind};
use post_relay::output::{append_to_archive, render_posts};
use post_relay::pipeline::Pipeline;
use post_relay::sink::{DeliverySink, WebhookSink};
use post_relay::source::{ApiSource, FetchSource, PageSource};
use post_relay::state::{open_store, DedupPolicy};

/// Relay new posts from one account to a chat webhook.
///
/// Every flag falls back to the matching environment variable (also read
/// from `.env`).
#[derive(Parser, Debug)]
#[command(name = "post-relay", version, about)]
struct Cli {
    /// Account handle to watch (without the leading @)
    #[arg(short = 'u', long)]
    username: Option<String>,

    /// Number of recent posts to fetch (1-40)
    #[arg(short = 'n', long)]
    limit: Option<u32>,

    /// Include replies in the fetched posts
    #[arg(long)]
    include_replies: bool,

    /// Webhook URL to deliver new posts to
    #[arg(long)]
    webhook: Option<String>,

    /// Environment variable holding the webhook URL (empty disables)
    #[arg(long)]
    webhook_env: Option<String>,

    /// Dedup policy: seen-set or last-id
    #[arg(long)]
    policy: Option<DedupPolicy>,

    /// Dedup state file
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Source kind: api or page
    #[arg(long)]
    source: Option<SourceKind>,

    /// Profile page URL for the page source; `{account}` is substituted
    #[arg(long)]
    page_url: Option<String>,

    /// Append new posts to this JSON archive file
    #[arg(long)]
    archive_file: Option<PathBuf>,

    /// Pretty-print the post JSON written to stdout
    #[arg(long)]
    pretty: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the environment configuration.
    fn apply(self, config: &mut Config) {
        if let Some(username) = self.username {
            config.account = username;
        }
        if let Some(limit) = self.limit {
            config.fetch_limit = limit;
        }
        if self.include_replies {
            config.include_replies = true;
        }
        if let Some(webhook) = self.webhook {
            config.webhook_url = Some(webhook);
        }
        if let Some(webhook_env) = self.webhook_env {
            config.webhook_env = webhook_env;
        }
        if let Some(policy) = self.policy {
            config.dedup_policy = policy;
        }
        if let Some(state_file) = self.state_file {
            config.state_path = Some(state_file);
        }
        if let Some(source) = self.source {
            config.source_kind = source;
        }
        if let Some(page_url) = self.page_url {
            config.page_url = Some(page_url);
        }
        if let Some(archive_file) = self.archive_file {
            config.archive_path = Some(archive_file);
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;
    let pretty = cli.pretty;

    let mut config = Config::from_env().context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        account = %config.account_handle(),
        source = ?config.source_kind,
        policy = %config.dedup_policy,
        "Configuration loaded"
    );

    let source = build_source(&config)?;

    let sink: Option<Box<dyn DeliverySink>> = match config.resolve_webhook() {
        Some(url) => Some(Box::new(
            WebhookSink::new(&url, config.http_timeout).context("Failed to create webhook sink")?,
        )),
        None => {
            warn!("No webhook configured; new posts will only be printed");
            None
        }
    };

    let mut store = open_store(config.dedup_policy, config.state_file());
    info!(path = %store.path().display(), "Using dedup state file");
    let pipeline = Pipeline::new(config.relay_options(), source, sink);

    let report = pipeline
        .run(store.as_mut())
        .await
        .context("Relay run failed")?;

    let json = render_posts(&report.new_posts, pretty).context("Failed to serialize posts")?;
    println!("{json}");

    if let Some(path) = &config.archive_path {
        if !report.new_posts.is_empty() {
            let total = append_to_archive(path, &report.new_posts)
                .await
                .with_context(|| format!("Failed to write archive: {}", path.display()))?;
            info!(path = %path.display(), total, "Archive updated");
        }
    }

    Ok(())
}

fn build_source(config: &Config) -> Result<Box<dyn FetchSource>> {
    let source: Box<dyn FetchSource> = match config.source_kind {
        SourceKind::Api => Box::new(
            ApiSource::new(
                &config.source_base_url,
                config.http_timeout,
                config.credentials(),
            )
            .context("Failed to create API source")?,
        ),
        SourceKind::Page => {
            let page_url = config
                .page_url
                .as_deref()
                .context("PAGE_URL is required for the page source")?;
            Box::new(
                PageSource::new(
                    page_url,
                    &config.page_container_selector,
                    config.page_feed_order,
                    config.http_timeout,
                )
                .context("Failed to create page source")?,
            )
        }
    };
    Ok(source)
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "info,post_relay=debug",
        (false, _) => "debug,post_relay=trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    // stdout carries the post JSON, so logs go to stderr
    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
