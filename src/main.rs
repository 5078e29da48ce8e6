//! NewsBhai digest CLI
//!
//! Builds digests on demand, answers questions, runs cadence deliveries
//! against a preferences file and lists the configured sources.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use newsbhai_digest::collaborators::{JsonFilePreferenceStore, StdoutChannel};
use newsbhai_digest::localization::verify_complete;
use newsbhai_digest::metrics;
use newsbhai_digest::schemas::{DigestRequest, Frequency, Language, NewsItem, Topic, UpdateKind};
use newsbhai_digest::service::{run_request, NewsService, ServiceOptions};
use newsbhai_digest::{Config, DigestSynthesizer, FetchOptions, NewsFetcher};

/// NewsBhai - casual spoken news digests
#[derive(Parser, Debug)]
#[command(name = "newsbhai")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetches news per topic and turns it into a short localized digest")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, default_value = "false", global = true)]
    json_logs: bool,

    /// Dump Prometheus metrics to stderr before exiting
    #[arg(long, default_value = "false", global = true)]
    print_metrics: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch and print a digest
    Digest {
        /// Comma-separated topics (politics, technology, sports, ...)
        #[arg(short, long, value_delimiter = ',', default_value = "general")]
        topics: Vec<String>,

        /// hindi, english or hinglish
        #[arg(short = 'L', long, default_value = "english")]
        language: String,

        /// Maximum number of items to fetch
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        /// Char budget for the digest text
        #[arg(long)]
        max_length: Option<usize>,

        /// Print items and digest as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Answer a free-text question
    Search {
        /// The question, e.g. "what happened in cricket today"
        #[arg(short, long)]
        query: String,

        #[arg(short, long, value_delimiter = ',', default_value = "general")]
        topics: Vec<String>,

        #[arg(short = 'L', long, default_value = "english")]
        language: String,

        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        #[arg(long)]
        max_length: Option<usize>,
    },

    /// Deliver digests to users from the preferences file
    Deliver {
        /// Cadence cohort to deliver to (daily, twice_daily, weekly)
        #[arg(short, long, conflicts_with = "user")]
        frequency: Option<String>,

        /// Single user to deliver to
        #[arg(short, long)]
        user: Option<i64>,

        /// Update kind for a single user (morning, evening, weekly, on_demand)
        #[arg(short, long, default_value = "on_demand")]
        kind: String,

        /// Pause between users, e.g. "500ms", "2s"
        #[arg(long)]
        delay: Option<String>,
    },

    /// Show configured topic sources and upstream status
    Sources,
}

/// Sets up structured logging with tracing
fn setup_logging(log_level: &str, json_output: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // Digest text goes to stdout, so logs stay on stderr
    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

/// Resolves on SIGTERM/SIGINT
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, stopping"),
        _ = terminate => info!("Received SIGTERM, stopping"),
    }
}

fn parse_topics(keys: &[String]) -> Vec<Topic> {
    keys.iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(Topic::from_key_or_general)
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs);

    let session_id = uuid::Uuid::new_v4();
    info!(version = env!("CARGO_PKG_VERSION"), session_id = %session_id, "Starting NewsBhai");

    verify_complete().context("localization table check failed")?;

    let config = Config::load().context("failed to load configuration")?;
    let topic_sources = config.topic_sources()?;
    topic_sources.validate()?;

    info!(
        social_api = config.has_social_api(),
        summarizer = config.summarizer_url.is_some(),
        max_concurrent = config.max_concurrent_requests,
        topics = topic_sources.configured_topics().len(),
        "Configuration loaded"
    );

    let fetcher = Arc::new(NewsFetcher::from_config(&config, topic_sources)?);
    let synthesizer = Arc::new(DigestSynthesizer::from_config(&config)?);
    let fetch_options = FetchOptions::new().auto_fetch(config.auto_fetch_enabled);

    match cli.command {
        Commands::Digest {
            topics,
            language,
            limit,
            max_length,
            json,
        } => {
            let mut request = DigestRequest::new(parse_topics(&topics), Language::from_key_or_default(&language));
            request.max_length = max_length.or(config.digest_max_chars);

            let (items, text) = run_request(&fetcher, &synthesizer, &request, limit, &fetch_options).await;
            if json {
                print_json(&request, &items, &text)?;
            } else {
                println!("{}", text);
            }
        }

        Commands::Search {
            query,
            topics,
            language,
            limit,
            max_length,
        } => {
            let mut request =
                DigestRequest::new(parse_topics(&topics), Language::from_key_or_default(&language)).query(query);
            request.max_length = max_length.or(config.digest_max_chars);

            let (items, text) = run_request(&fetcher, &synthesizer, &request, limit, &fetch_options).await;
            for item in &items {
                info!(
                    title = %item.title,
                    source = %item.source,
                    score = item.relevance_score.unwrap_or_default(),
                    "Matched item"
                );
            }
            println!("{}", text);
        }

        Commands::Deliver {
            frequency,
            user,
            kind,
            delay,
        } => {
            let mut options = ServiceOptions::from(&config);
            if let Some(delay) = delay {
                options.delivery_delay =
                    humantime::parse_duration(&delay).with_context(|| format!("invalid --delay {:?}", delay))?;
            }
            deliver(&config, fetcher, synthesizer, options, frequency, user, &kind).await?;
        }

        Commands::Sources => show_sources(&config, &fetcher),
    }

    if cli.print_metrics {
        eprintln!("{}", metrics::render());
    }

    Ok(())
}

fn print_json(request: &DigestRequest, items: &[NewsItem], text: &str) -> Result<()> {
    let out = serde_json::json!({
        "request": request,
        "items": items,
        "digest": text,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn deliver(
    config: &Config,
    fetcher: Arc<NewsFetcher>,
    synthesizer: Arc<DigestSynthesizer>,
    options: ServiceOptions,
    frequency: Option<String>,
    user: Option<i64>,
    kind: &str,
) -> Result<()> {
    let store = JsonFilePreferenceStore::load(&config.preferences_file).await?;
    let service = NewsService::new(fetcher, synthesizer, Arc::new(store), Arc::new(StdoutChannel)).options(options);

    match (frequency, user) {
        (Some(frequency), _) => {
            let frequency = Frequency::from_key(&frequency)
                .with_context(|| format!("unknown frequency {:?}", frequency))?;

            tokio::select! {
                report = service.deliver_to_frequency(frequency) => {
                    let report = report?;
                    info!(sent = report.sent, skipped = report.skipped, failed = report.failed, "Delivery complete");
                }
                _ = shutdown_signal() => {
                    warn!("Delivery burst interrupted, remaining users were not sent");
                }
            }
        }
        (None, Some(user_id)) => {
            let kind = UpdateKind::from_key(kind).with_context(|| format!("unknown update kind {:?}", kind))?;
            let report = service.deliver_digest(user_id, kind).await?;
            info!(user_id = user_id, status = ?report.status, items = report.items, "Delivery complete");
        }
        (None, None) => anyhow::bail!("pass --frequency or --user"),
    }

    Ok(())
}

fn show_sources(config: &Config, fetcher: &NewsFetcher) {
    let sources = fetcher.topic_sources();

    println!("\nNewsBhai sources");
    println!("================\n");
    println!(
        "Social API:  {}",
        if fetcher.has_social() { config.social_api_base_url.as_str() } else { "disabled (no bearer token)" }
    );
    println!(
        "Summarizer:  {}",
        config.summarizer_url.as_deref().unwrap_or("extractive (no endpoint)")
    );
    println!(
        "Timeouts:    request {}s, connect {}s",
        config.request_timeout_secs, config.connect_timeout_secs
    );

    for topic in Topic::ALL {
        if topic == Topic::CurrentAffairs {
            continue;
        }
        let topic_sources = sources.sources_for(topic);
        println!("\n{}:", topic);
        println!("  handles: {}", topic_sources.handles.join(", "));
        for feed in &topic_sources.feeds {
            println!("  feed:    {}", feed);
        }
    }

    println!("\n{}:", Topic::CurrentAffairs);
    for page in sources.current_affairs_pages() {
        println!("  page:    {}", page);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_digest() {
        let cli = Cli::try_parse_from(["newsbhai", "digest", "-t", "sports,tech", "-L", "hindi", "--max-length", "500"]).unwrap();
        match cli.command {
            Commands::Digest {
                topics, max_length, ..
            } => {
                assert_eq!(parse_topics(&topics), vec![Topic::Sports, Topic::General]);
                assert_eq!(max_length, Some(500));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_frequency_with_user() {
        assert!(Cli::try_parse_from(["newsbhai", "deliver", "--frequency", "daily", "--user", "1"]).is_err());
    }
}
