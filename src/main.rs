//! Theme tracker client CLI.
//!
//! ```text
//! theme-tracker fetch /api/themes --param period=1mo     retrying request
//! theme-tracker poll /api/nikkei225 --every-ms 5000      cached polling
//! theme-tracker stream --url ws://localhost:8000/ws      realtime channel
//! theme-tracker key themes page=1 period=1mo             cache key preview
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;

use theme_tracker_client::cache::{build_key, spawn_sweeper, TtlCache};
use theme_tracker_client::config::{load_layered, validate_config, ClientConfig, ConfigError};
use theme_tracker_client::http::cached::resource_ttl;
use theme_tracker_client::http::{ApiClient, CachedFetcher};
use theme_tracker_client::observability::{logging, metrics};
use theme_tracker_client::realtime::{ChannelEvent, ChannelOptions, RealtimeChannel};
use theme_tracker_client::Shutdown;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "theme-tracker")]
#[command(about = "Resilient client for the theme tracker market-data API", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request an endpoint with retries and print the JSON response
    Fetch {
        endpoint: String,
        /// Query parameter as name=value (repeatable)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
        #[arg(long)]
        retries: Option<u32>,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Fetch an endpoint repeatedly through the response cache
    Poll {
        endpoint: String,
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
        #[arg(long, default_value_t = 5000)]
        every_ms: u64,
        /// Stop after this many fetches
        #[arg(long)]
        times: Option<u32>,
        /// Cache TTL for this endpoint (defaults to the resource's TTL)
        #[arg(long)]
        ttl_ms: Option<u64>,
    },
    /// Open the realtime channel and print events until Ctrl-C
    Stream {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Print the cache key for a resource and parameters
    Key {
        base: String,
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
}

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();

    let mut config = load_layered(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability)?;

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    match cli.command {
        Commands::Fetch {
            endpoint,
            params,
            retries,
            timeout_ms,
        } => fetch(&config, &endpoint, &params, retries, timeout_ms).await,
        Commands::Poll {
            endpoint,
            params,
            every_ms,
            times,
            ttl_ms,
        } => poll(&config, &endpoint, &params, every_ms, times, ttl_ms).await,
        Commands::Stream { url, max_retries } => stream(&config, url, max_retries).await,
        Commands::Key { base, params } => {
            println!("{}", build_key(&base, params));
            Ok(())
        }
    }
}

async fn fetch(
    config: &ClientConfig,
    endpoint: &str,
    params: &[(String, String)],
    retries: Option<u32>,
    timeout_ms: Option<u64>,
) -> CliResult {
    let client = ApiClient::from_config(config)?;
    let mut options = client.options();
    if let Some(retries) = retries {
        options = options.retries(retries);
    }
    if let Some(ms) = timeout_ms {
        options = options.timeout(Duration::from_millis(ms));
    }

    let url = client.build_url(endpoint, query(params))?;
    let body: Value = client.request(url.as_str(), options).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn poll(
    config: &ClientConfig,
    endpoint: &str,
    params: &[(String, String)],
    every_ms: u64,
    times: Option<u32>,
    ttl_ms: Option<u64>,
) -> CliResult {
    let shutdown = Shutdown::new();
    let cache = TtlCache::from_config(&config.cache);
    let sweeper = spawn_sweeper(cache.clone(), config.cache.cleanup_interval(), shutdown.subscribe());
    let fetcher = CachedFetcher::new(ApiClient::from_config(config)?, cache);

    let mut stop = shutdown.subscribe();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move { ctrl_c.trigger_on_ctrl_c().await });

    // The whole path keys the cache so `/api/stock/7203` and `/api/stock/6758` stay apart.
    let resource = endpoint.trim_matches('/');
    let ttl = ttl_ms
        .map(Duration::from_millis)
        .or_else(|| resource_ttl::for_path(endpoint));
    tracing::debug!(resource, ttl = ?ttl, "Polling");
    let mut ticker = tokio::time::interval(Duration::from_millis(every_ms.max(1)));
    let mut fetched = 0u32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match fetcher.get::<Value, _, _, _>(resource, endpoint, query(params), ttl).await {
                    Ok(body) => println!("{}", serde_json::to_string(&body)?),
                    Err(e) => tracing::error!(error = %e, kind = e.kind(), "Poll failed"),
                }
                fetched += 1;
                tracing::debug!(fetched, cache_size = fetcher.cache().size(), "Poll tick");
                if times.is_some_and(|limit| fetched >= limit) {
                    break;
                }
            }
            _ = stop.recv() => break,
        }
    }

    shutdown.trigger();
    sweeper.await?;
    Ok(())
}

async fn stream(config: &ClientConfig, url: Option<String>, max_retries: Option<u32>) -> CliResult {
    let Some(target) = url.or_else(|| config.channel.target()) else {
        return Err("no channel URL configured (use --url or [channel].url)".into());
    };

    let mut options = ChannelOptions::from_config(&config.channel);
    if let Some(max_retries) = max_retries {
        options = options.max_retries(max_retries);
    }

    let channel = RealtimeChannel::new(Some(target), options);
    let mut events = channel.subscribe();
    channel.connect();

    let shutdown = Shutdown::new();
    let mut stop = shutdown.subscribe();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move { ctrl_c.trigger_on_ctrl_c().await });

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ChannelEvent::Status(status)) => eprintln!("status: {status}"),
                Ok(ChannelEvent::Message(message)) => match message.as_json() {
                    Some(value) => println!("{value}"),
                    None => println!("{}", message.as_raw().unwrap_or_default()),
                },
                Ok(ChannelEvent::ReconnectScheduled { attempt, delay }) => {
                    eprintln!("reconnecting in {}ms (attempt {attempt})", delay.as_millis());
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event printer lagging");
                }
                Err(RecvError::Closed) => break,
            },
            _ = stop.recv() => {
                channel.close();
                break;
            }
        }
    }

    Ok(())
}

fn query(params: &[(String, String)]) -> impl Iterator<Item = (&str, Option<&str>)> + '_ {
    params.iter().map(|(k, v)| (k.as_str(), Some(v.as_str())))
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}
