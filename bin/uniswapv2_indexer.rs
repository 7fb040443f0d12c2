//! # UniswapV2 Indexer Service
//!
//! Resolves every pair of a UniswapV2 factory, follows its logs over a websocket and keeps
//! the token graph and its path set current.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin uniswapv2_indexer -- --config Config.toml
//! ```
//!
//! Press Ctrl+C to stop; the path set is written to the cache before exit.

use anyhow::{Context, Result};
use clap::Parser;
use ethers::providers::{Http, Provider, Ws};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinError;
use tokio::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use uniswapv2_indexer::{
    cache::{InMemoryStore, KeyValueStore},
    chain::{ChainSource, EthersChainSource},
    events::EventQueue,
    graph::Graph,
    indexer::Indexer,
    listener::Listener,
    providers::StateCache,
    redis_manager::RedisManager,
    settings::{CacheBackend, Settings},
    shutdown,
};

#[derive(Debug, Parser)]
#[command(name = "uniswapv2_indexer", about = "UniswapV2 pool indexer and best-path router")]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "Config.toml")]
    config: PathBuf,

    /// Startup workers, overrides `[workers] count`
    #[arg(long)]
    workers: Option<usize>,
}

fn init_logging(level: &str) {
    #[cfg(feature = "observability")]
    {
        let level = level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);
        tracing_subscriber::fmt().json().with_max_level(level).init();
    }

    #[cfg(not(feature = "observability"))]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

async fn build_store(settings: &Settings) -> Result<Arc<dyn KeyValueStore>> {
    match settings.cache.backend {
        CacheBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        CacheBackend::Redis => {
            let redis = RedisManager::new(settings.cache.redis_config()).await?;
            redis.health_check().await?;
            Ok(Arc::new(redis))
        }
    }
}

async fn connect(url: &str, retries: usize) -> Result<Provider<Ws>> {
    let strategy = ExponentialBackoff::from_millis(200)
        .max_delay(Duration::from_secs(5))
        .map(jitter)
        .take(retries);

    Retry::spawn(strategy, || async {
        Provider::<Ws>::connect(url).await.map_err(|e| {
            error!("❌ Websocket connection to {} failed: {}", url, e);
            e
        })
    })
    .await
    .with_context(|| format!("Failed to connect to {}", url))
}

/// Contract reads over `[rpc] http_url` when set, otherwise over the websocket.
fn chain_source(settings: &Settings, ws: Arc<Provider<Ws>>) -> Result<Arc<dyn ChainSource>> {
    let qps = settings.rpc.qps_limit.unwrap_or(0);
    match &settings.rpc.http_url {
        Some(url) => {
            let http = Provider::<Http>::try_from(url.as_str())
                .with_context(|| format!("Invalid http_url {}", url))?;
            info!("✅ Contract reads over {}", url);
            Ok(Arc::new(EthersChainSource::new(Arc::new(http)).with_qps_limit(qps)))
        }
        None => Ok(Arc::new(EthersChainSource::new(ws).with_qps_limit(qps))),
    }
}

fn flatten(joined: Result<Result<()>, JoinError>) -> Result<()> {
    joined.context("Task panicked")?
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let mut settings = Settings::from_path(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(workers) = args.workers {
        settings.workers.count = workers;
    }
    init_logging(&settings.log.level);

    info!("🚀 Starting UniswapV2 indexer for factory {:?}", settings.contracts.factory);

    let store = build_store(&settings).await?;
    info!("✅ Cache backend: {}", store.backend());
    let cache = StateCache::new(store);

    let client = Arc::new(connect(&settings.rpc.ws_url, settings.rpc.connect_retries).await?);
    info!("✅ Connected to {}", settings.rpc.ws_url);
    let chain = chain_source(&settings, client.clone())?;

    let (handle, shutdown) = shutdown::channel();
    let queue = Arc::new(EventQueue::with_buffer(settings.indexer.events_buffer));
    let graph = Arc::new(Graph::with_config(settings.graph.to_config()));

    // Subscribe before the listener can produce anything.
    let events = queue.subscribe().await;
    let indexer = Indexer::new(graph, cache.clone()).with_dump_timeout(settings.indexer.dump_timeout());
    let mut indexer_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { indexer.run(events, shutdown).await }
    });

    let listener = Listener::new(
        settings.contracts.factory,
        chain,
        cache,
        queue,
        settings.workers.effective_count(),
    );
    let mut listener_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { listener.run(&client, shutdown).await }
    });

    let mut listener_done = false;
    let mut indexer_done = false;
    let outcome = tokio::select! {
        signal = signal::ctrl_c() => {
            info!("🛑 Shutdown signal received, stopping tasks...");
            signal.context("Failed to listen for Ctrl+C")
        }
        joined = &mut listener_task => {
            listener_done = true;
            flatten(joined).context("Listener stopped")
        }
        joined = &mut indexer_task => {
            indexer_done = true;
            flatten(joined).context("Indexer stopped")
        }
    };

    handle.shutdown();
    if !listener_done {
        if let Err(e) = flatten(listener_task.await) {
            error!("❌ Listener: {:#}", e);
        }
    }
    if !indexer_done {
        if let Err(e) = flatten(indexer_task.await) {
            error!("❌ Indexer: {:#}", e);
        }
    }

    match &outcome {
        Ok(()) => info!("✅ Shutdown complete"),
        Err(e) => error!("❌ {:#}", e),
    }
    outcome
}
