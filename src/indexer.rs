//! # Indexer
//!
//! Consumer side of the pipeline. A single loop applies events to the [`Graph`] in
//! arrival order:
//!
//! - `PairCreation` adds (or replaces) the pair's edge
//! - `ReservesUpdate` applies the signed deltas to the edge
//! - `BlockCreation` rebuilds the path set on the blocking pool
//!
//! A delta for an edge the graph never saw means events were lost or reordered; the loop
//! logs it and stops with [`GraphError::MissingEdge`]. Any other graph error is logged and
//! the event dropped. On shutdown every path set entry is written to the cache, bounded by
//! a timeout.

use anyhow::{Context, Result};
use ethers::types::Address;
use log::{debug, error, info, warn};
use num_bigint::BigUint;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::events::{Event, Subscription};
use crate::graph::{BestPath, Graph, GraphError, Path};
use crate::providers::StateCache;
use crate::shutdown::Shutdown;

pub const DEFAULT_DUMP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Indexer {
    graph: Arc<Graph>,
    cache: StateCache,
    dump_timeout: Duration,
}

impl Indexer {
    pub fn new(graph: Arc<Graph>, cache: StateCache) -> Self {
        Self {
            graph,
            cache,
            dump_timeout: DEFAULT_DUMP_TIMEOUT,
        }
    }

    pub fn with_dump_timeout(mut self, dump_timeout: Duration) -> Self {
        self.dump_timeout = dump_timeout;
        self
    }

    pub fn graph(&self) -> Arc<Graph> {
        self.graph.clone()
    }

    pub fn best_path(&self, token_in: Address, token_out: Address, amount_in: &BigUint) -> BestPath {
        self.graph.best_path(token_in, token_out, amount_in)
    }

    /// Paths last dumped for a pair.
    pub async fn stored_paths(&self, token0: Address, token1: Address) -> Result<Vec<Path>> {
        self.cache.paths(token0, token1).await
    }

    /// Consume `events` until shutdown or until every producer is gone, then dump paths.
    ///
    /// Subscribe before starting producers so no event is missed.
    pub async fn run(&self, mut events: Subscription, mut shutdown: Shutdown) -> Result<()> {
        info!("🚀 Indexer started");
        let mut processed: u64 = 0;

        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("🛑 Indexer stopping after {} events", processed);
                    break;
                }
                next = events.recv() => match next {
                    Some(event) => event,
                    None => {
                        info!("Event queue closed after {} events", processed);
                        break;
                    }
                },
            };

            self.process_event(event).await?;
            processed += 1;
        }

        self.dump_paths().await;
        Ok(())
    }

    /// Apply one event to the graph.
    pub async fn process_event(&self, event: Event) -> Result<()> {
        match event {
            Event::PairCreation(pair) => {
                if let Err(e) =
                    self.graph
                        .add_edge(pair.token0, pair.token1, pair.reserve0, pair.reserve1)
                {
                    warn!("⚠️ Dropping pair {:?}: {}", pair.address, e);
                }
            }
            Event::ReservesUpdate(update) => {
                match self.graph.update_reserves(
                    update.token0,
                    update.token1,
                    &update.reserve0_delta,
                    &update.reserve1_delta,
                ) {
                    Ok(()) => {}
                    Err(e @ GraphError::MissingEdge { .. }) => {
                        error!("❌ Reserves update for unknown pair {:?}: {}", update.address, e);
                        return Err(e.into());
                    }
                    Err(e) => warn!("⚠️ Dropping update for pair {:?}: {}", update.address, e),
                }
            }
            Event::BlockCreation(block) => {
                debug!("Block {}: rebuilding paths", block.block);
                let graph = self.graph.clone();
                tokio::task::spawn_blocking(move || graph.index())
                    .await
                    .context("Path indexing task panicked")?;
            }
        }
        Ok(())
    }

    /// Write every path set entry to the cache. Returns how many entries were written.
    pub async fn dump_paths(&self) -> usize {
        let started = Instant::now();
        let paths = self.graph.paths();
        let total = paths.len();

        let dump = async {
            let mut written = 0;
            for (key, entry) in paths.iter() {
                match self.cache.set_paths(key.token0, key.token1, entry).await {
                    Ok(()) => written += 1,
                    Err(e) => warn!(
                        "⚠️ Failed to store paths {:?}-{:?}: {:#}",
                        key.token0, key.token1, e
                    ),
                }
            }
            written
        };

        match tokio::time::timeout(self.dump_timeout, dump).await {
            Ok(written) => {
                info!(
                    "💾 Dumped {}/{} path entries in {:?}",
                    written,
                    total,
                    started.elapsed()
                );
                written
            }
            Err(_) => {
                warn!("⚠️ Path dump timed out after {:?}", self.dump_timeout);
                0
            }
        }
    }
}
