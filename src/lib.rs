//! # UniswapV2 Indexer
//!
//! Keeps a live token graph of every UniswapV2 pair of a factory and answers best-path
//! queries over it.
//!
//! ## Overview
//!
//! - **Resolution**: pair addresses, tokens, reserves and symbols are resolved cache-aside
//!   (in-process memo, shared key-value cache, then the chain).
//! - **Ingestion**: the [`listener::Listener`] resolves all pairs at startup through a
//!   bounded [`workers_pool::WorkersPool`] and then turns Swap/Mint/Burn/Sync/PairCreated
//!   logs into graph events.
//! - **Pipeline**: events flow through an [`events::EventQueue`] with bounded
//!   per-subscriber buffers; producers block when a consumer falls behind.
//! - **Routing**: the [`indexer::Indexer`] applies events to the [`graph::Graph`], rebuilds
//!   the path set on every block and serves [`graph::Graph::best_path`] with exact
//!   constant-product math.
//!
//! ## Architecture
//!
//! ```text
//! chain ──► resolver ──► listener ──► EventQueue ──► indexer ──► graph ──► best_path
//!              │                                        │
//!              └──────────── StateCache (memory | redis) ┘
//! ```

// Routing
/// Constant-product swap math over arbitrary-precision integers
pub mod math;
/// Token graph, path enumeration and best-path queries
pub mod graph;

// Pipeline
/// Graph events and the broadcast event queue
pub mod events;
/// Bounded worker pool with retry-on-rate-limit
pub mod workers_pool;
/// Cooperative cancellation signal
pub mod shutdown;

// State
/// Key-value store trait and in-memory backend
pub mod cache;
/// Redis key-value backend
pub mod redis_manager;
/// Typed cache accessors and key layout
pub mod providers;
/// Last consumed block
pub mod block_tracker;

// Chain
/// Contract bindings
pub mod contracts;
/// Chain data source trait and ethers implementation
pub mod chain;
/// Cache-aside resolvers for factories, pairs and tokens
pub mod resolver;
/// Raw log decoding
pub mod log_decoder;

// Orchestration
/// Startup discovery and log ingestion
pub mod listener;
/// Event consumer driving the graph
pub mod indexer;
/// Configuration
pub mod settings;

pub use graph::{BestPath, Graph, GraphConfig, GraphError, Path, PathSet};
pub use indexer::Indexer;
pub use listener::Listener;
pub use settings::Settings;
