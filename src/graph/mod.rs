//! # Token Graph
//!
//! Live token/pool multigraph with multi-hop route enumeration and best-path queries.
//!
//! ## Overview
//!
//! Tokens are nodes and every pool is one [`Edge`] stored once in an arena. Both adjacency
//! directions hold the arena index, so a reserve update through `(a, b)` is the same
//! update seen through `(b, a)`.
//!
//! - [`Graph::add_edge`] / [`Graph::update_reserves`] mutate under the exclusive lock.
//! - [`Graph::index`] rebuilds the [`PathSet`] from a consistent snapshot with a
//!   breadth-first walk from every node, skipping edges whose reserves are below
//!   `min_liquidity` and, when configured, stopping walks at `max_hops` pools.
//! - [`Graph::best_path`] evaluates every stored route between two tokens with the
//!   closed-form constant-product formula and keeps the largest output. It holds the
//!   shared lock for the whole evaluation so reserves cannot tear between hops.
//!
//! A rebuild replaces the path set atomically; queries keep using the previous set until
//! the new one is published.

pub mod path_set;

pub use path_set::{PairKey, Path, PathSet};

use arc_swap::ArcSwap;
use ethers::types::Address;
use indexmap::IndexSet;
use log::{debug, info};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use crate::math::{self, HopReserves};

/// UniswapV2 locks this much liquidity forever in every pool.
pub const DEFAULT_MIN_LIQUIDITY: u64 = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("no edge between {token0:?} and {token1:?}")]
    MissingEdge { token0: Address, token1: Address },
    #[error("reserve of {token:?} would underflow: {reserve} + ({delta})")]
    ReserveUnderflow {
        token: Address,
        reserve: BigUint,
        delta: BigInt,
    },
    #[error("edge endpoints must differ, got {0:?} twice")]
    SelfLoop(Address),
}

/// Routing parameters of [`Graph::index`].
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Both reserves of an edge must reach this to be routable.
    pub min_liquidity: BigUint,
    /// Longest path in pools; `None` walks until no unvisited neighbour is left.
    pub max_hops: Option<usize>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            min_liquidity: BigUint::from(DEFAULT_MIN_LIQUIDITY),
            max_hops: None,
        }
    }
}

/// Graph representation of one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub token0: Address,
    pub token1: Address,
    pub reserve0: BigUint,
    pub reserve1: BigUint,
}

impl Edge {
    pub fn new(token0: Address, token1: Address, reserve0: BigUint, reserve1: BigUint) -> Self {
        Self {
            token0,
            token1,
            reserve0,
            reserve1,
        }
    }

    /// Reserves oriented for a swap that sells `token_in`.
    pub fn reserves_from(&self, token_in: Address) -> Option<HopReserves> {
        if token_in == self.token0 {
            Some((self.reserve0.clone(), self.reserve1.clone()))
        } else if token_in == self.token1 {
            Some((self.reserve1.clone(), self.reserve0.clone()))
        } else {
            None
        }
    }

    fn is_liquid(&self, min_liquidity: &BigUint) -> bool {
        &self.reserve0 >= min_liquidity && &self.reserve1 >= min_liquidity
    }
}

/// Result of [`Graph::best_path`]. Empty path and zero amount when no route exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BestPath {
    pub path: Path,
    pub amount_out: BigUint,
}

impl BestPath {
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

type EdgeId = usize;

#[derive(Debug, Default)]
struct GraphState {
    nodes: BTreeSet<Address>,
    edges: Vec<Edge>,
    adjacency: BTreeMap<Address, BTreeMap<Address, EdgeId>>,
}

impl GraphState {
    fn edge_id(&self, a: Address, b: Address) -> Option<EdgeId> {
        self.adjacency.get(&a).and_then(|row| row.get(&b)).copied()
    }

    fn edge(&self, a: Address, b: Address) -> Option<&Edge> {
        self.edge_id(a, b).map(|id| &self.edges[id])
    }
}

/// One in-progress breadth-first walk: the visited tokens in order, last one is current.
struct Walk {
    visited: IndexSet<Address>,
}

impl Walk {
    fn start(token: Address) -> Self {
        let mut visited = IndexSet::new();
        visited.insert(token);
        Self { visited }
    }

    fn current(&self) -> Option<Address> {
        self.visited.last().copied()
    }

    fn hops(&self) -> usize {
        self.visited.len().saturating_sub(1)
    }

    fn extend(&self, next: Address) -> Self {
        let mut visited = self.visited.clone();
        visited.insert(next);
        Self { visited }
    }

    fn to_path(&self) -> Path {
        self.visited.iter().copied().collect()
    }
}

pub struct Graph {
    state: RwLock<GraphState>,
    paths: ArcSwap<PathSet>,
    indexing: Mutex<()>,
    config: GraphConfig,
}

impl Graph {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            paths: ArcSwap::from_pointee(PathSet::new()),
            indexing: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Insert or replace the edge between two tokens, adding unseen nodes.
    pub fn add_edge(
        &self,
        token_a: Address,
        token_b: Address,
        reserve_a: BigUint,
        reserve_b: BigUint,
    ) -> Result<(), GraphError> {
        if token_a == token_b {
            return Err(GraphError::SelfLoop(token_a));
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let edge = Edge::new(token_a, token_b, reserve_a, reserve_b);

        match state.edge_id(token_a, token_b) {
            Some(id) => state.edges[id] = edge,
            None => {
                let id = state.edges.len();
                state.edges.push(edge);
                state.nodes.insert(token_a);
                state.nodes.insert(token_b);
                state.adjacency.entry(token_a).or_default().insert(token_b, id);
                state.adjacency.entry(token_b).or_default().insert(token_a, id);
            }
        }
        Ok(())
    }

    /// Add signed deltas to the reserves of an existing edge.
    ///
    /// `delta_a` applies to `token_a`'s side whatever orientation the edge was created in.
    /// Both sides are checked before either is written, so a rejected update leaves the
    /// edge untouched.
    pub fn update_reserves(
        &self,
        token_a: Address,
        token_b: Address,
        delta_a: &BigInt,
        delta_b: &BigInt,
    ) -> Result<(), GraphError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let id = state.edge_id(token_a, token_b).ok_or(GraphError::MissingEdge {
            token0: token_a,
            token1: token_b,
        })?;

        let edge = &mut state.edges[id];
        let (delta0, delta1) = if edge.token0 == token_a {
            (delta_a, delta_b)
        } else {
            (delta_b, delta_a)
        };

        let reserve0 = apply_delta(edge.token0, &edge.reserve0, delta0)?;
        let reserve1 = apply_delta(edge.token1, &edge.reserve1, delta1)?;
        edge.reserve0 = reserve0;
        edge.reserve1 = reserve1;
        Ok(())
    }

    /// Copy of the edge between two tokens, in its stored orientation.
    pub fn edge(&self, token_a: Address, token_b: Address) -> Option<Edge> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.edge(token_a, token_b).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).edges.len()
    }

    pub fn contains_node(&self, token: Address) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .nodes
            .contains(&token)
    }

    /// Currently published path set.
    pub fn paths(&self) -> Arc<PathSet> {
        self.paths.load_full()
    }

    /// Rebuild the path set from the current graph and publish it.
    ///
    /// Expensive on dense graphs. Concurrent calls are serialised.
    pub fn index(&self) -> Arc<PathSet> {
        let _indexing = self.indexing.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();

        let path_set = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            enumerate_paths(&state, &self.config)
        };

        let path_set = Arc::new(path_set);
        self.paths.store(path_set.clone());

        info!(
            "🗺️ [Graph] Indexed {} paths over {} token pairs in {:?}",
            path_set.path_count(),
            path_set.len(),
            started.elapsed()
        );
        path_set
    }

    /// Route from `token_in` to `token_out` with the largest output for `amount_in`.
    pub fn best_path(&self, token_in: Address, token_out: Address, amount_in: &BigUint) -> BestPath {
        if token_in == token_out || amount_in.is_zero() {
            return BestPath::default();
        }

        let candidates = self.paths.load().paths_between(token_in, token_out);
        if candidates.is_empty() {
            debug!("[Graph] No path between {:?} and {:?}", token_in, token_out);
            return BestPath::default();
        }

        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut best = BestPath::default();
        for path in candidates {
            let Some(hops) = path_reserves(&state, &path) else {
                continue;
            };
            let amount_out = math::chain_amount_out(amount_in, &hops);
            if best.is_empty() || amount_out > best.amount_out {
                best = BestPath { path, amount_out };
            }
        }
        best
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_delta(token: Address, reserve: &BigUint, delta: &BigInt) -> Result<BigUint, GraphError> {
    let updated = BigInt::from_biguint(Sign::Plus, reserve.clone()) + delta;
    updated.to_biguint().ok_or_else(|| GraphError::ReserveUnderflow {
        token,
        reserve: reserve.clone(),
        delta: delta.clone(),
    })
}

/// Oriented reserves along `path`, or `None` if a hop has no edge.
fn path_reserves(state: &GraphState, path: &[Address]) -> Option<Vec<HopReserves>> {
    path.windows(2)
        .map(|pair| state.edge(pair[0], pair[1])?.reserves_from(pair[0]))
        .collect()
}

fn enumerate_paths(state: &GraphState, config: &GraphConfig) -> PathSet {
    let mut path_set = PathSet::new();
    let mut frontier = VecDeque::new();

    for &start in &state.nodes {
        frontier.push_back(Walk::start(start));

        while let Some(walk) = frontier.pop_front() {
            if config.max_hops.map_or(false, |max| walk.hops() >= max) {
                continue;
            }
            let Some(current) = walk.current() else {
                continue;
            };
            let Some(neighbours) = state.adjacency.get(&current) else {
                continue;
            };

            for (&next, &id) in neighbours {
                if walk.visited.contains(&next) || !state.edges[id].is_liquid(&config.min_liquidity) {
                    continue;
                }
                let child = walk.extend(next);
                path_set.add_path(child.to_path());
                frontier.push_back(child);
            }
        }
    }

    path_set
}
