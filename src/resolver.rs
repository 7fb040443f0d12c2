//! # Cache-Aside Resolvers
//!
//! Resolve factory, pair and token facts with as few chain round trips as possible.
//!
//! ## Overview
//!
//! Every lookup follows the same protocol:
//!
//! 1. in-process memo on the resolver (one-time initialisation per key)
//! 2. shared cache ([`StateCache`])
//! 3. the chain ([`ChainSource`]), then write back to the cache
//!
//! The cache is an optimisation only. A failing read is logged and treated as a miss; a
//! failing write is logged and dropped. Chain failures are returned with the entity being
//! resolved attached, and keep their rate-limit classification so the worker pool can
//! retry them.
//!
//! Reserves are memoised like identity facts, which makes them a snapshot of the first
//! read. [`PairResolver::fetch_reserves`] bypasses memo and cache for a fresh value and
//! becomes the snapshot when none was taken yet.

use dashmap::DashMap;
use ethers::types::Address;
use log::{debug, warn};
use num_bigint::BigUint;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::chain::{ChainError, ChainSource};
use crate::providers::StateCache;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("factory {factory:?} has no pair for {token0:?}-{token1:?}")]
    PairNotFound {
        factory: Address,
        token0: Address,
        token1: Address,
    },
    #[error("{what} returned the zero address")]
    ZeroAddress { what: String },
}

impl ResolveError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ResolveError::Chain(e) if e.is_rate_limited())
    }
}

/// Resolves pair addresses of one UniswapV2 factory.
pub struct FactoryResolver {
    address: Address,
    chain: Arc<dyn ChainSource>,
    cache: StateCache,
    by_index: DashMap<u64, Address>,
    by_tokens: DashMap<(Address, Address), Address>,
}

impl FactoryResolver {
    pub fn new(address: Address, chain: Arc<dyn ChainSource>, cache: StateCache) -> Self {
        Self {
            address,
            chain,
            cache,
            by_index: DashMap::new(),
            by_tokens: DashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Always read from the chain: the count only grows.
    pub async fn pool_count(&self) -> Result<u64, ResolveError> {
        Ok(self.chain.pool_count(self.address).await?)
    }

    pub async fn pool_by_index(&self, index: u64) -> Result<Address, ResolveError> {
        if let Some(pair) = self.by_index.get(&index) {
            return Ok(*pair);
        }

        match self.cache.pair_by_index(self.address, index).await {
            Ok(Some(pair)) => {
                self.by_index.insert(index, pair);
                return Ok(pair);
            }
            Ok(None) => {}
            Err(e) => warn!("⚠️ Cache read failed for pair #{} of {:?}: {:#}", index, self.address, e),
        }

        let pair = self.chain.pool_at_index(self.address, index).await?;
        if pair.is_zero() {
            return Err(ResolveError::ZeroAddress {
                what: format!("pair #{} of factory {:?}", index, self.address),
            });
        }

        if let Err(e) = self.cache.set_pair_by_index(self.address, index, pair).await {
            warn!("⚠️ Cache write failed for pair #{} of {:?}: {:#}", index, self.address, e);
        }
        self.by_index.insert(index, pair);
        debug!("Resolved pair #{} of {:?}: {:?}", index, self.address, pair);
        Ok(pair)
    }

    pub async fn pool_by_tokens(&self, token0: Address, token1: Address) -> Result<Address, ResolveError> {
        if let Some(pair) = self.by_tokens.get(&(token0, token1)) {
            return Ok(*pair);
        }

        match self.cache.pair_by_tokens(self.address, token0, token1).await {
            Ok(Some(pair)) => {
                self.by_tokens.insert((token0, token1), pair);
                return Ok(pair);
            }
            Ok(None) => {}
            Err(e) => warn!("⚠️ Cache read failed for pair {:?}-{:?}: {:#}", token0, token1, e),
        }

        let pair = self.chain.pool_by_tokens(self.address, token0, token1).await?;
        if pair.is_zero() {
            return Err(ResolveError::PairNotFound {
                factory: self.address,
                token0,
                token1,
            });
        }

        if let Err(e) = self.cache.set_pair_by_tokens(self.address, token0, token1, pair).await {
            warn!("⚠️ Cache write failed for pair {:?}-{:?}: {:#}", token0, token1, e);
        }
        self.by_tokens.insert((token0, token1), pair);
        Ok(pair)
    }
}

/// Lazily resolved view of one pair.
pub struct PairResolver {
    address: Address,
    chain: Arc<dyn ChainSource>,
    cache: StateCache,
    tokens: OnceCell<(Address, Address)>,
    reserves: OnceCell<(BigUint, BigUint)>,
}

impl PairResolver {
    pub fn new(address: Address, chain: Arc<dyn ChainSource>, cache: StateCache) -> Self {
        Self {
            address,
            chain,
            cache,
            tokens: OnceCell::new(),
            reserves: OnceCell::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// `(token0, token1)` in the pair's own order.
    pub async fn tokens(&self) -> Result<(Address, Address), ResolveError> {
        self.tokens
            .get_or_try_init(|| self.resolve_tokens())
            .await
            .copied()
    }

    pub async fn token0(&self) -> Result<Address, ResolveError> {
        Ok(self.tokens().await?.0)
    }

    pub async fn token1(&self) -> Result<Address, ResolveError> {
        Ok(self.tokens().await?.1)
    }

    /// Tokens if they were already resolved in this process.
    pub fn cached_tokens(&self) -> Option<(Address, Address)> {
        self.tokens.get().copied()
    }

    pub async fn reserves(&self) -> Result<(BigUint, BigUint), ResolveError> {
        self.reserves
            .get_or_try_init(|| self.resolve_reserves())
            .await
            .cloned()
    }

    /// Current reserves straight from the chain. The cache is refreshed; the memo only
    /// takes the value if it is still empty.
    pub async fn fetch_reserves(&self) -> Result<(BigUint, BigUint), ResolveError> {
        let (reserve0, reserve1) = self.chain.reserves(self.address).await?;
        self.store_reserves(&reserve0, &reserve1).await;
        self.seed_reserves(reserve0.clone(), reserve1.clone());
        Ok((reserve0, reserve1))
    }

    /// Use known reserves as the snapshot. Returns false if one was already taken.
    pub fn seed_reserves(&self, reserve0: BigUint, reserve1: BigUint) -> bool {
        self.reserves.set((reserve0, reserve1)).is_ok()
    }

    /// Write reserves observed elsewhere (a `Sync` log) to the shared cache.
    pub async fn store_reserves(&self, reserve0: &BigUint, reserve1: &BigUint) {
        if let Err(e) = self.cache.set_pair_reserves(self.address, reserve0, reserve1).await {
            warn!("⚠️ Cache write failed for reserves of {:?}: {:#}", self.address, e);
        }
    }

    async fn resolve_tokens(&self) -> Result<(Address, Address), ResolveError> {
        match self.cache.pair_tokens(self.address).await {
            Ok(Some(tokens)) => return Ok(tokens),
            Ok(None) => {}
            Err(e) => warn!("⚠️ Cache read failed for tokens of {:?}: {:#}", self.address, e),
        }

        let token0 = self.chain.token0(self.address).await?;
        let token1 = self.chain.token1(self.address).await?;
        if token0.is_zero() || token1.is_zero() {
            return Err(ResolveError::ZeroAddress {
                what: format!("tokens of pair {:?}", self.address),
            });
        }

        if let Err(e) = self.cache.set_pair_tokens(self.address, token0, token1).await {
            warn!("⚠️ Cache write failed for tokens of {:?}: {:#}", self.address, e);
        }
        Ok((token0, token1))
    }

    async fn resolve_reserves(&self) -> Result<(BigUint, BigUint), ResolveError> {
        match self.cache.pair_reserves(self.address).await {
            Ok(Some(reserves)) => return Ok(reserves),
            Ok(None) => {}
            Err(e) => warn!("⚠️ Cache read failed for reserves of {:?}: {:#}", self.address, e),
        }
        self.fetch_reserves().await
    }
}

/// Lazily resolved ERC20 metadata.
pub struct TokenResolver {
    address: Address,
    chain: Arc<dyn ChainSource>,
    cache: StateCache,
    symbol: OnceCell<String>,
}

impl TokenResolver {
    pub fn new(address: Address, chain: Arc<dyn ChainSource>, cache: StateCache) -> Self {
        Self {
            address,
            chain,
            cache,
            symbol: OnceCell::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn symbol(&self) -> Result<String, ResolveError> {
        self.symbol
            .get_or_try_init(|| self.resolve_symbol())
            .await
            .cloned()
    }

    async fn resolve_symbol(&self) -> Result<String, ResolveError> {
        match self.cache.symbol(self.address).await {
            Ok(Some(symbol)) => return Ok(symbol),
            Ok(None) => {}
            Err(e) => warn!("⚠️ Cache read failed for symbol of {:?}: {:#}", self.address, e),
        }

        let symbol = self.chain.symbol(self.address).await?;
        if let Err(e) = self.cache.set_symbol(self.address, &symbol).await {
            warn!("⚠️ Cache write failed for symbol of {:?}: {:#}", self.address, e);
        }
        Ok(symbol)
    }
}
