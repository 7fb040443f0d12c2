//! # Chain Data Source
//!
//! Read-only view of the UniswapV2 contracts the indexer needs, behind [`ChainSource`] so
//! the resolvers can be driven by any RPC client (or a fixture in tests).
//!
//! ## Overview
//!
//! [`EthersChainSource`] implements it over any ethers [`Middleware`]. Provider errors are
//! split into [`ChainError::RateLimited`] and [`ChainError::Call`] by a pluggable
//! [`RateLimitClassifier`]; the startup worker pool retries the former and aborts on the
//! latter. An optional `governor` quota throttles calls before they reach the provider.

use async_trait::async_trait;
use ethers::prelude::{Address, Middleware, U256};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;
use num_bigint::BigUint;
use std::fmt::Display;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::contracts::{Erc20, IUniswapV2Factory, IUniswapV2Pair};

type DefaultDirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("rate limited while {what}: {message}")]
    RateLimited { what: String, message: String },
    #[error("{what} failed: {message}")]
    Call { what: String, message: String },
}

impl ChainError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ChainError::RateLimited { .. })
    }
}

/// Decides whether a provider error means "back off and try again".
pub trait RateLimitClassifier: Send + Sync {
    fn is_rate_limited(&self, message: &str) -> bool;
}

impl<F> RateLimitClassifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_rate_limited(&self, message: &str) -> bool {
        self(message)
    }
}

/// Case-insensitive substring match against a list of provider overload messages.
#[derive(Debug, Clone)]
pub struct SubstringClassifier {
    needles: Vec<String>,
}

impl SubstringClassifier {
    pub fn new<I, S>(needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            needles: needles.into_iter().map(|n| n.into().to_lowercase()).collect(),
        }
    }
}

impl Default for SubstringClassifier {
    fn default() -> Self {
        Self::new([
            "429",
            "too many requests",
            "rate limit",
            "limit exceeded",
            "exceeded its compute units",
        ])
    }
}

impl RateLimitClassifier for SubstringClassifier {
    fn is_rate_limited(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.needles.iter().any(|needle| message.contains(needle.as_str()))
    }
}

#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Number of pairs the factory has created.
    async fn pool_count(&self, factory: Address) -> Result<u64, ChainError>;

    async fn pool_at_index(&self, factory: Address, index: u64) -> Result<Address, ChainError>;

    /// Zero address when the factory has no pair for the tokens.
    async fn pool_by_tokens(
        &self,
        factory: Address,
        token0: Address,
        token1: Address,
    ) -> Result<Address, ChainError>;

    async fn token0(&self, pool: Address) -> Result<Address, ChainError>;

    async fn token1(&self, pool: Address) -> Result<Address, ChainError>;

    async fn reserves(&self, pool: Address) -> Result<(BigUint, BigUint), ChainError>;

    async fn symbol(&self, token: Address) -> Result<String, ChainError>;

    async fn block_number(&self) -> Result<u64, ChainError>;
}

pub struct EthersChainSource<M> {
    client: Arc<M>,
    classifier: Arc<dyn RateLimitClassifier>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl<M: Middleware + 'static> EthersChainSource<M> {
    pub fn new(client: Arc<M>) -> Self {
        Self {
            client,
            classifier: Arc::new(SubstringClassifier::default()),
            limiter: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn RateLimitClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Cap outgoing calls per second. Zero leaves calls unthrottled.
    pub fn with_qps_limit(mut self, qps: u32) -> Self {
        self.limiter = NonZeroU32::new(qps)
            .map(|qps| Arc::new(RateLimiter::direct(Quota::per_second(qps))));
        self
    }

    pub fn client(&self) -> Arc<M> {
        self.client.clone()
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    fn classify(&self, what: impl Into<String>, err: impl Display) -> ChainError {
        let what = what.into();
        let message = err.to_string();
        if self.classifier.is_rate_limited(&message) {
            debug!("⏳ Rate limited while {}: {}", what, message);
            ChainError::RateLimited { what, message }
        } else {
            ChainError::Call { what, message }
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainSource for EthersChainSource<M> {
    async fn pool_count(&self, factory: Address) -> Result<u64, ChainError> {
        self.throttle().await;
        let count = IUniswapV2Factory::new(factory, self.client.clone())
            .all_pairs_length()
            .call()
            .await
            .map_err(|e| self.classify(format!("reading allPairsLength of {:?}", factory), e))?;

        if count > U256::from(u64::MAX) {
            return Err(ChainError::Call {
                what: format!("reading allPairsLength of {:?}", factory),
                message: format!("pair count {} does not fit in u64", count),
            });
        }
        Ok(count.low_u64())
    }

    async fn pool_at_index(&self, factory: Address, index: u64) -> Result<Address, ChainError> {
        self.throttle().await;
        IUniswapV2Factory::new(factory, self.client.clone())
            .all_pairs(U256::from(index))
            .call()
            .await
            .map_err(|e| self.classify(format!("reading pair #{} of {:?}", index, factory), e))
    }

    async fn pool_by_tokens(
        &self,
        factory: Address,
        token0: Address,
        token1: Address,
    ) -> Result<Address, ChainError> {
        self.throttle().await;
        IUniswapV2Factory::new(factory, self.client.clone())
            .get_pair(token0, token1)
            .call()
            .await
            .map_err(|e| {
                self.classify(format!("reading pair {:?}-{:?} of {:?}", token0, token1, factory), e)
            })
    }

    async fn token0(&self, pool: Address) -> Result<Address, ChainError> {
        self.throttle().await;
        IUniswapV2Pair::new(pool, self.client.clone())
            .token_0()
            .call()
            .await
            .map_err(|e| self.classify(format!("reading token0 of {:?}", pool), e))
    }

    async fn token1(&self, pool: Address) -> Result<Address, ChainError> {
        self.throttle().await;
        IUniswapV2Pair::new(pool, self.client.clone())
            .token_1()
            .call()
            .await
            .map_err(|e| self.classify(format!("reading token1 of {:?}", pool), e))
    }

    async fn reserves(&self, pool: Address) -> Result<(BigUint, BigUint), ChainError> {
        self.throttle().await;
        let (reserve0, reserve1, _) = IUniswapV2Pair::new(pool, self.client.clone())
            .get_reserves()
            .call()
            .await
            .map_err(|e| self.classify(format!("reading reserves of {:?}", pool), e))?;
        Ok((BigUint::from(reserve0), BigUint::from(reserve1)))
    }

    async fn symbol(&self, token: Address) -> Result<String, ChainError> {
        self.throttle().await;
        Erc20::new(token, self.client.clone())
            .symbol()
            .call()
            .await
            .map_err(|e| self.classify(format!("reading symbol of {:?}", token), e))
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.throttle().await;
        self.client
            .get_block_number()
            .await
            .map(|block| block.as_u64())
            .map_err(|e| self.classify("reading block number", e))
    }
}
