//! # Providers
//!
//! Typed accessors for every fact the indexer persists, layered over any
//! [`KeyValueStore`]. Resolvers and orchestrators only talk to [`StateCache`]; which
//! backend sits underneath is decided once, at construction.
//!
//! ## Keys
//!
//! | fact | key | value |
//! |---|---|---|
//! | pair by index | `uniswapV2:factory:<factory>:pair:<index>` | address |
//! | pair by tokens | `uniswapV2:factory:<factory>:pair:<token0>-<token1>` | address |
//! | pair tokens | `uniswapv2-pair:<pair>:tokens` | `{"token0","token1"}` |
//! | pair reserves | `uniswapv2-pair:<pair>:reserves` | `{"reserve0","reserve1"}` decimal strings |
//! | token symbol | `erc20:<token>:symbol` | string |
//! | paths | `pathes:<token0>-<token1>` | `a,b,c;a,d,c` |
//! | block cursor | `current_block` | decimal |
//!
//! The all-zero address never round-trips: it is not written and reads as a miss.

use anyhow::{Context, Result};
use ethers::types::Address;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::cache::KeyValueStore;
use crate::graph::Path;

const PATHS_SEPARATOR: char = ';';
const PATH_ELEMENT_SEPARATOR: char = ',';

/// `0x`-prefixed lowercase hex, the form every key uses.
pub fn address_key(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

pub fn parse_address(raw: &str) -> Result<Address> {
    Address::from_str(raw.trim()).with_context(|| format!("Invalid address {:?}", raw))
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedTokens {
    token0: Address,
    token1: Address,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedReserves {
    reserve0: String,
    reserve1: String,
}

#[derive(Clone)]
pub struct StateCache {
    store: Arc<dyn KeyValueStore>,
}

impl StateCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    // ==================== FACTORY ====================

    pub async fn pair_by_index(&self, factory: Address, index: u64) -> Result<Option<Address>> {
        self.get_address(&pair_by_index_key(factory, index)).await
    }

    pub async fn set_pair_by_index(&self, factory: Address, index: u64, pair: Address) -> Result<()> {
        self.set_address(&pair_by_index_key(factory, index), pair).await
    }

    pub async fn pair_by_tokens(
        &self,
        factory: Address,
        token0: Address,
        token1: Address,
    ) -> Result<Option<Address>> {
        self.get_address(&pair_by_tokens_key(factory, token0, token1)).await
    }

    pub async fn set_pair_by_tokens(
        &self,
        factory: Address,
        token0: Address,
        token1: Address,
        pair: Address,
    ) -> Result<()> {
        self.set_address(&pair_by_tokens_key(factory, token0, token1), pair).await
    }

    // ==================== PAIR ====================

    pub async fn pair_tokens(&self, pair: Address) -> Result<Option<(Address, Address)>> {
        let Some(raw) = self.store.get(&pair_tokens_key(pair)).await? else {
            return Ok(None);
        };
        let cached: CachedTokens =
            serde_json::from_str(&raw).with_context(|| format!("Corrupt tokens entry for {:?}", pair))?;
        if cached.token0.is_zero() || cached.token1.is_zero() {
            return Ok(None);
        }
        Ok(Some((cached.token0, cached.token1)))
    }

    pub async fn set_pair_tokens(&self, pair: Address, token0: Address, token1: Address) -> Result<()> {
        if token0.is_zero() || token1.is_zero() {
            return Ok(());
        }
        let raw = serde_json::to_string(&CachedTokens { token0, token1 })?;
        self.store.set(&pair_tokens_key(pair), &raw).await
    }

    pub async fn pair_reserves(&self, pair: Address) -> Result<Option<(BigUint, BigUint)>> {
        let Some(raw) = self.store.get(&pair_reserves_key(pair)).await? else {
            return Ok(None);
        };
        let cached: CachedReserves = serde_json::from_str(&raw)
            .with_context(|| format!("Corrupt reserves entry for {:?}", pair))?;
        let reserve0 = BigUint::from_str(&cached.reserve0).context("Corrupt reserve0")?;
        let reserve1 = BigUint::from_str(&cached.reserve1).context("Corrupt reserve1")?;
        Ok(Some((reserve0, reserve1)))
    }

    pub async fn set_pair_reserves(&self, pair: Address, reserve0: &BigUint, reserve1: &BigUint) -> Result<()> {
        let raw = serde_json::to_string(&CachedReserves {
            reserve0: reserve0.to_string(),
            reserve1: reserve1.to_string(),
        })?;
        self.store.set(&pair_reserves_key(pair), &raw).await
    }

    // ==================== ERC20 ====================

    pub async fn symbol(&self, token: Address) -> Result<Option<String>> {
        let symbol = self.store.get(&symbol_key(token)).await?;
        Ok(symbol.filter(|s| !s.is_empty()))
    }

    pub async fn set_symbol(&self, token: Address, symbol: &str) -> Result<()> {
        if symbol.is_empty() {
            return Ok(());
        }
        self.store.set(&symbol_key(token), symbol).await
    }

    // ==================== PATHS ====================

    /// Paths dumped for a pair, as stored. Empty when nothing was dumped.
    pub async fn paths(&self, token0: Address, token1: Address) -> Result<Vec<Path>> {
        match self.store.get(&paths_key(token0, token1)).await? {
            Some(raw) => parse_paths(&raw),
            None => Ok(Vec::new()),
        }
    }

    pub async fn set_paths(&self, token0: Address, token1: Address, paths: &[Path]) -> Result<()> {
        self.store
            .set(&paths_key(token0, token1), &format_paths(paths))
            .await
    }

    // ==================== BLOCK ====================

    /// Last stored block, 0 if none.
    pub async fn current_block(&self) -> Result<u64> {
        match self.store.get(CURRENT_BLOCK_KEY).await? {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("Corrupt current block {:?}", raw)),
            None => Ok(0),
        }
    }

    pub async fn set_current_block(&self, block: u64) -> Result<()> {
        self.store.set(CURRENT_BLOCK_KEY, &block.to_string()).await
    }

    async fn get_address(&self, key: &str) -> Result<Option<Address>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        let address = parse_address(&raw)?;
        Ok((!address.is_zero()).then_some(address))
    }

    async fn set_address(&self, key: &str, address: Address) -> Result<()> {
        if address.is_zero() {
            return Ok(());
        }
        self.store.set(key, &address_key(&address)).await
    }
}

const CURRENT_BLOCK_KEY: &str = "current_block";

fn pair_by_index_key(factory: Address, index: u64) -> String {
    format!("uniswapV2:factory:{}:pair:{}", address_key(&factory), index)
}

fn pair_by_tokens_key(factory: Address, token0: Address, token1: Address) -> String {
    format!(
        "uniswapV2:factory:{}:pair:{}-{}",
        address_key(&factory),
        address_key(&token0),
        address_key(&token1)
    )
}

fn pair_tokens_key(pair: Address) -> String {
    format!("uniswapv2-pair:{}:tokens", address_key(&pair))
}

fn pair_reserves_key(pair: Address) -> String {
    format!("uniswapv2-pair:{}:reserves", address_key(&pair))
}

fn symbol_key(token: Address) -> String {
    format!("erc20:{}:symbol", address_key(&token))
}

fn paths_key(token0: Address, token1: Address) -> String {
    format!("pathes:{}-{}", address_key(&token0), address_key(&token1))
}

pub fn format_paths(paths: &[Path]) -> String {
    paths
        .iter()
        .map(|path| {
            path.iter()
                .map(address_key)
                .collect::<Vec<_>>()
                .join(&PATH_ELEMENT_SEPARATOR.to_string())
        })
        .collect::<Vec<_>>()
        .join(&PATHS_SEPARATOR.to_string())
}

pub fn parse_paths(raw: &str) -> Result<Vec<Path>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(PATHS_SEPARATOR)
        .map(|path| {
            path.split(PATH_ELEMENT_SEPARATOR)
                .map(parse_address)
                .collect::<Result<Path>>()
        })
        .collect()
}
