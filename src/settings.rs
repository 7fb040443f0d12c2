use config::{Config, ConfigError, File};
use ethers::types::Address;
use num_bigint::BigUint;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::events::DEFAULT_EVENTS_BUFFER;
use crate::graph::{GraphConfig, DEFAULT_MIN_LIQUIDITY};
use crate::redis_manager::RedisConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Rpc {
    pub ws_url: String,
    /// Contract reads go here when set; the websocket then only carries the log
    /// subscription.
    #[serde(default)]
    pub http_url: Option<String>,
    /// Calls per second towards the provider; unset or 0 leaves calls unthrottled.
    #[serde(default)]
    pub qps_limit: Option<u32>,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: usize,
}

fn default_connect_retries() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct Contracts {
    pub factory: Address,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Workers {
    /// 0 = one worker per CPU.
    #[serde(default)]
    pub count: usize,
}

impl Workers {
    pub fn effective_count(&self) -> usize {
        if self.count > 0 {
            return self.count;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GraphSettings {
    #[serde(default = "default_min_liquidity")]
    pub min_liquidity: u64,
    /// Pools per path; 0 = unbounded.
    #[serde(default)]
    pub max_hops: usize,
}

fn default_min_liquidity() -> u64 {
    DEFAULT_MIN_LIQUIDITY
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            min_liquidity: default_min_liquidity(),
            max_hops: 0,
        }
    }
}

impl GraphSettings {
    pub fn to_config(&self) -> GraphConfig {
        GraphConfig {
            min_liquidity: BigUint::from(self.min_liquidity),
            max_hops: (self.max_hops > 0).then_some(self.max_hops),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexerSettings {
    #[serde(default = "default_dump_timeout_ms")]
    pub dump_timeout_ms: u64,
    #[serde(default = "default_events_buffer")]
    pub events_buffer: usize,
}

fn default_dump_timeout_ms() -> u64 {
    5_000
}
fn default_events_buffer() -> usize {
    DEFAULT_EVENTS_BUFFER
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            dump_timeout_ms: default_dump_timeout_ms(),
            events_buffer: default_events_buffer(),
        }
    }
}

impl IndexerSettings {
    pub fn dump_timeout(&self) -> Duration {
        Duration::from_millis(self.dump_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            redis_url: default_redis_url(),
            ttl_secs: None,
        }
    }
}

impl CacheSettings {
    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig {
            url: self.redis_url.clone(),
            ttl_secs: self.ttl_secs,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub rpc: Rpc,
    pub contracts: Contracts,
    #[serde(default)]
    pub workers: Workers,
    #[serde(default)]
    pub graph: GraphSettings,
    #[serde(default)]
    pub indexer: IndexerSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub log: LogSettings,
}

impl Settings {
    /// Load `path` and apply `INDEXER_*` overrides.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;
        settings.apply_overrides(|key| env::var(key).ok())?;
        Ok(settings)
    }

    /// Environment overrides, read through `lookup`. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(ws_url) = lookup("INDEXER_RPC_WS_URL") {
            self.rpc.ws_url = ws_url;
        }
        if let Some(http_url) = lookup("INDEXER_RPC_HTTP_URL") {
            self.rpc.http_url = Some(http_url);
        }
        if let Some(redis_url) = lookup("INDEXER_REDIS_URL") {
            self.cache.redis_url = redis_url;
        }
        if let Some(factory) = lookup("INDEXER_FACTORY") {
            self.contracts.factory = factory.parse().map_err(|e| {
                ConfigError::Message(format!("INDEXER_FACTORY {:?} is not an address: {}", factory, e))
            })?;
        }
        Ok(())
    }
}
