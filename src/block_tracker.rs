use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::providers::StateCache;

/// Last block the listener has consumed, persisted under `current_block`.
///
/// The stored value is read once and memoised; writes go to the cache only when the
/// block actually changes, so a burst of logs from the same block costs one write.
pub struct BlockTracker {
    cache: StateCache,
    current: AtomicU64,
    loaded: OnceCell<()>,
    write_lock: Mutex<()>,
}

impl BlockTracker {
    pub fn new(cache: StateCache) -> Self {
        Self {
            cache,
            current: AtomicU64::new(0),
            loaded: OnceCell::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Current block (0 when nothing was ever stored).
    pub async fn current_block(&self) -> Result<u64> {
        self.ensure_loaded().await?;
        Ok(self.current.load(Ordering::Acquire))
    }

    /// Memoised value without touching the cache. 0 until loaded.
    pub fn get_cached(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Record `block`. Returns whether anything was written.
    pub async fn update_block(&self, block: u64) -> Result<bool> {
        self.ensure_loaded().await?;

        let _guard = self.write_lock.lock().await;
        if self.current.load(Ordering::Acquire) == block {
            return Ok(false);
        }
        self.cache.set_current_block(block).await?;
        self.current.store(block, Ordering::Release);
        debug!("BlockTracker: advanced to block {}", block);
        Ok(true)
    }

    async fn ensure_loaded(&self) -> Result<()> {
        self.loaded
            .get_or_try_init(|| async {
                let stored = self.cache.current_block().await?;
                self.current.store(stored, Ordering::Release);
                debug!("BlockTracker: loaded block {} from {}", stored, self.cache.backend());
                Ok::<(), anyhow::Error>(())
            })
            .await?;
        Ok(())
    }
}
