//! # Listener
//!
//! Producer side of the pipeline: discovers every pair of the factory at startup, then
//! turns chain logs into graph events.
//!
//! ## Flow
//!
//! 1. [`Listener::initialize`] reads the pair count and resolves every pair (address,
//!    tokens, reserves) through a [`WorkersPool`]. Rate-limited calls are retried; any
//!    other failure aborts startup. Reserves always come from the chain: a cached value
//!    may predate a restart, and every later delta would be applied on top of it.
//! 2. [`Listener::emit_initial_state`] sends one `PairCreation` per pair and a
//!    `BlockCreation` for the chain head, so the consumer builds its first path set.
//! 3. [`Listener::listen`] subscribes once to the Swap/Sync/Mint/Burn/PairCreated topics.
//!    Each log goes through [`Listener::process_log`], which keeps only the factory and
//!    the known pairs; errors on a single log are logged and skipped.
//!
//! The subscription is not narrowed to an address list. The list grows with every
//! `PairCreated`, and swapping subscriptions would lose the logs still queued on the old
//! one. A new pair starts at zero reserves and its first `Mint` follows in the same stream.

use anyhow::{Context, Result};
use dashmap::DashMap;
use ethers::providers::{Middleware, Provider, Ws};
use ethers::types::{Address, Filter, Log};
use futures::{Stream, StreamExt};
use log::{debug, error, info, trace, warn};
use num_bigint::BigUint;
use num_traits::Zero;
use std::sync::Arc;
use std::time::Instant;

use crate::chain::ChainSource;
use crate::events::{BlockCreation, Event, EventQueue, PairCreation, ReservesUpdate};
use crate::log_decoder::{decode_log, watched_topics, DecodeError, LogKind};
use crate::providers::StateCache;
use crate::resolver::{FactoryResolver, PairResolver, TokenResolver};
use crate::shutdown::Shutdown;
use crate::block_tracker::BlockTracker;
use crate::workers_pool::{TaskOutcome, WorkersPool};

/// What [`Listener::process_log`] did with one log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    /// Translated into graph events.
    Applied,
    /// Reserves cached, nothing sent.
    Cached,
    /// A pair not seen before was recorded.
    NewPair(Address),
    Skipped,
}

/// Why [`Listener::run_stream`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Shutdown,
    Exhausted,
}

pub struct Listener {
    factory: Arc<FactoryResolver>,
    chain: Arc<dyn ChainSource>,
    cache: StateCache,
    pairs: Arc<DashMap<Address, Arc<PairResolver>>>,
    tokens: DashMap<Address, Arc<TokenResolver>>,
    queue: Arc<EventQueue>,
    blocks: BlockTracker,
    workers: usize,
}

impl Listener {
    pub fn new(
        factory: Address,
        chain: Arc<dyn ChainSource>,
        cache: StateCache,
        queue: Arc<EventQueue>,
        workers: usize,
    ) -> Self {
        Self {
            factory: Arc::new(FactoryResolver::new(factory, chain.clone(), cache.clone())),
            blocks: BlockTracker::new(cache.clone()),
            chain,
            cache,
            pairs: Arc::new(DashMap::new()),
            tokens: DashMap::new(),
            queue,
            workers: workers.max(1),
        }
    }

    pub fn factory(&self) -> Address {
        self.factory.address()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Known pairs, ascending.
    pub fn pair_addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.pairs.iter().map(|entry| *entry.key()).collect();
        addresses.sort();
        addresses
    }

    pub fn blocks(&self) -> &BlockTracker {
        &self.blocks
    }

    /// Startup followed by the log subscription, until shutdown.
    pub async fn run(&self, provider: &Provider<Ws>, shutdown: Shutdown) -> Result<()> {
        let result = async {
            self.initialize(shutdown.clone()).await?;
            self.emit_initial_state(&shutdown).await?;
            self.listen(provider, shutdown.clone()).await
        }
        .await;

        match result {
            Err(e) if shutdown.is_shutdown() => {
                debug!("Listener cancelled: {:#}", e);
                Ok(())
            }
            other => other,
        }
    }

    /// Resolve every pair of the factory. Returns the number of pairs.
    pub async fn initialize(&self, shutdown: Shutdown) -> Result<usize> {
        let started = Instant::now();
        let count = self
            .factory
            .pool_count()
            .await
            .context("Failed to read the factory pair count")?;
        let count = usize::try_from(count).context("Pair count does not fit in usize")?;
        info!(
            "🔍 Resolving {} pairs of factory {:?} with {} workers",
            count,
            self.factory.address(),
            self.workers
        );

        let pool = WorkersPool::new(self.workers, count);
        for index in 0..count as u64 {
            let factory = self.factory.clone();
            let pairs = self.pairs.clone();
            let chain = self.chain.clone();
            let cache = self.cache.clone();

            pool.add_task(move |_shutdown| {
                let factory = factory.clone();
                let pairs = pairs.clone();
                let chain = chain.clone();
                let cache = cache.clone();
                async move {
                    match load_pair(&factory, &pairs, chain, cache, index).await {
                        Ok(()) => TaskOutcome::Done,
                        Err(e) if e.is_rate_limited() => {
                            debug!("⏳ Pair #{} rate limited, retrying: {}", index, e);
                            TaskOutcome::Retry
                        }
                        Err(e) => TaskOutcome::Fatal(
                            anyhow::Error::new(e).context(format!("Failed to load pair #{}", index)),
                        ),
                    }
                }
            })?;
        }
        pool.run(shutdown).await?;

        info!(
            "✅ Resolved {} pairs in {:.2}s",
            self.pairs.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(self.pairs.len())
    }

    /// One `PairCreation` per known pair, then a `BlockCreation` for the chain head.
    pub async fn emit_initial_state(&self, shutdown: &Shutdown) -> Result<()> {
        let mut events = Vec::with_capacity(self.pairs.len() + 1);
        for address in self.pair_addresses() {
            let Some(pair) = self.pair(address) else { continue };
            events.push(pair_creation(&pair).await?);
        }

        let head = self
            .chain
            .block_number()
            .await
            .context("Failed to read the chain head")?;
        events.push(BlockCreation { block: head }.into());

        let sent = events.len();
        self.queue.send(events, shutdown).await?;
        info!("📤 Sent initial state: {} pairs at block {}", sent - 1, head);
        Ok(())
    }

    /// Watched topics from any address, from the stored block when there is one.
    pub async fn filter(&self) -> Result<Filter> {
        let mut filter = Filter::new().topic0(watched_topics());
        let from = self.blocks.current_block().await?;
        if from > 0 {
            filter = filter.from_block(from);
        }
        Ok(filter)
    }

    /// Subscribe over `provider` and process logs until shutdown.
    pub async fn listen(&self, provider: &Provider<Ws>, shutdown: Shutdown) -> Result<()> {
        let filter = self.filter().await?;
        let stream = provider
            .subscribe_logs(&filter)
            .await
            .context("Failed to subscribe to logs")?;
        info!("👂 Listening to {} pairs", self.pairs.len());

        match self.run_stream(stream, shutdown).await {
            StreamEnd::Shutdown => Ok(()),
            StreamEnd::Exhausted => anyhow::bail!("Log subscription closed by the provider"),
        }
    }

    /// Drive [`Listener::process_log`] over any log stream.
    pub async fn run_stream<S>(&self, stream: S, mut shutdown: Shutdown) -> StreamEnd
    where
        S: Stream<Item = Log> + Send,
    {
        let mut stream = Box::pin(stream);
        loop {
            let log = tokio::select! {
                biased;
                _ = shutdown.recv() => return StreamEnd::Shutdown,
                next = stream.next() => match next {
                    Some(log) => log,
                    None => return StreamEnd::Exhausted,
                },
            };

            match self.process_log(&log, &shutdown).await {
                Ok(_) => {}
                Err(_) if shutdown.is_shutdown() => return StreamEnd::Shutdown,
                Err(e) => warn!(
                    "⚠️ Skipping log {:?} of {:?}: {:#}",
                    log.transaction_hash, log.address, e
                ),
            }
        }
    }

    /// Translate one log into events.
    pub async fn process_log(&self, log: &Log, shutdown: &Shutdown) -> Result<LogOutcome> {
        let decoded = match decode_log(log) {
            Ok(decoded) => decoded,
            Err(DecodeError::UnknownTopic(topic)) => {
                debug!("Ignoring log with topic {:?} from {:?}", topic, log.address);
                return Ok(LogOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(block) = decoded.block {
            if block > self.blocks.current_block().await? {
                self.blocks.update_block(block).await?;
                self.queue.send_one(BlockCreation { block }, shutdown).await?;
            }
        }

        if let LogKind::PairCreated { token0, token1, pair, .. } = &decoded.kind {
            if decoded.address != self.factory.address() {
                debug!("PairCreated from unknown factory {:?}", decoded.address);
                return Ok(LogOutcome::Skipped);
            }
            return self.record_new_pair(*pair, *token0, *token1, shutdown).await;
        }

        let Some(pair) = self.pair(decoded.address) else {
            trace!("{} from untracked pair {:?}", decoded.kind.name(), decoded.address);
            return Ok(LogOutcome::Skipped);
        };

        if let LogKind::Sync { reserve0, reserve1 } = &decoded.kind {
            pair.store_reserves(reserve0, reserve1).await;
            return Ok(LogOutcome::Cached);
        }

        let Some((reserve0_delta, reserve1_delta)) = decoded.kind.reserve_deltas() else {
            return Ok(LogOutcome::Skipped);
        };
        let (token0, token1) = pair.tokens().await?;
        self.queue
            .send_one(
                ReservesUpdate {
                    address: pair.address(),
                    token0,
                    token1,
                    reserve0_delta,
                    reserve1_delta,
                },
                shutdown,
            )
            .await?;
        Ok(LogOutcome::Applied)
    }

    async fn record_new_pair(
        &self,
        address: Address,
        token0: Address,
        token1: Address,
        shutdown: &Shutdown,
    ) -> Result<LogOutcome> {
        if self.pairs.contains_key(&address) {
            return Ok(LogOutcome::Skipped);
        }

        // The log already names the tokens; seed the cache so the resolver does not ask.
        if let Err(e) = self.cache.set_pair_tokens(address, token0, token1).await {
            warn!("⚠️ Cache write failed for tokens of {:?}: {:#}", address, e);
        }
        let pair = Arc::new(PairResolver::new(address, self.chain.clone(), self.cache.clone()));
        // Created empty; liquidity arrives as Mint logs on this same stream.
        pair.seed_reserves(BigUint::zero(), BigUint::zero());
        let event = pair_creation(&pair).await?;
        self.pairs.insert(address, pair);

        info!(
            "🆕 New pair {:?} ({}/{})",
            address,
            self.symbol_or_address(token0).await,
            self.symbol_or_address(token1).await
        );
        self.queue.send_one(event, shutdown).await?;
        Ok(LogOutcome::NewPair(address))
    }

    async fn symbol_or_address(&self, token: Address) -> String {
        let resolver = self
            .tokens
            .entry(token)
            .or_insert_with(|| {
                Arc::new(TokenResolver::new(token, self.chain.clone(), self.cache.clone()))
            })
            .value()
            .clone();
        match resolver.symbol().await {
            Ok(symbol) => symbol,
            Err(e) => {
                debug!("No symbol for {:?}: {}", token, e);
                format!("{:?}", token)
            }
        }
    }

    fn pair(&self, address: Address) -> Option<Arc<PairResolver>> {
        self.pairs.get(&address).map(|entry| entry.value().clone())
    }
}

async fn load_pair(
    factory: &FactoryResolver,
    pairs: &DashMap<Address, Arc<PairResolver>>,
    chain: Arc<dyn ChainSource>,
    cache: StateCache,
    index: u64,
) -> Result<(), crate::resolver::ResolveError> {
    let address = factory.pool_by_index(index).await?;
    if pairs.contains_key(&address) {
        return Ok(());
    }

    let pair = Arc::new(PairResolver::new(address, chain, cache));
    pair.tokens().await?;
    pair.fetch_reserves().await?;
    pairs.insert(address, pair);
    Ok(())
}

async fn pair_creation(pair: &PairResolver) -> Result<Event> {
    let (token0, token1) = pair.tokens().await?;
    let (reserve0, reserve1) = pair.reserves().await.map_err(|e| {
        error!("❌ No reserves for pair {:?}: {}", pair.address(), e);
        e
    })?;
    Ok(PairCreation {
        address: pair.address(),
        token0,
        token1,
        reserve0,
        reserve1,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryStore;
    use crate::chain::ChainError;
    use crate::log_decoder::{MINT_TOPIC, PAIR_CREATED_TOPIC, SWAP_TOPIC, SYNC_TOPIC};
    use crate::shutdown;
    use async_trait::async_trait;
    use ethers::types::{Bytes, H256, U256, U64};
    use num_bigint::{BigInt, BigUint};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    const FACTORY: u64 = 0xfac;

    /// Two pairs: `0x1000` (tokens 1, 2) and `0x1001` (tokens 2, 3). The first
    /// `rate_limited` reads of pair `#1` are rate limited.
    struct TwoPairChain {
        rate_limited: AtomicUsize,
    }

    #[async_trait]
    impl ChainSource for TwoPairChain {
        async fn pool_count(&self, _factory: Address) -> Result<u64, ChainError> {
            Ok(2)
        }

        async fn pool_at_index(&self, _factory: Address, index: u64) -> Result<Address, ChainError> {
            if index == 1
                && self
                    .rate_limited
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return Err(ChainError::RateLimited {
                    what: "reading pair #1".to_string(),
                    message: "429".to_string(),
                });
            }
            Ok(addr(0x1000 + index))
        }

        async fn pool_by_tokens(&self, _f: Address, _t0: Address, _t1: Address) -> Result<Address, ChainError> {
            Ok(Address::zero())
        }

        async fn token0(&self, pool: Address) -> Result<Address, ChainError> {
            Ok(addr(pool.to_low_u64_be() - 0x1000 + 1))
        }

        async fn token1(&self, pool: Address) -> Result<Address, ChainError> {
            Ok(addr(pool.to_low_u64_be() - 0x1000 + 2))
        }

        async fn reserves(&self, _pool: Address) -> Result<(BigUint, BigUint), ChainError> {
            Ok((BigUint::from(1_000_000u32), BigUint::from(2_000_000u32)))
        }

        async fn symbol(&self, token: Address) -> Result<String, ChainError> {
            Ok(format!("T{}", token.to_low_u64_be()))
        }

        async fn block_number(&self) -> Result<u64, ChainError> {
            Ok(500)
        }
    }

    fn listener(rate_limited: usize) -> (Listener, Arc<EventQueue>) {
        let chain = Arc::new(TwoPairChain {
            rate_limited: AtomicUsize::new(rate_limited),
        });
        let queue = Arc::new(EventQueue::new());
        let cache = StateCache::new(Arc::new(InMemoryStore::new()));
        (
            Listener::new(addr(FACTORY), chain, cache, queue.clone(), 2),
            queue,
        )
    }

    fn word(value: u128) -> [u8; 32] {
        let mut buf = [0u8; 32];
        U256::from(value).to_big_endian(&mut buf);
        buf
    }

    fn log(address: Address, topics: Vec<H256>, data: Vec<u8>, block: u64) -> Log {
        Log {
            address,
            topics,
            data: Bytes::from(data),
            block_number: Some(U64::from(block)),
            ..Default::default()
        }
    }

    fn words(values: &[u128]) -> Vec<u8> {
        values.iter().flat_map(|v| word(*v)).collect()
    }

    #[tokio::test]
    async fn test_initialize_retries_rate_limited_pairs() {
        let (listener, _) = listener(3);
        let count = listener.initialize(Shutdown::never()).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(listener.pair_addresses(), vec![addr(0x1000), addr(0x1001)]);
    }

    #[tokio::test]
    async fn test_initial_state_ends_with_block() {
        let (listener, queue) = listener(0);
        let mut events = queue.subscribe().await;
        listener.initialize(Shutdown::never()).await.unwrap();
        listener.emit_initial_state(&Shutdown::never()).await.unwrap();

        match events.recv().await.unwrap() {
            Event::PairCreation(pair) => {
                assert_eq!(pair.address, addr(0x1000));
                assert_eq!((pair.token0, pair.token1), (addr(1), addr(2)));
                assert_eq!(pair.reserve0, BigUint::from(1_000_000u32));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(events.recv().await.unwrap(), Event::PairCreation(_)));
        assert!(matches!(
            events.recv().await.unwrap(),
            Event::BlockCreation(BlockCreation { block: 500 })
        ));
    }

    #[tokio::test]
    async fn test_filter_selects_topics_only() {
        let (listener, _) = listener(0);
        listener.initialize(Shutdown::never()).await.unwrap();

        let filter = listener.filter().await.unwrap();
        let json = serde_json::to_value(&filter).unwrap();
        assert!(json.get("address").is_none());
        assert_eq!(json["topics"][0].as_array().unwrap().len(), 5);
        assert!(json.get("fromBlock").is_none());

        listener.blocks().update_block(42).await.unwrap();
        let json = serde_json::to_value(&listener.filter().await.unwrap()).unwrap();
        assert_eq!(json["fromBlock"], "0x2a");
    }

    #[tokio::test]
    async fn test_logs_become_events() {
        let (listener, queue) = listener(0);
        let mut events = queue.subscribe().await;
        listener.initialize(Shutdown::never()).await.unwrap();
        let shutdown = Shutdown::never();

        let swap = log(
            addr(0x1000),
            vec![*SWAP_TOPIC, H256::zero(), H256::zero()],
            words(&[0, 300, 100, 0]),
            600,
        );
        assert_eq!(listener.process_log(&swap, &shutdown).await.unwrap(), LogOutcome::Applied);

        assert!(matches!(
            events.recv().await.unwrap(),
            Event::BlockCreation(BlockCreation { block: 600 })
        ));
        match events.recv().await.unwrap() {
            Event::ReservesUpdate(update) => {
                assert_eq!(update.reserve0_delta, BigInt::from(-100));
                assert_eq!(update.reserve1_delta, BigInt::from(300));
                assert_eq!((update.token0, update.token1), (addr(1), addr(2)));
            }
            other => panic!("unexpected {:?}", other),
        }

        // Same block: no second BlockCreation.
        let mint = log(addr(0x1001), vec![*MINT_TOPIC, H256::zero()], words(&[5, 6]), 600);
        listener.process_log(&mint, &shutdown).await.unwrap();
        assert!(matches!(events.recv().await.unwrap(), Event::ReservesUpdate(_)));

        let sync = log(addr(0x1001), vec![*SYNC_TOPIC], words(&[7, 8]), 600);
        assert_eq!(listener.process_log(&sync, &shutdown).await.unwrap(), LogOutcome::Cached);

        let stranger = log(addr(0x9999), vec![*MINT_TOPIC, H256::zero()], words(&[5, 6]), 600);
        assert_eq!(listener.process_log(&stranger, &shutdown).await.unwrap(), LogOutcome::Skipped);
        assert!(events.try_recv().is_err());
    }

    fn pair_created(pair: Address, token0: Address, token1: Address, block: u64) -> Log {
        let mut data = H256::from(pair).as_bytes().to_vec();
        data.extend_from_slice(&word(2));
        log(
            addr(FACTORY),
            vec![*PAIR_CREATED_TOPIC, H256::from(token0), H256::from(token1)],
            data,
            block,
        )
    }

    #[tokio::test]
    async fn test_pair_created_keeps_stream_going() {
        let (listener, queue) = listener(0);
        let mut events = queue.subscribe().await;
        listener.initialize(Shutdown::never()).await.unwrap();

        let malformed = log(addr(0x1000), vec![*SYNC_TOPIC], vec![1, 2, 3], 700);
        let created = pair_created(addr(0x2000), addr(7), addr(8), 700);
        let swap = log(
            addr(0x1000),
            vec![*SWAP_TOPIC, H256::zero(), H256::zero()],
            words(&[0, 300, 100, 0]),
            700,
        );
        let mint = log(addr(0x2000), vec![*MINT_TOPIC, H256::zero()], words(&[40, 50]), 700);

        let end = listener
            .run_stream(
                futures::stream::iter(vec![malformed, created, swap, mint]),
                Shutdown::never(),
            )
            .await;
        assert_eq!(end, StreamEnd::Exhausted);
        assert_eq!(
            listener.pair_addresses(),
            vec![addr(0x1000), addr(0x1001), addr(0x2000)]
        );

        assert!(matches!(events.recv().await.unwrap(), Event::BlockCreation(_)));
        match events.recv().await.unwrap() {
            Event::PairCreation(pair) => {
                assert_eq!(pair.address, addr(0x2000));
                assert_eq!((pair.token0, pair.token1), (addr(7), addr(8)));
                assert_eq!(pair.reserve0, BigUint::from(0u32));
                assert_eq!(pair.reserve1, BigUint::from(0u32));
            }
            other => panic!("unexpected {:?}", other),
        }
        match events.recv().await.unwrap() {
            Event::ReservesUpdate(update) => {
                assert_eq!(update.address, addr(0x1000));
                assert_eq!(update.reserve0_delta, BigInt::from(-100));
            }
            other => panic!("unexpected {:?}", other),
        }
        match events.recv().await.unwrap() {
            Event::ReservesUpdate(update) => {
                assert_eq!(update.address, addr(0x2000));
                assert_eq!(update.reserve0_delta, BigInt::from(40));
                assert_eq!(update.reserve1_delta, BigInt::from(50));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pair_created_by_other_factory_is_ignored() {
        let (listener, queue) = listener(0);
        let mut events = queue.subscribe().await;

        let mut foreign = pair_created(addr(0x3000), addr(7), addr(8), 700);
        foreign.address = addr(0xbad);
        assert_eq!(
            listener.process_log(&foreign, &Shutdown::never()).await.unwrap(),
            LogOutcome::Skipped
        );
        assert!(listener.pair_addresses().is_empty());
        assert!(matches!(events.recv().await.unwrap(), Event::BlockCreation(_)));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_startup_reserves_replace_stale_cache() {
        let cache = StateCache::new(Arc::new(InMemoryStore::new()));
        cache
            .set_pair_reserves(addr(0x1000), &BigUint::from(1u32), &BigUint::from(1u32))
            .await
            .unwrap();
        let chain = Arc::new(TwoPairChain {
            rate_limited: AtomicUsize::new(0),
        });
        let queue = Arc::new(EventQueue::new());
        let mut events = queue.subscribe().await;
        let listener = Listener::new(addr(FACTORY), chain, cache.clone(), queue, 2);

        listener.initialize(Shutdown::never()).await.unwrap();
        listener.emit_initial_state(&Shutdown::never()).await.unwrap();

        match events.recv().await.unwrap() {
            Event::PairCreation(pair) => {
                assert_eq!(pair.address, addr(0x1000));
                assert_eq!(pair.reserve0, BigUint::from(1_000_000u32));
                assert_eq!(pair.reserve1, BigUint::from(2_000_000u32));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            cache.pair_reserves(addr(0x1000)).await.unwrap(),
            Some((BigUint::from(1_000_000u32), BigUint::from(2_000_000u32)))
        );
    }

    #[tokio::test]
    async fn test_run_stream_stops_on_shutdown() {
        let (listener, _) = listener(0);
        let (handle, shutdown) = shutdown::channel();
        handle.shutdown();

        let end = listener.run_stream(futures::stream::pending::<Log>(), shutdown).await;
        assert_eq!(end, StreamEnd::Shutdown);

        let end = listener
            .run_stream(futures::stream::empty::<Log>(), Shutdown::never())
            .await;
        assert_eq!(end, StreamEnd::Exhausted);
    }
}
