//! End-to-end pipeline tests: chain fixture → listener → event queue → indexer → graph.
//!
//! Uses the in-memory cache and a fixture chain with two mainnet-sized pairs:
//! USDT/WETH and WETH/DAI.

use async_trait::async_trait;
use ethers::types::{Address, Bytes, Log, H256, U256, U64};
use num_bigint::BigUint;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uniswapv2_indexer::{
    cache::InMemoryStore,
    chain::{ChainError, ChainSource},
    events::EventQueue,
    graph::Graph,
    indexer::Indexer,
    listener::{Listener, StreamEnd},
    log_decoder::SWAP_TOPIC,
    providers::StateCache,
    shutdown::{self, Shutdown},
};

const HEAD: u64 = 18_000_000;

fn address(raw: &str) -> Address {
    Address::from_str(raw).unwrap()
}

fn big(raw: &str) -> BigUint {
    raw.parse().unwrap()
}

fn usdt() -> Address {
    address("0xdAC17F958D2ee523a2206206994597C13D831ec7")
}
fn weth() -> Address {
    address("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")
}
fn dai() -> Address {
    address("0x6B175474E89094C44Da98b954EedeAC495271d0F")
}
fn factory() -> Address {
    address("0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f")
}
fn usdt_weth() -> Address {
    address("0x0d4a11d5EEaaC28EC3F61d100daF4d40471f1852")
}
fn weth_dai() -> Address {
    address("0xA478c2975Ab1Ea89e8196811F51A7B7Ade33eB11")
}

/// Mainnet-shaped factory with two pairs. Counts every call.
#[derive(Default)]
struct MainnetFixture {
    calls: AtomicUsize,
}

impl MainnetFixture {
    fn pair(&self, pool: Address) -> Result<(Address, Address, BigUint, BigUint), ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if pool == usdt_weth() {
            Ok((usdt(), weth(), big("15161485837452"), big("11904476979297547639664")))
        } else if pool == weth_dai() {
            Ok((
                weth(),
                dai(),
                big("5165403989650444294732"),
                big("6587199298527047793486029"),
            ))
        } else {
            Err(ChainError::Call {
                what: format!("reading pair {:?}", pool),
                message: "execution reverted".to_string(),
            })
        }
    }
}

#[async_trait]
impl ChainSource for MainnetFixture {
    async fn pool_count(&self, _factory: Address) -> Result<u64, ChainError> {
        Ok(2)
    }

    async fn pool_at_index(&self, _factory: Address, index: u64) -> Result<Address, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(if index == 0 { usdt_weth() } else { weth_dai() })
    }

    async fn pool_by_tokens(&self, _f: Address, _t0: Address, _t1: Address) -> Result<Address, ChainError> {
        Ok(Address::zero())
    }

    async fn token0(&self, pool: Address) -> Result<Address, ChainError> {
        Ok(self.pair(pool)?.0)
    }

    async fn token1(&self, pool: Address) -> Result<Address, ChainError> {
        Ok(self.pair(pool)?.1)
    }

    async fn reserves(&self, pool: Address) -> Result<(BigUint, BigUint), ChainError> {
        let (_, _, reserve0, reserve1) = self.pair(pool)?;
        Ok((reserve0, reserve1))
    }

    async fn symbol(&self, _token: Address) -> Result<String, ChainError> {
        Ok("TKN".to_string())
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(HEAD)
    }
}

fn swap_log(pair: Address, amounts: [u128; 4], block: u64) -> Log {
    let data: Vec<u8> = amounts
        .iter()
        .flat_map(|amount| {
            let mut word = [0u8; 32];
            U256::from(*amount).to_big_endian(&mut word);
            word
        })
        .collect();
    Log {
        address: pair,
        topics: vec![*SWAP_TOPIC, H256::zero(), H256::zero()],
        data: Bytes::from(data),
        block_number: Some(U64::from(block)),
        ..Default::default()
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_startup_to_best_path() {
    let store = InMemoryStore::new();
    let cache = StateCache::new(Arc::new(store.clone()));
    let chain = Arc::new(MainnetFixture::default());
    let queue = Arc::new(EventQueue::new());
    let graph = Arc::new(Graph::new());
    let (handle, stop) = shutdown::channel();

    let events = queue.subscribe().await;
    let indexer = Indexer::new(graph.clone(), cache.clone());
    let indexer_task = tokio::spawn({
        let stop = stop.clone();
        async move { indexer.run(events, stop).await }
    });

    let listener = Listener::new(factory(), chain.clone(), cache.clone(), queue.clone(), 4);
    assert_eq!(listener.initialize(Shutdown::never()).await.unwrap(), 2);
    listener.emit_initial_state(&Shutdown::never()).await.unwrap();

    wait_for(|| !graph.paths().is_empty()).await;
    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 2);

    let best = graph.best_path(usdt(), dai(), &BigUint::from(1_000_000u32));
    assert_eq!(best.path, vec![usdt(), weth(), dai()]);
    assert_eq!(best.amount_out, big("1001301738132475972"));

    // 1 USDT in, 0.00078 WETH out.
    let swap = swap_log(usdt_weth(), [1_000_000, 0, 0, 785_000_000_000_000], HEAD + 1);
    let end = listener
        .run_stream(futures::stream::iter(vec![swap]), stop.clone())
        .await;
    assert_eq!(end, StreamEnd::Exhausted);

    wait_for(|| {
        graph
            .edge(usdt(), weth())
            .map_or(false, |edge| edge.reserve0 == big("15161486837452"))
    })
    .await;
    let edge = graph.edge(weth(), usdt()).unwrap();
    assert_eq!(edge.reserve1, big("11904476194297547639664"));

    let after = graph.best_path(usdt(), dai(), &BigUint::from(1_000_000u32));
    assert!(after.amount_out < best.amount_out);

    handle.shutdown();
    indexer_task.await.unwrap().unwrap();

    assert_eq!(cache.current_block().await.unwrap(), HEAD + 1);
    assert!(store.contains_key(&format!(
        "uniswapv2-pair:0x{}:tokens",
        hex::encode(usdt_weth().as_bytes())
    )));
    assert!(!store.keys_with_prefix("pathes:").is_empty());
}

#[tokio::test]
async fn test_restart_resolves_from_cache() {
    let store = InMemoryStore::new();
    let cache = StateCache::new(Arc::new(store.clone()));

    let first_chain = Arc::new(MainnetFixture::default());
    let first = Listener::new(factory(), first_chain.clone(), cache.clone(), Arc::new(EventQueue::new()), 2);
    first.initialize(Shutdown::never()).await.unwrap();
    assert!(first_chain.calls.load(Ordering::SeqCst) > 0);

    // Same cache, fresh process: addresses and tokens come from the cache, reserves are
    // read again.
    let second_chain = Arc::new(MainnetFixture::default());
    let second = Listener::new(factory(), second_chain.clone(), cache, Arc::new(EventQueue::new()), 2);
    second.initialize(Shutdown::never()).await.unwrap();
    assert_eq!(second.pair_addresses(), first.pair_addresses());
    assert_eq!(second_chain.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_two_subscribers_see_the_same_startup() {
    let cache = StateCache::new(Arc::new(InMemoryStore::new()));
    let queue = Arc::new(EventQueue::new());
    let mut first = queue.subscribe().await;
    let mut second = queue.subscribe().await;

    let listener = Listener::new(factory(), Arc::new(MainnetFixture::default()), cache, queue.clone(), 2);
    listener.initialize(Shutdown::never()).await.unwrap();
    listener.emit_initial_state(&Shutdown::never()).await.unwrap();

    let mut late = queue.subscribe().await;
    for _ in 0..3 {
        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();
        assert_eq!(a.event_type(), b.event_type());
    }
    assert!(late.try_recv().is_err());
}
