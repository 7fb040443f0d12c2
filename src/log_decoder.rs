// Log Decoder - turns raw UniswapV2 pair and factory logs into typed events
// Topics are matched on topic0; indexed addresses come from topics[1..], amounts from 32-byte data words

use ethers::types::{Address, Log, H256};
use ethers::utils::keccak256;
use num_bigint::{BigInt, BigUint};
use once_cell::sync::Lazy;

pub static SWAP_TOPIC: Lazy<H256> =
    Lazy::new(|| topic("Swap(address,uint256,uint256,uint256,uint256,address)"));
pub static SYNC_TOPIC: Lazy<H256> = Lazy::new(|| topic("Sync(uint112,uint112)"));
pub static MINT_TOPIC: Lazy<H256> = Lazy::new(|| topic("Mint(address,uint256,uint256)"));
pub static BURN_TOPIC: Lazy<H256> = Lazy::new(|| topic("Burn(address,uint256,uint256,address)"));
pub static PAIR_CREATED_TOPIC: Lazy<H256> =
    Lazy::new(|| topic("PairCreated(address,address,address,uint256)"));

fn topic(signature: &str) -> H256 {
    H256::from(keccak256(signature.as_bytes()))
}

/// Every topic0 the listener subscribes to.
pub fn watched_topics() -> Vec<H256> {
    vec![
        *SWAP_TOPIC,
        *SYNC_TOPIC,
        *MINT_TOPIC,
        *BURN_TOPIC,
        *PAIR_CREATED_TOPIC,
    ]
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("log has no topics")]
    NoTopics,
    #[error("unknown topic0 {0:?}")]
    UnknownTopic(H256),
    #[error("{event} log needs {expected} topics, got {actual}")]
    MissingTopics {
        event: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{event} log needs {expected} data bytes, got {actual}")]
    ShortData {
        event: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogKind {
    Swap {
        amount0_in: BigUint,
        amount1_in: BigUint,
        amount0_out: BigUint,
        amount1_out: BigUint,
    },
    Sync {
        reserve0: BigUint,
        reserve1: BigUint,
    },
    Mint {
        amount0: BigUint,
        amount1: BigUint,
    },
    Burn {
        amount0: BigUint,
        amount1: BigUint,
    },
    PairCreated {
        token0: Address,
        token1: Address,
        pair: Address,
        index: BigUint,
    },
}

impl LogKind {
    pub fn name(&self) -> &'static str {
        match self {
            LogKind::Swap { .. } => "Swap",
            LogKind::Sync { .. } => "Sync",
            LogKind::Mint { .. } => "Mint",
            LogKind::Burn { .. } => "Burn",
            LogKind::PairCreated { .. } => "PairCreated",
        }
    }

    /// Signed change to `(reserve0, reserve1)` for liquidity and swap logs.
    ///
    /// `Sync` carries absolute reserves, not a change, and yields `None`.
    pub fn reserve_deltas(&self) -> Option<(BigInt, BigInt)> {
        match self {
            LogKind::Mint { amount0, amount1 } => {
                Some((BigInt::from(amount0.clone()), BigInt::from(amount1.clone())))
            }
            LogKind::Burn { amount0, amount1 } => {
                Some((-BigInt::from(amount0.clone()), -BigInt::from(amount1.clone())))
            }
            LogKind::Swap {
                amount0_in,
                amount1_in,
                amount0_out,
                amount1_out,
            } => Some((
                BigInt::from(amount0_in.clone()) - BigInt::from(amount0_out.clone()),
                BigInt::from(amount1_in.clone()) - BigInt::from(amount1_out.clone()),
            )),
            LogKind::Sync { .. } | LogKind::PairCreated { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLog {
    /// Emitting contract: the pair, or the factory for `PairCreated`.
    pub address: Address,
    pub block: Option<u64>,
    pub kind: LogKind,
}

pub fn decode_log(log: &Log) -> Result<DecodedLog, DecodeError> {
    let topic0 = log.topics.first().ok_or(DecodeError::NoTopics)?;
    let data = log.data.as_ref();

    let kind = if *topic0 == *SWAP_TOPIC {
        let words = words("Swap", data, 4)?;
        LogKind::Swap {
            amount0_in: words[0].clone(),
            amount1_in: words[1].clone(),
            amount0_out: words[2].clone(),
            amount1_out: words[3].clone(),
        }
    } else if *topic0 == *SYNC_TOPIC {
        let [reserve0, reserve1] = pair_of_words("Sync", data)?;
        LogKind::Sync { reserve0, reserve1 }
    } else if *topic0 == *MINT_TOPIC {
        let [amount0, amount1] = pair_of_words("Mint", data)?;
        LogKind::Mint { amount0, amount1 }
    } else if *topic0 == *BURN_TOPIC {
        let [amount0, amount1] = pair_of_words("Burn", data)?;
        LogKind::Burn { amount0, amount1 }
    } else if *topic0 == *PAIR_CREATED_TOPIC {
        if log.topics.len() < 3 {
            return Err(DecodeError::MissingTopics {
                event: "PairCreated",
                expected: 3,
                actual: log.topics.len(),
            });
        }
        let [_, index] = pair_of_words("PairCreated", data)?;
        LogKind::PairCreated {
            token0: Address::from_slice(&log.topics[1].as_bytes()[12..]),
            token1: Address::from_slice(&log.topics[2].as_bytes()[12..]),
            pair: Address::from_slice(&data[12..32]),
            index,
        }
    } else {
        return Err(DecodeError::UnknownTopic(*topic0));
    };

    Ok(DecodedLog {
        address: log.address,
        block: log.block_number.map(|block| block.as_u64()),
        kind,
    })
}

fn words(event: &'static str, data: &[u8], count: usize) -> Result<Vec<BigUint>, DecodeError> {
    if data.len() < count * 32 {
        return Err(DecodeError::ShortData {
            event,
            expected: count * 32,
            actual: data.len(),
        });
    }
    Ok(data
        .chunks_exact(32)
        .take(count)
        .map(BigUint::from_bytes_be)
        .collect())
}

fn pair_of_words(event: &'static str, data: &[u8]) -> Result<[BigUint; 2], DecodeError> {
    let mut words = words(event, data, 2)?.into_iter();
    match (words.next(), words.next()) {
        (Some(first), Some(second)) => Ok([first, second]),
        _ => Err(DecodeError::ShortData {
            event,
            expected: 64,
            actual: data.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Bytes, U256, U64};
    use std::str::FromStr;

    fn word(value: u128) -> [u8; 32] {
        let mut buf = [0u8; 32];
        U256::from(value).to_big_endian(&mut buf);
        buf
    }

    fn address_topic(address: Address) -> H256 {
        H256::from(address)
    }

    fn raw_log(address: Address, topics: Vec<H256>, words: &[u128]) -> Log {
        let data: Vec<u8> = words.iter().flat_map(|w| word(*w)).collect();
        Log {
            address,
            topics,
            data: Bytes::from(data),
            block_number: Some(U64::from(17_000_000u64)),
            ..Default::default()
        }
    }

    #[test]
    fn test_topic_hashes() {
        assert_eq!(
            *PAIR_CREATED_TOPIC,
            H256::from_str("0x0d3648bd0f6ba80134a33ba9275ac585d9d315f0ad8355cddefde31afa28d0e9").unwrap()
        );
        assert_eq!(
            *SYNC_TOPIC,
            H256::from_str("0x1c411e9a96e071241c2f21f7726b17ae89e3cab4c78be50e062b03a9fffbbad1").unwrap()
        );
        assert_eq!(
            *SWAP_TOPIC,
            H256::from_str("0xd78ad95fa46c994b6551d0da85fc275fe613ce37657fb8d5e3d130840159d822").unwrap()
        );
        assert_eq!(watched_topics().len(), 5);
    }

    #[test]
    fn test_swap_deltas_are_in_minus_out() {
        let pair = Address::from_low_u64_be(0x1000);
        let log = raw_log(
            pair,
            vec![*SWAP_TOPIC, H256::zero(), H256::zero()],
            &[1_000, 0, 0, 1_273],
        );
        let decoded = decode_log(&log).unwrap();

        assert_eq!(decoded.address, pair);
        assert_eq!(decoded.block, Some(17_000_000));
        assert_eq!(decoded.kind.name(), "Swap");
        assert_eq!(
            decoded.kind.reserve_deltas(),
            Some((BigInt::from(1_000), BigInt::from(-1_273)))
        );
    }

    #[test]
    fn test_mint_and_burn_signs() {
        let pair = Address::from_low_u64_be(0x1000);
        let mint = decode_log(&raw_log(pair, vec![*MINT_TOPIC, H256::zero()], &[5, 7])).unwrap();
        let burn = decode_log(&raw_log(
            pair,
            vec![*BURN_TOPIC, H256::zero(), H256::zero()],
            &[5, 7],
        ))
        .unwrap();

        assert_eq!(mint.kind.reserve_deltas(), Some((BigInt::from(5), BigInt::from(7))));
        assert_eq!(burn.kind.reserve_deltas(), Some((BigInt::from(-5), BigInt::from(-7))));
    }

    #[test]
    fn test_sync_has_no_deltas() {
        let log = raw_log(Address::from_low_u64_be(1), vec![*SYNC_TOPIC], &[10, 20]);
        let decoded = decode_log(&log).unwrap();
        assert_eq!(
            decoded.kind,
            LogKind::Sync {
                reserve0: BigUint::from(10u32),
                reserve1: BigUint::from(20u32)
            }
        );
        assert_eq!(decoded.kind.reserve_deltas(), None);
    }

    #[test]
    fn test_pair_created() {
        let factory = Address::from_low_u64_be(0xfac);
        let token0 = Address::from_low_u64_be(1);
        let token1 = Address::from_low_u64_be(2);
        let pair = Address::from_low_u64_be(0x1000);

        let mut data = Vec::new();
        data.extend_from_slice(H256::from(pair).as_bytes());
        data.extend_from_slice(&word(3));
        let log = Log {
            address: factory,
            topics: vec![*PAIR_CREATED_TOPIC, address_topic(token0), address_topic(token1)],
            data: Bytes::from(data),
            ..Default::default()
        };

        let decoded = decode_log(&log).unwrap();
        assert_eq!(decoded.address, factory);
        assert_eq!(decoded.block, None);
        assert_eq!(
            decoded.kind,
            LogKind::PairCreated {
                token0,
                token1,
                pair,
                index: BigUint::from(3u32)
            }
        );
    }

    #[test]
    fn test_malformed_logs() {
        let address = Address::from_low_u64_be(1);
        assert_eq!(
            decode_log(&raw_log(address, vec![], &[])),
            Err(DecodeError::NoTopics)
        );
        assert_eq!(
            decode_log(&raw_log(address, vec![*SYNC_TOPIC], &[10])),
            Err(DecodeError::ShortData {
                event: "Sync",
                expected: 64,
                actual: 32
            })
        );
        assert_eq!(
            decode_log(&raw_log(address, vec![*PAIR_CREATED_TOPIC], &[1, 2])),
            Err(DecodeError::MissingTopics {
                event: "PairCreated",
                expected: 3,
                actual: 1
            })
        );
        assert!(matches!(
            decode_log(&raw_log(address, vec![H256::repeat_byte(0xee)], &[])),
            Err(DecodeError::UnknownTopic(_))
        ));
    }
}
