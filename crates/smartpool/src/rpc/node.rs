use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use ethereum_types::{Address, Bloom, H256, H64, U256, U64};
use rlp::RlpStream;
use serde::Deserialize;
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};
use tracing::{debug, warn};

use super::client::JsonRpcClient;
use crate::error::{PoolError, Result};
use crate::service::{NetworkClient, NodeWork};
use crate::shares::BlockHeader;

/// Work and pending block are read in separate calls; a new block between them
/// makes the pair disagree, so the pair is fetched again.
const WORK_ATTEMPTS: usize = 3;

/// The header fields of `eth_getBlockByNumber("pending")`. Mix digest and
/// nonce are not part of the sealed header, and nodes may null out `miner`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingBlock {
    parent_hash: H256,
    sha3_uncles: H256,
    miner: Option<Address>,
    state_root: H256,
    transactions_root: H256,
    receipts_root: H256,
    logs_bloom: Bloom,
    difficulty: U256,
    number: Option<U64>,
    gas_limit: U256,
    gas_used: U256,
    timestamp: U64,
    extra_data: String,
    #[serde(default)]
    base_fee_per_gas: Option<U256>,
}

impl PendingBlock {
    /// RLP of the header without mix digest and nonce. Its keccak is the
    /// hash miners search a nonce for.
    fn seal_rlp(&self, coinbase: Address) -> Result<Vec<u8>> {
        let number = self.number()?;
        let extra_data = hex::decode(self.extra_data.trim_start_matches("0x"))
            .map_err(|e| malformed(format!("extraData: {}", e)))?;

        let fields = if self.base_fee_per_gas.is_some() { 14 } else { 13 };
        let mut stream = RlpStream::new_list(fields);
        stream
            .append(&self.parent_hash)
            .append(&self.sha3_uncles)
            .append(&coinbase)
            .append(&self.state_root)
            .append(&self.transactions_root)
            .append(&self.receipts_root)
            .append(&self.logs_bloom)
            .append(&self.difficulty)
            .append(&number)
            .append(&self.gas_limit)
            .append(&self.gas_used)
            .append(&self.timestamp.as_u64())
            .append(&extra_data);
        if let Some(base_fee) = &self.base_fee_per_gas {
            stream.append(base_fee);
        }
        Ok(stream.out().to_vec())
    }

    fn number(&self) -> Result<u64> {
        self.number
            .map(|n| n.as_u64())
            .ok_or_else(|| malformed("pending block has no number"))
    }
}

pub fn seal_hash(rlp: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(rlp))
}

/// An Ethereum node serving `eth_getWork` for the pool's coinbase.
pub struct RpcNode {
    client: Arc<JsonRpcClient>,
}

impl RpcNode {
    pub fn new(client: Arc<JsonRpcClient>) -> Self {
        Self { client }
    }

    async fn pending_header(&self) -> Result<BlockHeader> {
        let block: PendingBlock = self
            .client
            .call("eth_getBlockByNumber", vec![json!("pending"), json!(false)])
            .await?;
        let coinbase = match block.miner {
            Some(miner) => miner,
            None => self.client.call("eth_coinbase", vec![]).await?,
        };

        Ok(BlockHeader {
            number: block.number()?,
            timestamp: block.timestamp.as_u64(),
            difficulty: block.difficulty,
            rlp: block.seal_rlp(coinbase)?,
        })
    }
}

#[async_trait]
impl NetworkClient for RpcNode {
    /// Only returns work whose pending header hashes to the PoW hash, so
    /// every share the pool accepts can be proven on chain.
    async fn get_work(&self) -> Result<NodeWork> {
        let mut last = H256::zero();
        for attempt in 1..=WORK_ATTEMPTS {
            let work: Vec<String> = self.client.call("eth_getWork", vec![]).await?;
            let (pow_hash, seed_hash) = parse_work(&work)?;
            let header = self.pending_header().await?;

            if seal_hash(&header.rlp) == pow_hash {
                debug!("Node work {:#x} at height {}", pow_hash, header.number);
                return Ok(NodeWork {
                    header,
                    pow_hash,
                    seed_hash,
                });
            }
            debug!(
                "Pending block {} does not match work {:#x} (attempt {})",
                header.number, pow_hash, attempt
            );
            last = pow_hash;
        }

        warn!("Node keeps serving work {:#x} without a matching header", last);
        Err(PoolError::HeaderMismatch(last))
    }

    async fn submit_work(&self, nonce: H64, pow_hash: H256, mix_digest: H256) -> Result<bool> {
        let params = vec![json!(nonce), json!(pow_hash), json!(mix_digest)];
        self.client.call("eth_submitWork", params).await
    }

    async fn submit_hashrate(&self, rate: U256, id: H256) -> Result<bool> {
        let params = vec![Value::String(format!("{:#x}", rate)), json!(id)];
        self.client.call("eth_submitHashrate", params).await
    }
}

fn malformed(message: impl Into<String>) -> PoolError {
    PoolError::RpcResponse {
        code: 0,
        message: message.into(),
    }
}

fn parse_hash(value: &str) -> Result<H256> {
    H256::from_str(value).map_err(|e| malformed(format!("bad hash {}: {}", value, e)))
}

/// `eth_getWork` answers `[pow hash, seed hash, boundary, ...]`; the node's
/// boundary is ignored since the pool sets its own.
fn parse_work(work: &[String]) -> Result<(H256, H256)> {
    match work {
        [pow_hash, seed_hash, _boundary, ..] => Ok((parse_hash(pow_hash)?, parse_hash(seed_hash)?)),
        _ => Err(malformed(format!("eth_getWork returned {} fields", work.len()))),
    }
}
