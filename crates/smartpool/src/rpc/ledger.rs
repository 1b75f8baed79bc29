use std::sync::Arc;

use async_trait::async_trait;
use ethereum_types::{Address, U256, U64};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::abi::{decode_bool, decode_string, decode_uint, encode_call, Token};
use super::client::JsonRpcClient;
use crate::claims::{Claim, ClaimProof, EpochData};
use crate::error::{PoolError, Result};
use crate::ledger::{Authorization, Ledger, TxHash, TxState};

const VERSION: &str = "version()";
const IS_REGISTERED: &str = "isRegistered(address)";
const CAN_REGISTER: &str = "canRegister(address)";
const GET_CLAIM_SEED: &str = "getClaimSeed(address)";
const REGISTER: &str = "register(address)";
const SUBMIT_CLAIM: &str = "submitClaim(uint256,uint256,uint256,uint256,uint256)";
const VERIFY_CLAIM: &str =
    "verifyClaim(bytes,uint256,uint256,uint256[],uint256[],uint256[],uint256[])";
const SET_EPOCH_DATA: &str = "setEpochData(uint128[],uint64[],uint64[],uint256[])";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Receipt {
    block_number: Option<U64>,
    status: Option<U64>,
}

/// The pool contract reached through a node's JSON-RPC. Writes use
/// `eth_sendTransaction`, so the sending account must be unlocked on the node.
pub struct RpcLedger {
    client: Arc<JsonRpcClient>,
    contract: Address,
}

impl RpcLedger {
    pub fn new(client: Arc<JsonRpcClient>, contract: Address) -> Self {
        Self { client, contract }
    }

    async fn read(&self, call: &'static str, data: Vec<u8>) -> Result<Vec<u8>> {
        let params = vec![
            json!({ "to": format!("{:#x}", self.contract), "data": hex_data(&data) }),
            json!("latest"),
        ];
        let output: String = self
            .client
            .call("eth_call", params)
            .await
            .map_err(|e| PoolError::ledger(call, e))?;
        hex::decode(output.trim_start_matches("0x")).map_err(|e| PoolError::ledger(call, e))
    }

    async fn send(
        &self,
        call: &'static str,
        auth: &Authorization,
        data: Vec<u8>,
    ) -> Result<TxHash> {
        let tx = transaction_object(auth, self.contract, &data);
        debug!("Sending {} from {:#x}", call, auth.from);
        self.client
            .call("eth_sendTransaction", vec![tx])
            .await
            .map_err(|e| PoolError::ledger(call, e))
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn version(&self) -> Result<String> {
        let output = self.read("version", encode_call(VERSION, &[])).await?;
        decode_string(&output)
    }

    async fn is_registered(&self, miner: Address) -> Result<bool> {
        let data = encode_call(IS_REGISTERED, &[Token::Address(miner)]);
        decode_bool(&self.read("isRegistered", data).await?)
    }

    async fn can_register(&self, miner: Address) -> Result<bool> {
        let data = encode_call(CAN_REGISTER, &[Token::Address(miner)]);
        decode_bool(&self.read("canRegister", data).await?)
    }

    async fn claim_seed(&self, miner: Address) -> Result<U256> {
        let data = encode_call(GET_CLAIM_SEED, &[Token::Address(miner)]);
        decode_uint(&self.read("getClaimSeed", data).await?)
    }

    async fn register(&self, auth: &Authorization, payment_address: Address) -> Result<TxHash> {
        let data = encode_call(REGISTER, &[Token::Address(payment_address)]);
        self.send("register", auth, data).await
    }

    async fn submit_claim(&self, auth: &Authorization, claim: &Claim) -> Result<TxHash> {
        self.send("submitClaim", auth, submit_claim_data(claim)).await
    }

    async fn verify_claim(&self, auth: &Authorization, proof: &ClaimProof) -> Result<TxHash> {
        self.send("verifyClaim", auth, verify_claim_data(proof)).await
    }

    async fn set_epoch_data(&self, auth: &Authorization, data: &EpochData) -> Result<TxHash> {
        self.send("setEpochData", auth, epoch_data_call(data)).await
    }

    async fn transaction_state(&self, tx: TxHash) -> Result<TxState> {
        let receipt: Option<Receipt> = self
            .client
            .call_optional("eth_getTransactionReceipt", vec![json!(tx)])
            .await?;
        if let Some(receipt) = receipt {
            return Ok(receipt_state(&receipt));
        }

        let known: Option<Value> = self
            .client
            .call_optional("eth_getTransactionByHash", vec![json!(tx)])
            .await?;
        Ok(if known.is_some() {
            TxState::Pending
        } else {
            TxState::Dropped
        })
    }
}

fn receipt_state(receipt: &Receipt) -> TxState {
    let Some(block) = receipt.block_number.map(|b| b.as_u64()) else {
        return TxState::Pending;
    };
    match receipt.status {
        Some(status) if status.is_zero() => TxState::Reverted { block },
        _ => TxState::Confirmed { block },
    }
}

fn transaction_object(auth: &Authorization, to: Address, data: &[u8]) -> Value {
    let mut tx = Map::new();
    tx.insert("from".into(), json!(format!("{:#x}", auth.from)));
    tx.insert("to".into(), json!(format!("{:#x}", to)));
    tx.insert("data".into(), json!(hex_data(data)));
    if let Some(gas_price) = auth.gas_price {
        tx.insert("gasPrice".into(), json!(format!("{:#x}", gas_price)));
    }
    if let Some(gas) = auth.gas_limit {
        tx.insert("gas".into(), json!(format!("{:#x}", gas)));
    }
    Value::Object(tx)
}

fn submit_claim_data(claim: &Claim) -> Vec<u8> {
    encode_call(
        SUBMIT_CLAIM,
        &[
            Token::Uint(U256::from(claim.num_shares)),
            Token::Uint(claim.difficulty),
            Token::Uint(claim.min),
            Token::Uint(claim.max),
            Token::Uint(claim.aug_merkle),
        ],
    )
}

fn verify_claim_data(proof: &ClaimProof) -> Vec<u8> {
    encode_call(
        VERIFY_CLAIM,
        &[
            Token::Bytes(proof.rlp_header.clone()),
            Token::Uint(proof.nonce),
            Token::Uint(proof.share_index),
            Token::UintArray(proof.dataset_lookup.clone()),
            Token::UintArray(proof.witness_for_lookup.clone()),
            Token::UintArray(proof.aug_counters_branch.clone()),
            Token::UintArray(proof.aug_hashes_branch.clone()),
        ],
    )
}

fn epoch_data_call(data: &EpochData) -> Vec<u8> {
    let words = |values: &[u64]| values.iter().map(|v| U256::from(*v)).collect::<Vec<_>>();
    encode_call(
        SET_EPOCH_DATA,
        &[
            Token::UintArray(data.merkle_roots.clone()),
            Token::UintArray(words(&data.full_size_in_128_resolution)),
            Token::UintArray(words(&data.branch_depth)),
            Token::UintArray(data.epochs.clone()),
        ],
    )
}

fn hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}
