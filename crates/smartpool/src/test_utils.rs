//! Fixtures shared by the unit tests: deterministic hashing, an in-process
//! ledger and a scripted node.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use ethereum_types::{Address, H256, H64, U256};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::claims::merkle::u256_bytes;
use crate::claims::{
    verify_branch, AugBranch, AugNode, Claim, ClaimProof, DatasetLookup, DatasetProver, EpochData,
};
use crate::error::{PoolError, Result};
use crate::ledger::{Authorization, Ledger, Signer, TxHash, TxState, WatchSettings};
use crate::service::{NetworkClient, NodeWork};
use crate::shares::{
    share_digest, BlockHeader, PowHasher, PowOutput, Share, Solution, SolutionState,
};
use crate::work::WorkUnit;

pub const NETWORK_DIFFICULTY: u64 = 1_000_000;

pub fn nonce(n: u64) -> H64 {
    H64::from(n.to_be_bytes())
}

pub fn header(number: u64, difficulty: u64) -> BlockHeader {
    let mut rlp = vec![0xf9, 0x02, 0x10];
    rlp.extend_from_slice(&number.to_be_bytes());
    rlp.extend_from_slice(&difficulty.to_be_bytes());
    BlockHeader {
        number,
        timestamp: 1_700_000_000 + number * 13,
        difficulty: U256::from(difficulty),
        rlp,
    }
}

pub fn work_unit(id: &str, share_difficulty: u64) -> WorkUnit {
    WorkUnit::new(
        id,
        header(1, NETWORK_DIFFICULTY),
        H256::zero(),
        H256::zero(),
        U256::from(share_difficulty),
    )
    .unwrap()
}

pub fn solution_for(work_id: &str, n: u64) -> Solution {
    Solution {
        work_id: work_id.to_string(),
        nonce: nonce(n),
        hash: H256::zero(),
        mix_digest: FakeHasher::mix_for(n),
    }
}

pub fn share(n: u64, share_difficulty: u64, state: SolutionState) -> Share {
    Share::new(
        header(1, NETWORK_DIFFICULTY),
        nonce(n),
        FakeHasher::mix_for(n),
        U256::from(share_difficulty),
        state,
    )
}

pub fn node_work(number: u64, pow_byte: u8) -> NodeWork {
    NodeWork {
        header: header(number, NETWORK_DIFFICULTY),
        pow_hash: H256::repeat_byte(pow_byte),
        seed_hash: H256::zero(),
    }
}

pub fn fast_watch() -> WatchSettings {
    WatchSettings {
        poll_interval: Duration::from_millis(1),
        timeout: Duration::from_millis(200),
    }
}

/// Hash results by nonce. Unknown nonces hash to the largest value, which no
/// target accepts.
#[derive(Debug, Clone, Default)]
pub struct FakeHasher {
    results: HashMap<u64, U256>,
}

impl FakeHasher {
    pub fn set(&mut self, n: u64, result: U256) {
        self.results.insert(n, result);
    }

    pub fn mix_for(n: u64) -> H256 {
        let mut bytes = [0x6d; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        H256::from(bytes)
    }
}

impl PowHasher for FakeHasher {
    fn compute(&self, _header: &BlockHeader, nonce: H64) -> PowOutput {
        let n = u64::from_be_bytes(nonce.to_fixed_bytes());
        let result = self.results.get(&n).copied().unwrap_or_else(U256::max_value);
        PowOutput {
            mix_digest: Self::mix_for(n),
            result: H256::from(u256_bytes(result)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeProver;

impl DatasetProver for FakeProver {
    fn lookup(&self, share: &Share) -> Result<DatasetLookup> {
        Ok(DatasetLookup {
            lookup: vec![U256::from(share.header().number), share.counter()],
            witness: vec![U256::from_big_endian(share.nonce().as_bytes())],
        })
    }

    fn epoch_data(&self, epoch: u64) -> Result<EpochData> {
        Ok(EpochData::single(epoch, U256::from(epoch + 1), 1024, 20))
    }
}

#[derive(Debug, Clone)]
pub struct FixedSigner {
    address: Address,
}

impl Default for FixedSigner {
    fn default() -> Self {
        Self {
            address: Address::repeat_byte(0x5a),
        }
    }
}

impl Signer for FixedSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn authorize(&self) -> Result<Authorization> {
        Ok(Authorization {
            from: self.address,
            gas_price: None,
            gas_limit: None,
        })
    }
}

/// Outcome of one verification the mock contract ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub index: u64,
    pub valid: bool,
}

struct LedgerState {
    payments: HashMap<Address, Address>,
    can_register: bool,
    seed: Option<U256>,
    fail_writes: bool,
    write_attempts: usize,
    tx_count: u64,
    next_script: Option<Vec<TxState>>,
    scripts: HashMap<TxHash, VecDeque<TxState>>,
    polls: HashMap<TxHash, usize>,
    claims: Vec<Claim>,
    verifications: Vec<Verification>,
    epoch_data: Vec<EpochData>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            payments: HashMap::new(),
            can_register: true,
            seed: Some(U256::zero()),
            fail_writes: false,
            write_attempts: 0,
            tx_count: 0,
            next_script: None,
            scripts: HashMap::new(),
            polls: HashMap::new(),
            claims: Vec::new(),
            verifications: Vec::new(),
            epoch_data: Vec::new(),
        }
    }
}

/// An in-process pool contract. Transactions confirm on the first poll
/// unless scripted otherwise; a scripted sequence is replayed in order and its
/// last state repeats.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
}

impl MockLedger {
    pub async fn script_tx(&self, tx: TxHash, states: Vec<TxState>) {
        self.state.lock().await.scripts.insert(tx, states.into());
    }

    pub async fn script_next_tx(&self, states: Vec<TxState>) {
        self.state.lock().await.next_script = Some(states);
    }

    pub async fn polls(&self, tx: TxHash) -> usize {
        self.state.lock().await.polls.get(&tx).copied().unwrap_or(0)
    }

    pub async fn fail_writes(&self, fail: bool) {
        self.state.lock().await.fail_writes = fail;
    }

    pub async fn write_attempts(&self) -> usize {
        self.state.lock().await.write_attempts
    }

    pub async fn set_seed(&self, seed: Option<U256>) {
        self.state.lock().await.seed = seed;
    }

    pub async fn set_can_register(&self, can_register: bool) {
        self.state.lock().await.can_register = can_register;
    }

    pub async fn payment_address(&self, miner: Address) -> Option<Address> {
        self.state.lock().await.payments.get(&miner).copied()
    }

    pub async fn claims(&self) -> Vec<Claim> {
        self.state.lock().await.claims.clone()
    }

    pub async fn verifications(&self) -> Vec<Verification> {
        self.state.lock().await.verifications.clone()
    }

    pub async fn epoch_data(&self) -> Vec<EpochData> {
        self.state.lock().await.epoch_data.clone()
    }

    async fn write<F>(&self, call: &'static str, apply: F) -> Result<TxHash>
    where
        F: FnOnce(&mut LedgerState) -> Option<Vec<TxState>>,
    {
        let mut state = self.state.lock().await;
        state.write_attempts += 1;
        if state.fail_writes {
            return Err(PoolError::ledger(call, "connection refused"));
        }

        state.tx_count += 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&state.tx_count.to_be_bytes());
        let tx = H256::from(bytes);

        let script = apply(&mut *state).or_else(|| state.next_script.take());
        if let Some(states) = script {
            state.scripts.insert(tx, states.into());
        }
        Ok(tx)
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn version(&self) -> Result<String> {
        Ok("mock-0.1.0".to_string())
    }

    async fn is_registered(&self, miner: Address) -> Result<bool> {
        Ok(self.state.lock().await.payments.contains_key(&miner))
    }

    async fn can_register(&self, _miner: Address) -> Result<bool> {
        Ok(self.state.lock().await.can_register)
    }

    async fn claim_seed(&self, _miner: Address) -> Result<U256> {
        self.state
            .lock()
            .await
            .seed
            .ok_or_else(|| PoolError::ledger("getClaimSeed", "node unavailable"))
    }

    async fn register(&self, auth: &Authorization, payment_address: Address) -> Result<TxHash> {
        let miner = auth.from;
        self.write("register", move |state| {
            if !state.can_register {
                return Some(vec![TxState::Reverted { block: 1 }]);
            }
            state.payments.insert(miner, payment_address);
            None
        })
        .await
    }

    async fn submit_claim(&self, _auth: &Authorization, claim: &Claim) -> Result<TxHash> {
        let claim = claim.clone();
        self.write("submitClaim", move |state| {
            state.claims.push(claim);
            None
        })
        .await
    }

    async fn verify_claim(&self, _auth: &Authorization, proof: &ClaimProof) -> Result<TxHash> {
        let proof = proof.clone();
        self.write("verifyClaim", move |state| {
            let valid = match (state.claims.last(), state.seed) {
                (Some(claim), Some(seed)) => proof_matches(claim, seed, &proof),
                _ => false,
            };
            state.verifications.push(Verification {
                index: proof.share_index.low_u64(),
                valid,
            });
            (!valid).then(|| vec![TxState::Reverted { block: 1 }])
        })
        .await
    }

    async fn set_epoch_data(&self, _auth: &Authorization, data: &EpochData) -> Result<TxHash> {
        let data = data.clone();
        self.write("setEpochData", move |state| {
            state.epoch_data.push(data);
            None
        })
        .await
    }

    async fn transaction_state(&self, tx: TxHash) -> Result<TxState> {
        let mut state = self.state.lock().await;
        *state.polls.entry(tx).or_insert(0) += 1;
        let observed = match state.scripts.get_mut(&tx) {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().copied(),
            None => None,
        };
        Ok(observed.unwrap_or(TxState::Confirmed { block: 1 }))
    }
}

/// What the contract checks: the challenged index follows from the seed, and
/// the leaf rebuilt from header and nonce hashes up to the submitted root.
fn proof_matches(claim: &Claim, seed: U256, proof: &ClaimProof) -> bool {
    if claim.num_shares == 0 || proof.share_index != seed % U256::from(claim.num_shares) {
        return false;
    }
    let nonce = H64::from_slice(&u256_bytes(proof.nonce)[24..]);
    let digest = share_digest(&proof.rlp_header, nonce);
    let leaf = AugNode::leaf(U256::from_big_endian(digest.as_bytes()), digest);
    let branch = AugBranch {
        counters: proof.aug_counters_branch.clone(),
        hashes: proof.aug_hashes_branch.clone(),
    };
    verify_branch(
        leaf,
        proof.share_index.low_u64() as usize,
        &branch,
        H256::from(u256_bytes(claim.aug_merkle)),
    )
}

#[derive(Default)]
struct NodeState {
    work: Option<NodeWork>,
    failing: bool,
    submitted: Vec<(H64, H256, H256)>,
    hashrates: Vec<(U256, H256)>,
}

/// A node that hands out fixed work and records what it is sent.
#[derive(Default)]
pub struct MockNode {
    state: Mutex<NodeState>,
}

impl MockNode {
    pub fn with_work(work: NodeWork) -> Self {
        Self {
            state: Mutex::new(NodeState {
                work: Some(work),
                ..Default::default()
            }),
        }
    }

    pub async fn set_work(&self, work: NodeWork) {
        self.state.lock().await.work = Some(work);
    }

    pub async fn set_failing(&self, failing: bool) {
        self.state.lock().await.failing = failing;
    }

    pub async fn submitted(&self) -> Vec<(H64, H256, H256)> {
        self.state.lock().await.submitted.clone()
    }

    pub async fn hashrates(&self) -> Vec<(U256, H256)> {
        self.state.lock().await.hashrates.clone()
    }
}

fn unavailable() -> PoolError {
    PoolError::RpcResponse {
        code: -32000,
        message: "node unavailable".to_string(),
    }
}

#[async_trait]
impl NetworkClient for MockNode {
    async fn get_work(&self) -> Result<NodeWork> {
        let state = self.state.lock().await;
        if state.failing {
            return Err(unavailable());
        }
        state.work.clone().ok_or_else(|| PoolError::RpcResponse {
            code: -32000,
            message: "no mining work available yet".to_string(),
        })
    }

    async fn submit_work(&self, nonce: H64, pow_hash: H256, mix_digest: H256) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.failing {
            return Err(unavailable());
        }
        state.submitted.push((nonce, pow_hash, mix_digest));
        Ok(true)
    }

    async fn submit_hashrate(&self, rate: U256, id: H256) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.failing {
            return Err(unavailable());
        }
        state.hashrates.push((rate, id));
        Ok(true)
    }
}

/// A JSON-RPC answer served by wiremock. The request id is echoed back so the
/// client accepts the response.
pub struct RpcReply(std::result::Result<Value, (i32, String)>);

impl RpcReply {
    pub fn result(value: Value) -> Self {
        Self(Ok(value))
    }

    pub fn error(code: i32, message: &str) -> Self {
        Self(Err((code, message.to_string())))
    }
}

impl Respond for RpcReply {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id = request
            .body_json::<Value>()
            .ok()
            .and_then(|body| body.get("id").cloned())
            .unwrap_or(Value::Null);
        let body = match &self.0 {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err((code, message)) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": code, "message": message}
            }),
        };
        ResponseTemplate::new(200).set_body_json(body)
    }
}

/// Answers every call of `rpc_method` with `reply`.
pub async fn mock_rpc(server: &MockServer, rpc_method: &str, reply: RpcReply) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(reply)
        .mount(server)
        .await;
}

/// Answers the next `times` calls of `rpc_method` with `reply`, ahead of any
/// mock mounted later.
pub async fn mock_rpc_times(server: &MockServer, rpc_method: &str, reply: RpcReply, times: u64) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(reply)
        .up_to_n_times(times)
        .mount(server)
        .await;
}
