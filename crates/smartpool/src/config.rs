use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use clap::Args;
use ethereum_types::{Address, U256};

use crate::ledger::WatchSettings;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub rpc_url: String,
    pub rpc_timeout: Duration,
    pub contract_address: Address,
    pub miner_address: Address,
    pub payment_address: Address,
    pub share_difficulty: U256,
    pub claim_interval: Duration,
    pub claim_min_difficulty: U256,
    pub claim_max_difficulty: U256,
    pub min_claim_shares: usize,
    pub work_max_age: Duration,
    /// How often fresh work is pulled from the node.
    pub work_refresh: Duration,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    pub gas_price: Option<U256>,
    pub gas_limit: Option<u64>,
    pub redis_url: Option<String>,
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            rpc_timeout: Duration::from_secs(30),
            contract_address: Address::zero(),
            miner_address: Address::zero(),
            payment_address: Address::zero(),
            share_difficulty: U256::from(100_000u64),
            claim_interval: Duration::from_secs(3600),
            claim_min_difficulty: U256::one(),
            claim_max_difficulty: U256::max_value(),
            min_claim_shares: 1,
            work_max_age: Duration::from_secs(600),
            work_refresh: Duration::from_secs(1),
            confirmation_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(2),
            gas_price: Some(U256::from(10_000_000_000u64)),
            gas_limit: None,
            redis_url: None,
            metrics_addr: None,
        }
    }
}

impl PoolConfig {
    pub fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            poll_interval: self.poll_interval,
            timeout: self.confirmation_timeout,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.share_difficulty.is_zero() {
            return Err(crate::PoolError::Configuration(
                "share difficulty must be positive".to_string(),
            ));
        }
        if self.claim_min_difficulty > self.claim_max_difficulty {
            return Err(crate::PoolError::Configuration(format!(
                "claim difficulty range is empty: {} > {}",
                self.claim_min_difficulty, self.claim_max_difficulty
            )));
        }
        if self.poll_interval.is_zero()
            || self.claim_interval.is_zero()
            || self.work_refresh.is_zero()
        {
            return Err(crate::PoolError::Configuration(
                "poll, claim and work refresh intervals must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Command line and environment settings, one per [`PoolConfig`] field.
#[derive(Args, Debug, Clone)]
pub struct PoolArgs {
    /// Node JSON-RPC endpoint
    #[clap(long, env = "SMARTPOOL_RPC_URL", default_value = "http://localhost:8545")]
    pub rpc_url: String,

    /// RPC request timeout in seconds
    #[clap(long, env = "SMARTPOOL_RPC_TIMEOUT", default_value = "30")]
    pub rpc_timeout: u64,

    /// Pool contract address
    #[clap(long, env = "SMARTPOOL_CONTRACT", value_parser = parse_address)]
    pub contract: Address,

    /// Miner account, unlocked on the node
    #[clap(long, env = "SMARTPOOL_MINER", value_parser = parse_address)]
    pub miner: Address,

    /// Address receiving the pool's payouts; defaults to the miner account
    #[clap(long, env = "SMARTPOOL_PAYMENT_ADDRESS", value_parser = parse_address)]
    pub payment_address: Option<Address>,

    /// Difficulty of the work handed to miners
    #[clap(
        long,
        env = "SMARTPOOL_SHARE_DIFFICULTY",
        default_value = "100000",
        value_parser = parse_u256
    )]
    pub share_difficulty: U256,

    /// Seconds between claims
    #[clap(long, env = "SMARTPOOL_CLAIM_INTERVAL", default_value = "3600")]
    pub claim_interval: u64,

    /// Lowest share difficulty counted in a claim
    #[clap(
        long,
        env = "SMARTPOOL_CLAIM_MIN_DIFFICULTY",
        default_value = "1",
        value_parser = parse_u256
    )]
    pub claim_min_difficulty: U256,

    /// Highest share difficulty counted in a claim; unbounded if unset
    #[clap(long, env = "SMARTPOOL_CLAIM_MAX_DIFFICULTY", value_parser = parse_u256)]
    pub claim_max_difficulty: Option<U256>,

    /// Shares needed before a claim is submitted
    #[clap(long, env = "SMARTPOOL_MIN_CLAIM_SHARES", default_value = "1")]
    pub min_claim_shares: usize,

    /// Seconds before outstanding work is pruned
    #[clap(long, env = "SMARTPOOL_WORK_MAX_AGE", default_value = "600")]
    pub work_max_age: u64,

    /// Milliseconds between work refreshes from the node
    #[clap(long, env = "SMARTPOOL_WORK_REFRESH_MS", default_value = "1000")]
    pub work_refresh_ms: u64,

    /// Gas price in wei
    #[clap(
        long,
        env = "SMARTPOOL_GAS_PRICE",
        default_value = "10000000000",
        value_parser = parse_u256
    )]
    pub gas_price: U256,

    /// Gas limit for contract calls; estimated by the node if unset
    #[clap(long, env = "SMARTPOOL_GAS_LIMIT")]
    pub gas_limit: Option<u64>,

    /// Seconds to wait for a transaction to be mined
    #[clap(long, env = "SMARTPOOL_CONFIRMATION_TIMEOUT", default_value = "600")]
    pub confirmation_timeout: u64,

    /// Seconds between receipt polls
    #[clap(long, env = "SMARTPOOL_POLL_INTERVAL", default_value = "2")]
    pub poll_interval: u64,

    /// Redis URL holding claim history
    #[clap(long, env = "SMARTPOOL_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Address serving Prometheus metrics
    #[clap(long, env = "SMARTPOOL_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

impl From<PoolArgs> for PoolConfig {
    fn from(args: PoolArgs) -> Self {
        PoolConfig {
            rpc_url: args.rpc_url,
            rpc_timeout: Duration::from_secs(args.rpc_timeout),
            contract_address: args.contract,
            miner_address: args.miner,
            payment_address: args.payment_address.unwrap_or(args.miner),
            share_difficulty: args.share_difficulty,
            claim_interval: Duration::from_secs(args.claim_interval),
            claim_min_difficulty: args.claim_min_difficulty,
            claim_max_difficulty: args.claim_max_difficulty.unwrap_or_else(U256::max_value),
            min_claim_shares: args.min_claim_shares,
            work_max_age: Duration::from_secs(args.work_max_age),
            work_refresh: Duration::from_millis(args.work_refresh_ms),
            confirmation_timeout: Duration::from_secs(args.confirmation_timeout),
            poll_interval: Duration::from_secs(args.poll_interval),
            gas_price: Some(args.gas_price),
            gas_limit: args.gas_limit,
            redis_url: args.redis_url,
            metrics_addr: args.metrics_addr,
        }
    }
}

fn parse_address(value: &str) -> Result<Address, String> {
    Address::from_str(value).map_err(|e| e.to_string())
}

/// Decimal, or hex with a 0x prefix.
fn parse_u256(value: &str) -> Result<U256, String> {
    match value.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| e.to_string()),
        None => U256::from_dec_str(value).map_err(|e| e.to_string()),
    }
}
