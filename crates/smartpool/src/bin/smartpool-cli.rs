use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smartpool::{
    claims::ClaimProtocol,
    database::{ClaimStore, RedisStore},
    ledger::NodeSigner,
    metrics::register_metrics,
    rpc::{JsonRpcClient, RpcLedger, RpcNode},
    NetworkClient, PoolArgs, PoolConfig,
};

#[derive(Parser, Debug)]
#[clap(name = "smartpool-cli")]
#[clap(about = "Operator tool for a SmartPool contract", long_about = None)]
struct Args {
    #[clap(flatten)]
    pool: PoolArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Contract version and registration state of the miner
    Status,
    /// Register the miner with the contract
    Register,
    /// Current claim seed for the miner
    ClaimSeed,
    /// Current node work, checked against its pending header
    Work,
    /// Recently submitted claims
    Claims {
        #[clap(long, default_value = "10")]
        limit: usize,
    },
}

fn client(config: &PoolConfig) -> anyhow::Result<Arc<JsonRpcClient>> {
    Ok(Arc::new(JsonRpcClient::new(config.rpc_url.clone(), config.rpc_timeout)?))
}

fn protocol(config: &PoolConfig) -> anyhow::Result<ClaimProtocol> {
    let ledger = Arc::new(RpcLedger::new(client(config)?, config.contract_address));
    let signer = Arc::new(NodeSigner::new(
        config.miner_address,
        config.gas_price,
        config.gas_limit,
    ));
    Ok(ClaimProtocol::new(ledger, signer, config.watch_settings()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    register_metrics()?;

    let config = PoolConfig::from(args.pool);
    config.validate()?;
    info!("Using contract {:#x} via {}", config.contract_address, config.rpc_url);

    match args.command {
        Command::Status => {
            let protocol = protocol(&config)?;
            println!("contract version: {}", protocol.version().await?);
            println!("miner:            {:#x}", protocol.miner());
            println!("registered:       {}", protocol.is_registered().await?);
            println!("can register:     {}", protocol.can_register().await?);
        }
        Command::Register => {
            let protocol = protocol(&config)?;
            if protocol.is_registered().await? {
                println!("{:#x} is already registered", protocol.miner());
                return Ok(());
            }
            if !protocol.can_register().await? {
                bail!("{:#x} is not allowed to register", protocol.miner());
            }
            protocol
                .register(config.payment_address)
                .await
                .context("registration failed")?;
            println!(
                "registered {:#x}, paying to {:#x}",
                protocol.miner(),
                config.payment_address
            );
        }
        Command::ClaimSeed => {
            let protocol = protocol(&config)?;
            println!("{:#x}", protocol.get_claim_seed().await?);
        }
        Command::Work => {
            let work = RpcNode::new(client(&config)?).get_work().await?;
            println!("pow hash:   {:#x}", work.pow_hash);
            println!("seed hash:  {:#x}", work.seed_hash);
            println!("height:     {}", work.header.number);
            println!("difficulty: {}", work.header.difficulty);
        }
        Command::Claims { limit } => {
            let url = config
                .redis_url
                .as_deref()
                .context("--redis-url is required to list claims")?;
            let store = RedisStore::new(url).await?;
            for record in store.recent_claims(limit).await? {
                println!("{}", serde_json::to_string(&record.claim)?);
            }
        }
    }

    Ok(())
}
