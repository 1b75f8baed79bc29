use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::claims::{ClaimProtocol, DatasetProver};
use crate::config::PoolConfig;
use crate::coordinator::SmartPool;
use crate::database::{ClaimStore, MemoryClaimStore, RedisStore};
use crate::error::Result;
use crate::ledger::{Ledger, NodeSigner, Signer};
use crate::metrics::serve_metrics;
use crate::rpc::{JsonRpcClient, RpcLedger, RpcNode};
use crate::service::{NetworkClient, PoolService};
use crate::shares::{EthashVerifier, PowHasher, PowVerifier, ShareAccounting};
use crate::work::WorkRegistry;

/// The running pool: work refresh, claim loop and metrics endpoint around one
/// [`SmartPool`]. Miner transport sits on top of [`PoolRuntime::service`].
pub struct PoolRuntime {
    pool: SmartPool,
    config: PoolConfig,
}

impl PoolRuntime {
    pub fn new(
        config: PoolConfig,
        node: Arc<dyn NetworkClient>,
        ledger: Arc<dyn Ledger>,
        signer: Arc<dyn Signer>,
        verifier: Arc<dyn PowVerifier>,
        prover: Arc<dyn DatasetProver>,
        store: Arc<dyn ClaimStore>,
    ) -> Self {
        let registry = Arc::new(WorkRegistry::new(verifier));
        let service = Arc::new(PoolService::new(
            node,
            registry,
            Arc::new(ShareAccounting::new()),
            config.share_difficulty,
        ));
        let protocol = ClaimProtocol::new(ledger, signer, config.watch_settings());
        let pool = SmartPool::new(config.clone(), protocol, service, store, prover);
        Self { pool, config }
    }

    /// Wires the pool to the node at `config.rpc_url`. The node's unlocked
    /// miner account signs, and claims are kept in Redis when a URL is set.
    pub async fn connect<H>(
        config: PoolConfig,
        hasher: H,
        prover: Arc<dyn DatasetProver>,
    ) -> Result<Self>
    where
        H: PowHasher + 'static,
    {
        config.validate()?;
        let client = Arc::new(JsonRpcClient::new(config.rpc_url.clone(), config.rpc_timeout)?);
        let node = Arc::new(RpcNode::new(client.clone()));
        let ledger = Arc::new(RpcLedger::new(client, config.contract_address));
        let signer = Arc::new(NodeSigner::new(
            config.miner_address,
            config.gas_price,
            config.gas_limit,
        ));
        let store: Arc<dyn ClaimStore> = match &config.redis_url {
            Some(url) => Arc::new(RedisStore::new(url).await?),
            None => Arc::new(MemoryClaimStore::new()),
        };
        let verifier = Arc::new(EthashVerifier::new(hasher));

        Ok(Self::new(config, node, ledger, signer, verifier, prover, store))
    }

    pub fn pool(&self) -> &SmartPool {
        &self.pool
    }

    pub fn service(&self) -> &Arc<PoolService> {
        self.pool.service()
    }

    /// Registers the miner if needed, then refreshes work, serves metrics and
    /// claims until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.pool.ensure_registered().await?;

        let (stop, stopped) = watch::channel(());
        let metrics = match self.config.metrics_addr {
            Some(addr) => {
                let listener = TcpListener::bind(addr).await?;
                let mut stopped = stopped.clone();
                Some(tokio::spawn(serve_metrics(listener, async move {
                    let _ = stopped.changed().await;
                })))
            }
            None => None,
        };
        let refresher = tokio::spawn(refresh_work(
            self.service().clone(),
            self.config.work_refresh,
            stopped,
        ));

        info!("Pool running for miner {:#x}", self.pool.protocol().miner());
        self.pool.run(shutdown).await;

        let _ = stop.send(());
        if let Err(e) = refresher.await {
            error!("Work refresh task failed: {}", e);
        }
        if let Some(metrics) = metrics {
            match metrics.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Metrics endpoint failed: {}", e),
                Err(e) => error!("Metrics task failed: {}", e),
            }
        }
        Ok(())
    }
}

async fn refresh_work(
    service: Arc<PoolService>,
    every: Duration,
    mut stopped: watch::Receiver<()>,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stopped.changed() => return,
            _ = interval.tick() => {
                if let Err(e) = service.get_work().await {
                    warn!("Failed to refresh work: {}", e);
                }
            }
        }
    }
}
