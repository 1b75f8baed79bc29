use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Ledger, TxHash, TxState};
use crate::error::{PoolError, Result};
use crate::metrics::TX_CONFIRMATION_SECONDS;

#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Pending,
    Confirmed { block: u64 },
    Failed,
}

/// Polls the ledger until a transaction is mined, reverted, dropped, or the
/// deadline passes.
pub struct TransactionWatcher {
    ledger: Arc<dyn Ledger>,
    tx: TxHash,
    settings: WatchSettings,
    state: WatchState,
}

impl TransactionWatcher {
    pub fn new(ledger: Arc<dyn Ledger>, tx: TxHash, settings: WatchSettings) -> Self {
        Self {
            ledger,
            tx,
            settings,
            state: WatchState::Pending,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub async fn wait(&mut self) -> Result<u64> {
        let started = Instant::now();
        let deadline = started + self.settings.timeout;

        loop {
            match self.ledger.transaction_state(self.tx).await {
                Ok(TxState::Confirmed { block }) => {
                    self.state = WatchState::Confirmed { block };
                    TX_CONFIRMATION_SECONDS.observe(started.elapsed().as_secs_f64());
                    info!("Tx {:#x} confirmed in block {}", self.tx, block);
                    return Ok(block);
                }
                Ok(TxState::Reverted { block }) => {
                    self.state = WatchState::Failed;
                    warn!("Tx {:#x} reverted in block {}", self.tx, block);
                    return Err(PoolError::TransactionFailed(self.tx));
                }
                Ok(TxState::Dropped) => {
                    self.state = WatchState::Failed;
                    warn!("Tx {:#x} dropped", self.tx);
                    return Err(PoolError::TransactionDropped(self.tx));
                }
                Ok(TxState::Pending) => {
                    debug!("Tx {:#x} still pending", self.tx);
                }
                Err(e) => {
                    warn!("Failed to query tx {:#x}: {}", self.tx, e);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PoolError::ConfirmationTimeout {
                    tx: self.tx,
                    waited: now - started,
                });
            }
            tokio::time::sleep(self.settings.poll_interval.min(deadline - now)).await;
        }
    }
}
