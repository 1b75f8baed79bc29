pub mod redis_store;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::claims::ClaimRecord;
use crate::error::Result;

pub use redis_store::RedisStore;

/// History of submitted claims and the shares behind them.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    async fn save_claim(&self, record: &ClaimRecord) -> Result<()>;
    async fn get_claim(&self, id: Uuid) -> Result<Option<ClaimRecord>>;
    /// Most recent first.
    async fn recent_claims(&self, limit: usize) -> Result<Vec<ClaimRecord>>;
}

#[derive(Default)]
pub struct MemoryClaimStore {
    records: RwLock<Vec<ClaimRecord>>,
}

impl MemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClaimStore for MemoryClaimStore {
    async fn save_claim(&self, record: &ClaimRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.retain(|r| r.claim.id != record.claim.id);
        records.push(record.clone());
        records.sort_by_key(|r| r.claim.created_at);
        Ok(())
    }

    async fn get_claim(&self, id: Uuid) -> Result<Option<ClaimRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.claim.id == id).cloned())
    }

    async fn recent_claims(&self, limit: usize) -> Result<Vec<ClaimRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}
