use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::ClaimStore;
use crate::claims::ClaimRecord;
use crate::error::Result;

const CLAIM_INDEX_KEY: &str = "claims:index";

pub struct RedisStore {
    conn: Mutex<ConnectionManager>,
}

impl RedisStore {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn claim_key(id: Uuid) -> String {
    format!("claim:{}", id)
}

#[async_trait]
impl ClaimStore for RedisStore {
    async fn save_claim(&self, record: &ClaimRecord) -> Result<()> {
        let key = claim_key(record.claim.id);
        let json = serde_json::to_string(record)?;
        let score = record.claim.created_at.timestamp_millis();

        let mut conn = self.conn.lock().await;
        let _: () = conn.set(&key, json).await?;
        let _: () = conn
            .zadd(CLAIM_INDEX_KEY, record.claim.id.to_string(), score)
            .await?;

        debug!("Saved claim {} with {} shares", record.claim.id, record.shares.len());
        Ok(())
    }

    async fn get_claim(&self, id: Uuid) -> Result<Option<ClaimRecord>> {
        let mut conn = self.conn.lock().await;
        let data: Option<String> = conn.get(claim_key(id)).await?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn recent_claims(&self, limit: usize) -> Result<Vec<ClaimRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.lock().await;
        let ids: Vec<String> = conn
            .zrevrange(CLAIM_INDEX_KEY, 0, limit as isize - 1)
            .await?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let data: Option<String> = conn.get(format!("claim:{}", id)).await?;
            if let Some(json) = data {
                records.push(serde_json::from_str(&json)?);
            }
        }

        Ok(records)
    }
}
