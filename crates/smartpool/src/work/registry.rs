use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::unit::WorkUnit;
use crate::metrics::OUTSTANDING_WORK;
use crate::shares::{PowVerifier, Share, Solution, SolutionState};

/// Outstanding work, keyed by work id.
///
/// Every mutation, including the lookup-classify-evict sequence in
/// [`WorkRegistry::accept_solution`], runs under one lock so a block can only
/// ever be reported once.
pub struct WorkRegistry {
    works: Mutex<HashMap<String, WorkUnit>>,
    verifier: Arc<dyn PowVerifier>,
}

impl WorkRegistry {
    pub fn new(verifier: Arc<dyn PowVerifier>) -> Self {
        Self {
            works: Mutex::new(HashMap::new()),
            verifier,
        }
    }

    pub async fn add_work(&self, work: WorkUnit) {
        let mut works = self.works.lock().await;
        debug!("Adding work {} (share difficulty {})", work.id(), work.share_difficulty());
        works.insert(work.id().to_string(), work);
        OUTSTANDING_WORK.set(works.len() as f64);
    }

    /// Returns `None` when the work is unknown, which is normal for stale or
    /// repeated submissions.
    pub async fn accept_solution(&self, solution: &Solution) -> Option<Share> {
        let mut works = self.works.lock().await;

        let Some(work) = works.get(&solution.work_id) else {
            warn!(
                "Work {} doesn't exist in registry ({} outstanding)",
                solution.work_id,
                works.len()
            );
            return None;
        };

        let share = work.accept_solution(solution, self.verifier.as_ref());
        match share.state() {
            SolutionState::FullBlockSolution => {
                works.remove(&solution.work_id);
                OUTSTANDING_WORK.set(works.len() as f64);
                info!("Full block solution for work {}", solution.work_id);
            }
            SolutionState::Invalid => {
                warn!(
                    "Solution with nonce {:#x} for work {} is invalid",
                    solution.nonce, solution.work_id
                );
            }
            SolutionState::ValidShare => {}
        }

        Some(share)
    }

    pub async fn contains(&self, work_id: &str) -> bool {
        self.works.lock().await.contains_key(work_id)
    }

    pub async fn len(&self) -> usize {
        self.works.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.works.lock().await.is_empty()
    }

    /// Drops work issued more than `max_age` ago.
    pub async fn prune(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut works = self.works.lock().await;
        let before = works.len();
        works.retain(|_, work| work.issued_at() >= cutoff);
        OUTSTANDING_WORK.set(works.len() as f64);
        before - works.len()
    }
}
