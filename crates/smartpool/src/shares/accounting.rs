use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use ethereum_types::U256;
use tokio::sync::Mutex;
use tracing::debug;

use super::types::Share;

#[derive(Default)]
struct Window {
    open: BTreeMap<U256, Share>,
    // counters already folded into a claim, with the time the share was accepted
    claimed: HashMap<U256, DateTime<Utc>>,
}

/// Accepted shares waiting to be claimed, in canonical (counter) order.
///
/// A share is counted at most once: after it is frozen into a claim its
/// counter is remembered, so resubmitting the same solution is not recorded
/// again.
#[derive(Default)]
pub struct ShareAccounting {
    window: Mutex<Window>,
}

impl ShareAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false for rejected, already recorded or already claimed shares.
    pub async fn record(&self, share: Share) -> bool {
        if !share.is_accepted() {
            return false;
        }
        let mut window = self.window.lock().await;
        let counter = share.counter();
        if window.open.contains_key(&counter) || window.claimed.contains_key(&counter) {
            debug!("Duplicate share {:#x} ignored", share.digest());
            return false;
        }
        window.open.insert(counter, share);
        true
    }

    /// Takes every share with difficulty in `[min, max]` out of the window, in
    /// canonical order. Shares recorded afterwards belong to the next claim.
    /// Nothing is taken unless at least `min_shares` qualify.
    pub async fn freeze(&self, min: U256, max: U256, min_shares: usize) -> Option<Vec<Share>> {
        let mut window = self.window.lock().await;

        let eligible = window.open.values().filter(|s| in_range(s, min, max)).count();
        if eligible == 0 || eligible < min_shares {
            debug!(
                "{} of {} shares eligible, not claiming yet",
                eligible,
                window.open.len()
            );
            return None;
        }

        let (frozen, kept): (BTreeMap<_, _>, BTreeMap<_, _>) = std::mem::take(&mut window.open)
            .into_iter()
            .partition(|(_, s)| in_range(s, min, max));
        window.open = kept;
        for (counter, share) in &frozen {
            window.claimed.insert(*counter, share.accepted_at());
        }

        Some(frozen.into_values().collect())
    }

    /// Returns shares from a claim that never made it on chain.
    pub async fn restore(&self, shares: Vec<Share>) {
        let mut window = self.window.lock().await;
        for share in shares {
            let counter = share.counter();
            window.claimed.remove(&counter);
            window.open.entry(counter).or_insert(share);
        }
    }

    /// Forgets claimed shares accepted before `now - max_age`. Their work has
    /// been pruned by then, so they can no longer be resubmitted.
    pub async fn prune_claimed(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut window = self.window.lock().await;
        let before = window.claimed.len();
        window.claimed.retain(|_, accepted_at| *accepted_at >= cutoff);
        before - window.claimed.len()
    }

    pub async fn len(&self) -> usize {
        self.window.lock().await.open.len()
    }

    pub async fn claimed_len(&self) -> usize {
        self.window.lock().await.claimed.len()
    }
}

fn in_range(share: &Share, min: U256, max: U256) -> bool {
    let d = share.share_difficulty();
    d >= min && d <= max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::SolutionState;
    use crate::test_utils::share;

    #[tokio::test]
    async fn duplicates_and_rejected_shares_are_not_recorded() {
        let accounting = ShareAccounting::new();
        assert!(accounting.record(share(1, 100, SolutionState::ValidShare)).await);
        assert!(!accounting.record(share(1, 100, SolutionState::ValidShare)).await);
        assert!(!accounting.record(share(2, 100, SolutionState::Invalid)).await);
        assert!(accounting.record(share(3, 100, SolutionState::FullBlockSolution)).await);
        assert_eq!(accounting.len().await, 2);
    }

    #[tokio::test]
    async fn freeze_takes_only_shares_in_range() {
        let accounting = ShareAccounting::new();
        for (nonce, diff) in [(1, 50), (2, 100), (3, 150), (4, 200), (5, 250)] {
            accounting.record(share(nonce, diff, SolutionState::ValidShare)).await;
        }

        let frozen = accounting
            .freeze(U256::from(100u64), U256::from(200u64), 1)
            .await
            .unwrap();
        assert_eq!(frozen.len(), 3);
        assert!(frozen
            .windows(2)
            .all(|pair| pair[0].counter() < pair[1].counter()));
        assert_eq!(accounting.len().await, 2);
    }

    #[tokio::test]
    async fn freeze_waits_for_enough_shares() {
        let accounting = ShareAccounting::new();
        accounting.record(share(1, 100, SolutionState::ValidShare)).await;

        assert!(accounting.freeze(U256::zero(), U256::max_value(), 2).await.is_none());
        assert_eq!(accounting.len().await, 1);
        assert!(accounting.freeze(U256::from(500u64), U256::max_value(), 0).await.is_none());
    }

    #[tokio::test]
    async fn shares_after_freeze_go_to_next_window() {
        let accounting = ShareAccounting::new();
        accounting.record(share(1, 100, SolutionState::ValidShare)).await;
        let frozen = accounting.freeze(U256::zero(), U256::max_value(), 1).await.unwrap();
        accounting.record(share(2, 100, SolutionState::ValidShare)).await;

        assert_eq!(frozen.len(), 1);
        assert_eq!(accounting.len().await, 1);

        accounting.restore(frozen).await;
        assert_eq!(accounting.len().await, 2);
    }

    #[tokio::test]
    async fn claimed_share_is_not_counted_again() {
        let accounting = ShareAccounting::new();
        assert!(accounting.record(share(2, 100, SolutionState::ValidShare)).await);
        let first = accounting.freeze(U256::zero(), U256::max_value(), 1).await.unwrap();
        assert_eq!(first.len(), 1);

        assert!(!accounting.record(share(2, 100, SolutionState::ValidShare)).await);
        assert!(accounting.freeze(U256::zero(), U256::max_value(), 1).await.is_none());
        assert_eq!(accounting.claimed_len().await, 1);
    }

    #[tokio::test]
    async fn restored_shares_are_claimable_again() {
        let accounting = ShareAccounting::new();
        accounting.record(share(1, 100, SolutionState::ValidShare)).await;
        let frozen = accounting.freeze(U256::zero(), U256::max_value(), 1).await.unwrap();
        accounting.restore(frozen).await;
        assert_eq!(accounting.claimed_len().await, 0);

        let again = accounting.freeze(U256::zero(), U256::max_value(), 1).await.unwrap();
        assert_eq!(again.len(), 1);
    }

    #[tokio::test]
    async fn old_claimed_counters_are_forgotten() {
        let accounting = ShareAccounting::new();
        accounting.record(share(1, 100, SolutionState::ValidShare)).await;
        accounting.freeze(U256::zero(), U256::max_value(), 1).await.unwrap();

        assert_eq!(accounting.prune_claimed(Duration::hours(1)).await, 0);
        assert_eq!(accounting.prune_claimed(Duration::seconds(-1)).await, 1);
        assert!(accounting.record(share(1, 100, SolutionState::ValidShare)).await);
    }
}
