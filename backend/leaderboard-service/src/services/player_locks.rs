// ============================================
// Per-player update serialization
// ============================================
//
// Score updates are read-modify-write against the index. Holding a
// per-player async mutex across that round trip makes concurrent
// increments to one player additive within this process. Writers in other
// processes are not covered.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct PlayerLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl PlayerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, player_id: &str) -> PlayerLockGuard {
        let lock = self
            .locks
            .entry(player_id.to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;

        PlayerLockGuard {
            locks: self.locks.clone(),
            player_id: player_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Players with a held or awaited lock
    pub fn active(&self) -> usize {
        self.locks.len()
    }
}

pub struct PlayerLockGuard {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    player_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PlayerLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // only the map's own reference left: nobody holds or waits on it
        self.locks
            .remove_if(&self.player_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_entry_removed_after_release() {
        let locks = PlayerLocks::new();
        {
            let _guard = locks.acquire("alice").await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_same_player_is_serialized() {
        let locks = PlayerLocks::new();
        let guard = locks.acquire("alice").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("alice").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_different_players_do_not_block() {
        let locks = PlayerLocks::new();
        let _alice = locks.acquire("alice").await;
        let bob = tokio::time::timeout(Duration::from_millis(100), locks.acquire("bob")).await;
        assert!(bob.is_ok());
        assert_eq!(locks.active(), 2);
    }
}
