//! Redis sorted-set score index
//!
//! Redis keys:
//! - {leaderboard_key} - sorted set of player_id by encoded sort key

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::ScoreIndex;
use crate::error::{IndexError, IndexResult};

/// Connection manager shared by every leaderboard on one Redis; `None` once closed.
type SharedConnection = Arc<Mutex<Option<ConnectionManager>>>;

/// Open a multiplexed connection manager and verify the server answers.
pub async fn connect_manager(redis_url: &str) -> IndexResult<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let mut manager = ConnectionManager::new(client).await?;

    let pong: String = redis::cmd("PING").query_async(&mut manager).await?;
    info!(response = %pong, "Redis connection established");

    Ok(manager)
}

pub struct RedisScoreIndex {
    connection: SharedConnection,
    key: String,
}

impl RedisScoreIndex {
    /// Serve `key` over an existing manager. Clones of one manager share a
    /// single multiplexed connection, so many leaderboards can coexist.
    pub fn new(manager: ConnectionManager, key: impl Into<String>) -> Self {
        Self {
            connection: Arc::new(Mutex::new(Some(manager))),
            key: key.into(),
        }
    }

    pub async fn connect(redis_url: &str, key: impl Into<String>) -> IndexResult<Self> {
        let manager = connect_manager(redis_url).await?;
        Ok(Self::new(manager, key))
    }

    /// Clone the manager out of the lock so no caller waits behind another's
    /// round trip.
    async fn connection(&self) -> IndexResult<ConnectionManager> {
        self.connection
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or(IndexError::Closed)
    }
}

/// Signed ZRANGE indices for `start..=end`, or `None` when the window is
/// empty. No sorted set holds more than `isize::MAX` members, so an end past
/// that saturates and a start past it selects nothing.
fn redis_bounds(start: u64, end: u64) -> Option<(isize, isize)> {
    if start > end {
        return None;
    }
    let start = isize::try_from(start).ok()?;
    let end = isize::try_from(end).unwrap_or(isize::MAX);
    Some((start, end))
}

#[async_trait]
impl ScoreIndex for RedisScoreIndex {
    async fn upsert(&self, member: &str, sort_key: f64) -> IndexResult<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.zadd(&self.key, member, sort_key).await?;
        Ok(())
    }

    async fn sort_key(&self, member: &str) -> IndexResult<Option<f64>> {
        let mut conn = self.connection().await?;
        let sort_key: Option<f64> = conn.zscore(&self.key, member).await?;
        Ok(sort_key)
    }

    async fn position(&self, member: &str) -> IndexResult<Option<u64>> {
        let mut conn = self.connection().await?;
        let position: Option<u64> = conn.zrank(&self.key, member).await?;
        Ok(position)
    }

    async fn range_by_position(&self, start: u64, end: u64) -> IndexResult<Vec<(String, f64)>> {
        let Some((start, end)) = redis_bounds(start, end) else {
            return Ok(Vec::new());
        };

        let mut conn = self.connection().await?;
        let entries: Vec<(String, f64)> = conn.zrange_withscores(&self.key, start, end).await?;
        Ok(entries)
    }

    async fn count_at_most(&self, threshold: f64) -> IndexResult<u64> {
        let mut conn = self.connection().await?;
        let count: u64 = conn.zcount(&self.key, "-inf", threshold).await?;
        Ok(count)
    }

    async fn size(&self) -> IndexResult<u64> {
        let mut conn = self.connection().await?;
        let size: u64 = conn.zcard(&self.key).await?;
        Ok(size)
    }

    async fn close(&self) -> IndexResult<()> {
        // dropping the last clone closes the multiplexed connection
        if self.connection.lock().await.take().is_some() {
            debug!(key = %self.key, "Redis score index closed");
        }
        Ok(())
    }

    fn namespace(&self) -> String {
        self.key.clone()
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
