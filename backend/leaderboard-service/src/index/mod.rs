//! Ordered score index
//!
//! The store the ranking engine sits on: (member, sort key) pairs kept in
//! ascending sort-key order, ties on equal keys ordered by member. Positions
//! are zero-based in that order.
//!
//! - `RedisScoreIndex`: one Redis sorted set per leaderboard key
//! - `InMemoryScoreIndex`: process-local, for tests and local development

mod memory;
mod redis_index;

pub use self::memory::InMemoryScoreIndex;
pub use self::redis_index::{connect_manager, RedisScoreIndex};

use crate::error::IndexResult;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScoreIndex: Send + Sync {
    /// Insert the member or replace its sort key
    async fn upsert(&self, member: &str, sort_key: f64) -> IndexResult<()>;

    async fn sort_key(&self, member: &str) -> IndexResult<Option<f64>>;

    /// Zero-based ascending position of the member
    async fn position(&self, member: &str) -> IndexResult<Option<u64>>;

    /// Entries at positions `start..=end`; positions past the end are skipped
    async fn range_by_position(&self, start: u64, end: u64) -> IndexResult<Vec<(String, f64)>>;

    /// Number of members whose sort key is `<= threshold`
    async fn count_at_most(&self, threshold: f64) -> IndexResult<u64>;

    async fn size(&self) -> IndexResult<u64>;

    /// Release the underlying connection. Later calls fail with `IndexError::Closed`.
    async fn close(&self) -> IndexResult<()>;

    /// Leaderboard key (namespace) this index serves
    fn namespace(&self) -> String;

    fn backend(&self) -> &'static str;
}
