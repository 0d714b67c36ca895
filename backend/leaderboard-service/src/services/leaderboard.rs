// ============================================
// Ranking Engine
// ============================================
//
// Derives standard and dense ranks from an ordered score index.
//
// Data Flow:
// 1. Update: read current key → decode score → add increment → encode → upsert
// 2. Standard rank: zero-based index position + 1
// 3. Dense rank: score-group walk (see `dense_rank_of`), or for
//    `DenseBySortKey` the count of keys at most the player's own
//
// Availability over strictness: the `LeaderboardService` methods never
// surface index failures. Updates fall back or drop with a warning, and
// queries return `None`. The `try_*` methods expose the same operations
// with typed errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::player_locks::PlayerLocks;
use super::sort_key::{
    decode_score, is_precise, score_floor_bound, SortKeyCodec, MAX_PRECISE_SCORE,
};
use crate::error::{IndexError, LeaderboardError, LeaderboardResult};
use crate::index::ScoreIndex;
use crate::metrics::{LeaderboardMetrics, QueryOutcome, UpdateOutcome};
use crate::models::{LeaderboardStats, Player, RangeWindow, RankInfo, RankingPolicy};

/// Caller-facing leaderboard operations
#[async_trait]
pub trait LeaderboardService: Send + Sync {
    /// Add `increment` (may be negative) to the player's cumulative score
    async fn update_score(&self, player_id: &str, increment: i64, timestamp: DateTime<Utc>);

    /// Under `RankingPolicy::Dense` this walks every distinct score above the
    /// player's, two index round trips per score.
    async fn get_player_rank(&self, player_id: &str) -> Option<RankInfo>;

    async fn get_top_n(&self, n: usize) -> Option<Vec<RankInfo>>;

    /// The player plus up to `n` neighbours on each side
    async fn get_player_range(&self, player_id: &str, n: usize) -> Option<Vec<RankInfo>>;
}

/// How a failed read of the current score is handled during an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadFailure {
    AssumeZero,
    Propagate,
}

pub struct Leaderboard<I> {
    index: I,
    policy: RankingPolicy,
    range_window: RangeWindow,
    codec: SortKeyCodec,
    locks: PlayerLocks,
    metrics: LeaderboardMetrics,
}

impl<I: ScoreIndex> Leaderboard<I> {
    pub fn new(index: I, policy: RankingPolicy) -> Self {
        Self {
            index,
            policy,
            range_window: RangeWindow::default(),
            codec: SortKeyCodec::default(),
            locks: PlayerLocks::new(),
            metrics: LeaderboardMetrics::new(),
        }
    }

    pub fn standard(index: I) -> Self {
        Self::new(index, RankingPolicy::Standard)
    }

    pub fn dense(index: I) -> Self {
        Self::new(index, RankingPolicy::Dense)
    }

    pub fn with_range_window(mut self, range_window: RangeWindow) -> Self {
        self.range_window = range_window;
        self
    }

    pub fn with_codec(mut self, codec: SortKeyCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn policy(&self) -> RankingPolicy {
        self.policy
    }

    pub fn range_window(&self) -> RangeWindow {
        self.range_window
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    // ============= Updates =============

    /// Strict update: returns the new cumulative score, or the first index error.
    pub async fn try_update_score(
        &self,
        player_id: &str,
        increment: i64,
        timestamp: DateTime<Utc>,
    ) -> LeaderboardResult<i64> {
        self.apply_update(player_id, increment, timestamp, ReadFailure::Propagate)
            .await
    }

    /// Apply a batch of updates in order
    pub async fn update_scores(&self, players: &[Player]) {
        for player in players {
            self.update_score(&player.id, player.score, player.timestamp)
                .await;
        }
    }

    async fn apply_update(
        &self,
        player_id: &str,
        increment: i64,
        timestamp: DateTime<Utc>,
        on_read_failure: ReadFailure,
    ) -> LeaderboardResult<i64> {
        let policy = self.policy.as_str();
        if player_id.is_empty() {
            self.metrics.record_update(policy, UpdateOutcome::Rejected);
            return Err(LeaderboardError::InvalidPlayerId);
        }

        let _guard = self.locks.acquire(player_id).await;

        let mut outcome = UpdateOutcome::Ok;
        let current = match self.index.sort_key(player_id).await {
            Ok(Some(sort_key)) => decode_score(sort_key),
            Ok(None) => 0,
            Err(e) if on_read_failure == ReadFailure::AssumeZero => {
                warn!(
                    player_id = %player_id,
                    error = %e,
                    "Failed to read current score, assuming zero"
                );
                outcome = UpdateOutcome::ReadFallback;
                0
            }
            Err(e) => return Err(e.into()),
        };

        let score = current.saturating_add(increment);
        if !is_precise(score) {
            warn!(
                player_id = %player_id,
                score = score,
                max_precise = MAX_PRECISE_SCORE,
                "Score exceeds sort-key precision; rank order may be corrupted"
            );
        }

        let sort_key = self.codec.encode(score, timestamp);
        if let Err(e) = self.index.upsert(player_id, sort_key).await {
            self.metrics.record_update(policy, UpdateOutcome::Dropped);
            return Err(e.into());
        }

        self.metrics.record_update(policy, outcome);
        debug!(
            leaderboard = %self.index.namespace(),
            player_id = %player_id,
            increment = increment,
            score = score,
            "Score updated"
        );
        Ok(score)
    }

    // ============= Queries =============

    pub async fn try_get_player_rank(
        &self,
        player_id: &str,
    ) -> LeaderboardResult<Option<RankInfo>> {
        let Some(sort_key) = self.index.sort_key(player_id).await? else {
            return Ok(None);
        };
        let score = decode_score(sort_key);

        let rank = match self.policy {
            RankingPolicy::Standard => match self.index.position(player_id).await? {
                Some(position) => position + 1,
                None => return Ok(None),
            },
            RankingPolicy::Dense => self.dense_rank_of(score).await?,
            RankingPolicy::DenseBySortKey => self.index.count_at_most(sort_key).await?,
        };

        Ok(Some(RankInfo::new(player_id, rank, score)))
    }

    pub async fn try_get_top_n(&self, n: usize) -> LeaderboardResult<Vec<RankInfo>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let entries = self.index.range_by_position(0, n as u64 - 1).await?;
        self.rank_window(0, entries).await
    }

    pub async fn try_get_player_range(
        &self,
        player_id: &str,
        n: usize,
    ) -> LeaderboardResult<Option<Vec<RankInfo>>> {
        let Some(position) = self.index.position(player_id).await? else {
            return Ok(None);
        };

        let size = match self.range_window {
            RangeWindow::Clamped => u64::MAX,
            RangeWindow::Recentered => self.index.size().await?,
        };
        let (start, end) = self.range_window.bounds(position, n as u64, size);

        let entries = self.index.range_by_position(start, end).await?;
        self.rank_window(start, entries).await.map(Some)
    }

    pub async fn try_statistics(&self) -> LeaderboardResult<LeaderboardStats> {
        Ok(LeaderboardStats {
            total_players: self.index.size().await?,
            leaderboard_key: self.index.namespace(),
            ranking_policy: self.policy,
            index_backend: self.index.backend().to_string(),
        })
    }

    pub async fn statistics(&self) -> Option<LeaderboardStats> {
        match self.try_statistics().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(error = %e, "Failed to read leaderboard statistics");
                None
            }
        }
    }

    /// Release the index connection
    pub async fn close(&self) -> LeaderboardResult<()> {
        self.index.close().await?;
        Ok(())
    }

    /// Rank a contiguous window of entries whose first entry sits at `start`.
    async fn rank_window(
        &self,
        start: u64,
        entries: Vec<(String, f64)>,
    ) -> LeaderboardResult<Vec<RankInfo>> {
        let mut ranked = Vec::with_capacity(entries.len());

        match self.policy {
            RankingPolicy::Standard => {
                for (offset, (member, sort_key)) in entries.into_iter().enumerate() {
                    let rank = start + offset as u64 + 1;
                    ranked.push(RankInfo::new(member, rank, decode_score(sort_key)));
                }
            }
            RankingPolicy::DenseBySortKey => {
                for (member, sort_key) in entries {
                    let rank = self.index.count_at_most(sort_key).await?;
                    ranked.push(RankInfo::new(member, rank, decode_score(sort_key)));
                }
            }
            RankingPolicy::Dense => {
                let Some((_, first_key)) = entries.first() else {
                    return Ok(ranked);
                };
                let mut group_score = decode_score(*first_key);
                let mut rank = if start == 0 {
                    1
                } else {
                    self.dense_rank_of(group_score).await?
                };

                for (member, sort_key) in entries {
                    let score = decode_score(sort_key);
                    if score != group_score {
                        group_score = score;
                        rank += 1;
                    }
                    ranked.push(RankInfo::new(member, rank, score));
                }
            }
        }

        Ok(ranked)
    }

    /// Dense rank of a displayed score: 1 + the number of distinct scores
    /// above it. Walks score groups from the top; each hop reads the head
    /// of a group and counts past it, two round trips per distinct score.
    async fn dense_rank_of(&self, score: i64) -> LeaderboardResult<u64> {
        let mut cursor = 0u64;
        let mut groups_above = 0u64;

        loop {
            let head = self.index.range_by_position(cursor, cursor).await?;
            let group_score = match head.into_iter().next() {
                Some((_, sort_key)) => decode_score(sort_key),
                None => i64::MIN,
            };
            if group_score <= score {
                debug!(
                    leaderboard = %self.index.namespace(),
                    score = score,
                    hops = groups_above,
                    "Dense rank walk finished"
                );
                return Ok(groups_above + 1);
            }

            groups_above += 1;
            let next = self
                .index
                .count_at_most(score_floor_bound(group_score))
                .await?;
            if next <= cursor {
                return Err(IndexError::InvalidData(format!(
                    "score group {group_score} did not advance past position {cursor}"
                ))
                .into());
            }
            cursor = next;
        }
    }

    fn record_query<T>(&self, query: &str, result: &LeaderboardResult<Option<T>>) {
        let outcome = match result {
            Ok(Some(_)) => QueryOutcome::Hit,
            Ok(None) => QueryOutcome::Miss,
            Err(_) => QueryOutcome::Error,
        };
        if outcome != QueryOutcome::Error {
            debug!(
                leaderboard = %self.index.namespace(),
                query = query,
                found = outcome == QueryOutcome::Hit,
                "Leaderboard query served"
            );
        }
        self.metrics.record_query(query, outcome);
    }
}

#[async_trait]
impl<I: ScoreIndex> LeaderboardService for Leaderboard<I> {
    async fn update_score(&self, player_id: &str, increment: i64, timestamp: DateTime<Utc>) {
        let result = self
            .apply_update(player_id, increment, timestamp, ReadFailure::AssumeZero)
            .await;
        if let Err(e) = result {
            warn!(
                leaderboard = %self.index.namespace(),
                player_id = %player_id,
                increment = increment,
                error = %e,
                "Score update dropped"
            );
        }
    }

    async fn get_player_rank(&self, player_id: &str) -> Option<RankInfo> {
        let result = self.try_get_player_rank(player_id).await;
        self.record_query("player_rank", &result);
        result.unwrap_or_else(|e| {
            warn!(
                leaderboard = %self.index.namespace(),
                player_id = %player_id,
                error = %e,
                "Failed to get player rank"
            );
            None
        })
    }

    async fn get_top_n(&self, n: usize) -> Option<Vec<RankInfo>> {
        let result = self.try_get_top_n(n).await.map(Some);
        self.record_query("top_n", &result);
        result.unwrap_or_else(|e| {
            warn!(
                leaderboard = %self.index.namespace(),
                n = n,
                error = %e,
                "Failed to get top players"
            );
            None
        })
    }

    async fn get_player_range(&self, player_id: &str, n: usize) -> Option<Vec<RankInfo>> {
        let result = self.try_get_player_range(player_id, n).await;
        self.record_query("player_range", &result);
        result.unwrap_or_else(|e| {
            warn!(
                leaderboard = %self.index.namespace(),
                player_id = %player_id,
                n = n,
                error = %e,
                "Failed to get player range"
            );
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MockScoreIndex;
    use chrono::Duration;

    /// Mock that answers the namespace lookups made by logging
    fn mock_index() -> MockScoreIndex {
        let mut index = MockScoreIndex::new();
        index
            .expect_namespace()
            .returning(|| "test_leaderboard".to_string());
        index
    }

    fn redis_down() -> IndexError {
        IndexError::InvalidData("connection refused".to_string())
    }

    #[tokio::test]
    async fn test_update_read_failure_assumes_zero() {
        let now = Utc::now();
        let expected_key = SortKeyCodec::default().encode(25, now);

        let mut index = mock_index();
        index
            .expect_sort_key()
            .times(1)
            .returning(|_| Err(redis_down()));
        index
            .expect_upsert()
            .withf(move |member: &str, sort_key: &f64| {
                member == "alice" && *sort_key == expected_key
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let board = Leaderboard::standard(index);
        board.update_score("alice", 25, now).await;
    }

    #[tokio::test]
    async fn test_try_update_propagates_read_failure() {
        let mut index = mock_index();
        index
            .expect_sort_key()
            .times(1)
            .returning(|_| Err(redis_down()));
        index.expect_upsert().never();

        let board = Leaderboard::standard(index);
        let result = board.try_update_score("alice", 25, Utc::now()).await;
        assert!(matches!(result, Err(LeaderboardError::Index(_))));
    }

    #[tokio::test]
    async fn test_update_write_failure_is_dropped() {
        let mut index = mock_index();
        index.expect_sort_key().times(1).returning(|_| Ok(None));
        index
            .expect_upsert()
            .times(1)
            .returning(|_, _| Err(redis_down()));

        let board = Leaderboard::standard(index);
        // no panic, no error surfaced
        board.update_score("alice", 10, Utc::now()).await;

        let policy = RankingPolicy::Standard.as_str();
        assert!(board.metrics.update_count(policy, UpdateOutcome::Dropped) >= 1.0);
    }

    #[tokio::test]
    async fn test_update_adds_to_existing_score() {
        let now = Utc::now();
        let codec = SortKeyCodec::default();
        let existing = codec.encode(100, now - Duration::seconds(30));
        let expected_key = codec.encode(70, now);

        let mut index = mock_index();
        index
            .expect_sort_key()
            .withf(|member: &str| member == "alice")
            .returning(move |_| Ok(Some(existing)));
        index
            .expect_upsert()
            .withf(move |_, sort_key: &f64| *sort_key == expected_key)
            .times(1)
            .returning(|_, _| Ok(()));

        let board = Leaderboard::standard(index);
        let score = board.try_update_score("alice", -30, now).await.unwrap();
        assert_eq!(score, 70);
    }

    #[tokio::test]
    async fn test_empty_player_id_is_rejected_without_index_traffic() {
        let mut index = mock_index();
        index.expect_sort_key().never();
        index.expect_upsert().never();

        let board = Leaderboard::standard(index);
        board.update_score("", 10, Utc::now()).await;
        assert!(matches!(
            board.try_update_score("", 10, Utc::now()).await,
            Err(LeaderboardError::InvalidPlayerId)
        ));
    }

    #[tokio::test]
    async fn test_query_failure_yields_no_result() {
        let mut index = mock_index();
        index.expect_sort_key().returning(|_| Err(redis_down()));
        index.expect_position().returning(|_| Err(redis_down()));
        index
            .expect_range_by_position()
            .returning(|_, _| Err(redis_down()));

        let board = Leaderboard::standard(index);
        assert_eq!(board.get_player_rank("alice").await, None);
        assert_eq!(board.get_top_n(10).await, None);
        assert_eq!(board.get_player_range("alice", 2).await, None);

        assert!(board.try_get_player_rank("alice").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_player_is_not_an_error() {
        let mut index = mock_index();
        index.expect_sort_key().returning(|_| Ok(None));
        index.expect_position().returning(|_| Ok(None));

        let board = Leaderboard::dense(index);
        assert!(matches!(board.try_get_player_rank("ghost").await, Ok(None)));
        assert!(matches!(
            board.try_get_player_range("ghost", 3).await,
            Ok(None)
        ));
    }

    #[tokio::test]
    async fn test_top_zero_skips_index() {
        let mut index = mock_index();
        index.expect_range_by_position().never();

        let board = Leaderboard::standard(index);
        assert_eq!(board.get_top_n(0).await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_dense_walk_detects_stalled_cursor() {
        let codec = SortKeyCodec::default();
        let head_key = codec.encode(100, Utc::now());

        let mut index = mock_index();
        index
            .expect_range_by_position()
            .returning(move |_, _| Ok(vec![("alice".to_string(), head_key)]));
        index.expect_count_at_most().returning(|_| Ok(0));

        let board = Leaderboard::dense(index);
        let result = board.dense_rank_of(50).await;
        assert!(matches!(
            result,
            Err(LeaderboardError::Index(IndexError::InvalidData(_)))
        ));
    }

    #[tokio::test]
    async fn test_dense_walk_costs_two_round_trips_per_higher_score() {
        let codec = SortKeyCodec::default();
        let now = Utc::now();
        let heads = [
            (0u64, codec.encode(100, now)),
            (2, codec.encode(95, now)),
            (4, codec.encode(90, now)),
        ];

        let mut index = mock_index();
        index
            .expect_range_by_position()
            .times(3)
            .returning(move |start, _| {
                Ok(heads
                    .iter()
                    .filter(|(position, _)| *position == start)
                    .map(|(_, key)| ("head".to_string(), *key))
                    .collect())
            });
        index
            .expect_count_at_most()
            .times(2)
            .returning(|bound| {
                if bound == score_floor_bound(100) {
                    Ok(2)
                } else {
                    Ok(4)
                }
            });

        let board = Leaderboard::dense(index);
        assert_eq!(board.dense_rank_of(90).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_query_logs_carry_leaderboard_key() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        let codec = SortKeyCodec::default();
        let key = codec.encode(40, Utc::now());

        let mut index = MockScoreIndex::new();
        index
            .expect_namespace()
            .times(1..)
            .returning(|| "global_leaderboard".to_string());
        index.expect_sort_key().returning(move |_| Ok(Some(key)));
        index.expect_position().returning(|_| Ok(Some(0)));

        let board = Leaderboard::standard(index);
        let info = board.get_player_rank("alice").await.unwrap();
        assert_eq!((info.rank, info.score), (1, 40));
    }

    #[tokio::test]
    async fn test_statistics_report_index_details() {
        let mut index = MockScoreIndex::new();
        index.expect_size().returning(|| Ok(3));
        index
            .expect_namespace()
            .returning(|| "global_leaderboard".to_string());
        index.expect_backend().return_const("mock");

        let board = Leaderboard::dense(index);
        let stats = board.statistics().await.unwrap();
        assert_eq!(stats.total_players, 3);
        assert_eq!(stats.leaderboard_key, "global_leaderboard");
        assert_eq!(stats.ranking_policy, RankingPolicy::Dense);
        assert_eq!(stats.index_backend, "mock");
    }
}
