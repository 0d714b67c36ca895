//! Requires a running Redis. Run with:
//! REDIS_URL=redis://localhost:6379 cargo test -p leaderboard-service -- --ignored

use chrono::{Duration, Utc};
use leaderboard_service::{
    Leaderboard, LeaderboardService, Player, RankingPolicy, RedisScoreIndex, ScoreIndex,
};

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// Fresh key per test so runs do not see each other's players
fn unique_key(name: &str) -> String {
    format!(
        "leaderboard_test:{name}:{}",
        Utc::now().timestamp_micros()
    )
}

async fn clear(url: &str, key: &str) {
    let client = redis::Client::open(url).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_redis_standard_and_dense_ranking() {
    let url = redis_url();
    let key = unique_key("ranking");
    let index = RedisScoreIndex::connect(&url, key.clone()).await.unwrap();
    let board = Leaderboard::new(index, RankingPolicy::Dense);

    let t0 = Utc::now();
    board
        .update_scores(&[
            Player::new("A", 100, t0),
            Player::new("B", 100, t0 + Duration::seconds(1)),
            Player::new("C", 95, t0 + Duration::seconds(2)),
            Player::new("D", 95, t0 + Duration::seconds(3)),
            Player::new("E", 90, t0 + Duration::seconds(4)),
            Player::new("F", 89, t0 + Duration::seconds(5)),
        ])
        .await;

    let ranks: Vec<(String, u64)> = board
        .get_top_n(6)
        .await
        .unwrap()
        .into_iter()
        .map(|info| (info.player_id, info.rank))
        .collect();
    assert_eq!(
        ranks,
        vec![
            ("A".to_string(), 1),
            ("B".to_string(), 1),
            ("C".to_string(), 2),
            ("D".to_string(), 2),
            ("E".to_string(), 3),
            ("F".to_string(), 4),
        ]
    );
    assert_eq!(board.get_player_rank("D").await.unwrap().rank, 2);

    // positions are the standard ranks
    assert_eq!(board.index().position("B").await.unwrap(), Some(1));
    assert_eq!(board.index().size().await.unwrap(), 6);

    clear(&url, &key).await;
    board.close().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_redis_increments_and_close() {
    let url = redis_url();
    let key = unique_key("increments");
    let index = RedisScoreIndex::connect(&url, key.clone()).await.unwrap();
    let board = Leaderboard::standard(index);

    let t0 = Utc::now();
    board.update_score("A", 40, t0).await;
    board.update_score("A", -15, t0 + Duration::seconds(1)).await;
    assert_eq!(board.get_player_rank("A").await.unwrap().score, 25);

    let stats = board.statistics().await.unwrap();
    assert_eq!(stats.leaderboard_key, key);
    assert_eq!(stats.index_backend, "redis");

    clear(&url, &key).await;
    board.close().await.unwrap();
    assert!(board.get_player_rank("A").await.is_none());
}

#[tokio::test]
#[ignore]
async fn test_redis_unbounded_windows_return_everyone() {
    let url = redis_url();
    let key = unique_key("unbounded");
    let index = RedisScoreIndex::connect(&url, key.clone()).await.unwrap();
    let board = Leaderboard::standard(index);

    let t0 = Utc::now();
    board
        .update_scores(&[
            Player::new("A", 100, t0),
            Player::new("B", 200, t0 + Duration::seconds(1)),
            Player::new("C", 150, t0 + Duration::seconds(2)),
        ])
        .await;

    let top = board.get_top_n(usize::MAX).await.unwrap();
    assert_eq!(top.len(), 3);
    let range = board.get_player_range("C", usize::MAX).await.unwrap();
    assert_eq!(range.len(), 3);

    clear(&url, &key).await;
    board.close().await.unwrap();
}
