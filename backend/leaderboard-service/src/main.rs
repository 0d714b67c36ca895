use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use leaderboard_service::{
    config::IndexBackend, index::connect_manager, Config, InMemoryScoreIndex, Leaderboard,
    LeaderboardService, Player, RankInfo, RankingPolicy, RedisScoreIndex, ScoreIndex,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().context("failed to load config")?;

    info!(
        service = %config.service.service_name,
        backend = %config.leaderboard.backend,
        key = %config.leaderboard.key,
        policy = %config.leaderboard.ranking_policy,
        "Starting leaderboard demo"
    );

    match config.leaderboard.backend {
        IndexBackend::Redis => {
            let manager = connect_manager(&config.redis.url)
                .await
                .context("failed to connect to Redis; is redis-server running?")?;
            let primary = RedisScoreIndex::new(manager.clone(), config.leaderboard.key.clone());
            let dense = RedisScoreIndex::new(manager, config.leaderboard.dense_key());
            run_demo(&config, primary, dense).await
        }
        IndexBackend::Memory => {
            let primary = InMemoryScoreIndex::new(config.leaderboard.key.clone());
            let dense = InMemoryScoreIndex::new(config.leaderboard.dense_key());
            run_demo(&config, primary, dense).await
        }
    }
}

async fn run_demo<I: ScoreIndex>(config: &Config, primary_index: I, dense_index: I) -> Result<()> {
    let primary = Leaderboard::new(primary_index, config.leaderboard.ranking_policy)
        .with_range_window(config.leaderboard.range_window)
        .with_codec(config.leaderboard.codec);
    let dense = Leaderboard::new(dense_index, RankingPolicy::Dense)
        .with_range_window(config.leaderboard.range_window)
        .with_codec(config.leaderboard.codec);

    warn_if_populated(&primary).await;
    warn_if_populated(&dense).await;

    let now = Utc::now();

    println!("1. {} ranking", primary.policy());
    primary
        .update_scores(&[
            Player::new("player_a", 100, now),
            Player::new("player_b", 200, now + Duration::seconds(1)),
            Player::new("player_c", 150, now + Duration::seconds(2)),
            // same score as player_b, reached later
            Player::new("player_d", 200, now + Duration::seconds(3)),
        ])
        .await;

    print_ranks("Top 3:", primary.get_top_n(3).await);
    match primary.get_player_rank("player_b").await {
        Some(info) => println!("\nplayer_b: rank {} (score: {})", info.rank, info.score),
        None => println!("\nplayer_b: no result"),
    }
    print_ranks("\nplayer_b and neighbours:", primary.get_player_range("player_b", 1).await);

    println!("\n2. dense ranking");
    dense
        .update_scores(&[
            Player::new("player_a", 100, now),
            Player::new("player_b", 100, now + Duration::seconds(1)),
            Player::new("player_c", 95, now + Duration::seconds(2)),
            Player::new("player_d", 95, now + Duration::seconds(3)),
            Player::new("player_e", 90, now + Duration::seconds(4)),
            Player::new("player_f", 89, now + Duration::seconds(5)),
        ])
        .await;
    print_ranks("All players:", dense.get_top_n(6).await);

    if let Some(stats) = primary.statistics().await {
        println!("\nStatistics: {}", serde_json::to_string_pretty(&stats)?);
    }

    for (name, result) in [("primary", primary.close().await), ("dense", dense.close().await)] {
        if let Err(e) = result {
            warn!(board = name, error = %e, "Failed to close leaderboard");
        }
    }

    info!("Leaderboard demo finished");
    Ok(())
}

async fn warn_if_populated<I: ScoreIndex>(board: &Leaderboard<I>) {
    if let Some(stats) = board.statistics().await {
        if stats.total_players > 0 {
            warn!(
                key = %stats.leaderboard_key,
                players = stats.total_players,
                "Leaderboard already populated; demo increments add to existing scores"
            );
        }
    }
}

fn print_ranks(title: &str, ranks: Option<Vec<RankInfo>>) {
    println!("{title}");
    match ranks {
        Some(ranks) => {
            for info in ranks {
                println!("  #{}: {} (score: {})", info.rank, info.player_id, info.score);
            }
        }
        None => println!("  no result"),
    }
}
