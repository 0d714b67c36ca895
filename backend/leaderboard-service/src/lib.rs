//! Redis-backed player leaderboard
//!
//! Ranks players by cumulative score with a deterministic tie-break (first
//! to reach a score ranks above later arrivals) and answers rank, top-N and
//! neighbourhood queries under standard or dense ranking.

pub mod config;
pub mod error;
pub mod index;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{ConfigError, IndexError, LeaderboardError};
pub use index::{InMemoryScoreIndex, RedisScoreIndex, ScoreIndex};
pub use models::{LeaderboardStats, Player, RangeWindow, RankInfo, RankingPolicy};
pub use services::{Leaderboard, LeaderboardService, SortKeyCodec};
