//! Leaderboard error types

use thiserror::Error;

/// Failures raised by an ordered score index backend.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Score index is closed")]
    Closed,

    #[error("Invalid index data: {0}")]
    InvalidData(String),
}

pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum LeaderboardError {
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Player id must not be empty")]
    InvalidPlayerId,
}

pub type LeaderboardResult<T> = Result<T, LeaderboardError>;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment error: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}
