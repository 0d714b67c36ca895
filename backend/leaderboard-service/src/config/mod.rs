use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::models::{RangeWindow, RankingPolicy};
use crate::services::sort_key::{SortKeyCodec, DEFAULT_TIE_EPOCH_SECS};

pub const DEFAULT_LEADERBOARD_KEY: &str = "leaderboard";

#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    pub redis: RedisConfig,
    pub leaderboard: LeaderboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(rename = "redis_url", default = "default_redis_url")]
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct LeaderboardConfig {
    /// Sorted-set key; several leaderboards can share one Redis
    pub key: String,
    pub ranking_policy: RankingPolicy,
    pub range_window: RangeWindow,
    pub codec: SortKeyCodec,
    pub backend: IndexBackend,
}

impl LeaderboardConfig {
    /// Key for the companion dense-ranked board
    pub fn dense_key(&self) -> String {
        format!("{}:dense", self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexBackend {
    #[default]
    Redis,
    Memory,
}

impl fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexBackend::Redis => f.write_str("redis"),
            IndexBackend::Memory => f.write_str("memory"),
        }
    }
}

impl FromStr for IndexBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(IndexBackend::Redis),
            "memory" => Ok(IndexBackend::Memory),
            other => Err(format!("unknown index backend: {other}")),
        }
    }
}

/// `LEADERBOARD_*` variables, prefix stripped
#[derive(Debug, Deserialize)]
struct LeaderboardEnv {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    ranking_policy: Option<String>,
    #[serde(default)]
    range_window: Option<String>,
    #[serde(default)]
    tie_epoch_secs: Option<i64>,
    #[serde(default)]
    backend: Option<String>,
}

fn default_service_name() -> String {
    "leaderboard-service".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn parse_or_default<T>(var: &'static str, raw: Option<String>) -> Result<T, ConfigError>
where
    T: FromStr + Default,
{
    match raw {
        Some(value) if !value.trim().is_empty() => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        _ => Ok(T::default()),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();

        let service: ServiceConfig = envy::from_iter(vars.clone())?;
        let redis: RedisConfig = envy::from_iter(vars.clone())?;
        let raw: LeaderboardEnv = envy::prefixed("LEADERBOARD_").from_iter(vars)?;

        let key = raw
            .key
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LEADERBOARD_KEY.to_string());

        let tie_epoch_secs = raw.tie_epoch_secs.unwrap_or(DEFAULT_TIE_EPOCH_SECS);
        let codec = SortKeyCodec::from_epoch_secs(tie_epoch_secs).ok_or_else(|| {
            ConfigError::InvalidValue {
                var: "LEADERBOARD_TIE_EPOCH_SECS",
                value: tie_epoch_secs.to_string(),
            }
        })?;

        Ok(Config {
            service,
            redis,
            leaderboard: LeaderboardConfig {
                key,
                ranking_policy: parse_or_default("LEADERBOARD_RANKING_POLICY", raw.ranking_policy)?,
                range_window: parse_or_default("LEADERBOARD_RANGE_WINDOW", raw.range_window)?,
                codec,
                backend: parse_or_default("LEADERBOARD_BACKEND", raw.backend)?,
            },
        })
    }
}
