use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A score update, used for batch seeding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    /// Increment applied to the cumulative score
    pub score: i64,
    pub timestamp: DateTime<Utc>,
}

impl Player {
    pub fn new(id: impl Into<String>, score: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            score,
            timestamp,
        }
    }
}

/// A player's rank as of `timestamp` (the query instant)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankInfo {
    pub player_id: String,
    pub rank: u64,
    pub score: i64,
    pub timestamp: DateTime<Utc>,
}

impl RankInfo {
    pub fn new(player_id: impl Into<String>, rank: u64, score: i64) -> Self {
        Self {
            player_id: player_id.into(),
            rank,
            score,
            timestamp: Utc::now(),
        }
    }
}

/// How rank numbers are derived from the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingPolicy {
    /// Unique gap-free positions; ties broken by update recency
    #[default]
    Standard,
    /// Equal displayed scores share a rank; the next distinct score is rank + 1
    Dense,
    /// Count of entries whose sort key is at most the player's own. Equal
    /// scores reached at different instants get different ranks.
    DenseBySortKey,
}

impl RankingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankingPolicy::Standard => "standard",
            RankingPolicy::Dense => "dense",
            RankingPolicy::DenseBySortKey => "dense_by_sort_key",
        }
    }
}

impl fmt::Display for RankingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(RankingPolicy::Standard),
            "dense" => Ok(RankingPolicy::Dense),
            "dense_by_sort_key" => Ok(RankingPolicy::DenseBySortKey),
            other => Err(format!("unknown ranking policy: {other}")),
        }
    }
}

/// Window selection for range queries around a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeWindow {
    /// `[max(0, p - n), p + n]`; a window clipped at the top is not shifted down
    #[default]
    Clamped,
    /// Always `2n + 1` wide when the population allows, shifted to fit
    Recentered,
}

impl RangeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeWindow::Clamped => "clamped",
            RangeWindow::Recentered => "recentered",
        }
    }

    /// Inclusive positions to fetch for a player at `position` with `n`
    /// neighbours per side, in a population of `size`.
    pub fn bounds(&self, position: u64, n: u64, size: u64) -> (u64, u64) {
        match self {
            RangeWindow::Clamped => (position.saturating_sub(n), position.saturating_add(n)),
            RangeWindow::Recentered => {
                let span = n.saturating_mul(2);
                if size == 0 || span >= size - 1 {
                    return (0, size.saturating_sub(1));
                }
                let start = position.saturating_sub(n).min(size - 1 - span);
                (start, start + span)
            }
        }
    }
}

impl fmt::Display for RangeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clamped" => Ok(RangeWindow::Clamped),
            "recentered" => Ok(RangeWindow::Recentered),
            other => Err(format!("unknown range window: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardStats {
    pub total_players: u64,
    pub leaderboard_key: String,
    pub ranking_policy: RankingPolicy,
    pub index_backend: String,
}
