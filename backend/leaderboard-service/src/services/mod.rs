pub mod leaderboard;
pub mod player_locks;
pub mod sort_key;

pub use leaderboard::{Leaderboard, LeaderboardService};
pub use player_locks::PlayerLocks;
pub use sort_key::{decode_score, SortKeyCodec, MAX_PRECISE_SCORE};
