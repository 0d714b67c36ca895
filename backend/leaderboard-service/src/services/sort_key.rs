// ============================================
// Sort-Key Codec
// ============================================
//
// Folds (cumulative score, update instant) into the single f64 the
// ordered score index sorts on:
//
//   sort_key = -(score * 1e9 + residue)
//   residue  = (1e9 - 1) - seconds_since(tie_epoch), clamped to [0, 1e9 - 1]
//
// Ascending key order is leaderboard order: higher score first, and for
// equal scores the earlier update first. Only the score is ever decoded;
// the residue is not a recoverable wall-clock time.
//
// Precision: the key is an f64, so once |score| + 1 exceeds 2^53 / 1e9 the
// residue no longer fits in the mantissa and both the decoded score and the
// tie order can be corrupted. See MAX_PRECISE_SCORE.

use chrono::{DateTime, TimeZone, Utc};

/// Multiplier reserving the low-order magnitude of the key for the tie residue.
pub const SCORE_SCALE: f64 = 1e9;

/// Largest tie residue; keeps `-key / SCORE_SCALE` strictly below `score + 1`.
const MAX_TIE_RESIDUE: f64 = SCORE_SCALE - 1.0;

/// Largest |score| whose key still decodes exactly and keeps tie order.
pub const MAX_PRECISE_SCORE: i64 = 9_007_198;

/// 2020-01-01T00:00:00Z
pub const DEFAULT_TIE_EPOCH_SECS: i64 = 1_577_836_800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKeyCodec {
    tie_epoch: DateTime<Utc>,
}

impl Default for SortKeyCodec {
    fn default() -> Self {
        Self {
            tie_epoch: Utc
                .timestamp_opt(DEFAULT_TIE_EPOCH_SECS, 0)
                .single()
                .unwrap_or_default(),
        }
    }
}

impl SortKeyCodec {
    pub fn new(tie_epoch: DateTime<Utc>) -> Self {
        Self { tie_epoch }
    }

    /// Codec whose tie epoch is `secs` seconds after the Unix epoch.
    pub fn from_epoch_secs(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self::new)
    }

    pub fn tie_epoch(&self) -> DateTime<Utc> {
        self.tie_epoch
    }

    pub fn encode(&self, score: i64, instant: DateTime<Utc>) -> f64 {
        -((score as f64) * SCORE_SCALE + self.tie_residue(instant))
    }

    /// Sub-second precision is kept; instants outside the ~31.7 year span
    /// after the epoch are clamped to its ends.
    fn tie_residue(&self, instant: DateTime<Utc>) -> f64 {
        let elapsed = instant.signed_duration_since(self.tie_epoch);
        let secs = match elapsed.num_nanoseconds() {
            Some(nanos) => nanos as f64 / 1e9,
            None => elapsed.num_seconds() as f64,
        };
        MAX_TIE_RESIDUE - secs.clamp(0.0, MAX_TIE_RESIDUE)
    }
}

pub fn decode_score(sort_key: f64) -> i64 {
    let scaled = -sort_key;
    let mut score = (scaled / SCORE_SCALE).floor();
    // the division can round up to the next integer near the precision
    // ceiling; `score * SCORE_SCALE` is exact there, so correct against it
    if score * SCORE_SCALE > scaled {
        score -= 1.0;
    } else if (score + 1.0) * SCORE_SCALE <= scaled {
        score += 1.0;
    }
    score as i64
}

/// Largest key any entry holding `score` can have. Counting keys at most
/// this bound counts the players whose displayed score is `>= score`.
pub fn score_floor_bound(score: i64) -> f64 {
    -(score as f64) * SCORE_SCALE
}

pub fn is_precise(score: i64) -> bool {
    score.unsigned_abs() <= MAX_PRECISE_SCORE as u64
}
