//! Leaderboard metrics for observability

use prometheus::{CounterVec, Opts, Registry};
use std::sync::OnceLock;

static METRICS: OnceLock<LeaderboardMetricsInner> = OnceLock::new();

struct LeaderboardMetricsInner {
    updates: CounterVec,
    queries: CounterVec,
}

impl LeaderboardMetricsInner {
    fn new() -> Self {
        Self {
            updates: CounterVec::new(
                Opts::new("leaderboard_updates_total", "Total score updates by outcome"),
                &["policy", "outcome"],
            )
            .expect("valid metric definition"),
            queries: CounterVec::new(
                Opts::new("leaderboard_queries_total", "Total rank queries by outcome"),
                &["query", "outcome"],
            )
            .expect("valid metric definition"),
        }
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.updates.clone()))?;
        registry.register(Box::new(self.queries.clone()))?;
        Ok(())
    }
}

fn get_metrics() -> &'static LeaderboardMetricsInner {
    METRICS.get_or_init(LeaderboardMetricsInner::new)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Ok,
    /// Current score unreadable, assumed zero
    ReadFallback,
    /// Write failed, update lost
    Dropped,
    Rejected,
}

impl UpdateOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            UpdateOutcome::Ok => "ok",
            UpdateOutcome::ReadFallback => "read_fallback",
            UpdateOutcome::Dropped => "dropped",
            UpdateOutcome::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Hit,
    Miss,
    Error,
}

impl QueryOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            QueryOutcome::Hit => "hit",
            QueryOutcome::Miss => "miss",
            QueryOutcome::Error => "error",
        }
    }
}

/// Leaderboard metrics wrapper
#[derive(Debug, Clone, Default)]
pub struct LeaderboardMetrics;

impl LeaderboardMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Register metrics with a Prometheus registry
    pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
        get_metrics().register(registry)
    }

    pub fn record_update(&self, policy: &str, outcome: UpdateOutcome) {
        get_metrics()
            .updates
            .with_label_values(&[policy, outcome.as_str()])
            .inc();
    }

    pub fn record_query(&self, query: &str, outcome: QueryOutcome) {
        get_metrics()
            .queries
            .with_label_values(&[query, outcome.as_str()])
            .inc();
    }

    #[cfg(test)]
    pub(crate) fn update_count(&self, policy: &str, outcome: UpdateOutcome) -> f64 {
        get_metrics()
            .updates
            .with_label_values(&[policy, outcome.as_str()])
            .get()
    }
}
