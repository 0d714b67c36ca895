//! In-memory score index
//!
//! Ordered-set semantics match a Redis sorted set: ascending by sort key,
//! equal keys ordered by member bytes.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use tokio::sync::RwLock;

use super::ScoreIndex;
use crate::error::{IndexError, IndexResult};

#[derive(Debug, Clone)]
struct Entry {
    sort_key: f64,
    member: String,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key
            .total_cmp(&other.sort_key)
            .then_with(|| self.member.cmp(&other.member))
    }
}

#[derive(Debug, Default)]
struct Entries {
    by_member: HashMap<String, f64>,
    ordered: BTreeSet<Entry>,
}

#[derive(Debug)]
pub struct InMemoryScoreIndex {
    namespace: String,
    entries: RwLock<Entries>,
    closed: AtomicBool,
}

impl InMemoryScoreIndex {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entries: RwLock::new(Entries::default()),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> IndexResult<()> {
        if self.closed.load(AtomicOrdering::Acquire) {
            return Err(IndexError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl ScoreIndex for InMemoryScoreIndex {
    async fn upsert(&self, member: &str, sort_key: f64) -> IndexResult<()> {
        self.ensure_open()?;
        if sort_key.is_nan() {
            return Err(IndexError::InvalidData(format!(
                "NaN sort key for member {member}"
            )));
        }

        let mut entries = self.entries.write().await;
        if let Some(previous) = entries.by_member.insert(member.to_string(), sort_key) {
            entries.ordered.remove(&Entry {
                sort_key: previous,
                member: member.to_string(),
            });
        }
        entries.ordered.insert(Entry {
            sort_key,
            member: member.to_string(),
        });
        Ok(())
    }

    async fn sort_key(&self, member: &str) -> IndexResult<Option<f64>> {
        self.ensure_open()?;
        let entries = self.entries.read().await;
        Ok(entries.by_member.get(member).copied())
    }

    async fn position(&self, member: &str) -> IndexResult<Option<u64>> {
        self.ensure_open()?;
        let entries = self.entries.read().await;
        let Some(&sort_key) = entries.by_member.get(member) else {
            return Ok(None);
        };
        let probe = Entry {
            sort_key,
            member: member.to_string(),
        };
        Ok(Some(entries.ordered.range(..probe).count() as u64))
    }

    async fn range_by_position(&self, start: u64, end: u64) -> IndexResult<Vec<(String, f64)>> {
        self.ensure_open()?;
        if start > end {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().await;
        let skip = usize::try_from(start).unwrap_or(usize::MAX);
        let take = usize::try_from(end - start)
            .map(|span| span.saturating_add(1))
            .unwrap_or(usize::MAX);

        Ok(entries
            .ordered
            .iter()
            .skip(skip)
            .take(take)
            .map(|entry| (entry.member.clone(), entry.sort_key))
            .collect())
    }

    async fn count_at_most(&self, threshold: f64) -> IndexResult<u64> {
        self.ensure_open()?;
        let entries = self.entries.read().await;
        Ok(entries
            .ordered
            .iter()
            .take_while(|entry| entry.sort_key <= threshold)
            .count() as u64)
    }

    async fn size(&self) -> IndexResult<u64> {
        self.ensure_open()?;
        Ok(self.entries.read().await.by_member.len() as u64)
    }

    async fn close(&self) -> IndexResult<()> {
        self.closed.store(true, AtomicOrdering::Release);
        Ok(())
    }

    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
