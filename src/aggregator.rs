use futures::future::join_all;
use tracing::info;

use crate::sources::{SourceAdapter, SourceOutcome, UnifiedItem};

pub const DEFAULT_LIMIT: usize = 10;

pub struct Aggregator {
    adapters: Vec<SourceAdapter>,
}

impl Aggregator {
    pub fn new(adapters: Vec<SourceAdapter>) -> Self {
        Self { adapters }
    }

    /// Runs every adapter concurrently and waits for all of them. Outcomes
    /// come back in adapter order, whatever order the fetches finish in.
    pub async fn collect(&self) -> Vec<SourceOutcome> {
        join_all(self.adapters.iter().map(|adapter| adapter.fetch_items())).await
    }

    pub async fn aggregate(&self, limit: usize) -> Vec<UnifiedItem> {
        let outcomes = self.collect().await;
        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        let items = merge(outcomes, limit);
        info!(
            "aggregated {} items from {} sources ({failed} failed)",
            items.len(),
            self.adapters.len()
        );
        items
    }
}

/// Newest first. Undated items go last and keep their relative order.
pub fn merge(outcomes: Vec<SourceOutcome>, limit: usize) -> Vec<UnifiedItem> {
    let mut items: Vec<UnifiedItem> = outcomes.into_iter().flat_map(|o| o.items).collect();

    // `sort_by` is stable, so ties keep source order.
    items.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    items.truncate(limit);
    items
}
