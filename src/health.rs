//! Indexer health and backoff bookkeeping consulted by the dispatch layer.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::definition::ProviderDefinition;
use crate::error::IndexerError;

/// Health/backoff service.
///
/// Consulted before every dispatch and notified of its outcome.
pub trait IndexerStatusService: Send + Sync {
    /// Returns the instant until which the indexer is suspended.
    fn suspended_until(&self, definition: &ProviderDefinition) -> Option<DateTime<Utc>>;

    fn record_success(&self, definition: &ProviderDefinition);

    fn record_failure(&self, definition: &ProviderDefinition, error: &IndexerError);
}

/// Status service that never suspends anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStatusService;

impl IndexerStatusService for NoopStatusService {
    fn suspended_until(&self, _definition: &ProviderDefinition) -> Option<DateTime<Utc>> {
        None
    }

    fn record_success(&self, _definition: &ProviderDefinition) {}

    fn record_failure(&self, _definition: &ProviderDefinition, _error: &IndexerError) {}
}

#[derive(Debug, Clone, Default)]
struct IndexerHealth {
    consecutive_failures: u32,
    disabled_until: Option<DateTime<Utc>>,
}

/// In-process backoff: each consecutive failure doubles the suspension,
/// starting at `base` and capped at `max`.
#[derive(Debug)]
pub struct BackoffStatusService {
    base: Duration,
    max: Duration,
    state: RwLock<HashMap<String, IndexerHealth>>,
}

impl Default for BackoffStatusService {
    fn default() -> Self {
        Self::new(Duration::minutes(5), Duration::hours(24))
    }
}

impl BackoffStatusService {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            state: RwLock::new(HashMap::new()),
        }
    }

    pub fn consecutive_failures(&self, id: &str) -> u32 {
        self.state
            .read()
            .get(id)
            .map(|h| h.consecutive_failures)
            .unwrap_or(0)
    }

    fn backoff_for(&self, failures: u32) -> Duration {
        let factor = 1i32 << failures.saturating_sub(1).min(16);
        match self.base.checked_mul(factor) {
            Some(backoff) if backoff <= self.max => backoff,
            _ => self.max,
        }
    }
}

impl IndexerStatusService for BackoffStatusService {
    fn suspended_until(&self, definition: &ProviderDefinition) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .get(&definition.id)
            .and_then(|h| h.disabled_until)
            .filter(|until| *until > Utc::now())
    }

    fn record_success(&self, definition: &ProviderDefinition) {
        self.state.write().remove(&definition.id);
    }

    fn record_failure(&self, definition: &ProviderDefinition, _error: &IndexerError) {
        let mut state = self.state.write();
        let health = state.entry(definition.id.clone()).or_default();
        health.consecutive_failures += 1;
        let now = Utc::now();
        health.disabled_until = now
            .checked_add_signed(self.backoff_for(health.consecutive_failures))
            .or(Some(DateTime::<Utc>::MAX_UTC));
    }
}
