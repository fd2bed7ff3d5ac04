//! Per-key minimum-interval rate limiting.
//!
//! Each key (an indexer id, or a host when no indexer is known) owns a slot
//! holding the instant its last call was released. Callers wait on the slot,
//! so calls to one key are serialized and spaced by at least the interval
//! while other keys proceed independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::debug;

type Slot = Arc<AsyncMutex<Option<Instant>>>;

/// Pool of per-key limiters.
#[derive(Debug, Default)]
pub struct RateLimiter {
    slots: Mutex<HashMap<String, Slot>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock();
        slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    /// Waits until a call for `key` may go out, then claims the slot.
    ///
    /// The slot is only claimed once the wait completes; dropping the future
    /// while it waits leaves the previous release time untouched.
    pub async fn wait(&self, key: &str, interval: Duration) {
        if interval.is_zero() {
            return;
        }

        let slot = self.slot(key);
        let mut last = slot.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + interval;
            let now = Instant::now();
            if ready_at > now {
                debug!(key, wait_ms = (ready_at - now).as_millis() as u64, "Rate limited");
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Time until `key` is free again, `None` when it is free now.
    pub fn next_available_in(&self, key: &str, interval: Duration) -> Option<Duration> {
        let slot = self.slots.lock().get(key).cloned()?;
        let last = slot.try_lock().ok()?;
        let ready_at = (*last)? + interval;
        let now = Instant::now();
        (ready_at > now).then(|| ready_at - now)
    }

    /// Number of keys seen so far.
    pub fn key_count(&self) -> usize {
        self.slots.lock().len()
    }
}
