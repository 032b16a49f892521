use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Single-slot snapshot cache with a freshness TTL. Readers share the
/// current `Arc` snapshot; replacement swaps the reference, the held
/// value is never mutated in place.
#[derive(Debug)]
pub struct Snapshot<T> {
    slot: RwLock<Option<(Arc<T>, Instant)>>,
    ttl: Duration,
}

impl<T> Snapshot<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
        }
    }

    /// The current snapshot, or None when absent or stale.
    pub async fn get(&self) -> Option<Arc<T>> {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some((value, stamped)) if stamped.elapsed() < self.ttl => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub async fn replace(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        let mut slot = self.slot.write().await;
        *slot = Some((Arc::clone(&value), Instant::now()));
        value
    }
}
