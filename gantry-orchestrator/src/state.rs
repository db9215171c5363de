//! Shared application state

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::config::Config;
use crate::events::EventBus;
use crate::store::{MemoryStore, Store};

/// Handed to every handler and service call
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<Config>,
    pub events: EventBus,
    pub locks: Arc<PipelineLocks>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
            events: EventBus::default(),
            locks: Arc::new(PipelineLocks::default()),
        }
    }

    /// State over a fresh in-memory store
    pub fn in_memory(config: Config) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }
}

/// Serializes processing per pipeline; different pipelines never contend
///
/// An entry lives only while some caller holds or waits for its lock.
#[derive(Default)]
pub struct PipelineLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl PipelineLocks {
    pub async fn lock(&self, pipeline_id: Uuid) -> PipelineGuard<'_> {
        let mutex = self
            .locks
            .entry(pipeline_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        PipelineGuard {
            locks: self,
            pipeline_id,
            guard: Some(mutex.lock_owned().await),
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.locks.len()
    }

    #[cfg(test)]
    fn references(&self, pipeline_id: Uuid) -> usize {
        self.locks
            .get(&pipeline_id)
            .map(|mutex| Arc::strong_count(mutex.value()))
            .unwrap_or(0)
    }
}

/// Held pipeline lock; evicts the map entry on drop when nobody else wants it
pub struct PipelineGuard<'a> {
    locks: &'a PipelineLocks,
    pipeline_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PipelineGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Waiters hold a clone of the Arc, so a count of one means only the map
        self.locks
            .locks
            .remove_if(&self.pipeline_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entry_dropped_after_unlock() {
        let locks = PipelineLocks::default();
        let id = Uuid::new_v4();

        let guard = locks.lock(id).await;
        assert_eq!(locks.tracked(), 1);
        drop(guard);
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_entry_kept_while_contended() {
        let locks = Arc::new(PipelineLocks::default());
        let id = Uuid::new_v4();

        let guard = locks.lock(id).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(id).await;
            })
        };
        // Map, held guard and waiter
        while locks.references(id) < 3 {
            tokio::task::yield_now().await;
        }

        drop(guard);
        assert_eq!(locks.tracked(), 1);

        waiter.await.unwrap();
        assert_eq!(locks.tracked(), 0);
    }
}
