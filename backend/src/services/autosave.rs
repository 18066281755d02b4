//! Debounced autosave of costing drafts
//!
//! Each staged edit replaces the pending draft for its record and bumps a
//! generation counter. A timer task fires after the debounce delay and
//! persists the draft only if no newer edit arrived in the meantime. A draft
//! stays dirty until a persist of its latest generation succeeds.
//!
//! Writes for one record are serialized by a per-record lock held across the
//! generation check, the store call and the removal of the draft, so an older
//! generation can never land after a newer one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::costing::UpsertCostingInput;

/// Where autosaved drafts are written
#[axum::async_trait]
pub trait DraftStore: Send + Sync + 'static {
    async fn persist_draft(&self, costing_id: Uuid, draft: &UpsertCostingInput) -> AppResult<()>;
}

#[derive(Debug, Clone)]
struct PendingDraft {
    draft: UpsertCostingInput,
    generation: u64,
}

struct Inner<S> {
    store: S,
    delay: Duration,
    next_generation: AtomicU64,
    drafts: Mutex<HashMap<Uuid, PendingDraft>>,
    writes: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

/// Coalesces rapid edits into one write per quiet period
pub struct Autosaver<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for Autosaver<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: DraftStore> Autosaver<S> {
    pub fn new(store: S, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                delay,
                next_generation: AtomicU64::new(1),
                drafts: Mutex::new(HashMap::new()),
                writes: Mutex::new(HashMap::new()),
            }),
        }
    }

    async fn write_lock(&self, costing_id: Uuid) -> Arc<Mutex<()>> {
        let mut writes = self.inner.writes.lock().await;
        Arc::clone(writes.entry(costing_id).or_default())
    }

    /// Forget the record's write lock once no other task holds or awaits it
    async fn release_write_lock(&self, costing_id: Uuid, lock: &Arc<Mutex<()>>) {
        let mut writes = self.inner.writes.lock().await;
        if Arc::strong_count(lock) == 2 {
            writes.remove(&costing_id);
        }
    }

    /// Stage a draft and schedule its save. Returns the draft's generation.
    pub async fn stage(&self, costing_id: Uuid, draft: UpsertCostingInput) -> u64 {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        self.inner
            .drafts
            .lock()
            .await
            .insert(costing_id, PendingDraft { draft, generation });

        tracing::debug!(costing_id = %costing_id, generation, "Draft staged");

        let autosaver = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(autosaver.inner.delay).await;
            if let Err(e) = autosaver.flush_generation(costing_id, generation).await {
                tracing::warn!(costing_id = %costing_id, generation, "Autosave failed: {}", e);
            }
        });

        generation
    }

    /// Persist the pending draft now. Returns false when nothing was pending.
    pub async fn flush(&self, costing_id: Uuid) -> AppResult<bool> {
        let generation = match self.inner.drafts.lock().await.get(&costing_id) {
            Some(pending) => pending.generation,
            None => return Ok(false),
        };
        self.flush_generation(costing_id, generation).await
    }

    /// Persist the draft if `generation` is still the latest one staged.
    /// Returns false when the draft was superseded or already saved.
    pub async fn flush_generation(&self, costing_id: Uuid, generation: u64) -> AppResult<bool> {
        let lock = self.write_lock(costing_id).await;
        let result = {
            let _write = lock.lock().await;
            self.persist_if_latest(costing_id, generation).await
        };
        self.release_write_lock(costing_id, &lock).await;
        result
    }

    /// Caller holds the record's write lock
    async fn persist_if_latest(&self, costing_id: Uuid, generation: u64) -> AppResult<bool> {
        let draft = match self.inner.drafts.lock().await.get(&costing_id) {
            Some(pending) if pending.generation == generation => pending.draft.clone(),
            _ => return Ok(false),
        };

        self.inner
            .store
            .persist_draft(costing_id, &draft)
            .await
            .map_err(|e| AppError::AutosaveFailed(e.to_string()))?;

        let mut drafts = self.inner.drafts.lock().await;
        if drafts
            .get(&costing_id)
            .is_some_and(|pending| pending.generation == generation)
        {
            drafts.remove(&costing_id);
        }

        tracing::info!(costing_id = %costing_id, generation, "Draft autosaved");
        Ok(true)
    }

    /// True while a draft is waiting to be persisted
    pub async fn is_dirty(&self, costing_id: Uuid) -> bool {
        self.inner.drafts.lock().await.contains_key(&costing_id)
    }

    /// The staged draft, if any
    pub async fn pending(&self, costing_id: Uuid) -> Option<UpsertCostingInput> {
        self.inner
            .drafts
            .lock()
            .await
            .get(&costing_id)
            .map(|pending| pending.draft.clone())
    }

    /// Drop a pending draft without saving it. Waits for a save already in
    /// flight for the record, so a write made after this returns lands last.
    pub async fn discard(&self, costing_id: Uuid) -> bool {
        let lock = self.write_lock(costing_id).await;
        let removed = {
            let _write = lock.lock().await;
            self.inner.drafts.lock().await.remove(&costing_id).is_some()
        };
        self.release_write_lock(costing_id, &lock).await;
        removed
    }

    /// Persist every pending draft. Returns how many were saved.
    pub async fn flush_all(&self) -> usize {
        let ids: Vec<Uuid> = self.inner.drafts.lock().await.keys().copied().collect();

        let mut saved = 0;
        for costing_id in ids {
            match self.flush(costing_id).await {
                Ok(true) => saved += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(costing_id = %costing_id, "Draft lost on shutdown: {}", e)
                }
            }
        }
        saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CostingInput, Product};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::atomic::AtomicBool;
    use tokio_test::assert_ok;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn draft(buying_rate: &str) -> UpsertCostingInput {
        UpsertCostingInput {
            name: "Wheat lot 14".to_string(),
            input: CostingInput::builder()
                .buying_rate(dec(buying_rate))
                .quantity(dec("100"))
                .product(Product::new("atta", "Atta", dec("100")))
                .build(),
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        saves: std::sync::Mutex<Vec<(Uuid, UpsertCostingInput)>>,
        failing: AtomicBool,
        /// Writes of drafts with this buying rate take a second
        slow_rate: std::sync::Mutex<Option<Decimal>>,
    }

    impl MemoryStore {
        fn last_rate(&self) -> Option<Decimal> {
            self.saves
                .lock()
                .unwrap()
                .last()
                .map(|(_, draft)| draft.input.batch.buying_rate)
        }
    }

    #[axum::async_trait]
    impl DraftStore for Arc<MemoryStore> {
        async fn persist_draft(&self, costing_id: Uuid, draft: &UpsertCostingInput) -> AppResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(AppError::Internal("store offline".to_string()));
            }
            let slow = *self.slow_rate.lock().unwrap() == Some(draft.input.batch.buying_rate);
            if slow {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            self.saves.lock().unwrap().push((costing_id, draft.clone()));
            Ok(())
        }
    }

    fn autosaver() -> (Autosaver<Arc<MemoryStore>>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        (
            Autosaver::new(Arc::clone(&store), Duration::from_millis(1500)),
            store,
        )
    }

    async fn settle(duration: Duration) {
        tokio::time::sleep(duration).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_coalesce_into_latest() {
        let (autosaver, store) = autosaver();
        let id = Uuid::new_v4();

        autosaver.stage(id, draft("2000")).await;
        settle(Duration::from_millis(500)).await;
        autosaver.stage(id, draft("2050")).await;
        settle(Duration::from_millis(500)).await;
        autosaver.stage(id, draft("2100")).await;

        assert!(autosaver.is_dirty(id).await);
        settle(Duration::from_millis(2000)).await;

        let saves = store.saves.lock().unwrap().clone();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, id);
        assert_eq!(saves[0].1.input.batch.buying_rate, dec("2100"));
        assert!(!autosaver.is_dirty(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_saved_before_delay() {
        let (autosaver, store) = autosaver();
        let id = Uuid::new_v4();

        autosaver.stage(id, draft("2000")).await;
        settle(Duration::from_millis(1000)).await;

        assert!(store.saves.lock().unwrap().is_empty());
        assert_eq!(
            autosaver.pending(id).await.map(|d| d.input.batch.buying_rate),
            Some(dec("2000"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_keeps_draft_dirty() {
        let (autosaver, store) = autosaver();
        let id = Uuid::new_v4();
        store.failing.store(true, Ordering::SeqCst);

        autosaver.stage(id, draft("2000")).await;
        settle(Duration::from_millis(2000)).await;

        assert!(store.saves.lock().unwrap().is_empty());
        assert!(autosaver.is_dirty(id).await);

        store.failing.store(false, Ordering::SeqCst);
        let flushed = assert_ok!(autosaver.flush(id).await);
        assert!(flushed);
        assert!(!autosaver.is_dirty(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_persists_immediately() {
        let (autosaver, store) = autosaver();
        let id = Uuid::new_v4();

        autosaver.stage(id, draft("2000")).await;
        assert!(assert_ok!(autosaver.flush(id).await));
        assert_eq!(store.saves.lock().unwrap().len(), 1);

        // the timer for the flushed generation finds nothing left to do
        settle(Duration::from_millis(2000)).await;
        assert_eq!(store.saves.lock().unwrap().len(), 1);
        assert!(!assert_ok!(autosaver.flush(id).await));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_generation_skips_superseded() {
        let (autosaver, store) = autosaver();
        let id = Uuid::new_v4();

        let first = autosaver.stage(id, draft("2000")).await;
        autosaver.stage(id, draft("2100")).await;

        assert!(!assert_ok!(autosaver.flush_generation(id, first).await));
        assert!(store.saves.lock().unwrap().is_empty());
        assert!(autosaver.is_dirty(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_in_flight_cannot_overwrite_newer_draft() {
        let (autosaver, store) = autosaver();
        let id = Uuid::new_v4();
        *store.slow_rate.lock().unwrap() = Some(dec("2000"));

        autosaver.stage(id, draft("2000")).await;
        // the timer has fired and the slow write is still running
        settle(Duration::from_millis(1600)).await;
        assert!(store.saves.lock().unwrap().is_empty());

        autosaver.stage(id, draft("2100")).await;
        assert!(assert_ok!(autosaver.flush(id).await));
        assert_eq!(store.last_rate(), Some(dec("2100")));

        settle(Duration::from_millis(3000)).await;
        assert_eq!(store.saves.lock().unwrap().len(), 2);
        assert_eq!(store.last_rate(), Some(dec("2100")));
        assert!(!autosaver.is_dirty(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_waits_for_save_in_flight() {
        let (autosaver, store) = autosaver();
        let id = Uuid::new_v4();
        *store.slow_rate.lock().unwrap() = Some(dec("2000"));

        autosaver.stage(id, draft("2000")).await;
        settle(Duration::from_millis(1600)).await;

        autosaver.discard(id).await;
        assert_eq!(store.saves.lock().unwrap().len(), 1);
        assert!(!autosaver.is_dirty(id).await);

        settle(Duration::from_millis(3000)).await;
        assert_eq!(store.saves.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_and_flush_all() {
        let (autosaver, store) = autosaver();
        let kept = Uuid::new_v4();
        let dropped = Uuid::new_v4();

        autosaver.stage(kept, draft("2000")).await;
        autosaver.stage(dropped, draft("2100")).await;
        assert!(autosaver.discard(dropped).await);
        assert!(!autosaver.discard(dropped).await);

        assert_eq!(autosaver.flush_all().await, 1);
        let saves = store.saves.lock().unwrap().clone();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, kept);
    }
}
