//! Optimistic document sync
//!
//! Decouples UI responsiveness from write latency: writes and deletes run
//! detached from the caller, failures go to a pluggable policy (default:
//! log-only, no retry), and remote collections are mirrored into local read
//! state through a cancelable subscription.

use crate::models::BudgetDraft;
use crate::store::{paths, CollectionPath, DocumentPath, DocumentStore};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

//
// ================= Failure Policy =================
//

/// Strategy applied when a detached write or delete fails. The sync layer
/// never retries and never surfaces these errors to the caller.
pub trait FailurePolicy: Send + Sync {
    fn on_failure(&self, target: &DocumentPath, error: &crate::error::TutorError);
}

/// Default policy: log and move on.
pub struct LogOnly;

impl FailurePolicy for LogOnly {
    fn on_failure(&self, target: &DocumentPath, error: &crate::error::TutorError) {
        warn!("Detached write to {} failed: {}", target, error);
    }
}

//
// ================= Content Hash =================
//

/// SHA256 over the streamed JSON serialization of a value.
/// Used as the dirty check: equal hash means nothing to sync.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String> {
    let mut hasher = Sha256::new();
    serde_json::to_writer(&mut HashWriter(&mut hasher), value)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

//
// ================= Detached Writes =================

/// Fire-and-forget merge-write. Returns as soon as the task is spawned.
pub fn write_detached(
    store: Arc<dyn DocumentStore>,
    policy: Arc<dyn FailurePolicy>,
    path: DocumentPath,
    data: Value,
) {
    tokio::spawn(async move {
        if let Err(error) = store.set_merge(&path, data).await {
            policy.on_failure(&path, &error);
        }
    });
}

/// Fire-and-forget single-document delete.
pub fn delete_detached(
    store: Arc<dyn DocumentStore>,
    policy: Arc<dyn FailurePolicy>,
    path: DocumentPath,
) {
    tokio::spawn(async move {
        if let Err(error) = store.delete(&path).await {
            policy.on_failure(&path, &error);
        }
    });
}

//
// ================= Budget Autosave =================
//

struct SyncedDraft {
    hash: String,
    doc: DocumentPath,
}

/// Write path of the budget simulator: tracks the last-synced draft per
/// user and schedules a merge-write only when the draft actually changed.
pub struct DraftAutosave {
    store: Arc<dyn DocumentStore>,
    policy: Arc<dyn FailurePolicy>,
    synced: RwLock<HashMap<Uuid, SyncedDraft>>,
}

impl DraftAutosave {
    pub fn new(store: Arc<dyn DocumentStore>, policy: Arc<dyn FailurePolicy>) -> Self {
        Self {
            store,
            policy,
            synced: RwLock::new(HashMap::new()),
        }
    }

    /// Schedule a merge-write of the draft if it is dirty. Returns `true`
    /// when a write was scheduled, `false` when the draft matched the last
    /// synced state. The write itself runs detached; this method never
    /// waits for it and its failures are handled by the policy alone.
    pub async fn push_budget(&self, user_id: Uuid, draft: &BudgetDraft) -> Result<bool> {
        let hash = content_hash(draft)?;

        let mut synced = self.synced.write().await;

        if let Some(state) = synced.get(&user_id) {
            if state.hash == hash {
                return Ok(false);
            }
        }

        let doc = match synced.get(&user_id) {
            Some(state) => state.doc.clone(),
            None => self.singleton_budget_doc(user_id).await?,
        };

        // Record the new state before the write lands: last caller wins.
        synced.insert(
            user_id,
            SyncedDraft {
                hash,
                doc: doc.clone(),
            },
        );
        drop(synced);

        let mut data = serde_json::to_value(draft)?;
        if let Value::Object(ref mut map) = data {
            map.insert("userId".to_string(), Value::String(user_id.to_string()));
        }

        write_detached(self.store.clone(), self.policy.clone(), doc, data);
        Ok(true)
    }

    /// The budget collection holds one document per user; reuse it when it
    /// exists, otherwise allocate a fresh id.
    async fn singleton_budget_doc(&self, user_id: Uuid) -> Result<DocumentPath> {
        let collection = paths::user_budgets(user_id);
        let existing = self.store.list(&collection).await?;

        Ok(match existing.first() {
            Some(doc) => collection.doc(doc.id),
            None => collection.new_doc(),
        })
    }
}

//
// ================= Collection Mirror =================
//

/// Local mirror state of a remote collection.
#[derive(Debug, Clone)]
pub enum Snapshot<T> {
    /// No data has arrived yet.
    Loading,
    /// The full current contents, possibly empty.
    Loaded(Vec<T>),
}

impl<T> Snapshot<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Snapshot::Loaded(_))
    }
}

/// Cancelable handle over a collection subscription. Dropping the handle
/// stops the mirror task.
pub struct SubscriptionHandle<T> {
    rx: watch::Receiver<Snapshot<T>>,
    task: JoinHandle<()>,
}

impl<T: Clone> SubscriptionHandle<T> {
    /// The latest mirrored state.
    pub fn current(&self) -> Snapshot<T> {
        self.rx.borrow().clone()
    }

    /// Wait until the mirror is replaced. Returns `false` once the
    /// subscription has been canceled.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    pub fn cancel(self) {
        self.task.abort();
    }
}

impl<T> Drop for SubscriptionHandle<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Mirror a remote collection into local state. Each poll that observes a
/// change replaces the mirror in full; consumers never see partial patches.
pub fn watch_collection<T>(
    store: Arc<dyn DocumentStore>,
    collection: CollectionPath,
    poll_interval: Duration,
) -> SubscriptionHandle<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let (tx, rx) = watch::channel(Snapshot::Loading);

    let task = tokio::spawn(async move {
        let mut last: Option<Vec<(Uuid, Value)>> = None;

        loop {
            match store.list(&collection).await {
                Ok(docs) => {
                    let raw: Vec<(Uuid, Value)> =
                        docs.iter().map(|d| (d.id, d.data.clone())).collect();

                    if last.as_ref() != Some(&raw) {
                        let typed: Vec<T> = docs
                            .iter()
                            .filter_map(|doc| match doc.deserialize() {
                                Ok(value) => Some(value),
                                Err(error) => {
                                    warn!(
                                        "Skipping undecodable document {} in {}: {}",
                                        doc.id,
                                        collection.as_str(),
                                        error
                                    );
                                    None
                                }
                            })
                            .collect();

                        if tx.send(Snapshot::Loaded(typed)).is_err() {
                            return;
                        }
                        last = Some(raw);
                    }
                }
                Err(error) => {
                    // Keep the previous mirror on read failures.
                    warn!("Failed to poll {}: {}", collection.as_str(), error);
                }
            }

            tokio::time::sleep(poll_interval).await;
        }
    });

    SubscriptionHandle { rx, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TutorError;
    use crate::models::{ExpenseEntry, Goal};
    use crate::store::{Document, InMemoryDocumentStore, WriteBatch};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn sample_draft() -> BudgetDraft {
        BudgetDraft {
            income: 5000.0,
            expenses: vec![
                ExpenseEntry {
                    name: "Renta".to_string(),
                    amount: 1500.0,
                },
                ExpenseEntry {
                    name: "Comida".to_string(),
                    amount: 600.0,
                },
            ],
        }
    }

    /// Store wrapper that counts merge-writes.
    struct CountingStore {
        inner: InMemoryDocumentStore,
        writes: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: InMemoryDocumentStore::new(),
                writes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl DocumentStore for CountingStore {
        async fn get(&self, path: &DocumentPath) -> Result<Option<Value>> {
            self.inner.get(path).await
        }

        async fn set_merge(&self, path: &DocumentPath, data: Value) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set_merge(path, data).await
        }

        async fn delete(&self, path: &DocumentPath) -> Result<()> {
            self.inner.delete(path).await
        }

        async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>> {
            self.inner.list(collection).await
        }

        async fn commit(&self, batch: WriteBatch) -> Result<()> {
            self.inner.commit(batch).await
        }
    }

    /// Store whose writes always fail.
    struct FailingStore;

    #[async_trait::async_trait]
    impl DocumentStore for FailingStore {
        async fn get(&self, _path: &DocumentPath) -> Result<Option<Value>> {
            Ok(None)
        }

        async fn set_merge(&self, _path: &DocumentPath, _data: Value) -> Result<()> {
            Err(TutorError::WriteFailed("store unavailable".to_string()))
        }

        async fn delete(&self, _path: &DocumentPath) -> Result<()> {
            Err(TutorError::WriteFailed("store unavailable".to_string()))
        }

        async fn list(&self, _collection: &CollectionPath) -> Result<Vec<Document>> {
            Ok(Vec::new())
        }

        async fn commit(&self, _batch: WriteBatch) -> Result<()> {
            Err(TutorError::BatchFailed("store unavailable".to_string()))
        }
    }

    /// Policy that records every failure it sees.
    #[derive(Default)]
    struct RecordingPolicy {
        failures: Mutex<Vec<String>>,
    }

    impl FailurePolicy for RecordingPolicy {
        fn on_failure(&self, target: &DocumentPath, error: &TutorError) {
            self.failures
                .lock()
                .unwrap()
                .push(format!("{}: {}", target, error));
        }
    }

    async fn settle<F: Fn() -> bool>(condition: F) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition did not settle in time");
    }

    #[tokio::test]
    async fn test_unchanged_draft_schedules_no_write() {
        let store = Arc::new(CountingStore::new());
        let autosave = DraftAutosave::new(store.clone(), Arc::new(LogOnly));
        let user_id = Uuid::new_v4();
        let draft = sample_draft();

        assert!(autosave.push_budget(user_id, &draft).await.unwrap());
        assert!(!autosave.push_budget(user_id, &draft).await.unwrap());

        settle(|| store.writes.load(Ordering::SeqCst) == 1).await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_modified_draft_schedules_second_write() {
        let store = Arc::new(CountingStore::new());
        let autosave = DraftAutosave::new(store.clone(), Arc::new(LogOnly));
        let user_id = Uuid::new_v4();

        let mut draft = sample_draft();
        assert!(autosave.push_budget(user_id, &draft).await.unwrap());

        draft.income = 6000.0;
        assert!(autosave.push_budget(user_id, &draft).await.unwrap());

        settle(|| store.writes.load(Ordering::SeqCst) == 2).await;
    }

    #[tokio::test]
    async fn test_budget_document_is_singleton_per_user() {
        let store = Arc::new(CountingStore::new());
        let autosave = DraftAutosave::new(store.clone(), Arc::new(LogOnly));
        let user_id = Uuid::new_v4();

        let mut draft = sample_draft();
        autosave.push_budget(user_id, &draft).await.unwrap();
        draft.income = 7000.0;
        autosave.push_budget(user_id, &draft).await.unwrap();

        settle(|| store.writes.load(Ordering::SeqCst) == 2).await;
        let docs = store.list(&paths::user_budgets(user_id)).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data["income"], 7000.0);
        assert!(docs[0].data.get("userId").is_some());
    }

    #[tokio::test]
    async fn test_write_failure_goes_to_policy_without_blocking_caller() {
        let policy = Arc::new(RecordingPolicy::default());
        let autosave = DraftAutosave::new(Arc::new(FailingStore), policy.clone());
        let user_id = Uuid::new_v4();

        // The push returns immediately even though the write will fail.
        let scheduled = autosave.push_budget(user_id, &sample_draft()).await.unwrap();
        assert!(scheduled);

        settle(|| !policy.failures.lock().unwrap().is_empty()).await;
        let failures = policy.failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("store unavailable"));
    }

    #[tokio::test]
    async fn test_detached_delete_removes_goal() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let user_id = Uuid::new_v4();
        let goals = paths::user_goals(user_id);
        let doc = goals.new_doc();

        store
            .set_merge(&doc, json!({"name": "Meta", "targetAmount": 100.0, "savedAmount": 0.0}))
            .await
            .unwrap();

        delete_detached(store.clone(), Arc::new(LogOnly), doc.clone());

        for _ in 0..100 {
            if store.list(&goals).await.unwrap().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("goal was not deleted");
    }

    #[tokio::test]
    async fn test_watcher_transitions_from_loading_to_loaded() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let user_id = Uuid::new_v4();
        let goals = paths::user_goals(user_id);

        let mut handle: SubscriptionHandle<Goal> =
            watch_collection(store.clone(), goals.clone(), Duration::from_millis(10));

        // First snapshot: loaded and empty.
        while !handle.current().is_loaded() {
            assert!(handle.changed().await);
        }
        match handle.current() {
            Snapshot::Loaded(items) => assert!(items.is_empty()),
            Snapshot::Loading => unreachable!(),
        }

        // A new goal shows up as a full replacement.
        store
            .set_merge(
                &goals.new_doc(),
                json!({"name": "Vacaciones", "targetAmount": 1000.0, "savedAmount": 250.0}),
            )
            .await
            .unwrap();

        loop {
            assert!(handle.changed().await);
            if let Snapshot::Loaded(items) = handle.current() {
                if items.len() == 1 {
                    assert_eq!(items[0].name, "Vacaciones");
                    break;
                }
            }
        }

        handle.cancel();
    }

    #[tokio::test]
    async fn test_content_hash_tracks_changes() {
        let draft = sample_draft();
        let same = content_hash(&draft).unwrap();
        assert_eq!(same, content_hash(&draft).unwrap());

        let mut changed = sample_draft();
        changed.expenses[0].amount = 1501.0;
        assert_ne!(same, content_hash(&changed).unwrap());
    }
}
