//! In-memory document store for development and tests

use super::{
    merge_fields, CollectionPath, Document, DocumentPath, DocumentStore, WriteBatch, WriteOp,
    MAX_BATCH_OPS,
};
use crate::error::TutorError;
use crate::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keyed by full document path. BTreeMap keeps listings in a stable order.
pub struct InMemoryDocumentStore {
    docs: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            docs: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Total number of documents across all collections.
    pub async fn document_count(&self) -> usize {
        self.docs.read().await.len()
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>> {
        let docs = self.docs.read().await;
        Ok(docs.get(&path.path()).cloned())
    }

    async fn set_merge(&self, path: &DocumentPath, data: Value) -> Result<()> {
        let mut docs = self.docs.write().await;
        match docs.get_mut(&path.path()) {
            Some(existing) => merge_fields(existing, data),
            None => {
                docs.insert(path.path(), data);
            }
        }
        Ok(())
    }

    async fn delete(&self, path: &DocumentPath) -> Result<()> {
        let mut docs = self.docs.write().await;
        docs.remove(&path.path());
        Ok(())
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>> {
        let prefix = format!("{}/", collection.as_str());
        let docs = self.docs.read().await;

        Ok(docs
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| !key[prefix.len()..].contains('/'))
            .filter_map(|(key, data)| {
                let id = Uuid::parse_str(&key[prefix.len()..]).ok()?;
                Some(Document {
                    id,
                    data: data.clone(),
                })
            })
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.len() > MAX_BATCH_OPS {
            return Err(TutorError::BatchFailed(format!(
                "batch of {} operations exceeds the limit of {}",
                batch.len(),
                MAX_BATCH_OPS
            )));
        }

        // Single write lock for the whole batch: all or nothing.
        let mut docs = self.docs.write().await;
        for op in batch.into_ops() {
            match op {
                WriteOp::Set { path, data } => {
                    docs.insert(path.path(), data);
                }
                WriteOp::Delete { path } => {
                    docs.remove(&path.path());
                }
            }
        }
        Ok(())
    }
}
