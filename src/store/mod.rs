//! Hierarchical document store
//!
//! Collections are scoped `users/{userId}/{goals|budgets|learningPaths}`,
//! with `learningPaths/{id}/modules/{id}/lessons/{id}` nested below.
//! Documents are schemaless JSON records. Two backends: in-memory for
//! development and tests, Postgres for deployment.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;

use crate::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

/// Maximum operations per batch, matching the hosted-store ceiling.
pub const MAX_BATCH_OPS: usize = 500;

/// A collection reference, e.g. `users/{id}/goals`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Reference a document in this collection by id.
    pub fn doc(&self, id: Uuid) -> DocumentPath {
        DocumentPath {
            parent: self.clone(),
            id,
        }
    }

    /// Reference a document with a freshly allocated id.
    pub fn new_doc(&self) -> DocumentPath {
        self.doc(Uuid::new_v4())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A single-document reference within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    parent: CollectionPath,
    id: Uuid,
}

impl DocumentPath {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.parent
    }

    /// A subcollection nested under this document.
    pub fn subcollection(&self, name: &str) -> CollectionPath {
        CollectionPath(format!("{}/{}/{}", self.parent.0, self.id, name))
    }

    /// Full slash-separated path of this document.
    pub fn path(&self) -> String {
        format!("{}/{}", self.parent.0, self.id)
    }
}

impl std::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Path builders for the per-user collections.
pub mod paths {
    use super::{CollectionPath, DocumentPath};
    use uuid::Uuid;

    pub fn user_goals(user_id: Uuid) -> CollectionPath {
        CollectionPath(format!("users/{}/goals", user_id))
    }

    pub fn user_budgets(user_id: Uuid) -> CollectionPath {
        CollectionPath(format!("users/{}/budgets", user_id))
    }

    pub fn user_learning_paths(user_id: Uuid) -> CollectionPath {
        CollectionPath(format!("users/{}/learningPaths", user_id))
    }

    pub fn modules(learning_path: &DocumentPath) -> CollectionPath {
        learning_path.subcollection("modules")
    }

    pub fn lessons(module: &DocumentPath) -> CollectionPath {
        module.subcollection("lessons")
    }
}

/// A document read back from a collection.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub data: Value,
}

impl Document {
    /// Deserialize the document into a typed record. The document id is
    /// injected into the object under `id` before deserializing.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let mut data = self.data.clone();
        if let Value::Object(ref mut map) = data {
            map.insert("id".to_string(), Value::String(self.id.to_string()));
        }
        Ok(serde_json::from_value(data)?)
    }
}

/// A staged set of writes committed atomically.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Full-document write (overwrites any existing fields).
    Set { path: DocumentPath, data: Value },
    Delete { path: DocumentPath },
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: DocumentPath, data: Value) {
        self.ops.push(WriteOp::Set { path, data });
    }

    pub fn delete(&mut self, path: DocumentPath) {
        self.ops.push(WriteOp::Delete { path });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Trait for the remote document store.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>>;

    /// Merge-write: top-level fields of `data` replace existing fields,
    /// other fields are left untouched. Last writer wins per field.
    async fn set_merge(&self, path: &DocumentPath, data: Value) -> Result<()>;

    async fn delete(&self, path: &DocumentPath) -> Result<()>;

    /// List the direct child documents of a collection.
    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>>;

    /// Commit a batch atomically: either every operation applies or none do.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}

/// Shallow field merge shared by backends. Non-object targets or payloads
/// fall back to replacement.
pub(crate) fn merge_fields(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                target.insert(key, value);
            }
        }
        (target, source) => *target = source,
    }
}
