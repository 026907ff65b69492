//! Learning-path fan-out persistence
//!
//! One generated learning path becomes a parent document plus module and
//! lesson children, committed as a single atomic batch. Ids are allocated
//! up front and `order` mirrors array position at both levels.

use crate::generation::GeneratedLearningPath;
use crate::models::{LearningModule, LearningPath, Lesson};
use crate::store::{paths, DocumentStore, WriteBatch};
use crate::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

/// Outcome of a committed fan-out.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedLearningPath {
    pub id: Uuid,
    pub document_count: usize,
}

/// Decompose a generated path into parent + modules + lessons and commit
/// the whole set atomically. On failure nothing is visible and the path is
/// not considered created.
pub async fn persist_learning_path(
    store: &dyn DocumentStore,
    user_id: Uuid,
    name: &str,
    description: &str,
    generated: &GeneratedLearningPath,
) -> Result<PersistedLearningPath> {
    let parent = paths::user_learning_paths(user_id).new_doc();
    let mut batch = WriteBatch::new();

    batch.set(
        parent.clone(),
        json!({
            "userId": user_id,
            "name": name,
            "description": description,
            "createdAt": Utc::now(),
        }),
    );

    for (module_index, module) in generated.modules.iter().enumerate() {
        let module_doc = paths::modules(&parent).new_doc();
        batch.set(
            module_doc.clone(),
            json!({
                "learningPathId": parent.id(),
                "title": module.title,
                "description": format!("Módulo {}", module_index + 1),
                "order": module_index as u32,
            }),
        );

        for (lesson_index, lesson) in module.lessons.iter().enumerate() {
            let lesson_doc = paths::lessons(&module_doc).new_doc();

            // Every generated field is copied verbatim.
            let mut data = serde_json::to_value(lesson)?;
            if let Value::Object(ref mut map) = data {
                map.insert(
                    "moduleId".to_string(),
                    Value::String(module_doc.id().to_string()),
                );
                map.insert("order".to_string(), json!(lesson_index as u32));
            }
            batch.set(lesson_doc, data);
        }
    }

    let document_count = batch.len();
    store.commit(batch).await?;

    info!(
        "Persisted learning path {} for user {} ({} documents)",
        parent.id(),
        user_id,
        document_count
    );

    Ok(PersistedLearningPath {
        id: parent.id(),
        document_count,
    })
}

/// An assembled path ready for display: modules and lessons in `order`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledLearningPath {
    #[serde(flatten)]
    pub path: LearningPath,
    pub modules: Vec<AssembledModule>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledModule {
    #[serde(flatten)]
    pub module: LearningModule,
    pub lessons: Vec<Lesson>,
}

/// Load the user's active learning path with its children. A user is
/// expected to own one path; when several exist the earliest created wins.
pub async fn load_active_learning_path(
    store: &dyn DocumentStore,
    user_id: Uuid,
) -> Result<Option<AssembledLearningPath>> {
    let collection = paths::user_learning_paths(user_id);

    let mut parents: Vec<LearningPath> = store
        .list(&collection)
        .await?
        .iter()
        .filter_map(|doc| doc.deserialize().ok())
        .collect();
    parents.sort_by_key(|path| path.created_at);

    let Some(path) = parents.into_iter().next() else {
        return Ok(None);
    };

    let parent_doc = collection.doc(path.id);
    let mut modules: Vec<LearningModule> = store
        .list(&paths::modules(&parent_doc))
        .await?
        .iter()
        .filter_map(|doc| doc.deserialize().ok())
        .collect();
    modules.sort_by_key(|module| module.order);

    let mut assembled = Vec::with_capacity(modules.len());
    for module in modules {
        let module_doc = paths::modules(&parent_doc).doc(module.id);
        let mut lessons: Vec<Lesson> = store
            .list(&paths::lessons(&module_doc))
            .await?
            .iter()
            .filter_map(|doc| doc.deserialize().ok())
            .collect();
        lessons.sort_by_key(|lesson| lesson.order);

        assembled.push(AssembledModule { module, lessons });
    }

    Ok(Some(AssembledLearningPath {
        path,
        modules: assembled,
    }))
}

/// Delete a learning path together with its modules and lessons in one
/// batch, so no orphaned children survive the parent.
pub async fn delete_learning_path(
    store: &dyn DocumentStore,
    user_id: Uuid,
    path_id: Uuid,
) -> Result<()> {
    let parent = paths::user_learning_paths(user_id).doc(path_id);
    let mut batch = WriteBatch::new();

    let modules = store.list(&paths::modules(&parent)).await?;
    for module in &modules {
        let module_doc = paths::modules(&parent).doc(module.id);
        for lesson in store.list(&paths::lessons(&module_doc)).await? {
            batch.delete(paths::lessons(&module_doc).doc(lesson.id));
        }
        batch.delete(module_doc);
    }
    batch.delete(parent);

    let removed = batch.len();
    store.commit(batch).await?;

    info!(
        "Deleted learning path {} for user {} ({} documents)",
        path_id, user_id, removed
    );

    Ok(())
}
