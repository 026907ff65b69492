//! Postgres-backed document store
//!
//! One `documents` table with a JSONB payload per document. Merge writes use
//! the JSONB `||` operator (top-level fields, last writer wins); batch
//! commits run inside a transaction.

use super::{
    CollectionPath, Document, DocumentPath, DocumentStore, WriteBatch, WriteOp, MAX_BATCH_OPS,
};
use crate::error::TutorError;
use crate::Result;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tokio::sync::OnceCell;

pub struct PostgresDocumentStore {
    pool: PgPool,
    schema_ready: OnceCell<()>,
}

impl PostgresDocumentStore {
    /// Build a lazily connecting store; the first query opens the pool.
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)
            .map_err(|e| TutorError::Database(format!("Failed to configure pool: {}", e)))?;

        Ok(Self {
            pool,
            schema_ready: OnceCell::new(),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS documents (
                      path TEXT PRIMARY KEY,
                      parent TEXT NOT NULL,
                      doc_id UUID NOT NULL,
                      data JSONB NOT NULL,
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_documents_parent
                    ON documents (parent);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                TutorError::Database(format!("Failed to initialize document schema: {}", e))
            })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT data FROM documents WHERE path = $1")
            .bind(path.path())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TutorError::Database(format!("Failed to load document: {}", e)))?;

        Ok(row.map(|r| r.get::<Value, _>("data")))
    }

    async fn set_merge(&self, path: &DocumentPath, data: Value) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (path, parent, doc_id, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (path) DO UPDATE
              SET data = documents.data || EXCLUDED.data,
                  updated_at = NOW()
            "#,
        )
        .bind(path.path())
        .bind(path.collection().as_str())
        .bind(path.id())
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(|e| TutorError::Database(format!("Failed to write document: {}", e)))?;

        Ok(())
    }

    async fn delete(&self, path: &DocumentPath) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query("DELETE FROM documents WHERE path = $1")
            .bind(path.path())
            .execute(&self.pool)
            .await
            .map_err(|e| TutorError::Database(format!("Failed to delete document: {}", e)))?;

        Ok(())
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            "SELECT doc_id, data FROM documents WHERE parent = $1 ORDER BY path ASC",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TutorError::Database(format!("Failed to list collection: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| Document {
                id: row.get("doc_id"),
                data: row.get("data"),
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

        self.ensure_schema().await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TutorError::BatchFailed(format!("Failed to begin transaction: {}", e)))?;

        for op in batch.into_ops() {
            match op {
                WriteOp::Set { path, data } => {
                    sqlx::query(
                        r#"
                        INSERT INTO documents (path, parent, doc_id, data)
                        VALUES ($1, $2, $3, $4)
                        ON CONFLICT (path) DO UPDATE
                          SET data = EXCLUDED.data,
                              updated_at = NOW()
                        "#,
                    )
                    .bind(path.path())
                    .bind(path.collection().as_str())
                    .bind(path.id())
                    .bind(&data)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        TutorError::BatchFailed(format!("Failed to stage batch write: {}", e))
                    })?;
                }
                WriteOp::Delete { path } => {
                    sqlx::query("DELETE FROM documents WHERE path = $1")
                        .bind(path.path())
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| {
                            TutorError::BatchFailed(format!("Failed to stage batch delete: {}", e))
                        })?;
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| TutorError::BatchFailed(format!("Failed to commit batch: {}", e)))?;

        Ok(())
    }
}
