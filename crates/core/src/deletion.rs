use crate::error::{DeleteError, StoreError};
use crate::models::{DocumentRecord, EmbeddingStatus};
use crate::traits::{BlobStore, DocumentStore, VectorIndex};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Progress of a three-store deletion. Each external call advances exactly
/// one stage and the new state is persisted on the document record before
/// the next call, so a crashed deletion resumes from where it stopped
/// instead of restarting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeleteStage {
    /// Nothing deleted yet; vectors are still searchable.
    Active,
    /// Vectors are gone from the index (status = deleted).
    IndexDeleted,
    /// The blob is gone too (storage_path = null).
    StorageDeleted,
    /// The metadata row itself was removed.
    FullyDeleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub document_id: Uuid,
    pub stage: DeleteStage,
}

/// Ordered, idempotent multi-store deletion: index first (hard gate), then
/// blob storage, then the metadata row. Deliberately not rollback-on-failure:
/// every failure handler moves the record forward toward "deleted" rather
/// than undoing prior steps, since a storage deletion cannot be undone and
/// re-embedding is what the index-first gate exists to avoid.
pub struct DeletionCoordinator<V, B, D> {
    index: V,
    blobs: B,
    documents: D,
}

impl<V, B, D> DeletionCoordinator<V, B, D>
where
    V: VectorIndex + Send + Sync,
    B: BlobStore + Send + Sync,
    D: DocumentStore + Send + Sync,
{
    pub fn new(index: V, blobs: B, documents: D) -> Self {
        Self {
            index,
            blobs,
            documents,
        }
    }

    pub async fn delete_document(&self, document_id: Uuid) -> Result<DeleteReport, DeleteError> {
        let record = match self
            .documents
            .fetch(document_id)
            .await
            .map_err(|source| halted(DeleteStage::Active, source))?
        {
            Some(record) => record,
            // A completed deletion removes the row, so a missing record is
            // indistinguishable from one already fully deleted. Re-deleting
            // must succeed, so absent resolves to a no-op.
            None => {
                info!(document_id = %document_id, "no record, treating as already deleted");
                return Ok(DeleteReport {
                    document_id,
                    stage: DeleteStage::FullyDeleted,
                });
            }
        };

        let mut stage = resume_stage(&record);
        info!(document_id = %document_id, resume_from = ?stage, "deleting document");

        if stage == DeleteStage::Active {
            // Hard gate: stale searchable vectors for a "deleted" document
            // are the worst inconsistency, so nothing else happens unless
            // this succeeds.
            self.index
                .delete_by_document(&document_id.to_string())
                .await
                .map_err(|source| halted(DeleteStage::Active, source))?;

            self.documents
                .set_status(document_id, EmbeddingStatus::Deleted)
                .await
                .map_err(|source| halted(DeleteStage::IndexDeleted, source))?;
            stage = DeleteStage::IndexDeleted;
        }

        if stage == DeleteStage::IndexDeleted {
            if let Some(path) = &record.storage_path {
                self.blobs
                    .remove(&[path.clone()])
                    .await
                    .map_err(|source| halted(DeleteStage::IndexDeleted, source))?;
            }

            self.documents
                .clear_storage_path(document_id)
                .await
                .map_err(|source| halted(DeleteStage::StorageDeleted, source))?;
            stage = DeleteStage::StorageDeleted;
        }

        if stage == DeleteStage::StorageDeleted {
            self.documents
                .delete(document_id)
                .await
                .map_err(|source| halted(DeleteStage::StorageDeleted, source))?;
        }

        info!(document_id = %document_id, "document fully deleted");
        Ok(DeleteReport {
            document_id,
            stage: DeleteStage::FullyDeleted,
        })
    }
}

fn halted(completed: DeleteStage, source: StoreError) -> DeleteError {
    DeleteError::Stage { completed, source }
}

/// Derives how far a previous deletion got from the persisted record, so a
/// repeated call skips completed stages instead of re-running them.
fn resume_stage(record: &DocumentRecord) -> DeleteStage {
    match (record.embedding_status, &record.storage_path) {
        (EmbeddingStatus::Deleted, None) => DeleteStage::StorageDeleted,
        (EmbeddingStatus::Deleted, Some(_)) => DeleteStage::IndexDeleted,
        _ => DeleteStage::Active,
    }
}
