use crate::chunking::{chunk_pages, ChunkingConfig};
use crate::error::IngestError;
use crate::extractor::extract_pdf;
use crate::models::{DocumentRecord, EmbeddingStatus, IngestReceipt, NewDocument};
use crate::traits::{BlobStore, DocumentStore, VectorIndex};
use chrono::Utc;
use regex::Regex;
use tracing::{info, warn};

pub const PDF_MIME_TYPE: &str = "application/pdf";

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Logical partition of the index and the storage key prefix.
    pub namespace: String,
    pub max_file_bytes: usize,
    /// Upsert batch bound; batches run sequentially to bound load on the
    /// index backend and allow partial-batch retry.
    pub upsert_batch_size: usize,
    pub chunking: ChunkingConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            namespace: "hospital-kb".to_string(),
            max_file_bytes: 10 * 1024 * 1024,
            upsert_batch_size: 30,
            chunking: ChunkingConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Orchestrates upload → extract → chunk → upsert for one PDF. Steps run
/// strictly in that order; any failure after the blob upload rolls the blob
/// back so a document that was never indexed leaves nothing behind.
pub struct IngestionPipeline<B, V, D> {
    blobs: B,
    index: V,
    documents: D,
    config: IngestConfig,
}

impl<B, V, D> IngestionPipeline<B, V, D>
where
    B: BlobStore + Send + Sync,
    V: VectorIndex + Send + Sync,
    D: DocumentStore + Send + Sync,
{
    pub fn new(blobs: B, index: V, documents: D, config: IngestConfig) -> Self {
        Self {
            blobs,
            index,
            documents,
            config,
        }
    }

    pub async fn ingest(&self, upload: FileUpload) -> Result<IngestReceipt, IngestError> {
        self.validate(&upload)?;

        let safe_name = sanitize_file_name(&upload.file_name)?;
        let storage_key = format!(
            "{}/{}-{}",
            self.config.namespace,
            Utc::now().timestamp_millis(),
            safe_name
        );

        // First externally visible side effect.
        self.blobs
            .put(&storage_key, &upload.bytes, &upload.mime_type)
            .await
            .map_err(IngestError::Store)?;

        let record = match self
            .documents
            .insert(NewDocument {
                name: upload.file_name.clone(),
                storage_path: storage_key.clone(),
                file_size: upload.bytes.len() as i64,
                mime_type: upload.mime_type.clone(),
                embedding_status: EmbeddingStatus::Pending,
            })
            .await
        {
            Ok(record) => record,
            Err(error) => {
                self.rollback_blob(&storage_key).await;
                return Err(error.into());
            }
        };

        match self.embed_and_finalize(&record, &upload).await {
            Ok(receipt) => {
                info!(
                    document_id = %receipt.document_id,
                    pages = receipt.page_count,
                    chunks = receipt.chunk_count,
                    "document ingested"
                );
                Ok(receipt)
            }
            Err(error) => {
                self.rollback_blob(&storage_key).await;
                if let Err(cleanup) = self.documents.delete(record.id).await {
                    warn!(
                        document_id = %record.id,
                        error = %cleanup,
                        "could not remove metadata for aborted ingest"
                    );
                }
                Err(error)
            }
        }
    }

    async fn embed_and_finalize(
        &self,
        record: &DocumentRecord,
        upload: &FileUpload,
    ) -> Result<IngestReceipt, IngestError> {
        let extracted = extract_pdf(&upload.bytes)?;
        let chunks = chunk_pages(
            &record.id.to_string(),
            &extracted.pages,
            extracted.producer.as_deref(),
            self.config.chunking,
        )?;

        for batch in chunks.chunks(self.config.upsert_batch_size.max(1)) {
            self.index
                .upsert_records(batch)
                .await
                .map_err(IngestError::Store)?;
        }

        self.documents
            .finalize(record.id, extracted.pages.len() as i64, chunks.len() as i64)
            .await
            .map_err(IngestError::Store)?;

        Ok(IngestReceipt {
            document_id: record.id,
            page_count: extracted.pages.len(),
            chunk_count: chunks.len(),
        })
    }

    async fn rollback_blob(&self, storage_key: &str) {
        if let Err(error) = self.blobs.remove(&[storage_key.to_string()]).await {
            warn!(key = %storage_key, error = %error, "rollback of uploaded blob failed");
        }
    }

    fn validate(&self, upload: &FileUpload) -> Result<(), IngestError> {
        if upload.mime_type != PDF_MIME_TYPE {
            return Err(IngestError::Validation(format!(
                "only {PDF_MIME_TYPE} uploads are accepted, got {}",
                upload.mime_type
            )));
        }
        if upload.bytes.is_empty() {
            return Err(IngestError::Validation(
                "uploaded file is empty".to_string(),
            ));
        }
        if upload.bytes.len() > self.config.max_file_bytes {
            return Err(IngestError::Validation(format!(
                "file is {} bytes, limit is {}",
                upload.bytes.len(),
                self.config.max_file_bytes
            )));
        }
        Ok(())
    }
}

/// Normalizes an uploaded file name into a safe storage key component:
/// whitespace collapses to underscores and anything outside
/// `[A-Za-z0-9._-]` is stripped.
pub fn sanitize_file_name(name: &str) -> Result<String, IngestError> {
    let collapsed = Regex::new(r"\s+")?.replace_all(name.trim(), "_");
    let safe = Regex::new(r"[^A-Za-z0-9._-]")?
        .replace_all(&collapsed, "")
        .into_owned();

    if safe.chars().all(|c| matches!(c, '.' | '_' | '-')) {
        return Err(IngestError::Validation(format!(
            "file name has no usable characters: {name}"
        )));
    }

    Ok(safe)
}
