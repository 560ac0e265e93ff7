use crate::error::StoreError;
use crate::models::{
    ChatMessage, ChatSession, ChunkRecord, DocumentRecord, EmbeddingStatus, GeneratedAnswer,
    NewDocument, NewMessage, SearchHit,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Object storage holding the raw uploaded files. Keys are namespaced and
/// time-ordered to avoid collisions.
#[async_trait]
pub trait BlobStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StoreError>;

    async fn remove(&self, keys: &[String]) -> Result<(), StoreError>;
}

/// The vector-search backend. Stores chunk text (embedded server-side) and
/// answers nearest-neighbour queries with score-sorted hits.
#[async_trait]
pub trait VectorIndex {
    async fn upsert_records(&self, batch: &[ChunkRecord]) -> Result<(), StoreError>;

    async fn search_records(&self, query: &str, top_k: usize)
        -> Result<Vec<SearchHit>, StoreError>;

    async fn delete_by_document(&self, document_id: &str) -> Result<(), StoreError>;
}

/// The language-model seam. Implementations must ground the answer in the
/// supplied context only, returning a fixed "Information not available"
/// sentinel when the context does not contain the answer.
#[async_trait]
pub trait AnswerGenerator {
    async fn generate(&self, question: &str, context: &str)
        -> Result<GeneratedAnswer, StoreError>;
}

/// Append-only conversation log: sessions and their messages.
#[async_trait]
pub trait ConversationStore {
    async fn create_session(&self, owner_id: Uuid, title: &str)
        -> Result<ChatSession, StoreError>;

    async fn insert_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError>;

    /// Atomic counter bump; `by` is the number of messages added in the turn.
    async fn increment_message_count(&self, session_id: Uuid, by: i64) -> Result<(), StoreError>;

    /// The one permitted mutation of an existing message: a user-feedback
    /// annotation added after the fact.
    async fn record_feedback(
        &self,
        message_id: Uuid,
        score: i16,
        text: Option<&str>,
    ) -> Result<(), StoreError>;
}

/// Document-metadata table. Status and storage-path updates are the persisted
/// state of the deletion state machine.
#[async_trait]
pub trait DocumentStore {
    async fn insert(&self, document: NewDocument) -> Result<DocumentRecord, StoreError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<DocumentRecord>, StoreError>;

    async fn list(&self) -> Result<Vec<DocumentRecord>, StoreError>;

    async fn set_status(&self, id: Uuid, status: EmbeddingStatus) -> Result<(), StoreError>;

    /// Marks a record embedded and stores the final page and chunk counts.
    async fn finalize(&self, id: Uuid, page_count: i64, chunk_count: i64)
        -> Result<(), StoreError>;

    async fn clear_storage_path(&self, id: Uuid) -> Result<(), StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}
