use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStatus {
    Pending,
    Embedded,
    Deleted,
}

/// One uploaded source file, as recorded in the `pdf_documents` table.
///
/// Invariants maintained procedurally across stores:
/// - `chunk_count > 0` implies status is `Embedded` or `Deleted`.
/// - status `Deleted` implies no vectors for this document remain indexed.
/// - `storage_path == None` implies no object exists at that key in blob
///   storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub name: String,
    pub storage_path: Option<String>,
    pub file_size: i64,
    pub mime_type: String,
    #[serde(rename = "document_pages")]
    pub page_count: i64,
    #[serde(rename = "document_chunks")]
    pub chunk_count: i64,
    #[serde(rename = "embedded_status")]
    pub embedding_status: EmbeddingStatus,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `pdf_documents`. The record starts out `Pending` and
/// is finalized by the ingestion pipeline once vectors are in the index.
#[derive(Debug, Clone, Serialize)]
pub struct NewDocument {
    pub name: String,
    pub storage_path: String,
    pub file_size: i64,
    pub mime_type: String,
    #[serde(rename = "embedded_status")]
    pub embedding_status: EmbeddingStatus,
}

/// Index-resident unit of embedding and retrieval. Ids are ordinal-derived
/// (`{document_id}-chunk-{n}`) so re-ingesting the same document overwrites
/// rather than duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub page_number: Option<u32>,
    pub category: String,
}

/// One nearest-neighbour match returned by the embedding index, score-sorted
/// descending by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub document_id: String,
    pub score: f64,
    pub text: String,
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub message_count: i64,
    pub is_closed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Message payload, tagged at write time so readers never have to sniff
/// whether a stored string is plain text or a structured answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Structured {
        answer: String,
        #[serde(default)]
        suggestions: Vec<String>,
    },
}

impl MessageContent {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text { text: value.into() }
    }

    /// The human-readable body regardless of variant.
    pub fn display_text(&self) -> &str {
        match self {
            Self::Text { text } => text,
            Self::Structured { answer, .. } => answer,
        }
    }
}

/// Point-in-time audit trail of which chunks backed an assistant answer.
/// Entries are not live references; they may outlive the chunks themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextChunk {
    #[serde(rename = "id")]
    pub chunk_id: String,
    pub score: f64,
    #[serde(rename = "page")]
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_session_id: Uuid,
    pub role: MessageRole,
    pub content: MessageContent,
    #[serde(default)]
    pub context_used: Vec<ContextChunk>,
    #[serde(default)]
    pub user_feedback: Option<i16>,
    #[serde(default)]
    pub feedback_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub chat_session_id: Uuid,
    pub role: MessageRole,
    pub content: MessageContent,
    pub context_used: Vec<ContextChunk>,
}

/// What the answer model produced for one question. `suggestions` carries
/// optional follow-up prompts when the model supplies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub answer: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Result of one completed `answer()` call: the user message and its paired
/// assistant message, anchored to a session.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub session_id: Uuid,
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReceipt {
    pub document_id: Uuid,
    pub page_count: usize,
    pub chunk_count: usize,
}
