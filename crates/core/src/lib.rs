pub mod chunking;
pub mod deletion;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_pages, normalize_whitespace, window_text, ChunkingConfig};
pub use deletion::{DeleteReport, DeleteStage, DeletionCoordinator};
pub use engine::{QueryEngine, BACKEND_TROUBLE_SENTINEL, DEFAULT_TOP_K, NO_MATCH_SENTINEL};
pub use error::{DeleteError, IngestError, QueryError, StoreError};
pub use extractor::{extract_pdf, ExtractedPdf, PageText};
pub use ingest::{
    sanitize_file_name, FileUpload, IngestConfig, IngestionPipeline, PDF_MIME_TYPE,
};
pub use models::{
    ChatMessage, ChatSession, ChatTurn, ChunkRecord, ContextChunk, DocumentRecord,
    EmbeddingStatus, GeneratedAnswer, IngestReceipt, MessageContent, MessageRole, NewDocument,
    NewMessage, SearchHit,
};
pub use stores::{BucketStore, GeminiGenerator, PineconeIndex, PostgrestStore};
pub use traits::{AnswerGenerator, BlobStore, ConversationStore, DocumentStore, VectorIndex};
