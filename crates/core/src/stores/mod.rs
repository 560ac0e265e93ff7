pub mod gemini;
pub mod pinecone;
pub mod postgrest;
pub mod storage;

pub use gemini::GeminiGenerator;
pub use pinecone::PineconeIndex;
pub use postgrest::PostgrestStore;
pub use storage::BucketStore;
