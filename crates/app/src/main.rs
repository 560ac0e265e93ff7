use chrono::Utc;
use clap::{Parser, Subcommand};
use hospital_kb_core::stores::gemini::DEFAULT_MODEL;
use hospital_kb_core::{
    BucketStore, DeletionCoordinator, FileUpload, GeminiGenerator, IngestConfig,
    IngestionPipeline, PineconeIndex, PostgrestStore, QueryEngine, VectorIndex,
    ConversationStore, DocumentStore, DEFAULT_TOP_K, PDF_MIME_TYPE,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "hospital-kb", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Pinecone index host
    #[arg(long, env = "PINECONE_URL", default_value = "http://localhost:5080")]
    pinecone_url: String,

    /// Pinecone namespace holding this knowledge base
    #[arg(long, default_value = "hospital-kb")]
    pinecone_namespace: String,

    /// Pinecone API key
    #[arg(long, env = "PINECONE_API_KEY", default_value = "")]
    pinecone_api_key: String,

    /// Object storage base URL
    #[arg(
        long,
        env = "STORAGE_URL",
        default_value = "http://localhost:8000/storage/v1/"
    )]
    storage_url: String,

    /// Object storage bucket for uploaded PDFs
    #[arg(long, default_value = "pdfs")]
    storage_bucket: String,

    /// Object storage service key
    #[arg(long, env = "STORAGE_SERVICE_KEY", default_value = "")]
    storage_key: String,

    /// Gemini API base URL
    #[arg(
        long,
        env = "GEMINI_URL",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    gemini_url: String,

    /// Gemini model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    gemini_model: String,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", default_value = "")]
    gemini_api_key: String,

    /// PostgREST base URL for the relational store
    #[arg(long, env = "DATABASE_URL", default_value = "http://localhost:3000")]
    db_url: String,

    /// PostgREST service key
    #[arg(long, env = "DATABASE_SERVICE_KEY", default_value = "")]
    db_key: String,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest one PDF into storage and the embedding index.
    Ingest {
        /// Path to the PDF file.
        file: PathBuf,
    },
    /// Ask a question answered from the knowledge base.
    Ask {
        /// The question, at most 500 characters.
        question: String,
        /// Existing chat session to continue; a new one is created otherwise.
        #[arg(long)]
        session: Option<Uuid>,
        /// Session owner; an anonymous one is generated otherwise.
        #[arg(long)]
        owner: Option<Uuid>,
        /// Number of chunks to retrieve.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// Search the index directly, without generation or persistence.
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// List ingested documents.
    Documents,
    /// Delete a document from index, storage, and metadata, in that order.
    Delete {
        document_id: Uuid,
    },
    /// Attach feedback to an assistant message.
    Feedback {
        message_id: Uuid,
        /// -1, 0, or 1.
        score: i16,
        #[arg(long)]
        text: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let index = PineconeIndex::new(
        &cli.pinecone_url,
        &cli.pinecone_namespace,
        &cli.pinecone_api_key,
    );
    let database = PostgrestStore::new(&cli.db_url, &cli.db_key);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "hospital-kb boot"
    );

    match cli.command {
        Command::Ingest { file } => {
            let blobs = BucketStore::new(&cli.storage_url, &cli.storage_bucket, &cli.storage_key)?;
            let config = IngestConfig {
                namespace: cli.pinecone_namespace.clone(),
                ..IngestConfig::default()
            };
            let pipeline = IngestionPipeline::new(blobs, index, database, config);

            let file_name = file
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| anyhow::anyhow!("path has no file name: {}", file.display()))?
                .to_string();
            let bytes = tokio::fs::read(&file).await?;

            let receipt = pipeline
                .ingest(FileUpload {
                    file_name,
                    mime_type: PDF_MIME_TYPE.to_string(),
                    bytes,
                })
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!(
                "ingested document {} ({} pages, {} chunks)",
                receipt.document_id, receipt.page_count, receipt.chunk_count
            );
        }
        Command::Ask {
            question,
            session,
            owner,
            top_k,
        } => {
            let generator =
                GeminiGenerator::new(&cli.gemini_url, &cli.gemini_model, &cli.gemini_api_key);
            let engine = QueryEngine::new(index, generator, database).with_top_k(top_k);
            let owner_id = owner.unwrap_or_else(Uuid::new_v4);

            let turn = engine
                .answer(session, owner_id, &question)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("session: {}", turn.session_id);
            println!("{}", turn.assistant_message.content.display_text());
            for context in &turn.assistant_message.context_used {
                match context.page_number {
                    Some(page) => println!(
                        "  source: {} (score {:.4}, page {})",
                        context.chunk_id, context.score, page
                    ),
                    None => println!(
                        "  source: {} (score {:.4})",
                        context.chunk_id, context.score
                    ),
                }
            }
        }
        Command::Search { query, top_k } => {
            let hits = index
                .search_records(&query, top_k)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if hits.is_empty() {
                println!("no matches");
            }
            for hit in hits {
                println!(
                    "[{:.4}] {} document={} page={:?}",
                    hit.score, hit.id, hit.document_id, hit.page_number
                );
                println!("  {}", hit.text);
            }
        }
        Command::Documents => {
            for document in database
                .list()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?
            {
                println!(
                    "{} {} status={:?} pages={} chunks={} size={}",
                    document.id,
                    document.name,
                    document.embedding_status,
                    document.page_count,
                    document.chunk_count,
                    document.file_size
                );
            }
        }
        Command::Delete { document_id } => {
            let blobs = BucketStore::new(&cli.storage_url, &cli.storage_bucket, &cli.storage_key)?;
            let coordinator = DeletionCoordinator::new(index, blobs, database);

            let report = coordinator
                .delete_document(document_id)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("deleted document {} ({:?})", report.document_id, report.stage);
        }
        Command::Feedback {
            message_id,
            score,
            text,
        } => {
            database
                .record_feedback(message_id, score, text.as_deref())
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("feedback recorded for message {message_id}");
        }
    }

    Ok(())
}
