use crate::error::StoreError;
use crate::models::{ChunkRecord, SearchHit};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

const API_VERSION: &str = "2025-01";

/// Pinecone-style records API client. The index embeds chunk text server
/// side, so upserts and searches carry text rather than raw vectors.
#[derive(Clone)]
pub struct PineconeIndex {
    client: Client,
    endpoint: String,
    namespace: String,
    api_key: String,
}

impl PineconeIndex {
    pub fn new(
        endpoint: impl Into<String>,
        namespace: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            namespace: namespace.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert_records(&self, batch: &[ChunkRecord]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        // Records are newline-delimited JSON, one per chunk. `_id` is the
        // deterministic chunk id, so re-upserting overwrites.
        let payload: String = batch
            .iter()
            .map(|chunk| {
                serde_json::to_string(&json!({
                    "_id": chunk.id,
                    "text": chunk.text,
                    "document_id": chunk.document_id,
                    "chunk_page": chunk.page_number,
                    "category": chunk.category,
                }))
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?
            .join("\n")
            + "\n";

        let response = self
            .client
            .post(format!(
                "{}/records/namespaces/{}/upsert",
                self.endpoint, self.namespace
            ))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "pinecone".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn search_records(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let response = self
            .client
            .post(format!(
                "{}/records/namespaces/{}/search",
                self.endpoint, self.namespace
            ))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&json!({
                "query": {
                    "top_k": top_k,
                    "inputs": { "text": query },
                },
                "fields": ["text", "document_id", "chunk_page", "category"],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "pinecone".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(parse_search_hits(&parsed))
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .post(format!("{}/vectors/delete", self.endpoint))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&json!({
                "namespace": self.namespace,
                "filter": { "document_id": { "$eq": document_id } },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "pinecone".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }
}

fn parse_search_hits(parsed: &Value) -> Vec<SearchHit> {
    let hits = parsed
        .pointer("/result/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut result = Vec::new();
    for hit in hits {
        let id = hit
            .pointer("/_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let score = hit
            .pointer("/_score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let text = hit
            .pointer("/fields/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let document_id = hit
            .pointer("/fields/document_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let page_number = hit
            .pointer("/fields/chunk_page")
            .and_then(Value::as_u64)
            .map(|page| page as u32);

        result.push(SearchHit {
            id,
            document_id,
            score,
            text,
            page_number,
        });
    }

    result
}
