use crate::error::StoreError;
use crate::models::{
    ChatMessage, ChatSession, DocumentRecord, EmbeddingStatus, NewDocument, NewMessage,
};
use crate::traits::{ConversationStore, DocumentStore};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;
use uuid::Uuid;

/// PostgREST client for the relational side: `chat_sessions`,
/// `chat_messages`, and `pdf_documents`, plus the atomic message-count RPC.
#[derive(Clone)]
pub struct PostgrestStore {
    client: Client,
    endpoint: String,
    service_key: String,
}

impl PostgrestStore {
    pub fn new(endpoint: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            service_key: service_key.into(),
        }
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.endpoint, table)
    }

    fn row_url(&self, table: &str, id: Uuid) -> String {
        format!("{}/{}?id=eq.{}", self.endpoint, table, id)
    }

    async fn insert_returning<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        body: serde_json::Value,
    ) -> Result<T, StoreError> {
        let response = self
            .authed(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;

        let response = check_status(response)?;
        let mut rows: Vec<T> = response.json().await?;
        rows.pop().ok_or_else(|| StoreError::BackendResponse {
            backend: "postgrest".to_string(),
            details: format!("insert into {table} returned no row"),
        })
    }

    async fn patch_row(
        &self,
        table: &str,
        id: Uuid,
        body: serde_json::Value,
    ) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.patch(self.row_url(table, id)))
            .json(&body)
            .send()
            .await?;

        check_status(response)?;
        Ok(())
    }
}

fn check_status(response: Response) -> Result<Response, StoreError> {
    if !response.status().is_success() {
        return Err(StoreError::BackendResponse {
            backend: "postgrest".to_string(),
            details: response.status().to_string(),
        });
    }
    Ok(response)
}

#[async_trait]
impl ConversationStore for PostgrestStore {
    async fn create_session(
        &self,
        owner_id: Uuid,
        title: &str,
    ) -> Result<ChatSession, StoreError> {
        self.insert_returning(
            "chat_sessions",
            json!({ "owner_id": owner_id, "title": title }),
        )
        .await
    }

    async fn insert_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        self.insert_returning("chat_messages", serde_json::to_value(&message)?)
            .await
    }

    async fn increment_message_count(&self, session_id: Uuid, by: i64) -> Result<(), StoreError> {
        let response = self
            .authed(
                self.client
                    .post(format!("{}/rpc/increment_message_count", self.endpoint)),
            )
            .json(&json!({ "session_id": session_id, "increment_by": by }))
            .send()
            .await?;

        check_status(response)?;
        Ok(())
    }

    async fn record_feedback(
        &self,
        message_id: Uuid,
        score: i16,
        text: Option<&str>,
    ) -> Result<(), StoreError> {
        self.patch_row(
            "chat_messages",
            message_id,
            json!({ "user_feedback": score, "feedback_text": text }),
        )
        .await
    }
}

#[async_trait]
impl DocumentStore for PostgrestStore {
    async fn insert(&self, document: NewDocument) -> Result<DocumentRecord, StoreError> {
        self.insert_returning("pdf_documents", serde_json::to_value(&document)?)
            .await
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<DocumentRecord>, StoreError> {
        let response = self
            .authed(self.client.get(self.row_url("pdf_documents", id)))
            .send()
            .await?;

        let response = check_status(response)?;
        let mut rows: Vec<DocumentRecord> = response.json().await?;
        Ok(rows.pop())
    }

    async fn list(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let response = self
            .authed(self.client.get(format!(
                "{}?order=created_at.desc",
                self.table_url("pdf_documents")
            )))
            .send()
            .await?;

        let response = check_status(response)?;
        Ok(response.json().await?)
    }

    async fn set_status(&self, id: Uuid, status: EmbeddingStatus) -> Result<(), StoreError> {
        self.patch_row(
            "pdf_documents",
            id,
            json!({ "embedded_status": status }),
        )
        .await
    }

    async fn finalize(
        &self,
        id: Uuid,
        page_count: i64,
        chunk_count: i64,
    ) -> Result<(), StoreError> {
        self.patch_row(
            "pdf_documents",
            id,
            json!({
                "embedded_status": EmbeddingStatus::Embedded,
                "document_pages": page_count,
                "document_chunks": chunk_count,
            }),
        )
        .await
    }

    async fn clear_storage_path(&self, id: Uuid) -> Result<(), StoreError> {
        self.patch_row("pdf_documents", id, json!({ "storage_path": null }))
            .await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.delete(self.row_url("pdf_documents", id)))
            .send()
            .await?;

        check_status(response)?;
        Ok(())
    }
}
