use crate::error::StoreError;
use crate::traits::BlobStore;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use url::Url;

/// Supabase-storage-style object store scoped to one bucket.
#[derive(Clone)]
pub struct BucketStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    service_key: String,
}

impl BucketStore {
    pub fn new(
        endpoint: &str,
        bucket: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            client: Client::new(),
            endpoint: Url::parse(endpoint)?,
            bucket: bucket.into(),
            service_key: service_key.into(),
        })
    }

    fn object_url(&self, key: &str) -> Result<Url, StoreError> {
        Ok(self
            .endpoint
            .join(&format!("object/{}/{}", self.bucket, key))?)
    }
}

#[async_trait]
impl BlobStore for BucketStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.object_url(key)?)
            .bearer_auth(&self.service_key)
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "storage".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StoreError> {
        let url = self.endpoint.join(&format!("object/{}", self.bucket))?;
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.service_key)
            .json(&json!({ "prefixes": keys }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "storage".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }
}
