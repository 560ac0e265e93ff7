use crate::error::StoreError;
use crate::models::GeneratedAnswer;
use crate::traits::AnswerGenerator;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

/// The fixed reply the model is instructed to give when the context does not
/// contain the answer. The prompt contract is the only groundedness check;
/// the engine does not verify it independently.
pub const NOT_AVAILABLE_SENTINEL: &str = "Information not available";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Answer generator backed by the Gemini `generateContent` API.
#[derive(Clone)]
pub struct GeminiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn request_url(&self) -> Result<Url, StoreError> {
        let base = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );
        Ok(Url::parse_with_params(&base, [("key", &self.api_key)])?)
    }
}

fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a hospital information assistant.\n\
         \n\
         RULES:\n\
         - Answer ONLY from the given context\n\
         - Maximum 10 lines\n\
         - Clear, short, factual\n\
         - If answer is missing, say: \"{NOT_AVAILABLE_SENTINEL}\"\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         User Question:\n\
         {question}\n\
         \n\
         Short Answer:\n"
    )
}

fn parse_answer(parsed: &Value) -> GeneratedAnswer {
    let answer = parsed
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE_SENTINEL.to_string());

    GeneratedAnswer {
        answer,
        suggestions: Vec::new(),
    }
}

#[async_trait]
impl AnswerGenerator for GeminiGenerator {
    async fn generate(
        &self,
        question: &str,
        context: &str,
    ) -> Result<GeneratedAnswer, StoreError> {
        let response = self
            .client
            .post(self.request_url()?)
            .json(&json!({
                "contents": [
                    {
                        "role": "user",
                        "parts": [{ "text": build_prompt(question, context) }],
                    }
                ],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "gemini".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(parse_answer(&parsed))
    }
}
