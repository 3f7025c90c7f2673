use crate::config::{endpoint, OpenAiConfig};
use crate::models::ModelBackend;
use crate::synthesis::AnswerBackend;
use crate::SynthesisError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

const SYSTEM_PROMPT: &str = "Answer questions based on the provided context.";

pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl AnswerBackend for OpenAiBackend {
    fn model(&self) -> ModelBackend {
        ModelBackend::OpenAi
    }

    async fn generate(&self, question: &str, context: &str) -> Result<String, SynthesisError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| SynthesisError::MissingCredentials("openai".to_string()))?;
        let url = endpoint(&self.config.base_url, "v1/chat/completions")?;

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&json!({
                "model": self.config.model,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": format!("Context: {context}\n\nQuestion: {question}") },
                ],
                "max_tokens": 500,
                "temperature": 0.1,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SynthesisError::BackendResponse {
                backend: "openai".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_completion(&parsed)
    }
}

fn parse_completion(parsed: &Value) -> Result<String, SynthesisError> {
    parsed
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SynthesisError::BackendResponse {
            backend: "openai".to_string(),
            details: "completion has no message content".to_string(),
        })
}
