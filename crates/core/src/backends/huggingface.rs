use crate::config::HuggingFaceConfig;
use crate::models::ModelBackend;
use crate::synthesis::AnswerBackend;
use crate::SynthesisError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Context beyond this many characters is cut before it reaches the model.
const MAX_CONTEXT_CHARS: usize = 1_000;

pub struct HuggingFaceBackend {
    client: Client,
    config: HuggingFaceConfig,
}

impl HuggingFaceBackend {
    pub fn new(config: HuggingFaceConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl AnswerBackend for HuggingFaceBackend {
    fn model(&self) -> ModelBackend {
        ModelBackend::HuggingFace
    }

    async fn generate(&self, question: &str, context: &str) -> Result<String, SynthesisError> {
        let context = context.chars().take(MAX_CONTEXT_CHARS).collect::<String>();
        let url = url::Url::parse(&self.config.model_url)?;

        let response = self
            .client
            .post(url)
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&json!({
                "inputs": format!("Context: {context}\n\nQuestion: {question}\n\nAnswer:"),
                "parameters": {
                    "max_length": 500,
                    "temperature": 0.1,
                    "do_sample": true,
                },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SynthesisError::BackendResponse {
                backend: "huggingface".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_generated_text(&parsed)
    }
}

fn parse_generated_text(parsed: &Value) -> Result<String, SynthesisError> {
    if let Some(error) = parsed.pointer("/error").and_then(Value::as_str) {
        return Err(SynthesisError::BackendResponse {
            backend: "huggingface".to_string(),
            details: error.to_string(),
        });
    }

    parsed
        .pointer("/0/generated_text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SynthesisError::BackendResponse {
            backend: "huggingface".to_string(),
            details: "response has no generated_text".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::parse_generated_text;
    use serde_json::json;

    #[test]
    fn generated_text_is_read_from_first_item() {
        let parsed = json!([{ "generated_text": " Ten percent. " }]);
        assert_eq!(parse_generated_text(&parsed).unwrap(), "Ten percent.");
    }

    #[test]
    fn error_payloads_and_missing_text_are_rejected() {
        assert!(parse_generated_text(&json!({ "error": "Model is loading" })).is_err());
        assert!(parse_generated_text(&json!([])).is_err());
        assert!(parse_generated_text(&json!([{ "generated_text": "" }])).is_err());
    }
}
