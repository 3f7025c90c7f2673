use crate::config::{endpoint, OllamaConfig};
use crate::models::ModelBackend;
use crate::synthesis::{build_prompt, AnswerBackend};
use crate::SynthesisError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl AnswerBackend for OllamaBackend {
    fn model(&self) -> ModelBackend {
        ModelBackend::Ollama
    }

    async fn generate(&self, question: &str, context: &str) -> Result<String, SynthesisError> {
        let url = endpoint(&self.config.base_url, "api/generate")?;

        let response = self
            .client
            .post(url)
            .json(&json!({
                "model": self.config.model,
                "prompt": build_prompt(question, context),
                "stream": false,
                "options": {
                    "temperature": 0.1,
                    "top_p": 0.9,
                    "max_tokens": 500,
                },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SynthesisError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        into_answer(parsed)
    }
}

fn into_answer(parsed: GenerateResponse) -> Result<String, SynthesisError> {
    if let Some(error) = parsed.error {
        return Err(SynthesisError::BackendResponse {
            backend: "ollama".to_string(),
            details: error,
        });
    }

    parsed
        .response
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| SynthesisError::BackendResponse {
            backend: "ollama".to_string(),
            details: "response field is empty".to_string(),
        })
}
