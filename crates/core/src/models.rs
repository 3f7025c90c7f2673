use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResult {
    pub answer: String,
    pub source_chunks: Vec<String>,
    pub confidence: f64,
    #[serde(default)]
    pub used_fallback: bool,
}

/// Which answer generation backend a request asks for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// Hosted free-tier inference.
    #[default]
    HuggingFace,
    /// Locally hosted model server.
    Ollama,
    /// Hosted premium provider.
    OpenAi,
    /// Sentence matching with no external dependency.
    Local,
}

impl ModelBackend {
    pub fn id(&self) -> &'static str {
        match self {
            ModelBackend::HuggingFace => "huggingface",
            ModelBackend::Ollama => "ollama",
            ModelBackend::OpenAi => "openai",
            ModelBackend::Local => "local",
        }
    }

    /// Unknown identifiers resolve to the local backend.
    pub fn from_id_lossy(id: &str) -> Self {
        id.parse().unwrap_or_else(|_| {
            tracing::warn!(model = %id, "unknown model identifier, using local fallback");
            ModelBackend::Local
        })
    }
}

impl fmt::Display for ModelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "huggingface" | "hugging-face" | "hf" => Ok(ModelBackend::HuggingFace),
            "ollama" => Ok(ModelBackend::Ollama),
            "openai" => Ok(ModelBackend::OpenAi),
            "local" | "fallback" => Ok(ModelBackend::Local),
            other => Err(format!("unknown model backend: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub question: String,
    pub model: ModelBackend,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: String,
    pub answer: String,
    pub source_chunks: Vec<String>,
    pub success: bool,
    pub message: String,
    /// Whole seconds, rounded.
    pub processing_time: u64,
    pub model: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub file_name: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryPage {
    pub records: Vec<AnalysisRecord>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    pub total_analyses: usize,
    /// Percentage in `[0, 100]`.
    pub success_rate: f64,
    pub avg_processing_time: f64,
    pub total_documents: usize,
}

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub max_file_bytes: usize,
    pub request_timeout: Duration,
    pub backend_timeout: Duration,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_200,
            chunk_overlap: 200,
            top_k: 3,
            max_file_bytes: MAX_FILE_BYTES,
            request_timeout: Duration::from_secs(60),
            backend_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_backend_parses_known_ids_case_insensitively() {
        assert_eq!("Ollama".parse::<ModelBackend>(), Ok(ModelBackend::Ollama));
        assert_eq!("openai".parse::<ModelBackend>(), Ok(ModelBackend::OpenAi));
        assert_eq!(" huggingface ".parse::<ModelBackend>(), Ok(ModelBackend::HuggingFace));
        assert!("gpt-9".parse::<ModelBackend>().is_err());
    }

    #[test]
    fn unknown_model_id_falls_back_to_local() {
        assert_eq!(ModelBackend::from_id_lossy("mystery"), ModelBackend::Local);
        assert_eq!(ModelBackend::from_id_lossy("ollama"), ModelBackend::Ollama);
    }

    #[test]
    fn record_serializes_with_camel_case_fields() {
        let record = AnalysisRecord {
            id: "a".to_string(),
            answer: "b".to_string(),
            source_chunks: vec!["c".to_string()],
            success: true,
            message: "ok".to_string(),
            processing_time: 2,
            model: "local".to_string(),
            confidence: 0.5,
            timestamp: Utc::now(),
            file_name: "report.pdf".to_string(),
            question: "why?".to_string(),
            user_id: None,
            checksum: "00".to_string(),
        };

        let value = serde_json::to_value(&record).expect("record should serialize");
        assert_eq!(value["sourceChunks"][0], "c");
        assert_eq!(value["processingTime"], 2);
        assert!(value.get("userId").is_none());
    }
}
