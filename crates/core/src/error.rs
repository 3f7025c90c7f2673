use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(
        "No readable text found in PDF. This might be a scanned document, an image-based or an encrypted PDF."
    )]
    NoReadableText,

    #[error("Failed to extract text from PDF: {0}")]
    Failed(String),

    #[error("regex error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("missing credentials for {0}")]
    MissingCredentials(String),

    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum RankError {
    #[error("ranking failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("analysis not found: {0}")]
    NotFound(String),
}

/// Coarse outcome class, the equivalent of a 4xx or 5xx status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Client,
    Server,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("processing failed: {0}")]
    Processing(String),

    #[error("failed to store analysis: {0}")]
    Persistence(#[from] StoreError),

    #[error("analysis did not finish within {0:?}")]
    Timeout(Duration),
}

impl AnalysisError {
    pub fn classification(&self) -> ErrorClass {
        match self {
            AnalysisError::Validation(_) => ErrorClass::Client,
            _ => ErrorClass::Server,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.classification() == ErrorClass::Client
    }
}

impl From<RankError> for AnalysisError {
    fn from(value: RankError) -> Self {
        AnalysisError::Processing(value.to_string())
    }
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
