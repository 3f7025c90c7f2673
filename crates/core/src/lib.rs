pub mod backends;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod history;
pub mod models;
pub mod orchestrator;
pub mod ranking;
pub mod synthesis;

pub use backends::{backend_for, HuggingFaceBackend, LocalBackend, OllamaBackend, OpenAiBackend};
pub use chunking::{build_chunks, chunk_text, normalize_whitespace, split_sentences, ChunkingConfig};
pub use config::BackendConfig;
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{
    AnalysisError, ErrorClass, ExtractionError, RankError, StoreError, SynthesisError,
};
pub use extractor::{
    extract_text, ExtractionStrategy, ObjectModelStrategy, PdfTextExtractor,
    PrintableSalvageStrategy, StreamLiteralStrategy, TextBlockStrategy,
};
pub use history::{AnalysisStore, InMemoryAnalysisStore, JsonFileStore, DEFAULT_PAGE_LIMIT};
pub use models::{
    AnalysisOptions, AnalysisRecord, AnalysisRequest, AnalysisStats, AnswerResult, Chunk,
    HistoryPage, ModelBackend, ScoredChunk, MAX_FILE_BYTES, PDF_CONTENT_TYPE,
};
pub use orchestrator::AnalysisPipeline;
pub use ranking::{ChunkRanker, EmbeddingRanker, KeywordRanker, DEFAULT_MAX_CHUNKS};
pub use synthesis::{AnswerBackend, AnswerSynthesizer, Synthesis};
