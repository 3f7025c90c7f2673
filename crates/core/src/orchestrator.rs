use crate::backends::backend_for;
use crate::chunking::{build_chunks, ChunkingConfig};
use crate::config::BackendConfig;
use crate::extractor::PdfTextExtractor;
use crate::history::AnalysisStore;
use crate::ranking::ChunkRanker;
use crate::synthesis::AnswerSynthesizer;
use crate::{
    AnalysisError, AnalysisOptions, AnalysisRecord, AnalysisRequest, AnswerResult, ModelBackend,
    PDF_CONTENT_TYPE,
};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use uuid::Uuid;

pub const SUCCESS_MESSAGE: &str = "Analysis completed successfully";
pub const MISSING_INPUT_MESSAGE: &str = "File and question are required";
pub const PDF_ONLY_MESSAGE: &str = "Only PDF files are allowed";

// Share of the request budget held back for the fallback and the store write.
const FALLBACK_RESERVE_DIVISOR: u32 = 10;

/// Runs one question against one uploaded PDF, end to end.
pub struct AnalysisPipeline<R, S>
where
    R: ChunkRanker,
    S: AnalysisStore,
{
    ranker: R,
    store: S,
    extractor: PdfTextExtractor,
    backends: BackendConfig,
    options: AnalysisOptions,
}

impl<R, S> AnalysisPipeline<R, S>
where
    R: ChunkRanker,
    S: AnalysisStore,
{
    pub fn new(ranker: R, store: S, backends: BackendConfig, options: AnalysisOptions) -> Self {
        Self {
            ranker,
            store,
            extractor: PdfTextExtractor::default(),
            backends,
            options,
        }
    }

    pub fn with_extractor(mut self, extractor: PdfTextExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub fn synthesizer_for(&self, model: ModelBackend) -> AnswerSynthesizer {
        AnswerSynthesizer::new(backend_for(model, &self.backends), self.options.backend_timeout)
    }

    pub fn validate(&self, request: &AnalysisRequest) -> Result<(), AnalysisError> {
        if request.bytes.is_empty() || request.question.trim().is_empty() {
            return Err(AnalysisError::Validation(MISSING_INPUT_MESSAGE.to_string()));
        }

        let is_pdf = request
            .content_type
            .as_deref()
            .and_then(|value| value.split(';').next())
            .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(PDF_CONTENT_TYPE));
        if !is_pdf {
            return Err(AnalysisError::Validation(PDF_ONLY_MESSAGE.to_string()));
        }

        if request.bytes.len() > self.options.max_file_bytes {
            return Err(AnalysisError::Validation(format!(
                "File size should be less than {}MB",
                self.options.max_file_bytes / (1024 * 1024)
            )));
        }

        Ok(())
    }

    /// Extract, chunk, rank and answer. Nothing is stored.
    pub async fn process(
        &self,
        bytes: &[u8],
        question: &str,
        synthesizer: &AnswerSynthesizer,
    ) -> Result<AnswerResult, AnalysisError> {
        self.process_until(bytes, question, synthesizer, None).await
    }

    async fn process_until(
        &self,
        bytes: &[u8],
        question: &str,
        synthesizer: &AnswerSynthesizer,
        deadline: Option<Instant>,
    ) -> Result<AnswerResult, AnalysisError> {
        let text = self.extractor.extract(bytes)?;

        let chunks = build_chunks(&text, ChunkingConfig::from(&self.options));
        if chunks.is_empty() {
            return Err(AnalysisError::Processing(
                "extracted text produced no chunks".to_string(),
            ));
        }
        drop(text);

        let ranked = self
            .ranker
            .rank(&chunks, question, self.options.top_k)
            .await?;
        tracing::debug!(
            ranker = self.ranker.name(),
            chunk_count = chunks.len(),
            selected = ranked.len(),
            "ranked chunks"
        );

        let source_chunks = ranked
            .into_iter()
            .map(|scored| scored.chunk.text)
            .collect::<Vec<_>>();

        let synthesis = synthesizer
            .synthesize_until(question, &source_chunks, deadline)
            .await;

        Ok(AnswerResult {
            answer: synthesis.answer,
            source_chunks,
            confidence: synthesis.confidence,
            used_fallback: synthesis.used_fallback,
        })
    }

    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisRecord, AnalysisError> {
        let synthesizer = self.synthesizer_for(request.model);
        self.analyze_with(request, &synthesizer).await
    }

    /// Like [`analyze`](Self::analyze) with a caller-supplied synthesizer.
    ///
    /// The record is stored before it is returned, so a store failure fails
    /// the whole request.
    pub async fn analyze_with(
        &self,
        request: AnalysisRequest,
        synthesizer: &AnswerSynthesizer,
    ) -> Result<AnalysisRecord, AnalysisError> {
        self.validate(&request)?;

        let timeout = self.options.request_timeout;
        tokio::time::timeout(timeout, self.run(request, synthesizer))
            .await
            .map_err(|_| AnalysisError::Timeout(timeout))?
    }

    async fn run(
        &self,
        request: AnalysisRequest,
        synthesizer: &AnswerSynthesizer,
    ) -> Result<AnalysisRecord, AnalysisError> {
        let started = Instant::now();
        let budget = self.options.request_timeout;
        let reserve = budget / FALLBACK_RESERVE_DIVISOR;
        let backend_deadline = started + budget.saturating_sub(reserve);

        let result = self
            .process_until(
                &request.bytes,
                &request.question,
                synthesizer,
                Some(backend_deadline),
            )
            .await?;

        let record = AnalysisRecord {
            id: Uuid::new_v4().to_string(),
            answer: result.answer,
            source_chunks: result.source_chunks,
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
            processing_time: started.elapsed().as_secs_f64().round() as u64,
            model: synthesizer.model().id().to_string(),
            confidence: result.confidence,
            timestamp: Utc::now(),
            file_name: request.file_name,
            question: request.question,
            user_id: request.user_id,
            checksum: digest_bytes(&request.bytes),
        };

        self.store.create(&record).await?;

        tracing::info!(
            id = %record.id,
            file = %record.file_name,
            model = %record.model,
            fallback = result.used_fallback,
            processing_time = record.processing_time,
            "analysis complete"
        );

        Ok(record)
    }
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
