use crate::models::ModelBackend;
use crate::synthesis::{fallback_answer, AnswerBackend, FALLBACK_CONFIDENCE};
use crate::SynthesisError;
use async_trait::async_trait;

/// Sentence matching over the context, always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalBackend;

#[async_trait]
impl AnswerBackend for LocalBackend {
    fn model(&self) -> ModelBackend {
        ModelBackend::Local
    }

    fn confidence(&self) -> f64 {
        FALLBACK_CONFIDENCE
    }

    async fn generate(&self, question: &str, context: &str) -> Result<String, SynthesisError> {
        Ok(fallback_answer(question, context))
    }
}
