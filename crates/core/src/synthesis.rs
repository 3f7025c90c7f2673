use crate::error::SynthesisError;
use crate::models::ModelBackend;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Confidence reported for any model-generated answer.
///
/// A fixed estimate, not a calibrated probability.
pub const MODEL_CONFIDENCE: f64 = 0.85;
/// Confidence reported for sentence-matching answers. Also uncalibrated.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

pub const NO_ANSWER_MESSAGE: &str = "I couldn't find an answer to that question in the document.";

/// Placed between ranked chunks; also a sentence boundary for the fallback.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

const MIN_SENTENCE_CHARS: usize = 20;
const MIN_QUESTION_WORD_CHARS: usize = 3;
const MAX_MATCHING_SENTENCES: usize = 3;
const MAX_LEADING_SENTENCES: usize = 2;

/// A service that turns a question plus document context into an answer.
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    fn model(&self) -> ModelBackend;

    fn confidence(&self) -> f64 {
        MODEL_CONFIDENCE
    }

    async fn generate(&self, question: &str, context: &str) -> Result<String, SynthesisError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub answer: String,
    pub confidence: f64,
    pub used_fallback: bool,
}

/// Calls a backend with a deadline and answers locally when it fails.
pub struct AnswerSynthesizer {
    backend: Box<dyn AnswerBackend>,
    timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(backend: Box<dyn AnswerBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn model(&self) -> ModelBackend {
        self.backend.model()
    }

    pub async fn synthesize(&self, question: &str, context_chunks: &[String]) -> Synthesis {
        self.synthesize_until(question, context_chunks, None).await
    }

    /// Like [`synthesize`](Self::synthesize), but the backend call also ends
    /// at `deadline` so the fallback still fits inside an outer budget.
    pub async fn synthesize_until(
        &self,
        question: &str,
        context_chunks: &[String],
        deadline: Option<Instant>,
    ) -> Synthesis {
        let context = context_chunks.join(CONTEXT_SEPARATOR);
        let limit = deadline.map_or(self.timeout, |deadline| {
            self.timeout
                .min(deadline.saturating_duration_since(Instant::now()))
        });

        let outcome = match tokio::time::timeout(
            limit,
            self.backend.generate(question, &context),
        )
        .await
        {
            Ok(Ok(answer)) if !answer.trim().is_empty() => Ok(answer.trim().to_string()),
            Ok(Ok(_)) => Err(SynthesisError::BackendResponse {
                backend: self.backend.model().to_string(),
                details: "empty answer".to_string(),
            }),
            Ok(Err(error)) => Err(error),
            Err(_) => Err(SynthesisError::Timeout(limit)),
        };

        match outcome {
            Ok(answer) => Synthesis {
                answer,
                confidence: self.backend.confidence(),
                used_fallback: false,
            },
            Err(error) => {
                tracing::warn!(
                    backend = %self.backend.model(),
                    %error,
                    "answer backend failed, using local fallback"
                );
                Synthesis {
                    answer: fallback_answer(question, &context),
                    confidence: FALLBACK_CONFIDENCE,
                    used_fallback: true,
                }
            }
        }
    }
}

/// Instruction prompt shared by the completion-style backends.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "Based on the following context, please answer the question concisely and accurately.\n\n\
         Context: {context}\n\nQuestion: {question}\n\nAnswer:"
    )
}

/// Answers from the context alone by picking sentences that mention the
/// question's longer words.
pub fn fallback_answer(question: &str, context: &str) -> String {
    // Chunks lose their final delimiter, so the separator ends a sentence too.
    let sentences = context
        .split(CONTEXT_SEPARATOR)
        .flat_map(|piece| piece.split(['.', '!', '?']))
        .map(str::trim)
        .filter(|sentence| sentence.chars().count() > MIN_SENTENCE_CHARS)
        .collect::<Vec<_>>();

    if sentences.is_empty() {
        return NO_ANSWER_MESSAGE.to_string();
    }

    let question_words = question
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| word.chars().count() > MIN_QUESTION_WORD_CHARS)
        .map(str::to_string)
        .collect::<Vec<_>>();

    let matching = sentences
        .iter()
        .filter(|sentence| {
            let lowered = sentence.to_lowercase();
            question_words.iter().any(|word| lowered.contains(word.as_str()))
        })
        .take(MAX_MATCHING_SENTENCES)
        .copied()
        .collect::<Vec<_>>();

    let picked = if matching.is_empty() {
        sentences.into_iter().take(MAX_LEADING_SENTENCES).collect()
    } else {
        matching
    };

    format!("{}.", picked.join(". "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::LocalBackend;

    struct FailingBackend;

    #[async_trait]
    impl AnswerBackend for FailingBackend {
        fn model(&self) -> ModelBackend {
            ModelBackend::Ollama
        }

        async fn generate(&self, _question: &str, _context: &str) -> Result<String, SynthesisError> {
            Err(SynthesisError::BackendResponse {
                backend: "ollama".to_string(),
                details: "503 Service Unavailable".to_string(),
            })
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl AnswerBackend for SlowBackend {
        fn model(&self) -> ModelBackend {
            ModelBackend::OpenAi
        }

        async fn generate(&self, _question: &str, _context: &str) -> Result<String, SynthesisError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    struct EchoBackend(&'static str);

    #[async_trait]
    impl AnswerBackend for EchoBackend {
        fn model(&self) -> ModelBackend {
            ModelBackend::HuggingFace
        }

        async fn generate(&self, _question: &str, _context: &str) -> Result<String, SynthesisError> {
            Ok(self.0.to_string())
        }
    }

    fn context() -> Vec<String> {
        vec![
            "The annual report covers all regional offices. Revenue grew 10 percent in Q1."
                .to_string(),
            "Operating costs stayed flat across the year!".to_string(),
        ]
    }

    #[test]
    fn fallback_prefers_sentences_with_question_words() {
        let answer = fallback_answer(
            "How much did revenue grow?",
            "The annual report covers all regional offices. Revenue grew 10 percent in Q1.",
        );
        assert_eq!(answer, "Revenue grew 10 percent in Q1.");
    }

    #[test]
    fn fallback_uses_leading_sentences_without_matches() {
        let answer = fallback_answer(
            "Who signed it?",
            "The annual report covers all regional offices. Operating costs stayed flat across the year. A third long sentence follows here.",
        );
        assert_eq!(
            answer,
            "The annual report covers all regional offices. Operating costs stayed flat across the year."
        );
    }

    #[test]
    fn fallback_caps_matching_sentences_at_three() {
        let context = "Pressure sensor one reads high values. Pressure sensor two reads high values. \
                       Pressure sensor three reads high values. Pressure sensor four reads high values.";
        let answer = fallback_answer("What does the pressure show?", context);
        assert!(answer.contains("three"));
        assert!(!answer.contains("four"));
    }

    #[test]
    fn fallback_without_sentences_says_so() {
        assert_eq!(fallback_answer("Anything?", "tiny. bits."), NO_ANSWER_MESSAGE);
    }

    #[test]
    fn prompt_embeds_context_and_question() {
        let prompt = build_prompt("Why?", "Because.");
        assert!(prompt.contains("Context: Because."));
        assert!(prompt.ends_with("Question: Why?\n\nAnswer:"));
    }

    #[tokio::test]
    async fn backend_failure_degrades_to_fallback() {
        let synthesizer = AnswerSynthesizer::new(Box::new(FailingBackend), Duration::from_secs(5));
        let synthesis = synthesizer.synthesize("How much did revenue grow?", &context()).await;

        assert!(synthesis.used_fallback);
        assert_eq!(synthesis.answer, "Revenue grew 10 percent in Q1.");
        assert_eq!(synthesis.confidence, FALLBACK_CONFIDENCE);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out_into_fallback() {
        let synthesizer = AnswerSynthesizer::new(Box::new(SlowBackend), Duration::from_secs(1));
        let synthesis = synthesizer.synthesize("How much did revenue grow?", &context()).await;

        assert!(synthesis.used_fallback);
        assert!(!synthesis.answer.is_empty());
    }

    #[tokio::test]
    async fn model_answer_carries_static_confidence() {
        let synthesizer = AnswerSynthesizer::new(
            Box::new(EchoBackend("  Ten percent.  ")),
            Duration::from_secs(5),
        );
        let synthesis = synthesizer.synthesize("How much?", &context()).await;

        assert_eq!(synthesis.answer, "Ten percent.");
        assert_eq!(synthesis.confidence, MODEL_CONFIDENCE);
        assert!(!synthesis.used_fallback);
    }

    #[tokio::test]
    async fn fallback_keeps_sentences_from_separate_chunks_apart() {
        let chunks = vec![
            "Revenue grew 10 percent in Q1 overall".to_string(),
            "The cafeteria menu changes every single week".to_string(),
        ];
        let synthesizer = AnswerSynthesizer::new(Box::new(FailingBackend), Duration::from_secs(5));
        let synthesis = synthesizer.synthesize("How much did revenue grow?", &chunks).await;

        assert!(synthesis.used_fallback);
        assert_eq!(synthesis.answer, "Revenue grew 10 percent in Q1 overall.");
    }

    #[tokio::test]
    async fn local_backend_sees_chunk_boundaries() {
        let chunks = vec![
            "The cafeteria menu changes every single week".to_string(),
            "Revenue grew 10 percent in Q1 overall".to_string(),
        ];
        let synthesizer = AnswerSynthesizer::new(Box::new(LocalBackend), Duration::from_secs(5));
        let synthesis = synthesizer.synthesize("How much did revenue grow?", &chunks).await;

        assert!(!synthesis.used_fallback);
        assert_eq!(synthesis.answer, "Revenue grew 10 percent in Q1 overall.");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_shortens_the_backend_timeout() {
        let synthesizer = AnswerSynthesizer::new(Box::new(SlowBackend), Duration::from_secs(60));
        let started = Instant::now();
        let deadline = started + Duration::from_millis(250);

        let synthesis = synthesizer
            .synthesize_until("How much did revenue grow?", &context(), Some(deadline))
            .await;

        assert!(synthesis.used_fallback);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn blank_model_answer_counts_as_failure() {
        let synthesizer =
            AnswerSynthesizer::new(Box::new(EchoBackend("   ")), Duration::from_secs(5));
        let synthesis = synthesizer.synthesize("How much did revenue grow?", &context()).await;
        assert!(synthesis.used_fallback);
    }
}
