use crate::embeddings::{cosine_similarity, CharacterNgramEmbedder, Embedder};
use crate::error::RankError;
use crate::models::{Chunk, ScoredChunk};
use async_trait::async_trait;
use regex::Regex;

pub const DEFAULT_MAX_CHUNKS: usize = 3;

const MAX_POSITION_STEP: f64 = 0.1;
// Upper bound on the gap between the first and last chunk's bonus.
const MAX_POSITION_SPREAD: f64 = 0.9;

/// Picks the chunks most relevant to a question, best first.
#[async_trait]
pub trait ChunkRanker: Send + Sync {
    fn name(&self) -> &'static str;

    async fn rank(
        &self,
        chunks: &[Chunk],
        question: &str,
        max_chunks: usize,
    ) -> Result<Vec<ScoredChunk>, RankError>;
}

/// Whole-word keyword counts plus a small bonus for earlier chunks.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordRanker;

impl KeywordRanker {
    pub fn score_all(&self, chunks: &[Chunk], question: &str) -> Result<Vec<ScoredChunk>, RankError> {
        let patterns = question_terms(question)
            .iter()
            .map(|term| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term))))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| RankError::Request(error.to_string()))?;

        let step = position_step(chunks.len());

        Ok(chunks
            .iter()
            .enumerate()
            .map(|(position, chunk)| {
                let matches = patterns
                    .iter()
                    .map(|pattern| pattern.find_iter(&chunk.text).count())
                    .sum::<usize>();
                let bonus = (chunks.len() - position) as f64 * step;

                ScoredChunk {
                    chunk: chunk.clone(),
                    score: matches as f64 + bonus,
                }
            })
            .collect())
    }
}

#[async_trait]
impl ChunkRanker for KeywordRanker {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn rank(
        &self,
        chunks: &[Chunk],
        question: &str,
        max_chunks: usize,
    ) -> Result<Vec<ScoredChunk>, RankError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let scored = self.score_all(chunks, question)?;
        Ok(take_best(scored, max_chunks))
    }
}

/// Nearest chunks to the question in embedding space.
#[derive(Debug, Default, Clone)]
pub struct EmbeddingRanker<E = CharacterNgramEmbedder> {
    embedder: E,
}

impl<E: Embedder> EmbeddingRanker<E> {
    pub fn new(embedder: E) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl<E: Embedder> ChunkRanker for EmbeddingRanker<E> {
    fn name(&self) -> &'static str {
        "embedding"
    }

    async fn rank(
        &self,
        chunks: &[Chunk],
        question: &str,
        max_chunks: usize,
    ) -> Result<Vec<ScoredChunk>, RankError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(question);
        let texts = chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>();
        let vectors = self.embedder.embed_all(&texts);

        if vectors.len() != chunks.len() {
            return Err(RankError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                vectors.len(),
                chunks.len()
            )));
        }

        let scored = chunks
            .iter()
            .zip(vectors.iter())
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: f64::from(cosine_similarity(&query_vector, vector)),
            })
            .collect();

        Ok(take_best(scored, max_chunks))
    }
}

/// Lowercase words longer than two characters, split on non-word characters.
pub fn question_terms(question: &str) -> Vec<String> {
    question
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| word.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Per-position bonus, `0.1` for short documents and shrinking for long ones
/// so the whole spread never reaches a single keyword match.
fn position_step(total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    MAX_POSITION_STEP.min(MAX_POSITION_SPREAD / total as f64)
}

fn take_best(mut scored: Vec<ScoredChunk>, max_chunks: usize) -> Vec<ScoredChunk> {
    // stable sort keeps document order among equal scores
    scored.sort_by(|left, right| right.score.total_cmp(&left.score));
    scored.truncate(max_chunks);
    scored
}
