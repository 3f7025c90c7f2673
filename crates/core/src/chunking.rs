use crate::models::{AnalysisOptions, Chunk};

const SENTENCE_DELIMITERS: [char; 3] = ['.', '!', '?'];

/// Overlap is configured in characters and spliced in as whole words, one
/// word per this many characters.
pub const CHARS_PER_OVERLAP_WORD: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(&AnalysisOptions::default())
    }
}

impl From<&AnalysisOptions> for ChunkingConfig {
    fn from(value: &AnalysisOptions) -> Self {
        Self {
            max_chars: value.chunk_size,
            overlap_chars: value.chunk_overlap,
        }
    }
}

impl ChunkingConfig {
    pub fn overlap_words(&self) -> usize {
        self.overlap_chars / CHARS_PER_OVERLAP_WORD
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

/// Sentences split on runs of `.`, `!` and `?`.
///
/// Text without any delimiter has no sentences at all.
pub fn split_sentences(text: &str) -> Vec<String> {
    if !text.contains(SENTENCE_DELIMITERS) {
        return Vec::new();
    }

    text.split(SENTENCE_DELIMITERS)
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn chunk_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let would_overflow = current.chars().count() + sentence.chars().count() > config.max_chars;

        if would_overflow && !current.is_empty() {
            chunks.push(current.trim().to_string());

            let overlap = trailing_words(&current, config.overlap_words());
            current = if overlap.is_empty() {
                sentence
            } else {
                format!("{overlap} {sentence}")
            };
        } else {
            if !current.is_empty() {
                current.push_str(". ");
            }
            current.push_str(&sentence);
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    if chunks.is_empty() {
        return fixed_windows(text, config.max_chars);
    }

    chunks
}

pub fn build_chunks(text: &str, config: ChunkingConfig) -> Vec<Chunk> {
    chunk_text(text, config)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk { text, index })
        .collect()
}

fn trailing_words(text: &str, count: usize) -> String {
    if count == 0 {
        return String::new();
    }

    let words = text.split_whitespace().collect::<Vec<_>>();
    let start = words.len().saturating_sub(count);
    words[start..].join(" ")
}

fn fixed_windows(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|window| window.iter().collect())
        .collect()
}
