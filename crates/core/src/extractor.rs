use crate::chunking::normalize_whitespace;
use crate::error::ExtractionError;
use lopdf::Document;
use regex::Regex;

/// Shortest text any strategy must produce to count as a successful extraction.
pub const MIN_TEXT_CHARS: usize = 10;
/// Printable salvage only counts when it recovered more than this.
pub const MIN_SALVAGE_CHARS: usize = 50;
pub const MAX_SALVAGE_CHARS: usize = 2_000;

const STREAM_PATTERN: &str = r"(?s)stream\s*(.*?)\s*endstream";
const TEXT_BLOCK_PATTERN: &str = r"(?s)\bBT\b\s*(.*?)\s*\bET\b";
// A TJ array or a standalone literal string, in content order. A literal ends
// at its first unescaped `)`, so only escaped parentheses nest.
const SHOWN_TEXT_PATTERN: &str = r"\[([^\]]*)\]|\(((?:\\.|[^\\)])*)\)";
const SHOW_OPERATOR_PATTERN: &str = r"\[([^\]]*)\]\s*TJ|\(((?:\\.|[^\\)])*)\)\s*Tj";
const LITERAL_PATTERN: &str = r"\(((?:\\.|[^\\)])*)\)";

/// One way of pulling plain text out of raw PDF bytes.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Literal strings shown inside `stream ... endstream` sections.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamLiteralStrategy;

impl ExtractionStrategy for StreamLiteralStrategy {
    fn name(&self) -> &'static str {
        "stream-literals"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let raw = decode_latin1(bytes);
        let stream_re = Regex::new(STREAM_PATTERN)?;
        let shown_re = Regex::new(SHOWN_TEXT_PATTERN)?;
        let literal_re = Regex::new(LITERAL_PATTERN)?;

        let mut pieces = Vec::new();
        for stream in stream_re.captures_iter(&raw) {
            let Some(content) = stream.get(1) else {
                continue;
            };
            collect_shown_strings(content.as_str(), &shown_re, &literal_re, &mut pieces);
        }

        Ok(clean_literal_text(&pieces.join(" ")))
    }
}

/// Every printable ASCII byte in the file, as a last resort before giving up.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintableSalvageStrategy;

impl ExtractionStrategy for PrintableSalvageStrategy {
    fn name(&self) -> &'static str {
        "printable-salvage"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let printable: String = bytes
            .iter()
            .map(|&byte| match byte {
                0x20..=0x7e | b'\n' | b'\r' | b'\t' => byte as char,
                _ => ' ',
            })
            .collect();

        let salvaged = normalize_whitespace(&printable);
        if salvaged.chars().count() <= MIN_SALVAGE_CHARS {
            return Ok(String::new());
        }

        Ok(salvaged.chars().take(MAX_SALVAGE_CHARS).collect())
    }
}

/// Strings passed to `Tj` and `TJ` inside `BT ... ET` text objects.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextBlockStrategy;

impl ExtractionStrategy for TextBlockStrategy {
    fn name(&self) -> &'static str {
        "text-blocks"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let raw = decode_latin1(bytes);
        let block_re = Regex::new(TEXT_BLOCK_PATTERN)?;
        let operator_re = Regex::new(SHOW_OPERATOR_PATTERN)?;
        let literal_re = Regex::new(LITERAL_PATTERN)?;

        let mut pieces = Vec::new();
        for block in block_re.captures_iter(&raw) {
            let Some(content) = block.get(1) else {
                continue;
            };
            collect_shown_strings(content.as_str(), &operator_re, &literal_re, &mut pieces);
        }

        Ok(clean_literal_text(&pieces.join(" ")))
    }
}

/// Structural extraction through the `lopdf` object model.
///
/// Handles compressed content streams the pattern strategies cannot see, at
/// the cost of rejecting files whose cross-reference table is damaged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectModelStrategy;

impl ExtractionStrategy for ObjectModelStrategy {
    fn name(&self) -> &'static str {
        "object-model"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let document =
            Document::load_mem(bytes).map_err(|error| ExtractionError::PdfParse(error.to_string()))?;

        let page_numbers = document.get_pages().keys().copied().collect::<Vec<_>>();
        if page_numbers.is_empty() {
            return Ok(String::new());
        }

        let text = document
            .extract_text(&page_numbers)
            .map_err(|error| ExtractionError::PdfParse(error.to_string()))?;

        Ok(normalize_whitespace(&text))
    }
}

/// Runs its strategies in order and keeps the first usable result.
pub struct PdfTextExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::with_strategies(vec![
            Box::new(StreamLiteralStrategy),
            Box::new(PrintableSalvageStrategy),
            Box::new(TextBlockStrategy),
        ])
    }
}

impl PdfTextExtractor {
    pub fn with_strategies(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Structural parsing first, then the pattern strategies.
    pub fn object_model_first() -> Self {
        Self::with_strategies(vec![
            Box::new(ObjectModelStrategy),
            Box::new(StreamLiteralStrategy),
            Box::new(PrintableSalvageStrategy),
            Box::new(TextBlockStrategy),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    pub fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            match strategy.extract(bytes) {
                Ok(text) if text.chars().count() >= MIN_TEXT_CHARS => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        chars = text.chars().count(),
                        "extracted pdf text"
                    );
                    return Ok(text);
                }
                Ok(_) => {
                    tracing::debug!(strategy = strategy.name(), "strategy found too little text");
                }
                Err(error) => {
                    tracing::debug!(strategy = strategy.name(), %error, "strategy failed");
                    failures.push(format!("{}: {error}", strategy.name()));
                }
            }
        }

        if failures.is_empty() {
            Err(ExtractionError::NoReadableText)
        } else {
            Err(ExtractionError::Failed(failures.join("; ")))
        }
    }
}

pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    PdfTextExtractor::default().extract(bytes)
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| byte as char).collect()
}

fn collect_shown_strings(
    content: &str,
    shown_re: &Regex,
    literal_re: &Regex,
    pieces: &mut Vec<String>,
) {
    for shown in shown_re.captures_iter(content) {
        if let Some(array) = shown.get(1) {
            // kerning numbers between the strings are dropped
            for literal in literal_re.captures_iter(array.as_str()) {
                if let Some(text) = literal.get(1) {
                    pieces.push(text.as_str().to_string());
                }
            }
        } else if let Some(text) = shown.get(2) {
            pieces.push(text.as_str().to_string());
        }
    }
}

fn clean_literal_text(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(current) = chars.next() {
        if current != '\\' {
            unescaped.push(current);
            continue;
        }

        match chars.next() {
            Some('n') => unescaped.push('\n'),
            Some('r') => unescaped.push('\r'),
            Some('t') => unescaped.push('\t'),
            Some('\\') => unescaped.push('\\'),
            Some('(') => unescaped.push('('),
            Some(')') => unescaped.push(')'),
            Some(other) => {
                unescaped.push('\\');
                unescaped.push(other);
            }
            None => unescaped.push('\\'),
        }
    }

    normalize_whitespace(&unescaped)
}
