use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pdf_qa_core::{
    AnalysisOptions, AnalysisPipeline, AnalysisRequest, AnalysisStore, BackendConfig,
    CharacterNgramEmbedder, ChunkRanker, EmbeddingRanker, JsonFileStore, KeywordRanker,
    ModelBackend, DEFAULT_PAGE_LIMIT, PDF_CONTENT_TYPE,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Parser)]
#[command(name = "pdf-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON file holding the analysis history
    #[arg(long, env = "PDF_QA_HISTORY", default_value = "pdf-qa-history.json", global = true)]
    history: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a question about a PDF file.
    Analyze {
        /// PDF to analyze.
        #[arg(long)]
        file: PathBuf,
        /// Question to answer from the document.
        #[arg(long)]
        question: String,
        /// Answer backend: huggingface, ollama, openai or local.
        #[arg(long, default_value = "huggingface")]
        model: String,
        #[arg(long, value_enum, default_value_t = RankerKind::Keyword)]
        ranker: RankerKind,
        #[arg(long)]
        user_id: Option<String>,
        /// Target characters per chunk.
        #[arg(long, env = "PDF_QA_CHUNK_SIZE", default_value = "1200")]
        chunk_size: usize,
        /// Characters of trailing context repeated at the start of the next chunk.
        #[arg(long, env = "PDF_QA_CHUNK_OVERLAP", default_value = "200")]
        chunk_overlap: usize,
        /// Number of chunks handed to the backend.
        #[arg(long, env = "PDF_QA_TOP_K", default_value = "3")]
        top_k: usize,
        /// Deadline for the whole analysis, in seconds.
        #[arg(long, env = "PDF_QA_TIMEOUT_SECS", default_value = "60")]
        timeout_secs: u64,
        /// Deadline for one backend call, in seconds.
        #[arg(long, env = "PDF_QA_BACKEND_TIMEOUT_SECS", default_value = "60")]
        backend_timeout_secs: u64,
        #[command(flatten)]
        backends: BackendArgs,
    },
    /// Inspect or prune stored analyses.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Aggregate numbers over the stored analyses.
    Stats {
        #[arg(long)]
        user_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List analyses, newest first.
    List {
        #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Delete one analysis by id, or all of them (optionally for one user).
    Delete {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        user_id: Option<String>,
    },
}

/// Overrides applied on top of a [`BackendConfig`].
#[derive(Args, Default)]
struct BackendArgs {
    /// Hugging Face inference URL
    #[arg(long, env = "HUGGINGFACE_MODEL_URL")]
    huggingface_url: Option<String>,
    #[arg(long, env = "HUGGINGFACE_API_KEY", hide_env_values = true)]
    huggingface_api_key: Option<String>,
    /// Ollama base URL
    #[arg(long, env = "OLLAMA_BASE_URL")]
    ollama_url: Option<String>,
    #[arg(long, env = "OLLAMA_MODEL")]
    ollama_model: Option<String>,
    /// OpenAI-compatible base URL
    #[arg(long, env = "OPENAI_BASE_URL")]
    openai_url: Option<String>,
    #[arg(long, env = "OPENAI_MODEL")]
    openai_model: Option<String>,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,
}

impl BackendArgs {
    fn apply_to(self, mut config: BackendConfig) -> BackendConfig {
        let set = |target: &mut String, value: Option<String>| {
            if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
                *target = value.trim().to_string();
            }
        };

        set(&mut config.huggingface.model_url, self.huggingface_url);
        set(&mut config.ollama.base_url, self.ollama_url);
        set(&mut config.ollama.model, self.ollama_model);
        set(&mut config.openai.base_url, self.openai_url);
        set(&mut config.openai.model, self.openai_model);
        if let Some(key) = self.huggingface_api_key.filter(|key| !key.trim().is_empty()) {
            config.huggingface.api_key = Some(key.trim().to_string());
        }
        if let Some(key) = self.openai_api_key.filter(|key| !key.trim().is_empty()) {
            config.openai.api_key = Some(key.trim().to_string());
        }
        config
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RankerKind {
    Keyword,
    Embedding,
}

struct AnalyzeArgs {
    file: PathBuf,
    question: String,
    model: ModelBackend,
    user_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        history = %cli.history.display(),
        "pdf-qa boot"
    );

    let store = JsonFileStore::new(&cli.history);

    match cli.command {
        Command::Analyze {
            file,
            question,
            model,
            ranker,
            user_id,
            chunk_size,
            chunk_overlap,
            top_k,
            timeout_secs,
            backend_timeout_secs,
            backends,
        } => {
            let backends = backends.apply_to(BackendConfig::from_env());
            backends
                .validate()
                .context("invalid backend endpoint")?;

            let options = AnalysisOptions {
                chunk_size,
                chunk_overlap,
                top_k,
                request_timeout: Duration::from_secs(timeout_secs),
                backend_timeout: Duration::from_secs(backend_timeout_secs),
                ..AnalysisOptions::default()
            };
            let args = AnalyzeArgs {
                file,
                question,
                model: ModelBackend::from_id_lossy(&model),
                user_id,
            };

            match ranker {
                RankerKind::Keyword => {
                    let pipeline = AnalysisPipeline::new(KeywordRanker, store, backends, options);
                    analyze(&pipeline, args).await?;
                }
                RankerKind::Embedding => {
                    let ranker = EmbeddingRanker::new(CharacterNgramEmbedder::default());
                    let pipeline = AnalysisPipeline::new(ranker, store, backends, options);
                    analyze(&pipeline, args).await?;
                }
            }
        }
        Command::History { action } => match action {
            HistoryAction::List {
                limit,
                offset,
                user_id,
            } => {
                let page = store.list(limit, offset, user_id.as_deref()).await?;
                println!(
                    "{} of {} analyses (offset {})",
                    page.records.len(),
                    page.total,
                    page.offset
                );
                for record in page.records {
                    println!(
                        "{} {} model={} confidence={:.2} file={}",
                        record.id,
                        record.timestamp.to_rfc3339(),
                        record.model,
                        record.confidence,
                        record.file_name
                    );
                    println!("  question: {}", record.question);
                    println!("  answer: {}", record.answer);
                }
            }
            HistoryAction::Delete { id, user_id } => match id {
                Some(id) => {
                    store.delete(&id).await?;
                    println!("deleted {id}");
                }
                None => {
                    let removed = store.delete_all(user_id.as_deref()).await?;
                    println!("deleted {removed} analyses");
                }
            },
        },
        Command::Stats { user_id } => {
            let stats = store.stats(user_id.as_deref()).await?;
            println!("total_analyses: {}", stats.total_analyses);
            println!("success_rate: {:.1}%", stats.success_rate);
            println!("avg_processing_time: {:.2}s", stats.avg_processing_time);
            println!("total_documents: {}", stats.total_documents);
        }
    }

    Ok(())
}

async fn analyze<R, S>(pipeline: &AnalysisPipeline<R, S>, args: AnalyzeArgs) -> anyhow::Result<()>
where
    R: ChunkRanker,
    S: AnalysisStore,
{
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let content_type = infer_content_type(&args.file, &bytes);
    if content_type.is_none() {
        warn!(file = %args.file.display(), "file does not look like a pdf");
    }

    let file_name = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.file.display().to_string());

    let request = AnalysisRequest {
        file_name,
        content_type: content_type.map(str::to_string),
        bytes,
        question: args.question,
        model: args.model,
        user_id: args.user_id,
    };

    let record = match pipeline.analyze(request).await {
        Ok(record) => record,
        Err(error) if error.is_client_error() => anyhow::bail!("rejected: {error}"),
        Err(error) => return Err(anyhow::Error::new(error).context("analysis failed")),
    };

    println!("answer: {}", record.answer);
    println!(
        "model={} confidence={:.2} processing_time={}s id={}",
        record.model, record.confidence, record.processing_time, record.id
    );
    for (index, chunk) in record.source_chunks.iter().enumerate() {
        println!("[{}] {chunk}", index + 1);
    }

    Ok(())
}

/// Both the extension and the magic header have to agree on PDF.
fn infer_content_type(path: &Path, bytes: &[u8]) -> Option<&'static str> {
    let has_pdf_extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"));

    (has_pdf_extension && bytes.starts_with(PDF_MAGIC)).then_some(PDF_CONTENT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_needs_extension_and_magic_header() {
        assert_eq!(
            infer_content_type(Path::new("report.PDF"), b"%PDF-1.7\n"),
            Some(PDF_CONTENT_TYPE)
        );
        assert_eq!(infer_content_type(Path::new("report.pdf"), b"\x89PNG"), None);
        assert_eq!(infer_content_type(Path::new("report.txt"), b"%PDF-1.7\n"), None);
    }

    #[test]
    fn cli_parses_nested_history_commands() {
        let cli = Cli::try_parse_from([
            "pdf-qa",
            "history",
            "list",
            "--limit",
            "5",
            "--history",
            "/tmp/h.json",
        ])
        .expect("arguments should parse");

        assert_eq!(cli.history, PathBuf::from("/tmp/h.json"));
        assert!(matches!(
            cli.command,
            Command::History {
                action: HistoryAction::List { limit: 5, offset: 0, .. }
            }
        ));
    }

    #[test]
    fn backend_flags_override_config() {
        let base = BackendConfig::from_lookup(|name| match name {
            "OLLAMA_MODEL" => Some("mistral".to_string()),
            "OPENAI_API_KEY" => Some("env-key".to_string()),
            _ => None,
        });
        let config = BackendArgs {
            ollama_url: Some("http://gpu-box:11434".to_string()),
            openai_api_key: Some("  ".to_string()),
            ..BackendArgs::default()
        }
        .apply_to(base);

        assert_eq!(config.ollama.base_url, "http://gpu-box:11434");
        assert_eq!(config.ollama.model, "mistral");
        assert_eq!(config.openai.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.huggingface, BackendConfig::default().huggingface);
        assert!(config.validate().is_ok());
    }
}
