use crate::error::SynthesisError;
use url::Url;

pub const DEFAULT_HUGGINGFACE_MODEL_URL: &str =
    "https://api-inference.huggingface.co/models/microsoft/DialoGPT-medium";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuggingFaceConfig {
    pub model_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Endpoints and credentials for every answer backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub huggingface: HuggingFaceConfig,
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            huggingface: HuggingFaceConfig {
                model_url: DEFAULT_HUGGINGFACE_MODEL_URL.to_string(),
                api_key: None,
            },
            ollama: OllamaConfig {
                base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
                model: DEFAULT_OLLAMA_MODEL.to_string(),
            },
            openai: OpenAiConfig {
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
                model: DEFAULT_OPENAI_MODEL.to_string(),
                api_key: None,
            },
        }
    }
}

impl BackendConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| {
            lookup(name).and_then(|raw| {
                let trimmed = raw.trim().to_string();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed)
                }
            })
        };

        let defaults = Self::default();
        Self {
            huggingface: HuggingFaceConfig {
                model_url: value("HUGGINGFACE_MODEL_URL").unwrap_or(defaults.huggingface.model_url),
                api_key: value("HUGGINGFACE_API_KEY"),
            },
            ollama: OllamaConfig {
                base_url: value("OLLAMA_BASE_URL").unwrap_or(defaults.ollama.base_url),
                model: value("OLLAMA_MODEL").unwrap_or(defaults.ollama.model),
            },
            openai: OpenAiConfig {
                base_url: value("OPENAI_BASE_URL").unwrap_or(defaults.openai.base_url),
                model: value("OPENAI_MODEL").unwrap_or(defaults.openai.model),
                api_key: value("OPENAI_API_KEY"),
            },
        }
    }

    pub fn validate(&self) -> Result<(), SynthesisError> {
        Url::parse(&self.huggingface.model_url)?;
        Url::parse(&self.ollama.base_url)?;
        Url::parse(&self.openai.base_url)?;
        Ok(())
    }
}

/// Joins `path` onto `base`, keeping any path prefix already on the base.
pub fn endpoint(base: &str, path: &str) -> Result<Url, SynthesisError> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}
