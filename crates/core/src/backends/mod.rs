pub mod huggingface;
pub mod local;
pub mod ollama;
pub mod openai;

pub use huggingface::HuggingFaceBackend;
pub use local::LocalBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

use crate::config::BackendConfig;
use crate::models::ModelBackend;
use crate::synthesis::AnswerBackend;

pub fn backend_for(model: ModelBackend, config: &BackendConfig) -> Box<dyn AnswerBackend> {
    match model {
        ModelBackend::HuggingFace => Box::new(HuggingFaceBackend::new(config.huggingface.clone())),
        ModelBackend::Ollama => Box::new(OllamaBackend::new(config.ollama.clone())),
        ModelBackend::OpenAi => Box::new(OpenAiBackend::new(config.openai.clone())),
        ModelBackend::Local => Box::new(LocalBackend),
    }
}
