use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

use crate::settings::{Preset, PresetKind};

mod ollama;
mod openai;

pub use ollama::Ollama;
pub use openai::OpenAi;

pub type BackendFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

/// One chat-completion round trip: a system/user prompt pair in, the raw
/// message content out. Both implementations constrain the model to the
/// five-field translation JSON via their native schema mechanism.
pub trait TranslationBackend: Send + Sync {
    fn call(&self, system_prompt: String, user_prompt: String) -> BackendFuture;
}

#[derive(Debug, Clone)]
pub enum BackendImpl {
    Ollama(Ollama),
    OpenAi(OpenAi),
}

impl TranslationBackend for BackendImpl {
    fn call(&self, system_prompt: String, user_prompt: String) -> BackendFuture {
        match self {
            BackendImpl::Ollama(backend) => backend.call(system_prompt, user_prompt),
            BackendImpl::OpenAi(backend) => backend.call(system_prompt, user_prompt),
        }
    }
}

pub fn build_backend(preset: &Preset) -> BackendImpl {
    match preset.kind {
        PresetKind::Ollama => BackendImpl::Ollama(Ollama::new(&preset.api_url, &preset.model)),
        PresetKind::OpenAi => BackendImpl::OpenAi(OpenAi::new(
            &preset.api_url,
            &preset.model,
            preset.bearer_token.as_deref(),
        )),
    }
}

/// Field layout of the translation payload both backends must return.
pub(crate) fn translation_schema_properties() -> serde_json::Value {
    serde_json::json!({
        "translation": {"type": "string"},
        "original": {"type": "string"},
        "remarks": {"type": "string"},
        "src_lang": {"type": "string"},
        "tgt_lang": {"type": "string"}
    })
}

pub(crate) fn translation_schema_required() -> serde_json::Value {
    serde_json::json!(["translation", "original", "src_lang", "tgt_lang"])
}
