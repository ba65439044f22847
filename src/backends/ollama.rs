use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::{BackendFuture, TranslationBackend, translation_schema_properties, translation_schema_required};

#[derive(Debug, Clone)]
pub struct Ollama {
    api_url: String,
    model: String,
}

impl Ollama {
    pub fn new(api_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            model: model.into(),
        }
    }
}

impl TranslationBackend for Ollama {
    fn call(&self, system_prompt: String, user_prompt: String) -> BackendFuture {
        let backend = self.clone();
        Box::pin(async move {
            let body = json!({
                "model": backend.model,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": user_prompt}
                ],
                "options": {"num_predict": 2048},
                "stream": false,
                "format": {
                    "type": "object",
                    "properties": translation_schema_properties(),
                    "required": translation_schema_required()
                }
            });

            let client = reqwest::Client::new();
            let response = client
                .post(&backend.api_url)
                .json(&body)
                .send()
                .await
                .with_context(|| format!("Ollama request to {} failed", backend.api_url))?;
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(anyhow!("Ollama API error ({}): {}", status, text));
            }
            extract_content(&text)
        })
    }
}

fn extract_content(text: &str) -> Result<String> {
    let payload: OllamaResponse =
        serde_json::from_str(text).with_context(|| "failed to parse Ollama response JSON")?;
    Ok(payload.message.content)
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::extract_content;

    #[test]
    fn content_is_read_from_message() {
        let payload = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/ollama_chat_response.json"
        ));
        let content = extract_content(payload).unwrap();
        assert!(content.contains("\"translation\""));
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(extract_content("not json").is_err());
        assert!(extract_content("{\"message\":{}}").is_err());
    }
}
