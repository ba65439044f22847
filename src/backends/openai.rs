use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::{BackendFuture, TranslationBackend, translation_schema_properties, translation_schema_required};

/// OpenAI-compatible chat-completions backend. Works against any endpoint
/// that accepts the `/chat/completions` request shape, with optional bearer
/// authentication.
#[derive(Debug, Clone)]
pub struct OpenAi {
    api_url: String,
    model: String,
    bearer_token: Option<String>,
}

impl OpenAi {
    pub fn new(
        api_url: impl Into<String>,
        model: impl Into<String>,
        bearer_token: Option<&str>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            model: model.into(),
            bearer_token: bearer_token
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string),
        }
    }
}

impl TranslationBackend for OpenAi {
    fn call(&self, system_prompt: String, user_prompt: String) -> BackendFuture {
        let backend = self.clone();
        Box::pin(async move {
            let body = json!({
                "model": backend.model,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": user_prompt}
                ],
                "stream": false,
                "max_tokens": 2048,
                "temperature": 0.4,
                "top_p": 0.9,
                "top_k": 50,
                "frequency_penalty": 1.0,
                "n": 1,
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {
                        "name": "translation_schema",
                        "strict": true,
                        "schema": {
                            "type": "object",
                            "properties": translation_schema_properties(),
                            "required": translation_schema_required(),
                            "additionalProperties": false
                        }
                    }
                }
            });

            let client = reqwest::Client::new();
            let mut request = client.post(&backend.api_url).json(&body);
            if let Some(token) = &backend.bearer_token {
                request = request.bearer_auth(token);
            }
            let response = request
                .send()
                .await
                .with_context(|| format!("chat request to {} failed", backend.api_url))?;
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(anyhow!("chat API error ({}): {}", status, text));
            }
            extract_content(&text)
        })
    }
}

fn extract_content(text: &str) -> Result<String> {
    let payload: ChatResponse =
        serde_json::from_str(text).with_context(|| "failed to parse chat response JSON")?;
    payload
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("chat response contained no choices"))
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::extract_content;

    #[test]
    fn content_is_read_from_first_choice() {
        let payload = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/openai_chat_response.json"
        ));
        let content = extract_content(payload).unwrap();
        assert!(content.contains("\"translation\""));
    }

    #[test]
    fn empty_choices_is_an_error() {
        assert!(extract_content("{\"choices\":[]}").is_err());
    }
}
