pub mod context;
pub mod prompt;

use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::backends::TranslationBackend;
use context::ContextStore;
use prompt::{SYSTEM_PROMPT, build_user_prompt};

/// Drives one chat backend and maintains the shared translation context.
/// Translation never fails hard: any backend or parse problem degrades to
/// returning the source text unchanged.
#[derive(Clone)]
pub struct Translator {
    backend: Arc<dyn TranslationBackend>,
    context: ContextStore,
    source_language: String,
    target_language: String,
}

impl Translator {
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        context: ContextStore,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            context,
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    /// Translates one text block. `page_context` carries the lines already
    /// translated on the current page, appended after the shared cross-page
    /// context in the reference section.
    pub async fn translate(&self, original: &str, page_context: &str) -> String {
        let original = original.trim();
        if original.is_empty() {
            return String::new();
        }

        let reference = self.build_reference(page_context);
        let user_prompt = build_user_prompt(
            &self.source_language,
            &self.target_language,
            &reference,
            original,
        );

        let content = match self
            .backend
            .call(SYSTEM_PROMPT.to_string(), user_prompt)
            .await
        {
            Ok(content) => content,
            Err(err) => {
                warn!("translation request failed, passing text through: {err:#}");
                return original.to_string();
            }
        };

        let translated = extract_translation(&content)
            .unwrap_or_else(|| {
                debug!("no translation found in response, passing text through");
                original.to_string()
            });

        if !translated.is_empty() && translated != original {
            self.context.push(original, translated.as_str());
        }
        translated
    }

    fn build_reference(&self, page_context: &str) -> String {
        let shared = self.context.snapshot();
        let mut reference = String::new();
        if !shared.is_empty() {
            reference.push_str("Shared Context:\n");
            for pair in shared {
                reference.push_str(&pair.source);
                reference.push_str(" -> ");
                reference.push_str(&pair.translated);
                reference.push('\n');
            }
        }
        if !page_context.trim().is_empty() {
            if !reference.is_empty() {
                reference.push('\n');
            }
            reference.push_str("Current page:\n");
            reference.push_str(page_context);
        }
        reference
    }
}

/// Pulls the translated string out of whatever the model returned.
/// A successful JSON decode is terminal: only its `translation` field
/// counts, and an empty or missing one means passthrough. The regex and
/// longest-quoted-substring fallbacks apply only when the decode itself
/// fails (truncated or prose-wrapped output).
pub fn extract_translation(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.is_object() {
            return value
                .get("translation")
                .and_then(|v| v.as_str())
                .map(clean)
                .filter(|translation| !translation.is_empty());
        }
    }

    static FRAGMENT: OnceLock<Regex> = OnceLock::new();
    let fragment = FRAGMENT.get_or_init(|| {
        Regex::new(r#"\{[^}]*"translation"\s*:\s*"([^"]+)"[^}]*\}"#)
            .expect("fragment regex is valid")
    });
    if let Some(captures) = fragment.captures(trimmed) {
        if let Some(matched) = captures.get(1) {
            let translation = clean(matched.as_str());
            if !translation.is_empty() {
                return Some(translation);
            }
        }
    }

    longest_quoted(trimmed)
        .map(|candidate| clean(&candidate))
        .filter(|translation| !translation.is_empty())
}

/// Strips markup debris some models leave around the translated value.
/// Applied to the extracted translation, never to the raw response, so a
/// quote-plus-`>` sequence inside valid JSON cannot break the decode.
fn clean(text: &str) -> String {
    text.replace("\">", "").replace("</", "").trim().to_string()
}

fn longest_quoted(content: &str) -> Option<String> {
    let mut best: Option<&str> = None;
    let mut start: Option<usize> = None;
    for (index, ch) in content.char_indices() {
        if ch != '"' {
            continue;
        }
        match start {
            None => start = Some(index + 1),
            Some(from) => {
                let candidate = &content[from..index];
                if best.is_none_or(|current| candidate.len() > current.len()) {
                    best = Some(candidate);
                }
                start = None;
            }
        }
    }
    best.filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}
