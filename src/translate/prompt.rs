/// System prompt shared by every backend. The schema section mirrors the
/// structured-output constraint the backends also send natively, so models
/// without schema support still tend to comply.
pub const SYSTEM_PROMPT: &str = r#"You are an expert comic and manga translator.
Translate the text inside speech bubbles and captions naturally, keeping each
character's tone, register and personality. Onomatopoeia should be adapted to
an equivalent expression in the target language, not romanized. Use the
reference context to keep names and recurring terms consistent across pages.

Respond with a single JSON object and nothing else:
{"translation": "...", "original": "...", "src_lang": "...", "tgt_lang": "...", "remarks": "..."}

- translation: the translated text, line breaks preserved where natural
- original: the source text exactly as given
- src_lang / tgt_lang: the language names you were given
- remarks: optional notes, may be empty"#;

/// Builds the single-line JSON user prompt. Serializing through serde keeps
/// the source text safely escaped.
pub fn build_user_prompt(
    src_lang: &str,
    tgt_lang: &str,
    reference: &str,
    original: &str,
) -> String {
    serde_json::json!({
        "src_lang": src_lang,
        "tgt_lang": tgt_lang,
        "reference": reference,
        "original": original,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_escapes_quotes_in_source_text() {
        let prompt = build_user_prompt("Japanese", "English", "", "say \"hi\"");
        let parsed: serde_json::Value = serde_json::from_str(&prompt).unwrap();
        assert_eq!(parsed["original"], "say \"hi\"");
    }

    #[test]
    fn user_prompt_is_single_line() {
        let prompt = build_user_prompt("Japanese", "English", "a\nb", "c\nd");
        assert!(!prompt.contains('\n'));
    }
}
