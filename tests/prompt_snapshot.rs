use manga_page_translator::translate::prompt::{SYSTEM_PROMPT, build_user_prompt};

#[test]
fn user_prompt_shape_is_stable() {
    let prompt = build_user_prompt("Japanese", "English", "名前 -> Name\n", "待って！");
    insta::assert_snapshot!(
        prompt,
        @r#"{"original":"待って！","reference":"名前 -> Name\n","src_lang":"Japanese","tgt_lang":"English"}"#
    );
}

#[test]
fn system_prompt_pins_the_response_contract() {
    assert!(SYSTEM_PROMPT.contains("\"translation\""));
    assert!(SYSTEM_PROMPT.contains("single JSON object"));
}
