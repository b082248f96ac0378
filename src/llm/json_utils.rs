//! JSON extraction from free-form model text, grounded in the teacher's
//! `src/phases/json_utils.rs::extract_json_block`.

/// Extracts a JSON block from LLM response text: a fenced ```json``` block
/// if present, else the span from the first `{` to the last `}`.
pub fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return Some(text[content_start..content_start + end].trim());
        }
    }

    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            if end >= start {
                return Some(&text[start..=end]);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_fenced_code_block() {
        let text = "Here's the response:\n```json\n{\"key\": \"value\"}\n```\n";
        assert_eq!(extract_json_block(text), Some(r#"{"key": "value"}"#));
    }

    #[test]
    fn extracts_raw_json() {
        let text = r#"Some text before {"key": "value"} and after"#;
        assert_eq!(extract_json_block(text), Some(r#"{"key": "value"}"#));
    }

    #[test]
    fn no_json_returns_none() {
        assert_eq!(extract_json_block("just plain text"), None);
    }
}
