// src/service/response.rs
//
// Turns the free-form text a model replies with into validated captions.

use crate::data_model::CaptionText;
use crate::service::ServiceError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("fenced block regex is valid")
});

#[derive(Debug, Deserialize)]
struct CaptionEnvelope {
    text: Option<CaptionFields>,
}

#[derive(Debug, Deserialize)]
struct CaptionFields {
    english_caption: Option<String>,
    korean_caption: Option<String>,
}

/// Finds the JSON value in a model reply: a fenced code block first, then the
/// first balanced `{...}` object, then the whole text.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Some(captures) = FENCED_BLOCK.captures(text) {
        if let Ok(value) = serde_json::from_str::<Value>(captures[1].trim()) {
            debug!("JSON found in fenced code block");
            return Some(value);
        }
    }

    if let Some(object) = first_balanced_object(text) {
        if let Ok(value) = serde_json::from_str::<Value>(object) {
            debug!("JSON object found inside reply text");
            return Some(value);
        }
    }

    serde_json::from_str::<Value>(text.trim()).ok()
}

/// Returns the first `{...}` span whose braces balance, ignoring braces inside
/// JSON string literals.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses a model reply into captions, or fails with `IncompletePayload`.
pub fn parse_caption_reply(text: &str) -> Result<CaptionText, ServiceError> {
    let value = extract_json(text)
        .ok_or_else(|| ServiceError::incomplete("reply contains no JSON object"))?;

    let envelope: CaptionEnvelope = serde_json::from_value(value)
        .map_err(|e| ServiceError::incomplete(format!("unexpected reply shape: {}", e)))?;

    let fields = envelope
        .text
        .ok_or_else(|| ServiceError::incomplete("missing `text` object"))?;

    let english_caption = non_empty(fields.english_caption)
        .ok_or_else(|| ServiceError::incomplete("missing `english_caption`"))?;
    let korean_caption = non_empty(fields.korean_caption)
        .ok_or_else(|| ServiceError::incomplete("missing `korean_caption`"))?;

    Ok(CaptionText {
        english_caption,
        korean_caption,
    })
}

fn non_empty(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceErrorKind;

    #[test]
    fn test_fenced_block() {
        let reply = "Here you go:\n```json\n{\"text\": {\"english_caption\": \"A dog.\", \"korean_caption\": \"개.\"}}\n```";
        let captions = parse_caption_reply(reply).unwrap();
        assert_eq!(captions.english_caption, "A dog.");
        assert_eq!(captions.korean_caption, "개.");
    }

    #[test]
    fn test_embedded_object_with_braces_in_strings() {
        let reply = r#"Sure! {"text": {"english_caption": "A sign reads {open}.", "korean_caption": "간판."}} Hope that helps."#;
        let captions = parse_caption_reply(reply).unwrap();
        assert_eq!(captions.english_caption, "A sign reads {open}.");
    }

    #[test]
    fn test_bare_json() {
        let reply = r#"  {"text": {"english_caption": " Trimmed. ", "korean_caption": "정리."}}  "#;
        let captions = parse_caption_reply(reply).unwrap();
        assert_eq!(captions.english_caption, "Trimmed.");
    }

    #[test]
    fn test_missing_field_is_incomplete() {
        let reply = r#"{"text": {"english_caption": "Only English."}}"#;
        let err = parse_caption_reply(reply).unwrap_err();
        assert_eq!(err.kind, ServiceErrorKind::IncompletePayload);
        assert!(err.detail.contains("korean_caption"));
    }

    #[test]
    fn test_empty_field_is_incomplete() {
        let reply = r#"{"text": {"english_caption": "  ", "korean_caption": "있음."}}"#;
        let err = parse_caption_reply(reply).unwrap_err();
        assert!(err.detail.contains("english_caption"));
    }

    #[test]
    fn test_plain_text_reply() {
        let err = parse_caption_reply("I cannot describe this image.").unwrap_err();
        assert_eq!(err.kind, ServiceErrorKind::IncompletePayload);
    }
}
