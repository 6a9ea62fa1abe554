// Text utils

use once_cell::sync::Lazy;
use regex::Regex;

use crate::data_model::CaptionText;

/// A terminal mark (ASCII or full-width) followed by whitespace or end of text.
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[.!?。！？](?:\s+|$)").expect("sentence boundary regex is valid")
});

/// Splits text into sentences, keeping each sentence's own terminal mark.
/// A trailing fragment without a terminal mark counts as a sentence.
pub fn split_into_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(text) {
        let mark_len = m.as_str().chars().next().map_or(1, char::len_utf8);
        let sentence = text[start..m.start() + mark_len].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Result of fitting one caption to the sentence limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    /// Sentence count before truncation.
    pub sentence_count: usize,
    pub truncated: bool,
}

/// Keeps at most `max_sentences` sentences, rejoined with single spaces.
pub fn truncate_sentences(text: &str, max_sentences: usize) -> NormalizedText {
    let trimmed = text.trim();
    let sentences = split_into_sentences(trimmed);
    let sentence_count = sentences.len();

    if sentence_count <= max_sentences {
        return NormalizedText {
            text: trimmed.to_string(),
            sentence_count,
            truncated: false,
        };
    }

    NormalizedText {
        text: sentences[..max_sentences].join(" "),
        sentence_count,
        truncated: true,
    }
}

/// Both captions after normalization, plus what happened to each.
#[derive(Debug, Clone)]
pub struct CaptionNormalization {
    pub captions: CaptionText,
    pub english: NormalizedText,
    pub korean: NormalizedText,
}

impl CaptionNormalization {
    /// True if either caption has fewer sentences than asked for.
    pub fn is_short(&self, expected: usize) -> bool {
        self.english.sentence_count < expected || self.korean.sentence_count < expected
    }
}

pub fn normalize_captions(captions: &CaptionText, max_sentences: usize) -> CaptionNormalization {
    let english = truncate_sentences(&captions.english_caption, max_sentences);
    let korean = truncate_sentences(&captions.korean_caption, max_sentences);
    CaptionNormalization {
        captions: CaptionText {
            english_caption: english.text.clone(),
            korean_caption: korean.text.clone(),
        },
        english,
        korean,
    }
}
