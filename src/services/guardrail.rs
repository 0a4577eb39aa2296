//! Input checks applied to the raw user message before anything else runs.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::error::{Error, Result};

/// Longest accepted user message, in characters.
pub const MAX_INPUT_CHARS: usize = 1000;

const SENSITIVE_WORDS: &[&str] = &[
    "ignore previous instructions",
    "ignore above",
    "hack",
    "bypass",
    "jailbreak",
];

static INJECTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)ignore\s+(?:previous|above|all)\s+(?:instructions?|commands?|prompts?)",
        r"(?i)(?:forget|disregard)\s+(?:everything|all)\s+(?:above|before)",
        r"(?i)(?:pretend|act|behave)\s+(?:as|like)\s+(?:if|you\s+are)",
        r"(?i)system\s*:\s*you\s+are",
        r"(?i)new\s+(?:instructions?|commands?|prompts?)\s*:",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Reject empty, oversized or manipulative input.
pub fn check_input(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(Error::Validation("message must not be empty".to_string()));
    }

    let chars = message.chars().count();
    if chars > MAX_INPUT_CHARS {
        return Err(Error::Validation(format!(
            "message is too long ({} characters, at most {})",
            chars, MAX_INPUT_CHARS
        )));
    }

    let lower = message.to_lowercase();
    if SENSITIVE_WORDS.iter().any(|w| lower.contains(w)) {
        warn!("Rejected message containing a blocked phrase");
        return Err(Error::Validation(
            "message contains disallowed content, please rephrase".to_string(),
        ));
    }

    if INJECTION_PATTERNS.iter().any(|p| p.is_match(message)) {
        warn!("Rejected message matching an injection pattern");
        return Err(Error::Validation("message was rejected as a prompt injection".to_string()));
    }

    Ok(())
}
