//! Topic names and wildcard matching.
//!
//! Topics are dot-separated tokens. In patterns `*` matches exactly one token
//! and `>` matches one or more trailing tokens.

use crate::events::{EventsError, EventsResult};

/// Join the subject prefix and a configured topic.
pub fn prefixed(prefix: &str, topic: &str) -> String {
    let prefix = prefix.trim_end_matches('.');
    if prefix.is_empty() {
        topic.to_string()
    } else {
        format!("{prefix}.{topic}")
    }
}

/// Check that `pattern` is a well-formed topic or wildcard pattern.
pub fn validate(pattern: &str) -> EventsResult<()> {
    let tokens: Vec<&str> = pattern.split('.').collect();
    let last = tokens.len() - 1;

    for (i, token) in tokens.iter().enumerate() {
        let ok = match *token {
            "" => false,
            ">" => i == last,
            t => !t.contains(char::is_whitespace),
        };
        if !ok {
            return Err(EventsError::InvalidTopic(pattern.to_string()));
        }
    }

    Ok(())
}

/// Whether the concrete `topic` matches `pattern`.
pub fn matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut topic_tokens = topic.split('.');

    loop {
        match (pattern_tokens.next(), topic_tokens.next()) {
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => {}
            (Some(p), Some(t)) if p == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
