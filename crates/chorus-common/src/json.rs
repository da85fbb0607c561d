//! Tolerant JSON extraction from free-text model replies.
//! See ARCHITECTURE.md §2.2
//!
//! Models routinely wrap the JSON they were asked for in prose or
//! markdown fences. `first_object` finds the first balanced `{…}`
//! substring and performs a typed parse. Failure is an ordinary
//! `None`, never a panic or an error used for control flow.

use serde::de::DeserializeOwned;

/// Locate the first balanced `{…}` substring in `text`.
///
/// Brace counting ignores braces inside double-quoted strings,
/// honouring backslash escapes.
pub fn first_object_str(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract and parse the first balanced JSON object in `text`.
pub fn first_object<T: DeserializeOwned>(text: &str) -> Option<T> {
    let raw = first_object_str(text)?;
    serde_json::from_str(raw).ok()
}
