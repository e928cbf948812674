//! Gmail utility functions
//!
//! Header lookup, date normalization, body extraction and the flattening of
//! a full Gmail message into [`MessageDetails`].

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::DateTime;

use crate::gmail::types::{Header, Message, MessageDetails, MessagePart};

/// Upper bound on `maxResults` for list and search
pub const MAX_RESULTS_LIMIT: i64 = 100;

/// Extracted body text is cut to this many characters
pub const BODY_SCAN_LIMIT: usize = 5000;

/// `body_preview` is cut to this many characters
pub const BODY_PREVIEW_LIMIT: usize = 2000;

/// MIME nesting deeper than this is ignored
const MAX_PART_DEPTH: usize = 16;

/// Clamp a requested result count into `1..=100`
pub fn clamp_max_results(requested: i64) -> u32 {
    requested.clamp(1, MAX_RESULTS_LIMIT) as u32
}

/// Decode base64url data from Gmail API
/// Handles both padded and non-padded base64url encoding
pub fn decode_base64url(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD
        .decode(data)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(data))
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(data))
}

/// Decode a body part to text, replacing invalid UTF-8
fn decode_text(data: &str) -> String {
    match decode_base64url(data) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::debug!("Failed to decode body part: {}", e);
            String::new()
        }
    }
}

/// Find header value by name (case-insensitive, first match)
pub fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Truncate to at most `max` characters
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Normalize an RFC 2822 `Date` header to `YYYY-MM-DD HH:MM`.
///
/// The time stays in the header's own offset. Unparseable input is
/// returned unchanged.
pub fn format_date(raw: &str) -> String {
    let trimmed = raw.trim();
    // Drop a trailing comment such as "(UTC)" or "(PST)"
    let candidate = match (trimmed.ends_with(')'), trimmed.rfind('(')) {
        (true, Some(idx)) => trimmed[..idx].trim_end(),
        _ => trimmed,
    };

    let parsed = DateTime::parse_from_rfc2822(candidate)
        .or_else(|_| DateTime::parse_from_rfc2822(&pad_time_fields(candidate)));

    match parsed {
        Ok(date) => date.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Zero-pad one-digit fields of the `H:MM:SS` token; chrono wants two digits
fn pad_time_fields(date: &str) -> String {
    date.split_whitespace()
        .map(|token| {
            if !token.contains(':') {
                return token.to_string();
            }
            token
                .split(':')
                .map(|field| match field.len() {
                    1 => format!("0{}", field),
                    _ => field.to_string(),
                })
                .collect::<Vec<_>>()
                .join(":")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract body text from a message payload, preferring `text/plain`
pub fn extract_body(payload: &MessagePart) -> String {
    truncate_chars(&extract_body_at(payload, 0), BODY_SCAN_LIMIT)
}

fn extract_body_at(part: &MessagePart, depth: usize) -> String {
    if depth > MAX_PART_DEPTH {
        tracing::debug!("MIME nesting deeper than {} levels, skipping", MAX_PART_DEPTH);
        return String::new();
    }

    if let Some(data) = part.data() {
        return decode_text(data);
    }

    let mut body = String::new();
    for child in &part.parts {
        match (child.mime(), child.data()) {
            ("text/plain", Some(data)) => {
                body = decode_text(data);
                break;
            }
            ("text/html", Some(data)) if body.is_empty() => {
                body = decode_text(data);
            }
            _ if !child.parts.is_empty() => {
                let nested = extract_body_at(child, depth + 1);
                if !nested.is_empty() {
                    body = nested;
                    break;
                }
            }
            _ => {}
        }
    }

    body
}

/// Flatten a full Gmail message into the shape returned to tool callers
pub fn flatten_message(message: Message) -> MessageDetails {
    let payload = message.payload.unwrap_or_default();
    let header = |name: &str| find_header(&payload.headers, name).unwrap_or("").to_string();

    let date = format_date(&header("Date"));
    let from = header("From");
    let to = header("To");
    let subject = header("Subject");
    let body_preview = truncate_chars(&extract_body(&payload), BODY_PREVIEW_LIMIT);

    MessageDetails {
        id: message.id,
        thread_id: message.thread_id,
        from,
        to,
        subject,
        date,
        snippet: message.snippet.unwrap_or_default(),
        labels: message.label_ids,
        body_preview,
    }
}
