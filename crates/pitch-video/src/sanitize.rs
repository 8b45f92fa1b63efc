//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Source references may be signed URLs or paths inside a user's home
//! directory. Spans only ever see the redacted form.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Redacts a video source reference for logging.
///
/// - `https://user:pw@cdn.example.com/v.mp4?sig=abc` → `https://****@cdn.example.com/v.mp4`
/// - `https://cdn.example.com/v.mp4#t=10` → `https://cdn.example.com/v.mp4`
/// - `/home/alice/videos/pitch.mp4` → `pitch.mp4`
pub fn redact_source(source: &str) -> String {
    let Some(scheme_end) = source.find("://") else {
        return redact_path(Path::new(source));
    };

    let scheme = &source[..scheme_end + 3];
    let rest = &source[scheme_end + 3..];
    // Signed URLs carry their credentials in the query string.
    let rest = rest.split(['?', '#']).next().unwrap_or_default();

    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at_pos) => format!("{}****@{}", scheme, &rest[at_pos + 1..]),
        None => format!("{}{}", scheme, rest),
    }
}
