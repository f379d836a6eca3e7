//! Helpers for sanitizing data before it enters tracing spans or the
//! filesystem.
//!
//! Source URLs may carry credentials or session tokens, so spans only ever
//! see the redacted form.

use std::path::Path;

use url::Url;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips userinfo, query and fragment from a URL.
///
/// - `https://user:pw@city.gov/minutes?session=abc` → `https://****@city.gov/minutes`
/// - `https://city.gov/minutes` → unchanged
/// - unparseable input is returned with anything after `?` or `#` removed
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            let had_userinfo = !url.username().is_empty() || url.password().is_some();
            url.set_query(None);
            url.set_fragment(None);
            if had_userinfo {
                let _ = url.set_password(None);
                let _ = url.set_username("****");
            }
            url.to_string()
        }
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Decodes `%XX` escapes. Malformed escapes are kept verbatim.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            let hi = (bytes[i + 1] as char).to_digit(16).unwrap_or(0) as u8;
            let lo = (bytes[i + 2] as char).to_digit(16).unwrap_or(0) as u8;
            out.push(hi << 4 | lo);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Derives a safe document filename from a URL path.
///
/// Takes the last non-empty path segment, percent-decodes it, replaces
/// anything outside `[A-Za-z0-9._-]` with `_`, and appends `.pdf` unless the
/// name already ends with it (case-insensitive). An empty result becomes
/// `document.pdf`.
pub fn document_filename(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("");
    let decoded = percent_decode(segment);

    let mut name: String = decoded
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = name.trim_matches('.');
    if trimmed.is_empty() {
        return "document.pdf".to_string();
    }
    name = trimmed.to_string();

    if !name.to_ascii_lowercase().ends_with(".pdf") {
        name.push_str(".pdf");
    }
    name
}

/// Returns true when `component` is safe to use as a single path segment.
pub fn is_safe_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && !component.contains(['/', '\\', '\0'])
}
