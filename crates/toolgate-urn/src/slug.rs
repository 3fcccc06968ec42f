//! URN segment validation and URI slugification.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{UrnError, UrnResult};

/// Maximum length of a single URN segment.
pub const MAX_SEGMENT_LEN: usize = 128;

/// Pattern every URN segment must match.
static SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+([a-z0-9_-]*[a-z0-9])?$").expect("valid segment regex"));

static NON_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_-]+").expect("valid non-slug regex"));
static MULTI_DASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid dash regex"));
static MULTI_UNDERSCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_+").expect("valid underscore regex"));

/// Validate a single URN segment, naming the segment in the error.
pub(crate) fn validate_segment(label: &str, value: &str) -> UrnResult<()> {
    if value.is_empty() {
        return Err(UrnError::invalid(format!("empty {label}")));
    }

    if value.len() > MAX_SEGMENT_LEN {
        return Err(UrnError::invalid(format!(
            "{label} segment is too long (max {MAX_SEGMENT_LEN}, got {})",
            value.len()
        )));
    }

    if !SEGMENT_RE.is_match(value) {
        return Err(UrnError::invalid(format!(
            "disallowed characters in {label}: {value:?}"
        )));
    }

    Ok(())
}

/// Sanitize an arbitrary string into a URN-safe slug fragment.
fn sanitize_uri_fragment(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    let s = s.to_lowercase();
    let s = NON_SLUG_RE.replace_all(&s, "-");
    let s = MULTI_DASH_RE.replace_all(&s, "-");
    let s = MULTI_UNDERSCORE_RE.replace_all(&s, "_");
    let s = s.trim_matches(|c| c == '-' || c == '_');

    truncate_fragment(s)
}

/// Cap a fragment at the segment length, re-trimming after the cut.
fn truncate_fragment(s: &str) -> String {
    if s.len() <= MAX_SEGMENT_LEN {
        return s.to_string();
    }

    // Fragments are ASCII after sanitization, so byte slicing is safe.
    s[..MAX_SEGMENT_LEN]
        .trim_matches(|c| c == '-' || c == '_')
        .to_string()
}

/// Minimal URI decomposition for slugification.
///
/// Deliberately more lenient than a full URL parser: inputs like
/// `https://api.example.com/users/{id}` keep their path characters verbatim
/// so the slug reflects the original text rather than a percent-encoded
/// normalization of it.
fn split_uri(uri: &str) -> (Option<&str>, Option<&str>, Option<&str>, Option<&str>) {
    let uri = uri.split('#').next().unwrap_or(uri);

    let (rest, query) = match uri.split_once('?') {
        Some((r, q)) => (r, Some(q)),
        None => (uri, None),
    };

    let (scheme, rest) = match rest.split_once(':') {
        Some((s, r))
            if !s.is_empty()
                && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
        {
            (Some(s), r)
        }
        _ => (None, rest),
    };

    let (host, path) = match rest.strip_prefix("//") {
        Some(after) => match after.find('/') {
            Some(idx) => (Some(&after[..idx]), Some(&after[idx..])),
            None => (Some(after), None),
        },
        None => (None, Some(rest)),
    };

    let host = host.filter(|h| !h.is_empty());
    let path = path.filter(|p| !p.is_empty());

    (scheme, host, path, query)
}

/// Convert a URI into a slug suitable for use as a URN segment.
///
/// The scheme, host, path, and query all contribute so that distinct URIs
/// produce distinct slugs:
///
/// ```
/// use toolgate_urn::uri_to_slug;
///
/// assert_eq!(uri_to_slug("file:///project/src/main.rs"), "file-project-src-main-rs");
/// assert_eq!(
///     uri_to_slug("https://api.example.com/data?version=v1&format=json"),
///     "https-api-example-com-data-version-v1-format-json",
/// );
/// ```
///
/// Returns an empty string for empty input or input that reduces to nothing,
/// which fails URN validation downstream.
pub fn uri_to_slug(uri: &str) -> String {
    if uri.is_empty() {
        return String::new();
    }

    let (scheme, host, path, query) = split_uri(uri);

    let mut parts: Vec<String> = Vec::new();

    if let Some(scheme) = scheme {
        parts.push(sanitize_uri_fragment(scheme));
    }

    if let Some(host) = host {
        parts.push(sanitize_uri_fragment(host));
    }

    if let Some(path) = path {
        let path = path.trim_matches('/');
        if !path.is_empty() {
            parts.push(sanitize_uri_fragment(&path.replace('/', "-")));
        }
    }

    if let Some(query) = query {
        let query = query.replace('&', "-").replace('=', "-");
        parts.push(sanitize_uri_fragment(&query));
    }

    let filtered: Vec<String> = parts.into_iter().filter(|p| !p.is_empty()).collect();
    if filtered.is_empty() {
        return String::new();
    }

    truncate_fragment(&filtered.join("-"))
}
