//! Tool-name sanitization.
//!
//! Upstream tool names arrive with arbitrary casing, Unicode, and length.
//! [`sanitize`] reduces them to a stable `[a-z0-9_-]+` identifier of at most
//! 60 characters, appending a deterministic hash suffix when truncation is
//! needed so that long names stay collision-resistant across renames.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Maximum length of a sanitized tool name.
pub const MAX_NAME_LEN: usize = 60;

/// Reserved delimiter of proxied tool names (`<slug>--<tool>`). Upstream
/// names containing it are rejected outright; there is no escape mechanism.
pub const PROXY_DELIMITER: &str = "--";

/// Number of hex characters of the SHA-256 digest kept as a truncation suffix.
const HASH_SUFFIX_LEN: usize = 8;

static NON_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_-]").expect("valid non-name regex"));
static MULTI_UNDERSCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_+").expect("valid underscore regex"));

/// A tool name that has been through [`sanitize`].
///
/// Keeps the sanitized-but-untruncated form alongside the final name so
/// rename passes can recompute names without the original raw input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitizedName {
    name: String,
    untruncated: String,
}

impl SanitizedName {
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The sanitized string before hash-truncation; equals `as_str()` when
    /// no truncation happened.
    pub fn untruncated(&self) -> &str {
        &self.untruncated
    }

    pub fn into_string(self) -> String {
        self.name
    }
}

impl std::ops::Deref for SanitizedName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for SanitizedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<SanitizedName> for String {
    fn from(name: SanitizedName) -> String {
        name.name
    }
}

/// Sanitize a raw tool name into a stable `[a-z0-9_-]+` identifier.
///
/// Lowercases, strips diacritics (NFKD then drops combining marks), replaces
/// everything outside `[a-z0-9_-]` with `_`, collapses runs of `_` (runs of
/// `-` are preserved), and truncates with a hash suffix past
/// [`MAX_NAME_LEN`]. Idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(raw: &str) -> SanitizedName {
    let folded: String = raw
        .to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let replaced = NON_NAME_RE.replace_all(&folded, "_");
    let collapsed = MULTI_UNDERSCORE_RE.replace_all(&replaced, "_");

    SanitizedName {
        name: truncate_with_hash(&collapsed, MAX_NAME_LEN),
        untruncated: collapsed.into_owned(),
    }
}

/// The pre-2024 sanitizer behavior: like [`sanitize`] but with `-` folded
/// into `_`. Kept so migration code can recompute the historical name for a
/// tool and map it to the current one.
pub fn legacy_sanitize(raw: &str) -> SanitizedName {
    let sanitized = sanitize(raw);
    let folded = sanitized.untruncated().replace('-', "_");
    let collapsed = MULTI_UNDERSCORE_RE.replace_all(&folded, "_");
    SanitizedName {
        name: truncate_with_hash(&collapsed, MAX_NAME_LEN),
        untruncated: collapsed.into_owned(),
    }
}

/// Truncate `s` to `max` characters, replacing the tail with the first
/// 8 hex chars of `sha256(s)` when it does not fit. The digest is taken over
/// the full untruncated input, so equal inputs always truncate identically.
pub fn truncate_with_hash(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }

    let digest = Sha256::digest(s.as_bytes());
    let hash: String = digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>()
        .chars()
        .take(HASH_SUFFIX_LEN)
        .collect();

    if max < HASH_SUFFIX_LEN {
        return hash;
    }

    // The cut must land on a char boundary; callers are not required to
    // pass ASCII.
    let mut cut = max - HASH_SUFFIX_LEN;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }

    format!("{}{}", &s[..cut], hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_passthrough() {
        assert_eq!(sanitize("get_weather").as_str(), "get_weather");
        assert_eq!(sanitize("list-items").as_str(), "list-items");
    }

    #[test]
    fn test_sanitize_lowercases() {
        assert_eq!(sanitize("GetWeather").as_str(), "getweather");
    }

    #[test]
    fn test_sanitize_strips_diacritics() {
        assert_eq!(sanitize("météo_été").as_str(), "meteo_ete");
    }

    #[test]
    fn test_sanitize_replaces_symbols_with_underscore() {
        assert_eq!(sanitize("get weather!").as_str(), "get_weather_");
        assert_eq!(sanitize("a😀b").as_str(), "a_b");
    }

    #[test]
    fn test_sanitize_collapses_underscores_preserves_dashes() {
        assert_eq!(sanitize("a___b").as_str(), "a_b");
        assert_eq!(sanitize("a---b").as_str(), "a---b");
        assert_eq!(sanitize("a !? b").as_str(), "a_b");
    }

    #[test]
    fn test_sanitize_idempotent() {
        for raw in [
            "GetWeather",
            "météo_été",
            "a !? b---c",
            "petstore_doc_this_is_a_very_long_operation_name_that_definitely_exceeds_sixty",
        ] {
            let once = sanitize(raw);
            let twice = sanitize(once.as_str());
            assert_eq!(once.as_str(), twice.as_str(), "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_sanitize_output_shape() {
        let re = Regex::new(r"^[a-z0-9_-]+$").unwrap();
        for raw in ["GetWeather", "météo été", "a😀b", "x".repeat(200).as_str()] {
            let name = sanitize(raw);
            assert!(re.is_match(name.as_str()), "bad shape {:?}", name.as_str());
            assert!(name.len() <= MAX_NAME_LEN);
        }
    }

    #[test]
    fn test_sanitize_at_boundary_no_hash() {
        let raw = "a".repeat(60);
        assert_eq!(sanitize(&raw).as_str(), raw);
    }

    #[test]
    fn test_sanitize_just_over_boundary_appends_hash() {
        let raw = "a".repeat(61);
        let name = sanitize(&raw);
        assert_eq!(name.len(), 60);
        assert_eq!(&name[..52], &raw[..52]);
        assert_ne!(&name[52..], &raw[52..60]);
        assert!(name[52..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sanitize_long_name_hash_suffix() {
        // 69 chars, already sanitized, so the digest is over the input itself.
        let raw = "petstore_doc_this_is_a_very_long_operation_name_that_definitely_exceeds_sixty";
        let name = sanitize(raw);
        assert_eq!(name.len(), 60);

        let digest = Sha256::digest(raw.as_bytes());
        let want: String = digest
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>()
            .chars()
            .take(8)
            .collect();
        assert_eq!(&name[52..], want.as_str());
        assert_eq!(&name[..52], &raw[..52]);
    }

    #[test]
    fn test_truncate_with_hash_multibyte_input() {
        // 40 two-byte chars: 80 bytes, so truncation kicks in and the cut
        // lands mid-char unless backed down to a boundary.
        let raw = "é".repeat(40);
        let out = truncate_with_hash(&raw, 61);
        assert!(out.len() <= 61);
        assert!(out.ends_with(|c: char| c.is_ascii_hexdigit()));
        assert!(out.starts_with('é'));
    }

    #[test]
    fn test_truncate_with_hash_tiny_max() {
        let out = truncate_with_hash("something quite long indeed", 4);
        assert_eq!(out.len(), 8);
        assert!(out.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_untruncated_survives_truncation() {
        let raw = "a".repeat(70);
        let name = sanitize(&raw);
        assert_eq!(name.untruncated(), raw);
        assert_eq!(name.len(), 60);

        let short = sanitize("get_weather");
        assert_eq!(short.untruncated(), short.as_str());
    }

    #[test]
    fn test_legacy_sanitize_folds_dashes() {
        assert_eq!(legacy_sanitize("list-items").as_str(), "list_items");
        assert_eq!(legacy_sanitize("a-_-b").as_str(), "a_b");
    }
}
