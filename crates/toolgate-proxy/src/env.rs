//! Case-insensitive environment bag.
//!
//! Header values come from a *source* environment merged with a *toolset*
//! environment (toolset wins). Keys are matched case-insensitively
//! throughout; iteration yields lowercased keys.

use std::collections::HashMap;

/// A case-insensitive string map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiEnv {
    entries: HashMap<String, String>,
}

impl CiEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge source and toolset environments, toolset taking precedence.
    pub fn merged(source: &CiEnv, toolset: &CiEnv) -> CiEnv {
        let mut entries = source.entries.clone();
        entries.extend(toolset.entries.clone());
        CiEnv { entries }
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(key.as_ref().to_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Iterate over (lowercased key, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for CiEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = CiEnv::new();
        for (key, value) in iter {
            env.insert(key, value);
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let env: CiEnv = [("API_KEY", "abc")].into_iter().collect();
        assert_eq!(env.get("api_key"), Some("abc"));
        assert_eq!(env.get("Api_Key"), Some("abc"));
        assert_eq!(env.get("missing"), None);
    }

    #[test]
    fn test_later_insert_overwrites_any_casing() {
        let mut env = CiEnv::new();
        env.insert("API_KEY", "old");
        env.insert("api_key", "new");
        assert_eq!(env.get("API_KEY"), Some("new"));
    }

    #[test]
    fn test_merged_toolset_wins() {
        let source: CiEnv = [("api_key", "source"), ("region", "us")].into_iter().collect();
        let toolset: CiEnv = [("API_KEY", "toolset")].into_iter().collect();

        let merged = CiEnv::merged(&source, &toolset);
        assert_eq!(merged.get("api_key"), Some("toolset"));
        assert_eq!(merged.get("region"), Some("us"));
    }
}
