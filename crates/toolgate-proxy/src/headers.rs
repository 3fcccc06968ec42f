//! Header composition for proxied MCP calls.

use std::collections::HashMap;

use toolgate_registry::HeaderDefinition;

use crate::env::CiEnv;

/// Derive an HTTP header name from a snake_case env key:
/// `api_v2_key` becomes `Api-V2-Key`.
pub fn to_http_header(key: &str) -> String {
    key.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Compose the headers for one upstream request.
///
/// System env values map through their [`HeaderDefinition`] when one exists,
/// otherwise through [`to_http_header`]. User-config values may only
/// overwrite keys that have a definition; unknown keys are ignored so a
/// caller cannot inject arbitrary headers. Empty values never produce or
/// erase a header. The OAuth token, when present, wins the `Authorization`
/// header last.
pub fn build_headers(
    system_env: &CiEnv,
    user_config: &HashMap<String, String>,
    header_defs: &[HeaderDefinition],
    oauth_token: Option<&str>,
) -> HashMap<String, String> {
    // env_name (lowercased) to header name.
    let defined: HashMap<String, &str> = header_defs
        .iter()
        .map(|d| (d.env_name.to_lowercase(), d.header_name.as_str()))
        .collect();

    let mut headers: HashMap<String, String> = HashMap::new();

    for (key, value) in system_env.iter() {
        if value.is_empty() {
            continue;
        }
        let name = defined
            .get(key)
            .map(|n| (*n).to_string())
            .unwrap_or_else(|| to_http_header(key));
        headers.insert(name, value.to_string());
    }

    for (key, value) in user_config {
        if value.is_empty() {
            continue;
        }
        if let Some(name) = defined.get(&key.to_lowercase()) {
            headers.insert((*name).to_string(), value.clone());
        }
    }

    if let Some(token) = oauth_token {
        if !token.is_empty() {
            headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }
    }

    headers
}
