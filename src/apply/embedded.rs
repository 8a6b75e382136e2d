//! Detection of secrets embedded in opencode config files.
//!
//! Sensitive string values are moved out of the config document into an
//! override-shaped document so they stay on the machine that owns them.
use serde_json::{Map, Value};

const SENSITIVE_KEYS: &[&str] = &[
    "apikey",
    "token",
    "accesstoken",
    "refreshtoken",
    "secret",
    "clientsecret",
    "password",
    "authorization",
];

const SECRET_CONTAINERS: &[&str] = &["headers", "environment", "env"];

const CONTAINER_SUFFIXES: &[&str] = &["key", "token", "secret"];

fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// `{env:NAME}`, `{file:path}` and `${NAME}` references are resolved by
/// opencode at runtime and carry no secret themselves.
fn is_reference(value: &str) -> bool {
    let v = value.trim();
    v.starts_with("{env:") || v.starts_with("{file:") || v.starts_with("${")
}

/// Whether a string value under `key` should be treated as a secret.
#[must_use]
pub fn is_sensitive(key: &str, value: &str, in_container: bool) -> bool {
    if value.trim().is_empty() || is_reference(value) {
        return false;
    }
    if value.starts_with("Bearer ") {
        return true;
    }
    let folded = fold_key(key);
    if SENSITIVE_KEYS.contains(&folded.as_str()) {
        return true;
    }
    in_container && CONTAINER_SUFFIXES.iter().any(|s| folded.ends_with(s))
}

/// Remove sensitive values from `config` in place and return them as an
/// override document (an empty object when nothing was found).
pub fn extract_embedded_secrets(config: &mut Value) -> Value {
    match config {
        Value::Object(map) => Value::Object(extract_map(map, false)),
        _ => Value::Object(Map::new()),
    }
}

fn extract_map(map: &mut Map<String, Value>, in_container: bool) -> Map<String, Value> {
    let mut extracted = Map::new();
    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        let take = match map.get_mut(&key) {
            Some(Value::String(s)) => is_sensitive(&key, s, in_container),
            Some(Value::Object(child)) => {
                let container = SECRET_CONTAINERS.contains(&fold_key(&key).as_str());
                let sub = extract_map(child, container);
                if !sub.is_empty() {
                    extracted.insert(key.clone(), Value::Object(sub));
                }
                false
            }
            _ => false,
        };
        if take && let Some(value) = map.shift_remove(&key) {
            extracted.insert(key, value);
        }
    }
    extracted
}

/// Count the leaf values of an override document.
#[must_use]
pub fn count_leaves(value: &Value) -> usize {
    match value {
        Value::Object(map) => map.values().map(count_leaves).sum(),
        _ => 1,
    }
}

/// Count the leaves of `extracted` that `existing` does not already hold
/// with the same value.
#[must_use]
pub fn count_new_leaves(extracted: &Value, existing: &Value) -> usize {
    match extracted {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let known = existing.as_object().and_then(|e| e.get(key));
                known.map_or_else(|| count_leaves(value), |known| count_new_leaves(value, known))
            })
            .sum(),
        leaf if leaf == existing => 0,
        _ => 1,
    }
}

/// Drop literal secrets left at the paths of `extracted` in a document about
/// to be written to the mirror.
///
/// Values that are not sensitive (such as `{env:NAME}` references the mirror
/// already defines) stay in place.  Objects emptied by a removal are pruned.
pub fn drop_literal_secrets(document: &mut Value, extracted: &Value) {
    if let (Value::Object(map), Value::Object(paths)) = (document, extracted) {
        drop_in_map(map, paths, false);
    }
}

fn drop_in_map(map: &mut Map<String, Value>, paths: &Map<String, Value>, in_container: bool) {
    for (key, path) in paths {
        let remove = match (map.get_mut(key), path) {
            (Some(Value::Object(child)), Value::Object(sub)) => {
                let container = SECRET_CONTAINERS.contains(&fold_key(key).as_str());
                let before = child.len();
                drop_in_map(child, sub, container);
                child.is_empty() && before > 0
            }
            (Some(Value::String(s)), _) => is_sensitive(key, s, in_container),
            _ => false,
        };
        if remove {
            map.shift_remove(key);
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sensitive_key_names() {
        assert!(is_sensitive("apiKey", "sk-1", false));
        assert!(is_sensitive("api_key", "sk-1", false));
        assert!(is_sensitive("Client-Secret", "x", false));
        assert!(is_sensitive("refresh_token", "x", false));
        assert!(!is_sensitive("model", "anthropic/claude", false));
        assert!(!is_sensitive("tokenizer", "x", false));
    }

    #[test]
    fn container_suffixes_only_inside_containers() {
        assert!(is_sensitive("GITHUB_TOKEN", "ghp_x", true));
        assert!(is_sensitive("X-Api-Key", "k", true));
        assert!(!is_sensitive("GITHUB_TOKEN", "ghp_x", false));
    }

    #[test]
    fn bearer_values_anywhere() {
        assert!(is_sensitive("whatever", "Bearer abc", false));
    }

    #[test]
    fn references_and_empty_values_are_not_secrets() {
        assert!(!is_sensitive("apiKey", "{env:ANTHROPIC_API_KEY}", false));
        assert!(!is_sensitive("apiKey", "{file:~/.secrets/key}", false));
        assert!(!is_sensitive("token", "${TOKEN}", false));
        assert!(!is_sensitive("password", "", false));
    }

    #[test]
    fn extracts_nested_values() {
        let mut config = json!({
            "model": "a/b",
            "provider": {"openai": {"options": {"apiKey": "sk-live", "baseURL": "https://x"}}},
            "mcp": {"gh": {
                "type": "remote",
                "headers": {"Authorization": "Bearer t", "X-Trace": "1"},
                "environment": {"GITHUB_TOKEN": "ghp_1", "DEBUG": "1"}
            }},
            "keep": {"apiKey": "{env:KEY}"}
        });
        let extracted = extract_embedded_secrets(&mut config);
        assert_eq!(
            extracted,
            json!({
                "provider": {"openai": {"options": {"apiKey": "sk-live"}}},
                "mcp": {"gh": {
                    "headers": {"Authorization": "Bearer t"},
                    "environment": {"GITHUB_TOKEN": "ghp_1"}
                }}
            })
        );
        assert_eq!(
            config,
            json!({
                "model": "a/b",
                "provider": {"openai": {"options": {"baseURL": "https://x"}}},
                "mcp": {"gh": {
                    "type": "remote",
                    "headers": {"X-Trace": "1"},
                    "environment": {"DEBUG": "1"}
                }},
                "keep": {"apiKey": "{env:KEY}"}
            })
        );
        assert_eq!(count_leaves(&extracted), 3);
    }

    #[test]
    fn nothing_to_extract() {
        let mut config = json!({"theme": "dark"});
        assert_eq!(extract_embedded_secrets(&mut config), json!({}));
        assert_eq!(config, json!({"theme": "dark"}));
    }

    #[test]
    fn new_leaves_ignore_known_overrides() {
        let extracted = json!({"provider": {"x": {"options": {"apiKey": "sk-1", "token": "t"}}}});
        assert_eq!(count_new_leaves(&extracted, &json!({})), 2);
        assert_eq!(count_new_leaves(&extracted, &extracted), 0);
        let known = json!({"provider": {"x": {"options": {"apiKey": "sk-1", "token": "old"}}}});
        assert_eq!(count_new_leaves(&extracted, &known), 1);
    }

    #[test]
    fn dropping_keeps_references_and_removes_literals() {
        let extracted = json!({
            "provider": {"x": {"options": {"apiKey": "sk-local"}}},
            "mcp": {"gh": {"headers": {"Authorization": "Bearer t"}}}
        });
        let mut document = json!({
            "provider": {"x": {"options": {"apiKey": "{env:KEY}", "baseURL": "u"}}},
            "mcp": {"gh": {"type": "remote", "headers": {"Authorization": "Bearer old"}}}
        });
        drop_literal_secrets(&mut document, &extracted);
        assert_eq!(
            document,
            json!({
                "provider": {"x": {"options": {"apiKey": "{env:KEY}", "baseURL": "u"}}},
                "mcp": {"gh": {"type": "remote"}}
            })
        );
    }
}
