//! Function configuration conveyed to the host process as environment variables.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Environment variables to set on a function host process.
///
/// Created fresh per test scope, mutated by setup steps, then read by the
/// controller when it builds the launch specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionConfiguration {
    environment_variables: HashMap<String, String>,
}

impl FunctionConfiguration {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an environment variable. A later value for the same key wins.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.environment_variables.insert(key.into(), value.into());
        self
    }

    /// Builder-style variant of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Look up a variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.environment_variables.get(key).map(String::as_str)
    }

    /// Remove a variable, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.environment_variables.remove(key)
    }

    /// All configured variables.
    pub const fn environment_variables(&self) -> &HashMap<String, String> {
        &self.environment_variables
    }

    pub fn is_empty(&self) -> bool {
        self.environment_variables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.environment_variables.len()
    }

    /// Copy entries into the environment variables, skipping `None` values.
    ///
    /// Flattened configuration sources report sections (e.g. `Root` and
    /// `Root:Middle` in a nested document) as entries without a value. Those
    /// are placeholders, not errors, and are skipped.
    pub fn copy_to_environment_variables<I, K>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        for (key, value) in values {
            if let Some(value) = value {
                self.environment_variables.insert(key.into(), value);
            }
        }
    }
}

/// Flatten a nested JSON settings document into `(key, value)` pairs.
///
/// Keys are joined with `:`. Objects and arrays produce a `None` entry for the
/// section itself, followed by their children; JSON `null` produces `None`;
/// other scalars are stringified. A section entry always precedes its children.
pub fn flatten_settings_json(document: &Value) -> Vec<(String, Option<String>)> {
    let mut entries = Vec::new();
    match document {
        Value::Object(map) => {
            for (key, value) in map {
                flatten_into(key.clone(), value, &mut entries);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                flatten_into(index.to_string(), value, &mut entries);
            }
        }
        _ => {}
    }
    entries
}

fn flatten_into(prefix: String, value: &Value, entries: &mut Vec<(String, Option<String>)>) {
    match value {
        Value::Object(map) => {
            entries.push((prefix.clone(), None));
            for (key, child) in map {
                flatten_into(format!("{prefix}:{key}"), child, entries);
            }
        }
        Value::Array(items) => {
            entries.push((prefix.clone(), None));
            for (index, child) in items.iter().enumerate() {
                flatten_into(format!("{prefix}:{index}"), child, entries);
            }
        }
        Value::Null => entries.push((prefix, None)),
        Value::String(s) => entries.push((prefix, Some(s.clone()))),
        Value::Bool(b) => entries.push((prefix, Some(b.to_string()))),
        Value::Number(n) => entries.push((prefix, Some(n.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn later_values_win() {
        let mut config = FunctionConfiguration::new();
        config.set("ResponseMessage", "Hello");
        config.set("ResponseMessage", "Welcome, {name}");
        assert_eq!(config.get("ResponseMessage"), Some("Welcome, {name}"));
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn copy_skips_section_placeholders() {
        let mut config = FunctionConfiguration::new();
        config.copy_to_environment_variables(vec![
            ("Root", None),
            ("Root:Middle", None),
            ("Root:Middle:Value", Some("v".to_string())),
        ]);
        assert_eq!(config.len(), 1);
        assert_eq!(config.get("Root:Middle:Value"), Some("v"));
    }

    #[test]
    fn flatten_reports_sections_and_nulls_as_none() {
        let document = json!({
            "Root": {
                "Middle": {
                    "ExplicitNull": null,
                    "Value": "v"
                }
            },
            "ExplicitNull": null
        });

        let entries = flatten_settings_json(&document);
        let none_keys: Vec<&str> = entries
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.as_str())
            .collect();

        assert!(none_keys.contains(&"Root"));
        assert!(none_keys.contains(&"Root:Middle"));
        assert!(none_keys.contains(&"Root:Middle:ExplicitNull"));
        assert!(none_keys.contains(&"ExplicitNull"));

        let mut config = FunctionConfiguration::new();
        config.copy_to_environment_variables(entries);
        assert_eq!(config.len(), 1);
        assert_eq!(config.get("Root:Middle:Value"), Some("v"));
    }

    #[test]
    fn flatten_stringifies_scalars_and_indexes_arrays() {
        let document = json!({ "Port": 7071, "Enabled": true, "Hosts": ["a", "b"] });
        let mut config = FunctionConfiguration::new();
        config.copy_to_environment_variables(flatten_settings_json(&document));

        assert_eq!(config.get("Port"), Some("7071"));
        assert_eq!(config.get("Enabled"), Some("true"));
        assert_eq!(config.get("Hosts:0"), Some("a"));
        assert_eq!(config.get("Hosts:1"), Some("b"));
    }
}
