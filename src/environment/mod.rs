//! # Environments & Variables
//!
//! An environment is a named set of variables (e.g. dev, staging, prod). At
//! most one environment is active at a time. Request text refers to variables
//! with `{{name}}` placeholders which are substituted in a single pass.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("placeholder pattern is valid"));

/// Anything that can answer a variable lookup.
pub trait Variables {
    fn get_variable(&self, name: &str) -> Option<&str>;
}

impl Variables for HashMap<String, String> {
    fn get_variable(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl<V: Variables> Variables for Option<&V> {
    fn get_variable(&self, name: &str) -> Option<&str> {
        self.and_then(|vars| vars.get_variable(name))
    }
}

/// A named set of variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

impl Environment {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            variables: HashMap::new(),
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

impl Variables for Environment {
    fn get_variable(&self, name: &str) -> Option<&str> {
        self.variables.get_variable(name)
    }
}

/// Replace every `{{name}}` placeholder in `text` with its value.
///
/// The name is the placeholder's inner text with surrounding whitespace
/// trimmed. Unknown names are left verbatim and substituted values are never
/// scanned again.
pub fn resolve<V: Variables + ?Sized>(text: &str, variables: &V) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            match variables.get_variable(caps[1].trim()) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Holds all environments and the active selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentStore {
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub active_environment_id: Option<String>,
}

impl EnvironmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an environment, replacing any existing one with the same id.
    pub fn add(&mut self, environment: Environment) {
        self.environments.retain(|env| env.id != environment.id);
        self.environments.push(environment);
    }

    /// Apply `update` to the environment with `id`. Returns false if absent.
    pub fn update<F>(&mut self, id: &str, update: F) -> bool
    where
        F: FnOnce(&mut Environment),
    {
        match self.environments.iter_mut().find(|env| env.id == id) {
            Some(env) => {
                update(env);
                true
            }
            None => false,
        }
    }

    /// Remove an environment; deleting the active one clears the selection.
    pub fn delete(&mut self, id: &str) {
        self.environments.retain(|env| env.id != id);
        if self.active_environment_id.as_deref() == Some(id) {
            self.active_environment_id = None;
        }
    }

    pub fn set_active(&mut self, id: Option<&str>) {
        self.active_environment_id = id.map(str::to_string);
    }

    /// Select an environment by id or, failing that, by name.
    pub fn select(&mut self, id_or_name: &str) -> bool {
        let found = self
            .environments
            .iter()
            .find(|env| env.id == id_or_name)
            .or_else(|| self.environments.iter().find(|env| env.name == id_or_name))
            .map(|env| env.id.clone());
        let selected = found.is_some();
        if selected {
            self.active_environment_id = found;
        }
        selected
    }

    pub fn active(&self) -> Option<&Environment> {
        let id = self.active_environment_id.as_deref()?;
        self.environments.iter().find(|env| env.id == id)
    }
}

impl Variables for EnvironmentStore {
    fn get_variable(&self, name: &str) -> Option<&str> {
        self.active().and_then(|env| env.get_variable(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev() -> Environment {
        Environment::new("env1", "dev")
            .with_variable("host", "dev.example.com")
            .with_variable("port", "8080")
    }

    #[test]
    fn test_resolve_replaces_placeholders() {
        let result = resolve("https://{{host}}:{{port}}/api", &dev());
        assert_eq!(result, "https://dev.example.com:8080/api");
    }

    #[test]
    fn test_resolve_trims_identifier() {
        assert_eq!(resolve("{{ host }}", &dev()), "dev.example.com");
    }

    #[test]
    fn test_resolve_leaves_unknown_placeholders() {
        let text = "https://{{host}}/{{missing}}";
        assert_eq!(resolve(text, &dev()), "https://dev.example.com/{{missing}}");

        let none: Option<&Environment> = None;
        assert_eq!(resolve(text, &none), text);
    }

    #[test]
    fn test_resolve_is_not_recursive() {
        let env = Environment::new("e", "e")
            .with_variable("outer", "{{inner}}")
            .with_variable("inner", "deep");
        assert_eq!(resolve("{{outer}}", &env), "{{inner}}");
    }

    #[test]
    fn test_resolved_text_has_no_braces() {
        let result = resolve("{{host}}{{port}}", &dev());
        assert!(!result.contains("{{") && !result.contains("}}"));
    }

    #[test]
    fn test_resolve_empty_and_unterminated() {
        assert_eq!(resolve("{{}}", &dev()), "{{}}");
        assert_eq!(resolve("{{host", &dev()), "{{host");
        assert_eq!(resolve("", &dev()), "");
    }

    #[test]
    fn test_store_active_lookup() {
        let mut store = EnvironmentStore::new();
        store.add(dev());
        store.add(Environment::new("env2", "prod").with_variable("host", "api.example.com"));

        assert_eq!(store.get_variable("host"), None);

        store.set_active(Some("env2"));
        assert_eq!(store.get_variable("host"), Some("api.example.com"));

        assert!(store.select("dev"));
        assert_eq!(store.get_variable("host"), Some("dev.example.com"));
        assert!(!store.select("staging"));
        assert_eq!(store.active_environment_id.as_deref(), Some("env1"));
    }

    #[test]
    fn test_resolve_through_store() {
        let mut store = EnvironmentStore::new();
        store.add(dev());
        assert_eq!(resolve("{{host}}", &store), "{{host}}");

        store.set_active(Some("env1"));
        assert_eq!(resolve("http://{{host}}:{{port}}", &store), "http://dev.example.com:8080");
    }

    #[test]
    fn test_store_delete_active_clears_selection() {
        let mut store = EnvironmentStore::new();
        store.add(dev());
        store.set_active(Some("env1"));
        store.delete("env1");

        assert!(store.active().is_none());
        assert!(store.environments.is_empty());
    }

    #[test]
    fn test_store_update() {
        let mut store = EnvironmentStore::new();
        store.add(dev());
        assert!(store.update("env1", |env| {
            env.variables.insert("token".into(), "abc".into());
        }));
        assert!(!store.update("nope", |_| {}));

        store.set_active(Some("env1"));
        assert_eq!(store.get_variable("token"), Some("abc"));
    }
}
