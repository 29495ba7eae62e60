//! Runtime settings for the transport and the script sandbox.
//!
//! Settings come from an optional JSON file and are then overridden by
//! `LITEPOST_*` environment variables.

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage;

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Fallback log filter when `RUST_LOG` is unset (default: info)
    pub log_level: String,
    /// Whole-request timeout in milliseconds (default: none)
    pub timeout_ms: Option<u64>,
    /// Redirect hops followed before giving up (default: 10)
    pub max_redirects: usize,
    /// Verify TLS certificates (default: true)
    pub verify_ssl: bool,
    /// Operation budget per script, 0 = unlimited (default: 0)
    pub script_max_operations: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            timeout_ms: None,
            max_redirects: 10,
            verify_ssl: true,
            script_max_operations: 0,
        }
    }
}

impl Settings {
    /// Load settings from `path` (when given) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => storage::load_json(path)?,
            None => Self::default(),
        };
        settings.with_overrides(|name| env::var(name).ok())
    }

    /// Apply `LITEPOST_*` overrides looked up through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("LITEPOST_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(raw) = lookup("LITEPOST_TIMEOUT_MS") {
            let ms: u64 = parse_var("LITEPOST_TIMEOUT_MS", &raw)?;
            self.timeout_ms = (ms > 0).then_some(ms);
        }
        if let Some(raw) = lookup("LITEPOST_MAX_REDIRECTS") {
            self.max_redirects = parse_var("LITEPOST_MAX_REDIRECTS", &raw)?;
        }
        if let Some(raw) = lookup("LITEPOST_VERIFY_SSL") {
            self.verify_ssl = match raw.trim() {
                "true" | "1" => true,
                "false" | "0" => false,
                other => {
                    return Err(Error::Config(format!(
                        "LITEPOST_VERIFY_SSL must be true/false, got `{other}`"
                    )));
                }
            };
        }
        if let Some(raw) = lookup("LITEPOST_SCRIPT_MAX_OPERATIONS") {
            self.script_max_operations = parse_var("LITEPOST_SCRIPT_MAX_OPERATIONS", &raw)?;
        }
        Ok(self)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name} must be a non-negative integer, got `{raw}`")))
}
