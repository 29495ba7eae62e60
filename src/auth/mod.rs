//! # Authentication
//!
//! Turns an auth configuration into header and query-string contributions:
//! Bearer Token, Basic Auth and API Key (header or query).

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::environment::{Variables, resolve};
use crate::http::request::set_header;

/// Supported authentication methods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AuthConfig {
    #[default]
    None,
    Basic {
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: String,
    },
    Bearer {
        #[serde(default)]
        token: String,
    },
    #[serde(alias = "api-key")]
    ApiKey {
        #[serde(default)]
        key: String,
        #[serde(default)]
        value: String,
        #[serde(default, rename = "addTo")]
        add_to: ApiKeyLocation,
    },
}

/// Where to place the API key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
}

impl AuthConfig {
    /// Substitute placeholders in every populated field.
    pub fn resolve<V: Variables + ?Sized>(&self, variables: &V) -> AuthConfig {
        match self {
            AuthConfig::None => AuthConfig::None,
            AuthConfig::Basic { username, password } => AuthConfig::Basic {
                username: resolve(username, variables),
                password: resolve(password, variables),
            },
            AuthConfig::Bearer { token } => AuthConfig::Bearer {
                token: resolve(token, variables),
            },
            AuthConfig::ApiKey { key, value, add_to } => AuthConfig::ApiKey {
                key: resolve(key, variables),
                value: resolve(value, variables),
                add_to: *add_to,
            },
        }
    }

    /// Write this auth's contribution into `headers` and `url`.
    ///
    /// Auth headers replace any same-named header already present.
    pub fn apply(&self, headers: &mut HashMap<String, String>, url: &mut String) {
        match self {
            AuthConfig::None => {}
            AuthConfig::Basic { username, password } => {
                let credentials = STANDARD.encode(format!("{username}:{password}"));
                set_header(headers, "Authorization", format!("Basic {credentials}"));
            }
            AuthConfig::Bearer { token } => {
                // An empty token sends no Authorization header at all.
                if !token.is_empty() {
                    set_header(headers, "Authorization", format!("Bearer {token}"));
                }
            }
            AuthConfig::ApiKey { key, value, add_to } => {
                if key.is_empty() {
                    return;
                }
                match add_to {
                    ApiKeyLocation::Header => set_header(headers, key, value.clone()),
                    ApiKeyLocation::Query => append_query(url, key, value),
                }
            }
        }
    }
}

/// Append `key=value` to `url`, percent-encoding both sides.
///
/// Plain string concatenation so that unparseable URLs still get the pair.
pub fn append_query(url: &mut String, key: &str, value: &str) {
    let separator = if url.contains('?') { '&' } else { '?' };
    url.push(separator);
    url.push_str(&urlencoding::encode(key));
    url.push('=');
    url.push_str(&urlencoding::encode(value));
}
