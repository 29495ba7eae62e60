use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::method::HttpMethod;
use crate::auth::AuthConfig;
use crate::environment::{Variables, resolve};

/// An editable key/value row (URL parameter or header).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

fn default_enabled() -> bool {
    true
}

/// A cookie attached to the request. Only name and value are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

/// The request as the user describes it, placeholders and all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub raw_url: String,
    pub params: Vec<KeyValue>,
    pub headers: Vec<KeyValue>,
    pub body: String,
    pub content_type: String,
    pub auth: AuthConfig,
    pub cookies: Vec<Cookie>,
}

/// A concrete request, ready for the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub cookies: Vec<Cookie>,
}

impl ResolvedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Insert a header, dropping any existing header whose name differs only in case.
pub fn set_header(headers: &mut HashMap<String, String>, key: &str, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(key));
    headers.insert(key.to_string(), value);
}

/// Turn a descriptor into a concrete request using `variables`.
///
/// Never fails: unknown placeholders stay in the output and malformed URLs are
/// passed through as text.
pub fn compile<V: Variables + ?Sized>(descriptor: &RequestDescriptor, variables: &V) -> ResolvedRequest {
    let mut url = resolve(&descriptor.raw_url, variables);

    let mut headers = HashMap::new();
    for header in descriptor.headers.iter().filter(|h| h.enabled && !h.key.is_empty()) {
        set_header(
            &mut headers,
            &resolve(&header.key, variables),
            resolve(&header.value, variables),
        );
    }

    descriptor.auth.resolve(variables).apply(&mut headers, &mut url);

    let cookies: Vec<Cookie> = descriptor
        .cookies
        .iter()
        .map(|cookie| Cookie {
            name: resolve(&cookie.name, variables),
            value: resolve(&cookie.value, variables),
            ..cookie.clone()
        })
        .collect();
    let cookie_header = cookies
        .iter()
        .map(|c| format!("{}={}", urlencoding::encode(&c.name), urlencoding::encode(&c.value)))
        .collect::<Vec<_>>()
        .join("; ");
    // Compiled cookies take precedence over an explicit Cookie header.
    if !cookie_header.is_empty() {
        set_header(&mut headers, "Cookie", cookie_header);
    }

    let (body, content_type) = if descriptor.method.sends_body() && !descriptor.body.is_empty() {
        let content_type = resolve(&descriptor.content_type, variables);
        (
            Some(resolve(&descriptor.body, variables)),
            (!content_type.is_empty()).then_some(content_type),
        )
    } else {
        (None, None)
    };

    debug!(
        method = %descriptor.method,
        url = %url,
        headers = headers.len(),
        cookies = cookies.len(),
        has_body = body.is_some(),
        "Compiled request"
    );

    ResolvedRequest {
        method: descriptor.method,
        url,
        headers,
        body,
        content_type,
        cookies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ApiKeyLocation;
    use crate::environment::Environment;

    fn env() -> Environment {
        Environment::new("env1", "staging")
            .with_variable("base_url", "https://api.example.com")
            .with_variable("auth_token", "staging-token")
            .with_variable("session", "s3ss")
    }

    fn descriptor(url: &str) -> RequestDescriptor {
        RequestDescriptor {
            raw_url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_compile_full() {
        let request = RequestDescriptor {
            method: HttpMethod::Post,
            raw_url: "{{base_url}}/users".into(),
            headers: vec![
                KeyValue::new("X-Token", "{{auth_token}}"),
                KeyValue::new("X-Skipped", "nope").disabled(),
            ],
            body: r#"{"key": "{{auth_token}}"}"#.into(),
            content_type: "application/json".into(),
            auth: AuthConfig::Bearer {
                token: "{{auth_token}}".into(),
            },
            cookies: vec![Cookie::new("session", "{{session}}")],
            ..Default::default()
        };

        let resolved = compile(&request, &env());
        assert_eq!(resolved.url, "https://api.example.com/users");
        assert_eq!(resolved.header("x-token"), Some("staging-token"));
        assert_eq!(resolved.header("Authorization"), Some("Bearer staging-token"));
        assert_eq!(resolved.header("Cookie"), Some("session=s3ss"));
        assert_eq!(resolved.header("X-Skipped"), None);
        assert_eq!(resolved.body.as_deref(), Some(r#"{"key": "staging-token"}"#));
        assert_eq!(resolved.content_type.as_deref(), Some("application/json"));
        assert_eq!(resolved.cookies[0].value, "s3ss");
    }

    #[test]
    fn test_compile_never_fails_on_odd_urls() {
        for url in ["", "not a url", "example.com/path", "{{missing}}/x", "http://[::1"] {
            let resolved = compile(&descriptor(url), &env());
            assert_eq!(resolved.url, url);
        }
    }

    #[test]
    fn test_later_duplicate_headers_win() {
        let mut request = descriptor("http://x");
        request.headers = vec![
            KeyValue::new("Accept", "text/plain"),
            KeyValue::new("accept", "application/json"),
        ];
        let resolved = compile(&request, &env());
        assert_eq!(resolved.headers.len(), 1);
        assert_eq!(resolved.header("Accept"), Some("application/json"));
    }

    #[test]
    fn test_auth_header_beats_user_header() {
        let mut request = descriptor("http://x");
        request.headers = vec![KeyValue::new("Authorization", "Token user-supplied")];
        request.auth = AuthConfig::Basic {
            username: "user".into(),
            password: "pass".into(),
        };
        let resolved = compile(&request, &env());
        assert_eq!(resolved.header("Authorization"), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn test_api_key_query_appended_after_resolution() {
        let mut request = descriptor("{{base_url}}/y?a=1");
        request.auth = AuthConfig::ApiKey {
            key: "k".into(),
            value: "v".into(),
            add_to: ApiKeyLocation::Query,
        };
        let resolved = compile(&request, &env());
        assert_eq!(resolved.url, "https://api.example.com/y?a=1&k=v");
    }

    #[test]
    fn test_cookie_header_overrides_explicit_cookie() {
        let mut request = descriptor("http://x");
        request.headers = vec![KeyValue::new("Cookie", "manual=1")];
        request.cookies = vec![Cookie::new("a b", "1;2"), Cookie::new("c", "3")];
        let resolved = compile(&request, &env());
        assert_eq!(resolved.header("Cookie"), Some("a%20b=1%3B2; c=3"));
    }

    #[test]
    fn test_explicit_cookie_kept_without_cookie_list() {
        let mut request = descriptor("http://x");
        request.headers = vec![KeyValue::new("Cookie", "manual=1")];
        let resolved = compile(&request, &env());
        assert_eq!(resolved.header("Cookie"), Some("manual=1"));
    }

    #[test]
    fn test_body_dropped_for_get_and_head() {
        for method in [HttpMethod::Get, HttpMethod::Head] {
            let mut request = descriptor("http://x");
            request.method = method;
            request.body = "payload".into();
            request.content_type = "text/plain".into();
            let resolved = compile(&request, &env());
            assert_eq!(resolved.body, None);
            assert_eq!(resolved.content_type, None);
        }
    }

    #[test]
    fn test_empty_body_not_sent() {
        let mut request = descriptor("http://x");
        request.method = HttpMethod::Post;
        request.content_type = "application/json".into();
        let resolved = compile(&request, &env());
        assert_eq!(resolved.body, None);
        assert_eq!(resolved.content_type, None);
    }

    #[test]
    fn test_disabled_params_do_not_touch_url() {
        let mut request = descriptor("http://x/y");
        request.params = vec![KeyValue::new("q", "1").disabled()];
        assert_eq!(compile(&request, &env()).url, "http://x/y");
    }

    #[test]
    fn test_deserialize_descriptor() {
        let request: RequestDescriptor = serde_json::from_str(
            r#"{
                "method": "PUT",
                "rawUrl": "{{base_url}}/items/1",
                "headers": [{"key": "Accept", "value": "application/json"}],
                "auth": {"type": "none"}
            }"#,
        )
        .unwrap();
        assert_eq!(request.method, HttpMethod::Put);
        assert!(request.headers[0].enabled);
        assert_eq!(request.auth, AuthConfig::None);
    }
}
