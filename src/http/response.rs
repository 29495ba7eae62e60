use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Phase timings in milliseconds. Only `total` is always known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTiming {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_byte: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<f64>,
    pub total: f64,
}

/// Sizes in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSize {
    pub headers: u64,
    pub body: u64,
    pub total: u64,
}

impl ResponseSize {
    pub fn new(headers: u64, body: u64) -> Self {
        Self {
            headers,
            body,
            total: headers + body,
        }
    }
}

/// One hop of a followed redirect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectHop {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub cookies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<ResponseTiming>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ResponseSize>,
}

/// What came back from one send. Produced once and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDescriptor {
    pub status: u16,
    pub status_text: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
    #[serde(default, rename = "is_base64", alias = "isBase64")]
    pub is_base64: bool,
    #[serde(default)]
    pub redirect_chain: Vec<RedirectHop>,
    #[serde(default)]
    pub cookies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<ResponseTiming>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ResponseSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseDescriptor {
    /// The degenerate response a failed send turns into.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            status_text: "Error".into(),
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Total response time in milliseconds, 0 when unknown.
    pub fn response_time(&self) -> f64 {
        self.timing.as_ref().map_or(0.0, |timing| timing.total)
    }
}
