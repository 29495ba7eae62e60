//! # Testing & Assertions
//!
//! Verifies a response with declarative assertions and free-form test
//! scripts, producing a single [`TestResult`] per run.

pub mod assertion;
pub mod runner;
pub mod script;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User-authored test code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestScript {
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Which part of the response an assertion inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssertionKind {
    Status,
    Json,
    Header,
    ResponseTime,
}

impl AssertionKind {
    pub fn label(self) -> &'static str {
        match self {
            AssertionKind::Status => "status",
            AssertionKind::Json => "json",
            AssertionKind::Header => "header",
            AssertionKind::ResponseTime => "responseTime",
        }
    }
}

/// Comparison operator for an assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssertionOperator {
    Equals,
    Contains,
    Exists,
    GreaterThan,
    LessThan,
}

/// A declarative expectation about one response attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAssertion {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AssertionKind,
    pub operator: AssertionOperator,
    #[serde(default)]
    pub expected: Value,
    /// JSON path for `json`, header name for `header`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionOutcome {
    pub id: String,
    pub success: bool,
    pub message: String,
}

/// Outcome of one `test()` call inside a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutcome {
    pub name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ScriptOutcome {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: true,
            message: None,
        }
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Everything one test run produced. Replaces any earlier result wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Id of the last script that was started.
    pub script_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub assertions: Vec<AssertionOutcome>,
    pub script_results: Vec<ScriptOutcome>,
    /// Milliseconds.
    pub duration: u64,
}

/// Scripts and assertions attached to one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestSuite {
    pub scripts: Vec<TestScript>,
    pub assertions: Vec<TestAssertion>,
}
