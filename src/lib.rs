//! Request composition and verification.
//!
//! A [`RequestDescriptor`] is resolved against an environment into a
//! [`ResolvedRequest`], handed to a [`Transport`], and the resulting
//! [`ResponseDescriptor`] is checked by assertions and test scripts into a
//! single [`TestResult`].

pub mod auth;
pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod http;
pub mod storage;
pub mod testing;

pub use auth::{ApiKeyLocation, AuthConfig};
pub use config::Settings;
pub use environment::{Environment, EnvironmentStore, Variables, resolve};
pub use error::{Error, Result};
pub use http::client::{HttpTransport, Transport};
pub use http::method::HttpMethod;
pub use http::request::{Cookie, KeyValue, RequestDescriptor, ResolvedRequest, compile};
pub use http::response::ResponseDescriptor;
pub use testing::runner::{TestRunner, run_tests};
pub use testing::script::{RhaiScriptEngine, ScriptEngine};
pub use testing::{TestAssertion, TestResult, TestScript, TestSuite};
