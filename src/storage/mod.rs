//! Loading the JSON documents the CLI host works from, and writing reports.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::environment::EnvironmentStore;
use crate::error::{Error, Result};
use crate::http::request::RequestDescriptor;
use crate::testing::TestSuite;

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = raw.len(), "loaded file");
    serde_json::from_str(&raw).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value).map_err(|source| Error::Serialize {
        what: "report",
        source,
    })?;
    fs::write(path, raw).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_request(path: &Path) -> Result<RequestDescriptor> {
    load_json(path)
}

/// `{ "environments": [...], "activeEnvironmentId": "..." }`
pub fn load_environment_store(path: &Path) -> Result<EnvironmentStore> {
    load_json(path)
}

/// `{ "scripts": [...], "assertions": [...] }`
pub fn load_test_suite(path: &Path) -> Result<TestSuite> {
    load_json(path)
}
