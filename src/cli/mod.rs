//! # CLI Support
//!
//! Runs a single request and its test suite from JSON files, for CI/CD
//! pipelines and quick checks from a terminal.
//!
//! ```text
//! litepost run --request req.json --env envs.json --use dev --tests suite.json
//! litepost resolve --request req.json --env envs.json --use staging
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Settings;
use crate::environment::EnvironmentStore;
use crate::error::{Error, Result};
use crate::http::client::Transport;
use crate::http::method::HttpMethod;
use crate::http::request::{ResolvedRequest, compile};
use crate::http::response::ResponseDescriptor;
use crate::http::url::{parse_query_params, request_name_from_url};
use crate::storage;
use crate::testing::runner::TestRunner;
use crate::testing::{TestResult, TestSuite};

pub const USAGE: &str = "\
Usage:
  litepost run --request <file> [--env <file>] [--use <env>] [--method <method>]
               [--tests <file>] [--config <file>] [--format text|json] [--report <file>]
  litepost resolve --request <file> [--env <file>] [--use <env>] [--method <method>]
                   [--format text|json]
  litepost help

Options:
  --request, -r  Request descriptor (JSON)
  --method, -X   Send with this method instead of the descriptor's
  --env, -e      Environments file: {\"environments\": [...], \"activeEnvironmentId\": ...}
  --use, -u      Environment to activate, by id or name
  --tests, -t    Test suite: {\"scripts\": [...], \"assertions\": [...]}
  --config, -c   Settings file (JSON); LITEPOST_* variables override it
  --format, -f   Output format: text (default) or json
  --report       Also write the JSON report to this file

Exit status is 1 when an assertion or test fails, a script aborts or the
request could not be sent.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(CliConfig),
    Resolve(CliConfig),
    Help,
}

/// CLI configuration parsed from command-line arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    pub request_path: PathBuf,
    pub method: Option<HttpMethod>,
    pub environments_path: Option<PathBuf>,
    pub environment: Option<String>,
    pub tests_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub output_format: OutputFormat,
    pub report_path: Option<PathBuf>,
}

/// Output format for CLI reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::Usage(format!("Unknown output format: {other}"))),
        }
    }
}

/// Parse the arguments that follow the program name.
pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some(command) = args.first() else {
        return Err(Error::Usage("Missing command".to_string()));
    };

    match command.as_str() {
        "run" => Ok(Command::Run(CliConfig::parse(&args[1..])?)),
        "resolve" => Ok(Command::Resolve(CliConfig::parse(&args[1..])?)),
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(Error::Usage(format!("Unknown command: {other}"))),
    }
}

impl CliConfig {
    fn parse(args: &[String]) -> Result<Self> {
        let mut config = CliConfig::default();
        let mut request_path = None;

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            let value = || {
                args.get(i + 1)
                    .cloned()
                    .ok_or_else(|| Error::Usage(format!("{flag} requires a value")))
            };

            match flag {
                "--request" | "-r" => request_path = Some(PathBuf::from(value()?)),
                "--method" | "-X" => config.method = Some(value()?.parse().map_err(Error::Usage)?),
                "--env" | "-e" => config.environments_path = Some(PathBuf::from(value()?)),
                "--use" | "-u" => config.environment = Some(value()?),
                "--tests" | "-t" => config.tests_path = Some(PathBuf::from(value()?)),
                "--config" | "-c" => config.config_path = Some(PathBuf::from(value()?)),
                "--format" | "-f" => config.output_format = value()?.parse()?,
                "--report" => config.report_path = Some(PathBuf::from(value()?)),
                other => return Err(Error::Usage(format!("Unknown option: {other}"))),
            }
            i += 2;
        }

        config.request_path =
            request_path.ok_or_else(|| Error::Usage("--request is required".to_string()))?;
        Ok(config)
    }
}

/// Load the request and environments named by `config` and compile the request.
pub fn resolve_request(config: &CliConfig) -> Result<ResolvedRequest> {
    let mut descriptor = storage::load_request(&config.request_path)?;
    if let Some(method) = config.method {
        descriptor.method = method;
    }

    let mut store = match &config.environments_path {
        Some(path) => storage::load_environment_store(path)?,
        None => EnvironmentStore::new(),
    };
    if let Some(name) = &config.environment {
        if !store.select(name) {
            return Err(Error::Usage(format!("No environment with id or name `{name}`")));
        }
    }
    debug!(
        environment = store.active().map(|env| env.name.as_str()),
        "compiling request"
    );

    Ok(compile(&descriptor, &store))
}

/// Everything one `litepost run` produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub name: String,
    pub request: ResolvedRequest,
    pub response: ResponseDescriptor,
    pub result: TestResult,
}

impl RunReport {
    /// True when the request was sent and every check passed.
    pub fn passed(&self) -> bool {
        self.response.error.is_none() && self.result.success
    }
}

/// Compile, send once, and run the test suite against the response.
pub async fn run<T: Transport>(config: &CliConfig, transport: &T, settings: &Settings) -> Result<RunReport> {
    let request = resolve_request(config)?;
    let suite = match &config.tests_path {
        Some(path) => storage::load_test_suite(path)?,
        None => TestSuite::default(),
    };

    let response = transport.send(&request).await;
    let result = TestRunner::new(settings).run_suite(&suite, &response);

    let report = RunReport {
        name: request_name_from_url(&request.url),
        request,
        response,
        result,
    };
    info!(name = %report.name, passed = report.passed(), "run complete");
    Ok(report)
}

pub fn render_report(report: &RunReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(report.to_string()),
        OutputFormat::Json => to_json(report, "report"),
    }
}

pub fn render_resolved(request: &ResolvedRequest, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(ResolvedText(request).to_string()),
        OutputFormat::Json => to_json(request, "request"),
    }
}

fn to_json<T: Serialize>(value: &T, what: &'static str) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|source| Error::Serialize { what, source })
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}  [{}]", self.request.method, self.request.url, self.name)?;
        for param in parse_query_params(&self.request.url) {
            writeln!(f, "  ?{} = {}", param.key, param.value)?;
        }

        let response = &self.response;
        match &response.error {
            Some(error) => writeln!(f, "-> request failed: {error}")?,
            None => {
                write!(
                    f,
                    "-> {} {}  {} ms",
                    response.status,
                    response.status_text,
                    response.response_time().round()
                )?;
                if !response.redirect_chain.is_empty() {
                    write!(f, "  ({} redirects)", response.redirect_chain.len())?;
                }
                writeln!(f)?;
            }
        }

        let result = &self.result;
        if !result.assertions.is_empty() {
            writeln!(f, "\nAssertions")?;
            for outcome in &result.assertions {
                writeln!(f, "  {} {}: {}", mark(outcome.success), outcome.id, outcome.message)?;
            }
        }
        if !result.script_results.is_empty() {
            writeln!(f, "\nTests")?;
            for outcome in &result.script_results {
                match &outcome.message {
                    Some(message) => writeln!(f, "  {} {}: {message}", mark(outcome.success), outcome.name)?,
                    None => writeln!(f, "  {} {}", mark(outcome.success), outcome.name)?,
                }
            }
        }
        if let Some(error) = &result.error {
            writeln!(f, "\nScript {} aborted: {error}", result.script_id)?;
        }

        let checks = result.assertions.len() + result.script_results.len();
        let passed = result.assertions.iter().filter(|o| o.success).count()
            + result.script_results.iter().filter(|o| o.success).count();
        write!(
            f,
            "\n{}  {passed}/{checks} checks passed in {} ms",
            if self.passed() { "PASSED" } else { "FAILED" },
            result.duration
        )
    }
}

fn mark(success: bool) -> &'static str {
    if success { "ok  " } else { "FAIL" }
}

struct ResolvedText<'a>(&'a ResolvedRequest);

impl fmt::Display for ResolvedText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let request = self.0;
        writeln!(f, "{} {}", request.method, request.url)?;

        let mut headers: Vec<_> = request.headers.iter().collect();
        headers.sort();
        for (key, value) in headers {
            writeln!(f, "{key}: {value}")?;
        }
        if let Some(content_type) = &request.content_type {
            if request.header("content-type").is_none() {
                writeln!(f, "Content-Type: {content_type}")?;
            }
        }
        if let Some(body) = &request.body {
            write!(f, "\n{body}")?;
        }
        Ok(())
    }
}
