use std::time::Instant;

use tracing::{debug, info, warn};

use super::assertion;
use super::script::{RhaiScriptEngine, ScriptEngine};
use super::{TestAssertion, TestResult, TestScript, TestSuite};
use crate::config::Settings;
use crate::http::response::ResponseDescriptor;

/// Runs assertions and scripts against a response and folds them into one
/// [`TestResult`].
pub struct TestRunner {
    engine: Box<dyn ScriptEngine>,
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::with_engine(RhaiScriptEngine::new())
    }
}

impl TestRunner {
    pub fn new(settings: &Settings) -> Self {
        Self::with_engine(RhaiScriptEngine::new().with_max_operations(settings.script_max_operations))
    }

    pub fn with_engine(engine: impl ScriptEngine + 'static) -> Self {
        Self {
            engine: Box::new(engine),
        }
    }

    pub fn run_suite(&self, suite: &TestSuite, response: &ResponseDescriptor) -> TestResult {
        self.run(&suite.scripts, &suite.assertions, response)
    }

    /// Assertions first, then scripts in order. A fatal script error stops
    /// the run; whatever completed before it is kept.
    pub fn run(
        &self,
        scripts: &[TestScript],
        assertions: &[TestAssertion],
        response: &ResponseDescriptor,
    ) -> TestResult {
        let start = Instant::now();
        let mut result = TestResult {
            success: true,
            ..Default::default()
        };

        for item in assertions.iter().filter(|a| a.enabled) {
            let evaluation = assertion::evaluate(item, response);
            debug!(id = %item.id, success = evaluation.success, "{}", evaluation.message);
            result.success &= evaluation.success;
            result.assertions.push(evaluation.into_outcome(item.id.clone()));
        }

        for script in scripts.iter().filter(|s| s.enabled) {
            result.script_id = script.id.clone();
            let run = self.engine.execute(script, response);

            if let Some(error) = run.fatal {
                warn!(script = %script.name, %error, "test script aborted");
                result.success = false;
                result.error = Some(error);
                break;
            }

            result.success &= run.outcomes.iter().all(|o| o.success);
            result.script_results.extend(run.outcomes);
        }

        result.duration = (start.elapsed().as_secs_f64() * 1000.0).round() as u64;
        info!(
            success = result.success,
            assertions = result.assertions.len(),
            tests = result.script_results.len(),
            duration_ms = result.duration,
            "test run finished"
        );
        result
    }
}

/// Run with the default engine.
pub fn run_tests(
    scripts: &[TestScript],
    assertions: &[TestAssertion],
    response: &ResponseDescriptor,
) -> TestResult {
    TestRunner::default().run(scripts, assertions, response)
}
