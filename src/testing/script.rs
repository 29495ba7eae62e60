//! Sandboxed execution of user test scripts.
//!
//! Scripts are Rhai code. Each one runs in a fresh engine that can see only
//! `response`, `test`, `expect` and the Postman-style `pm` object:
//!
//! ```rhai
//! test("status is 200", || expect(response.code).to.equal(200));
//! pm.test("has id", || pm.expect(pm.response.json().data.id).to.exist());
//! ```
//!
//! Module imports resolve to nothing, `eval` is disabled and `print`/`debug`
//! go to the log.

use std::cell::RefCell;
use std::rc::Rc;

use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, ImmutableString, Map, NativeCallContext, Scope};
use serde_json::Value;
use tracing::{debug, info};

use super::assertion::{INVALID_JSON_MESSAGE, to_js_string, to_number};
use super::{ScriptOutcome, TestScript};
use crate::http::response::ResponseDescriptor;

type ScriptError = Box<EvalAltResult>;

/// Runs one script against one response.
pub trait ScriptEngine {
    fn execute(&self, script: &TestScript, response: &ResponseDescriptor) -> ScriptRun;
}

/// What a single script produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptRun {
    /// Outcomes of the `test()` calls that completed, in call order.
    pub outcomes: Vec<ScriptOutcome>,
    /// Error raised outside any `test()` call.
    pub fatal: Option<String>,
}

/// The default engine, backed by Rhai.
#[derive(Debug, Clone, Default)]
pub struct RhaiScriptEngine {
    max_operations: u64,
}

impl RhaiScriptEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort scripts after `limit` operations; 0 means unlimited.
    pub fn with_max_operations(mut self, limit: u64) -> Self {
        self.max_operations = limit;
        self
    }

    fn build_engine(&self, response: ScriptResponse, results: &Rc<RefCell<Vec<ScriptOutcome>>>) -> Engine {
        let mut engine = Engine::new();
        engine.set_module_resolver(DummyModuleResolver::new());
        engine.disable_symbol("eval");
        if self.max_operations > 0 {
            engine.set_max_operations(self.max_operations);
        }
        engine.on_print(|text| info!(target: "litepost::script", "{text}"));
        engine.on_debug(|text, _source, pos| debug!(target: "litepost::script", position = %pos, "{text}"));

        // Every read of `response`/`pm` yields a fresh copy, so a callback can
        // use `pm` while `pm.test(...)` is still running.
        let pm = Pm {
            response: response.clone(),
        };
        engine.on_var(move |name, _index, _context| {
            Ok(match name {
                "response" => Some(Dynamic::from(response.clone())),
                "pm" => Some(Dynamic::from(pm.clone())),
                _ => None,
            })
        });

        engine
            .register_type_with_name::<ScriptResponse>("Response")
            .register_get("code", |r: &mut ScriptResponse| r.status)
            .register_get("status", |r: &mut ScriptResponse| r.status)
            .register_get("statusText", |r: &mut ScriptResponse| r.status_text.clone())
            .register_get("body", |r: &mut ScriptResponse| r.body.clone())
            .register_get("headers", |r: &mut ScriptResponse| r.headers.clone())
            .register_get("responseTime", |r: &mut ScriptResponse| r.response_time)
            .register_fn("toJson", ScriptResponse::to_json)
            .register_fn("json", ScriptResponse::to_json);

        engine
            .register_type_with_name::<Expectation>("Expectation")
            .register_get("to", |e: &mut Expectation| e.clone())
            .register_get("be", |e: &mut Expectation| e.clone())
            .register_fn("equal", Expectation::equal)
            .register_fn("contain", Expectation::contain)
            .register_fn("exist", Expectation::exist)
            .register_fn("greaterThan", Expectation::greater_than)
            .register_fn("lessThan", Expectation::less_than);
        engine.register_fn("expect", Expectation::new);

        engine
            .register_type_with_name::<Pm>("Pm")
            .register_get("response", |pm: &mut Pm| pm.response.clone())
            .register_fn("expect", |_pm: &mut Pm, actual: Dynamic| Expectation::new(actual));

        let collector = Rc::clone(results);
        engine.register_fn(
            "test",
            move |context: NativeCallContext, name: ImmutableString, callback: FnPtr| {
                let outcome = run_test(&context, &name, &callback);
                collector.borrow_mut().push(outcome);
            },
        );
        let collector = Rc::clone(results);
        engine.register_fn(
            "test",
            move |context: NativeCallContext, _pm: &mut Pm, name: ImmutableString, callback: FnPtr| {
                let outcome = run_test(&context, &name, &callback);
                collector.borrow_mut().push(outcome);
            },
        );

        engine
    }
}

impl ScriptEngine for RhaiScriptEngine {
    fn execute(&self, script: &TestScript, response: &ResponseDescriptor) -> ScriptRun {
        let results = Rc::new(RefCell::new(Vec::new()));
        let script_response = ScriptResponse::from_response(response);
        let engine = self.build_engine(script_response.clone(), &results);

        // Closures capture these by name; reads go through the resolver.
        let mut scope = Scope::new();
        scope.push("response", script_response.clone());
        scope.push("pm", Pm {
            response: script_response,
        });

        let fatal = engine
            .run_with_scope(&mut scope, &script.code)
            .err()
            .map(|err| error_message(&err));

        drop(engine);
        let outcomes = results.take();
        ScriptRun { outcomes, fatal }
    }
}

/// Call a `test()` callback, turning anything it raises into a failed outcome.
fn run_test(context: &NativeCallContext, name: &str, callback: &FnPtr) -> ScriptOutcome {
    match callback.call_within_context::<Dynamic>(context, ()) {
        Ok(_) => ScriptOutcome::passed(name),
        Err(err) => ScriptOutcome::failed(name, error_message(&err)),
    }
}

/// The user-facing text of a script error, without call-site wrapping.
fn error_message(err: &EvalAltResult) -> String {
    match err {
        EvalAltResult::ErrorRuntime(value, _) => value.to_string(),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => error_message(inner),
        other => other.to_string(),
    }
}

/// Read-only view of the response handed to scripts.
#[derive(Debug, Clone)]
struct ScriptResponse {
    status: i64,
    status_text: ImmutableString,
    body: Dynamic,
    json: Option<Dynamic>,
    headers: Map,
    response_time: i64,
}

impl ScriptResponse {
    fn from_response(response: &ResponseDescriptor) -> Self {
        let json = serde_json::from_str::<Value>(&response.body)
            .ok()
            .and_then(|value| rhai::serde::to_dynamic(&value).ok());
        let body = json
            .clone()
            .unwrap_or_else(|| Dynamic::from(response.body.clone()));

        let mut headers = Map::new();
        for (key, value) in &response.headers {
            headers.insert(key.as_str().into(), Dynamic::from(value.clone()));
        }

        Self {
            status: i64::from(response.status),
            status_text: response.status_text.as_str().into(),
            body,
            json,
            headers,
            response_time: response.response_time().round() as i64,
        }
    }

    fn to_json(&mut self) -> Result<Dynamic, ScriptError> {
        self.json.clone().ok_or_else(|| INVALID_JSON_MESSAGE.into())
    }
}

#[derive(Debug, Clone)]
struct Pm {
    response: ScriptResponse,
}

/// Returned by `expect(value)`; `.to` and `.be` are readability chains.
#[derive(Debug, Clone)]
struct Expectation {
    actual: Dynamic,
}

impl Expectation {
    fn new(actual: Dynamic) -> Self {
        Self { actual }
    }

    fn equal(&mut self, expected: Dynamic) -> Result<(), ScriptError> {
        if strict_equals(&to_json(&self.actual), &to_json(&expected)) {
            Ok(())
        } else {
            Err(format!("Expected {} to equal {}", describe(&self.actual), describe(&expected)).into())
        }
    }

    fn contain(&mut self, expected: Dynamic) -> Result<(), ScriptError> {
        let needle = to_json(&expected);
        let found = match to_json(&self.actual) {
            Value::String(haystack) => haystack.contains(&to_js_string(&needle)),
            Value::Array(items) => items.iter().any(|item| strict_equals(item, &needle)),
            _ => false,
        };
        if found {
            Ok(())
        } else {
            Err(format!("Expected {} to contain {}", describe(&self.actual), describe(&expected)).into())
        }
    }

    fn exist(&mut self) -> Result<(), ScriptError> {
        if self.actual.is_unit() {
            Err("Expected value to exist".into())
        } else {
            Ok(())
        }
    }

    fn greater_than(&mut self, expected: Dynamic) -> Result<(), ScriptError> {
        match (as_number(&self.actual), to_number(&to_json(&expected))) {
            (Some(actual), Some(bound)) if actual > bound => Ok(()),
            _ => Err(format!(
                "Expected {} to be greater than {}",
                describe(&self.actual),
                describe(&expected)
            )
            .into()),
        }
    }

    fn less_than(&mut self, expected: Dynamic) -> Result<(), ScriptError> {
        match (as_number(&self.actual), to_number(&to_json(&expected))) {
            (Some(actual), Some(bound)) if actual < bound => Ok(()),
            _ => Err(format!(
                "Expected {} to be less than {}",
                describe(&self.actual),
                describe(&expected)
            )
            .into()),
        }
    }
}

fn as_number(value: &Dynamic) -> Option<f64> {
    match value.as_int() {
        Ok(int) => Some(int as f64),
        Err(_) => value.as_float().ok(),
    }
}

fn to_json(value: &Dynamic) -> Value {
    rhai::serde::from_dynamic::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn describe(value: &Dynamic) -> String {
    if value.is_unit() {
        "undefined".to_string()
    } else {
        to_js_string(&to_json(value))
    }
}

/// Deep equality with numbers compared by value (`1 == 1.0`).
fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| strict_equals(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(key, a)| y.get(key).is_some_and(|b| strict_equals(a, b)))
        }
        _ => a == b,
    }
}
