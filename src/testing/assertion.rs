//! Declarative assertion evaluation.
//!
//! Values are handled as `Option<Value>` where `None` stands for a missing
//! (undefined) value and `Some(Value::Null)` for an explicit null.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{AssertionKind, AssertionOperator, AssertionOutcome, TestAssertion};
use crate::http::response::ResponseDescriptor;

pub const INVALID_JSON_MESSAGE: &str = "Response body is not valid JSON";

static INDEXED_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)^(\w+)\[(\d+)\]$").expect("segment pattern is valid"));

/// Result of checking one assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub success: bool,
    pub message: String,
}

impl Evaluation {
    fn pass(kind: AssertionKind) -> Self {
        Self {
            success: true,
            message: format!("{} assertion passed", kind.label()),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    pub fn into_outcome(self, id: impl Into<String>) -> AssertionOutcome {
        AssertionOutcome {
            id: id.into(),
            success: self.success,
            message: self.message,
        }
    }
}

/// Check `assertion` against `response`.
pub fn evaluate(assertion: &TestAssertion, response: &ResponseDescriptor) -> Evaluation {
    let actual = match actual_value(assertion, response) {
        Ok(actual) => actual,
        Err(message) => return Evaluation::fail(message),
    };

    match compare(assertion, actual.as_ref()) {
        Ok(()) => Evaluation::pass(assertion.kind),
        Err(message) => Evaluation::fail(message),
    }
}

fn actual_value(assertion: &TestAssertion, response: &ResponseDescriptor) -> Result<Option<Value>, String> {
    let property = assertion.property.as_deref().filter(|p| !p.is_empty());

    let actual = match assertion.kind {
        AssertionKind::Status => Some(Value::from(response.status)),
        AssertionKind::Json => {
            let body: Value =
                serde_json::from_str(&response.body).map_err(|_| INVALID_JSON_MESSAGE.to_string())?;
            match property {
                Some(path) => value_at_path(&body, path).cloned(),
                None => Some(body),
            }
        }
        AssertionKind::Header => match property {
            Some(name) => response.header(name).map(|value| Value::String(value.to_string())),
            None => Some(Value::Null),
        },
        AssertionKind::ResponseTime => Some(Value::from(response.response_time())),
    };

    Ok(actual)
}

fn compare(assertion: &TestAssertion, actual: Option<&Value>) -> Result<(), String> {
    let label = assertion.kind.label();
    let expected = &assertion.expected;

    match assertion.operator {
        AssertionOperator::Equals => {
            if !loose_equals(actual, Some(expected)) {
                return Err(format!(
                    "Expected {label} to equal {}, but got {}",
                    to_js_string(expected),
                    display(actual)
                ));
            }
        }
        AssertionOperator::Contains => {
            let found = match actual {
                Some(Value::Array(items)) => items.iter().any(|item| loose_equals(Some(item), Some(expected))),
                _ => display(actual).contains(&to_js_string(expected)),
            };
            if !found {
                return Err(format!("Expected {label} to contain {}", to_js_string(expected)));
            }
        }
        AssertionOperator::Exists => {
            if is_nullish(actual) {
                return Err(format!("Expected {label} to exist"));
            }
        }
        AssertionOperator::GreaterThan | AssertionOperator::LessThan => {
            let greater = assertion.operator == AssertionOperator::GreaterThan;
            let passed = match (actual.and_then(Value::as_f64), to_number(expected)) {
                (Some(actual), Some(bound)) if greater => actual > bound,
                (Some(actual), Some(bound)) => actual < bound,
                _ => false,
            };
            if !passed {
                let relation = if greater { "greater than" } else { "less than" };
                return Err(format!(
                    "Expected {label} to be {relation} {}, but got {}",
                    to_js_string(expected),
                    display(actual)
                ));
            }
        }
    }

    Ok(())
}

/// Walk a dot-separated path; `name[index]` segments index into arrays.
pub fn value_at_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| {
        match INDEXED_SEGMENT.captures(segment) {
            Some(caps) => {
                let index: usize = caps[2].parse().ok()?;
                member(current, &caps[1])?.get(index)
            }
            None => member(current, segment),
        }
    })
}

fn member<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    }
}

fn is_nullish(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn is_compound(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

/// Type-coercing equality.
///
/// - null and undefined equal each other and nothing else
/// - same-typed values compare directly, numbers numerically
/// - a number against a string compares the string's numeric value
/// - booleans compare as 1 / 0
/// - arrays and objects against a primitive compare by string form
/// - two arrays or objects are never equal
pub fn loose_equals(actual: Option<&Value>, expected: Option<&Value>) -> bool {
    match (is_nullish(actual), is_nullish(expected)) {
        (true, true) => true,
        (true, false) | (false, true) => false,
        (false, false) => match (actual, expected) {
            (Some(a), Some(b)) => loose_equals_values(a, b),
            _ => false,
        },
    }
}

fn loose_equals_values(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Bool(x), other) => loose_equals_values(&Value::from(u8::from(*x)), other),
        (other, Value::Bool(y)) => loose_equals_values(other, &Value::from(u8::from(*y))),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            matches!((n.as_f64(), string_to_number(s)), (Some(x), Some(y)) if x == y)
        }
        (x, y) if is_compound(x) && is_compound(y) => false,
        (x, other) if is_compound(x) => loose_equals_values(&Value::String(to_js_string(x)), other),
        (other, y) if is_compound(y) => loose_equals_values(other, &Value::String(to_js_string(y))),
        _ => false,
    }
}

/// Numeric value of `value`, `None` where the conversion yields NaN.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => string_to_number(s),
        Value::Array(_) => string_to_number(&to_js_string(value)),
        Value::Object(_) => None,
    }
}

fn string_to_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    match trimmed {
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => trimmed.parse::<f64>().ok().filter(|n| n.is_finite()),
    }
}

/// String form used for messages and string comparisons.
pub fn to_js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() => format_number(f),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

fn display(value: Option<&Value>) -> String {
    value.map_or_else(|| "undefined".to_string(), to_js_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::ResponseTiming;
    use serde_json::json;
    use std::collections::HashMap;

    fn assertion(kind: AssertionKind, operator: AssertionOperator, expected: Value) -> TestAssertion {
        TestAssertion {
            id: "a1".into(),
            kind,
            operator,
            expected,
            property: None,
            enabled: true,
        }
    }

    fn with_property(mut assertion: TestAssertion, property: &str) -> TestAssertion {
        assertion.property = Some(property.to_string());
        assertion
    }

    fn response(status: u16, body: &str) -> ResponseDescriptor {
        ResponseDescriptor {
            status,
            status_text: "OK".into(),
            headers: HashMap::from([("Content-Type".to_string(), "application/json; charset=utf-8".to_string())]),
            body: body.to_string(),
            timing: Some(ResponseTiming {
                total: 120.0,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_status_equals() {
        let check = assertion(AssertionKind::Status, AssertionOperator::Equals, json!(200));
        assert_eq!(
            evaluate(&check, &response(200, "")),
            Evaluation {
                success: true,
                message: "status assertion passed".into()
            }
        );

        let failed = evaluate(&check, &response(404, ""));
        assert!(!failed.success);
        assert_eq!(failed.message, "Expected status to equal 200, but got 404");
    }

    #[test]
    fn test_status_equals_numeric_string() {
        let check = assertion(AssertionKind::Status, AssertionOperator::Equals, json!("200"));
        assert!(evaluate(&check, &response(200, "")).success);
    }

    #[test]
    fn test_json_path() {
        let check = with_property(
            assertion(AssertionKind::Json, AssertionOperator::Equals, json!(5)),
            "data.id",
        );
        assert!(evaluate(&check, &response(200, r#"{"data":{"id":5}}"#)).success);
    }

    #[test]
    fn test_json_invalid_body() {
        let check = with_property(
            assertion(AssertionKind::Json, AssertionOperator::Equals, json!(5)),
            "data.id",
        );
        let result = evaluate(&check, &response(200, "<html>"));
        assert!(!result.success);
        assert_eq!(result.message, INVALID_JSON_MESSAGE);
    }

    #[test]
    fn test_json_array_index_path() {
        let body = json!({"items": [{"id": 1}, {"id": 2, "tags": ["a", "b"]}]});
        assert_eq!(value_at_path(&body, "items[1].id"), Some(&json!(2)));
        assert_eq!(value_at_path(&body, "items[1].tags[0]"), Some(&json!("a")));
        assert_eq!(value_at_path(&body, "items.0.id"), Some(&json!(1)));
        assert_eq!(value_at_path(&body, "items[5].id"), None);
        assert_eq!(value_at_path(&body, "missing.deep"), None);
    }

    #[test]
    fn test_index_segments_are_ascii_only() {
        let body = json!({"données[0]": "literal", "données": ["indexed"], "naïve": ["x"]});
        assert_eq!(value_at_path(&body, "données[0]"), Some(&json!("literal")));
        assert_eq!(value_at_path(&body, "naïve[0]"), None);

        let digits = json!({"items": ["a"], "items[٠]": "arabic"});
        assert_eq!(value_at_path(&digits, "items[٠]"), Some(&json!("arabic")));
    }

    #[test]
    fn test_json_exists() {
        let body = r#"{"data":{"id":5,"gone":null}}"#;
        let exists = |path: &str| {
            let check = with_property(
                assertion(AssertionKind::Json, AssertionOperator::Exists, Value::Null),
                path,
            );
            evaluate(&check, &response(200, body))
        };
        assert!(exists("data.id").success);
        assert!(!exists("data.gone").success);
        let missing = exists("data.nope");
        assert!(!missing.success);
        assert_eq!(missing.message, "Expected json to exist");
    }

    #[test]
    fn test_json_contains_array_membership() {
        let check = with_property(
            assertion(AssertionKind::Json, AssertionOperator::Contains, json!("b")),
            "tags",
        );
        assert!(evaluate(&check, &response(200, r#"{"tags":["a","b"]}"#)).success);
        assert!(!evaluate(&check, &response(200, r#"{"tags":["a","bc"]}"#)).success);
    }

    #[test]
    fn test_header_contains_case_insensitive() {
        let check = with_property(
            assertion(AssertionKind::Header, AssertionOperator::Contains, json!("application/json")),
            "content-type",
        );
        assert!(evaluate(&check, &response(200, "")).success);
    }

    #[test]
    fn test_header_without_property_is_null() {
        let check = assertion(AssertionKind::Header, AssertionOperator::Exists, Value::Null);
        assert!(!evaluate(&check, &response(200, "")).success);
    }

    #[test]
    fn test_response_time_comparisons() {
        let less = assertion(AssertionKind::ResponseTime, AssertionOperator::LessThan, json!(500));
        assert!(evaluate(&less, &response(200, "")).success);

        let greater = assertion(AssertionKind::ResponseTime, AssertionOperator::GreaterThan, json!("500"));
        let result = evaluate(&greater, &response(200, ""));
        assert!(!result.success);
        assert_eq!(
            result.message,
            "Expected responseTime to be greater than 500, but got 120"
        );
    }

    #[test]
    fn test_response_time_unknown_is_zero() {
        let check = assertion(AssertionKind::ResponseTime, AssertionOperator::Equals, json!(0));
        let mut response = response(200, "");
        response.timing = None;
        assert!(evaluate(&check, &response).success);
    }

    #[test]
    fn test_greater_than_requires_number() {
        let check = with_property(
            assertion(AssertionKind::Json, AssertionOperator::GreaterThan, json!(1)),
            "count",
        );
        let result = evaluate(&check, &response(200, r#"{"count":"5"}"#));
        assert!(!result.success);
        assert_eq!(result.message, "Expected json to be greater than 1, but got 5");
    }

    #[test]
    fn test_loose_equality_rules() {
        assert!(loose_equals(None, Some(&Value::Null)));
        assert!(!loose_equals(Some(&json!(0)), Some(&Value::Null)));
        assert!(loose_equals(Some(&json!(1)), Some(&json!(1.0))));
        assert!(loose_equals(Some(&json!("  42 ")), Some(&json!(42))));
        assert!(loose_equals(Some(&json!("")), Some(&json!(0))));
        assert!(!loose_equals(Some(&json!("abc")), Some(&json!(0))));
        assert!(loose_equals(Some(&json!(true)), Some(&json!(1))));
        assert!(loose_equals(Some(&json!(false)), Some(&json!("0"))));
        assert!(!loose_equals(Some(&json!(true)), Some(&json!("true"))));
        assert!(loose_equals(Some(&json!([1, 2])), Some(&json!("1,2"))));
        assert!(loose_equals(Some(&json!([7])), Some(&json!(7))));
        assert!(!loose_equals(Some(&json!([1])), Some(&json!([1]))));
        assert!(loose_equals(Some(&json!({"a": 1})), Some(&json!("[object Object]"))));
    }

    #[test]
    fn test_js_string_forms() {
        assert_eq!(to_js_string(&json!(1.5)), "1.5");
        assert_eq!(to_js_string(&json!(120.0)), "120");
        assert_eq!(to_js_string(&json!([1, null, "x"])), "1,,x");
        assert_eq!(display(None), "undefined");
    }
}
