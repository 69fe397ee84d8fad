//! Assertion predicates behind `pm.expect`.
//!
//! Values are compared as JSON. `None` stands for JavaScript `undefined`.
//! The same predicates are reachable from Rust through the fluent
//! [`Expectation`] builder and from scripts through [`evaluate`].
//!
//! # Example
//!
//! ```
//! use rest_runner::scripting::assertions::Expectation;
//! use serde_json::json;
//!
//! Expectation::new(json!(200)).to().equal(json!(200)).unwrap();
//! Expectation::new(json!("hello")).to().not().include(json!("xyz")).unwrap();
//! assert!(Expectation::new(json!(3)).to().be().above(5.0).is_err());
//! ```

use serde_json::Value;
use std::fmt;

/// A failed assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionError {
    pub message: String,
}

impl AssertionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssertionError: {}", self.message)
    }
}

impl std::error::Error for AssertionError {}

/// Outcome of a predicate, with the message to report for either polarity.
struct Verdict {
    passed: bool,
    message: String,
    negated_message: String,
}

impl Verdict {
    fn new(passed: bool, actual: &str, verb: &str, expected: Option<&str>) -> Self {
        let tail = expected.map(|e| format!(" {}", e)).unwrap_or_default();
        Self {
            passed,
            message: format!("expected {} to {}{}", actual, verb, tail),
            negated_message: format!("expected {} to not {}{}", actual, verb, tail),
        }
    }

    fn with_message(mut self, message: String) -> Self {
        self.message = message;
        self
    }

    fn positive(self) -> Result<(), AssertionError> {
        if self.passed {
            Ok(())
        } else {
            Err(AssertionError::new(self.message))
        }
    }

    fn negative(self) -> Result<(), AssertionError> {
        if self.passed {
            Err(AssertionError::new(self.negated_message))
        } else {
            Ok(())
        }
    }
}

/// Renders a value the way assertion messages show it.
pub fn render(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::String(s)) => format!("'{}'", s),
        Some(other) => other.to_string(),
    }
}

/// JavaScript truthiness of a JSON value.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn type_name(value: Option<&Value>) -> &'static str {
    match value {
        None => "undefined",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

/// Numeric equality treats `1` and `1.0` as the same value.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).map(|o| values_equal(v, o)).unwrap_or(false))
        }
        _ => a == b,
    }
}

fn number(value: Option<&Value>, what: &str) -> Result<f64, AssertionError> {
    value
        .and_then(Value::as_f64)
        .ok_or_else(|| AssertionError::new(format!("{} is not a number", what)))
}

fn check_equal(actual: Option<&Value>, expected: Option<&Value>) -> Verdict {
    let passed = match (actual, expected) {
        (None, None) => true,
        (Some(a), Some(e)) => values_equal(a, e),
        _ => false,
    };
    Verdict::new(passed, &render(actual), "equal", Some(&render(expected)))
}

fn check_type(actual: Option<&Value>, expected_type: &str) -> Verdict {
    let name = type_name(actual);
    let wanted = expected_type.to_ascii_lowercase();
    let passed = name == wanted || (wanted == "object" && name == "array");
    let article = if wanted.starts_with(['a', 'e', 'i', 'o', 'u']) {
        "an"
    } else {
        "a"
    };
    Verdict::new(
        passed,
        &render(actual),
        &format!("be {} {}", article, wanted),
        None,
    )
}

fn check_empty(actual: Option<&Value>) -> Result<Verdict, AssertionError> {
    let passed = match actual {
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        other => {
            return Err(AssertionError::new(format!(
                ".empty was passed non-string primitive {}",
                render(other)
            )))
        }
    };
    Ok(Verdict::new(passed, &render(actual), "be empty", None))
}

fn check_include(actual: Option<&Value>, needle: Option<&Value>) -> Result<Verdict, AssertionError> {
    let passed = match (actual, needle) {
        (Some(Value::String(haystack)), Some(Value::String(n))) => haystack.contains(n.as_str()),
        (Some(Value::String(haystack)), Some(other)) => {
            haystack.contains(other.to_string().as_str())
        }
        (Some(Value::Array(items)), Some(n)) => items.iter().any(|item| values_equal(item, n)),
        (Some(Value::Object(map)), Some(Value::Object(subset))) => subset
            .iter()
            .all(|(k, v)| map.get(k).map(|o| values_equal(o, v)).unwrap_or(false)),
        (Some(Value::Object(map)), Some(Value::String(key))) => map.contains_key(key),
        _ => {
            return Err(AssertionError::new(format!(
                "the given combination of arguments ({} and {}) is invalid for this assertion",
                type_name(actual),
                type_name(needle)
            )))
        }
    };
    Ok(Verdict::new(
        passed,
        &render(actual),
        "include",
        Some(&render(needle)),
    ))
}

fn check_compare(
    actual: Option<&Value>,
    bound: Option<&Value>,
    verb: &str,
    cmp: fn(f64, f64) -> bool,
) -> Result<Verdict, AssertionError> {
    let a = number(actual, &render(actual))?;
    let b = number(bound, "the argument")?;
    Ok(Verdict::new(
        cmp(a, b),
        &render(actual),
        verb,
        Some(&render(bound)),
    ))
}

fn check_length(actual: Option<&Value>, expected: Option<&Value>) -> Result<Verdict, AssertionError> {
    let len = match actual {
        Some(Value::String(s)) => s.chars().count(),
        Some(Value::Array(a)) => a.len(),
        other => {
            return Err(AssertionError::new(format!(
                "expected {} to have property 'length'",
                render(other)
            )))
        }
    };
    let wanted = number(expected, "the length argument")?;
    let passed = (len as f64) == wanted;
    Ok(Verdict::new(
        passed,
        &render(actual),
        "have a length of",
        Some(&render(expected)),
    )
    .with_message(format!(
        "expected {} to have a length of {} but got {}",
        render(actual),
        render(expected),
        len
    )))
}

/// `expected` is `None` when only a name was given and `Some(None)` when the
/// value argument was `undefined`.
fn check_property(
    actual: Option<&Value>,
    name: Option<&Value>,
    expected: Option<Option<&Value>>,
) -> Result<Verdict, AssertionError> {
    let key = match name {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        other => {
            return Err(AssertionError::new(format!(
                "the property name must be a string, got {}",
                render(other)
            )))
        }
    };
    let found = match actual {
        Some(Value::Object(map)) => map.get(&key),
        Some(Value::Array(items)) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    };
    let verdict = match expected {
        None => Verdict::new(
            found.is_some(),
            &render(actual),
            "have property",
            Some(&format!("'{}'", key)),
        ),
        Some(value) => {
            let passed = match (found, value) {
                (Some(f), Some(v)) => values_equal(f, v),
                _ => false,
            };
            Verdict::new(
                passed,
                &render(actual),
                "have property",
                Some(&format!("'{}' of {}", key, render(value))),
            )
            .with_message(match found {
                Some(f) => format!(
                    "expected {} to have property '{}' of {}, but got {}",
                    render(actual),
                    key,
                    render(value),
                    render(Some(f))
                ),
                None => format!("expected {} to have property '{}'", render(actual), key),
            })
        }
    };
    Ok(verdict)
}

fn check_status(actual: Option<&Value>, expected: Option<&Value>) -> Result<Verdict, AssertionError> {
    let code = match actual {
        Some(Value::Object(map)) => map.get("code").and_then(Value::as_f64),
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    }
    .ok_or_else(|| {
        AssertionError::new(format!(
            "expected {} to be a response with a status code",
            render(actual)
        ))
    })?;
    let wanted = number(expected, "the status argument")?;
    Ok(Verdict::new(
        code == wanted,
        "response",
        "have status code",
        Some(&render(expected)),
    )
    .with_message(format!(
        "expected response to have status code {} but got {}",
        render(expected),
        code
    )))
}

fn check_one_of(actual: Option<&Value>, options: &[Option<Value>]) -> Verdict {
    let passed = options.iter().any(|option| match (actual, option) {
        (None, None) => true,
        (Some(a), Some(o)) => values_equal(a, o),
        _ => false,
    });
    let list: Vec<String> = options.iter().map(|o| render(o.as_ref())).collect();
    Verdict::new(
        passed,
        &render(actual),
        "be one of",
        Some(&format!("[{}]", list.join(", "))),
    )
}

/// Evaluates one predicate by name.
///
/// This is the entry point used by the script bridge: `op` is the method name
/// called on `pm.expect(...)`, `args` its arguments. A `None` argument is an
/// explicit `undefined`, which is distinct from `null`.
///
/// # Returns
///
/// `Ok(())` when the assertion holds, or the failure message.
pub fn evaluate(
    op: &str,
    actual: Option<&Value>,
    args: &[Option<Value>],
    negated: bool,
) -> Result<(), AssertionError> {
    let arg = |i: usize| args.get(i).and_then(Option::as_ref);
    let verdict = match op {
        "equal" | "eql" | "equals" => check_equal(actual, arg(0)),
        "ok" => Verdict::new(truthy(actual), &render(actual), "be truthy", None),
        "true" => Verdict::new(
            actual == Some(&Value::Bool(true)),
            &render(actual),
            "be true",
            None,
        ),
        "false" => Verdict::new(
            actual == Some(&Value::Bool(false)),
            &render(actual),
            "be false",
            None,
        ),
        "null" => Verdict::new(
            actual == Some(&Value::Null),
            &render(actual),
            "be null",
            None,
        ),
        "undefined" => Verdict::new(actual.is_none(), &render(actual), "be undefined", None),
        "empty" => check_empty(actual)?,
        "include" | "contain" | "includes" | "contains" => check_include(actual, arg(0))?,
        "above" | "gt" => check_compare(actual, arg(0), "be above", |a, b| a > b)?,
        "below" | "lt" => check_compare(actual, arg(0), "be below", |a, b| a < b)?,
        "atLeast" | "at_least" | "gte" => {
            check_compare(actual, arg(0), "be at least", |a, b| a >= b)?
        }
        "atMost" | "at_most" | "lte" => check_compare(actual, arg(0), "be at most", |a, b| a <= b)?,
        "length" | "lengthOf" => check_length(actual, arg(0))?,
        "property" => check_property(
            actual,
            arg(0),
            args.get(1).map(Option::as_ref),
        )?,
        "status" => check_status(actual, arg(0))?,
        "oneOf" => check_one_of(actual, args),
        "a" | "an" => {
            let wanted = arg(0).and_then(Value::as_str).ok_or_else(|| {
                AssertionError::new("the type argument must be a string".to_string())
            })?;
            check_type(actual, wanted)
        }
        other => {
            return Err(AssertionError::new(format!(
                "unknown assertion '{}'",
                other
            )))
        }
    };

    if negated {
        match op {
            "equal" | "eql" | "equals" | "ok" | "null" | "empty" | "include" | "contain"
            | "includes" | "contains" => verdict.negative(),
            other => Err(AssertionError::new(format!(
                "'.not' is not supported with '{}'",
                other
            ))),
        }
    } else {
        verdict.positive()
    }
}

fn defined(args: &[Value]) -> Vec<Option<Value>> {
    args.iter().cloned().map(Some).collect()
}

/// Fluent assertion builder.
///
/// Chain words (`to`, `be`, `have`, `a`, `an`) return the same expectation;
/// predicates return `Err(AssertionError)` on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    actual: Option<Value>,
}

impl Expectation {
    pub fn new(actual: impl Into<Value>) -> Self {
        Self {
            actual: Some(actual.into()),
        }
    }

    /// An expectation about JavaScript `undefined`.
    pub fn of_undefined() -> Self {
        Self { actual: None }
    }

    pub fn to(self) -> Self {
        self
    }

    pub fn be(self) -> Self {
        self
    }

    pub fn have(self) -> Self {
        self
    }

    pub fn a(self) -> Self {
        self
    }

    pub fn an(self) -> Self {
        self
    }

    pub fn not(self) -> NegatedExpectation {
        NegatedExpectation {
            actual: self.actual,
        }
    }

    fn run(&self, op: &str, args: &[Value]) -> Result<(), AssertionError> {
        evaluate(op, self.actual.as_ref(), &defined(args), false)
    }

    pub fn equal(&self, expected: impl Into<Value>) -> Result<(), AssertionError> {
        self.run("equal", &[expected.into()])
    }

    pub fn eql(&self, expected: impl Into<Value>) -> Result<(), AssertionError> {
        self.run("eql", &[expected.into()])
    }

    pub fn ok(&self) -> Result<(), AssertionError> {
        self.run("ok", &[])
    }

    pub fn is_true(&self) -> Result<(), AssertionError> {
        self.run("true", &[])
    }

    pub fn is_false(&self) -> Result<(), AssertionError> {
        self.run("false", &[])
    }

    pub fn null(&self) -> Result<(), AssertionError> {
        self.run("null", &[])
    }

    pub fn undefined(&self) -> Result<(), AssertionError> {
        self.run("undefined", &[])
    }

    pub fn empty(&self) -> Result<(), AssertionError> {
        self.run("empty", &[])
    }

    pub fn include(&self, needle: impl Into<Value>) -> Result<(), AssertionError> {
        self.run("include", &[needle.into()])
    }

    pub fn contain(&self, needle: impl Into<Value>) -> Result<(), AssertionError> {
        self.include(needle)
    }

    pub fn above(&self, bound: f64) -> Result<(), AssertionError> {
        self.run("above", &[Value::from(bound)])
    }

    pub fn below(&self, bound: f64) -> Result<(), AssertionError> {
        self.run("below", &[Value::from(bound)])
    }

    pub fn at_least(&self, bound: f64) -> Result<(), AssertionError> {
        self.run("atLeast", &[Value::from(bound)])
    }

    pub fn at_most(&self, bound: f64) -> Result<(), AssertionError> {
        self.run("atMost", &[Value::from(bound)])
    }

    pub fn length(&self, expected: usize) -> Result<(), AssertionError> {
        self.run("length", &[Value::from(expected)])
    }

    pub fn length_of(&self, expected: usize) -> Result<(), AssertionError> {
        self.length(expected)
    }

    /// Asserts that the object has `name`, and if `value` is given, that the
    /// property equals it.
    pub fn property(&self, name: &str, value: Option<Value>) -> Result<(), AssertionError> {
        let mut args = vec![Value::from(name)];
        args.extend(value);
        self.run("property", &args)
    }

    /// Asserts the status code of a response projection (or a bare number).
    pub fn status(&self, code: u16) -> Result<(), AssertionError> {
        self.run("status", &[Value::from(code)])
    }

    pub fn one_of(&self, options: &[Value]) -> Result<(), AssertionError> {
        self.run("oneOf", options)
    }

    /// Asserts the JavaScript-style type name (`string`, `number`, `array`, ...).
    pub fn type_of(&self, name: &str) -> Result<(), AssertionError> {
        self.run("a", &[Value::from(name)])
    }
}

/// Negated counterpart of [`Expectation`], reached through `.not()`.
#[derive(Debug, Clone, PartialEq)]
pub struct NegatedExpectation {
    actual: Option<Value>,
}

impl NegatedExpectation {
    pub fn to(self) -> Self {
        self
    }

    pub fn be(self) -> Self {
        self
    }

    pub fn have(self) -> Self {
        self
    }

    fn run(&self, op: &str, args: &[Value]) -> Result<(), AssertionError> {
        evaluate(op, self.actual.as_ref(), &defined(args), true)
    }

    pub fn equal(&self, expected: impl Into<Value>) -> Result<(), AssertionError> {
        self.run("equal", &[expected.into()])
    }

    pub fn eql(&self, expected: impl Into<Value>) -> Result<(), AssertionError> {
        self.run("eql", &[expected.into()])
    }

    pub fn ok(&self) -> Result<(), AssertionError> {
        self.run("ok", &[])
    }

    pub fn null(&self) -> Result<(), AssertionError> {
        self.run("null", &[])
    }

    pub fn empty(&self) -> Result<(), AssertionError> {
        self.run("empty", &[])
    }

    pub fn include(&self, needle: impl Into<Value>) -> Result<(), AssertionError> {
        self.run("include", &[needle.into()])
    }

    pub fn contain(&self, needle: impl Into<Value>) -> Result<(), AssertionError> {
        self.include(needle)
    }
}
