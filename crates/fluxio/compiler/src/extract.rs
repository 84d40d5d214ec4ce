//! Value extractors: literal syntax nodes to JSON values
//!
//! Extractors never evaluate anything. Each accepts exactly the literal
//! shapes of its kind and fails with the offending node's position
//! otherwise, which keeps source statically analyzable.

use fluxio_syntax::{Expr, ExprKind, UnaryOp};
use fluxio_types::{ensure, CompileResult, UnsupportedOperation};
use serde_json::{Map, Number, Value};

/// Name of the state data parameter every machine function takes
pub const DATA_ROOT: &str = "data";

/// Allowed values of the `subscribe` decorator's `status` option
pub const SUBSCRIBE_STATUSES: &[&str] = &["success", "failure"];

/// Keys a retrier object may carry
pub const RETRIER_KEYS: &[&str] = &[
    "ErrorEquals",
    "IntervalSeconds",
    "MaxAttempts",
    "BackoffRate",
    "MaxDelaySeconds",
    "JitterStrategy",
];

/// A string literal
pub fn string(expr: &Expr) -> CompileResult<Value> {
    match &expr.kind {
        ExprKind::Str(text) => Ok(Value::String(text.clone())),
        other => Err(expected("a string literal", other.label(), expr)),
    }
}

/// `True` or `False`
pub fn boolean(expr: &Expr) -> CompileResult<Value> {
    match &expr.kind {
        ExprKind::Bool(value) => Ok(Value::Bool(*value)),
        other => Err(expected("True or False", other.label(), expr)),
    }
}

/// A non-negative integer literal
pub fn integer(expr: &Expr) -> CompileResult<Value> {
    match &expr.kind {
        ExprKind::Int(value) => {
            ensure(*value >= 0, "Expected a non-negative integer", expr.pos)?;
            Ok(Value::Number(Number::from(*value)))
        }
        other => Err(expected("an integer literal", other.label(), expr)),
    }
}

/// A positive integer literal, for durations that cannot be zero
pub fn positive_integer(expr: &Expr) -> CompileResult<Value> {
    match &expr.kind {
        ExprKind::Int(value) => {
            ensure(*value > 0, "Expected a positive integer", expr.pos)?;
            Ok(Value::Number(Number::from(*value)))
        }
        other => Err(expected("an integer literal", other.label(), expr)),
    }
}

/// A dict literal holding only JSON values
pub fn dict(expr: &Expr) -> CompileResult<Value> {
    match &expr.kind {
        ExprKind::Dict(_) => json(expr),
        other => Err(expected("a dict literal", other.label(), expr)),
    }
}

/// Any literal that survives a strict JSON round trip
///
/// Tuples, sets, non-string keys and non-finite floats are rejected since
/// they would come back as something else.
pub fn json(expr: &Expr) -> CompileResult<Value> {
    match &expr.kind {
        ExprKind::Str(text) => Ok(Value::String(text.clone())),
        ExprKind::Int(value) => Ok(Value::Number(Number::from(*value))),
        ExprKind::Float(value) => float(*value, expr),
        ExprKind::Bool(value) => Ok(Value::Bool(*value)),
        ExprKind::NoneLit => Ok(Value::Null),
        ExprKind::List(items) => items
            .iter()
            .map(json)
            .collect::<CompileResult<Vec<_>>>()
            .map(Value::Array),
        ExprKind::Dict(entries) => {
            let mut object = Map::new();
            for (key, value) in entries {
                let key = match &key.kind {
                    ExprKind::Str(text) => text.clone(),
                    _ => return Err(not_serializable(key)),
                };
                object.insert(key, json(value)?);
            }
            Ok(Value::Object(object))
        }
        ExprKind::UnaryOp {
            op: op @ (UnaryOp::Neg | UnaryOp::Pos),
            operand,
        } => {
            let negate = *op == UnaryOp::Neg;
            match operand.kind {
                ExprKind::Int(value) if negate => Ok(Value::Number(Number::from(-value))),
                ExprKind::Int(value) => Ok(Value::Number(Number::from(value))),
                ExprKind::Float(value) if negate => float(-value, expr),
                ExprKind::Float(value) => float(value, expr),
                _ => Err(not_serializable(expr)),
            }
        }
        _ => Err(not_serializable(expr)),
    }
}

/// `subscribe(status=...)`: a string from [`SUBSCRIBE_STATUSES`]
pub fn subscribe_status(expr: &Expr) -> CompileResult<Value> {
    let value = string(expr)?;
    let status = value.as_str().unwrap_or_default();
    ensure(
        SUBSCRIBE_STATUSES.contains(&status),
        format!(
            "Status must be one of {}. Provided: {}",
            SUBSCRIBE_STATUSES.join("|"),
            status
        ),
        expr.pos,
    )?;
    Ok(value)
}

/// `schedule(expression=...)`: `cron(...)` or `rate(...)`
pub fn schedule_expression(expr: &Expr) -> CompileResult<Value> {
    let value = string(expr)?;
    let text = value.as_str().unwrap_or_default();
    let valid = (text.starts_with("cron(") || text.starts_with("rate(")) && text.ends_with(')');
    ensure(
        valid,
        format!(
            "Schedule expression must be cron(...) or rate(...). Provided: {}",
            text
        ),
        expr.pos,
    )?;
    Ok(value)
}

/// A reference into the state data as a JSONPath string
pub fn data_path_value(expr: &Expr) -> CompileResult<Value> {
    data_path(expr).map(Value::String)
}

/// Retry policy: one retrier dict or a list of them, normalized to a list
pub fn retry_policy(expr: &Expr) -> CompileResult<Value> {
    let value = json(expr)?;
    let retriers = match value {
        Value::Object(_) => vec![value],
        Value::Array(items) => items,
        _ => {
            return Err(UnsupportedOperation::new(
                "Retry must be a dict or a list of dicts",
                expr.pos,
            ))
        }
    };

    for retrier in &retriers {
        let object = retrier.as_object().ok_or_else(|| {
            UnsupportedOperation::new("Retry must be a dict or a list of dicts", expr.pos)
        })?;
        for key in object.keys() {
            ensure(
                RETRIER_KEYS.contains(&key.as_str()),
                format!(
                    "Unknown retry key '{}'. Valid keys: {}",
                    key,
                    RETRIER_KEYS.join(", ")
                ),
                expr.pos,
            )?;
        }
        let errors_valid = object
            .get("ErrorEquals")
            .and_then(Value::as_array)
            .is_some_and(|errors| !errors.is_empty() && errors.iter().all(Value::is_string));
        ensure(
            errors_valid,
            "Each retrier needs ErrorEquals: a non-empty list of error names",
            expr.pos,
        )?;
    }

    Ok(Value::Array(retriers))
}

/// Convert a `data[...]` reference into a JSONPath
///
/// `data` is `$`, `data["a"][0]` is `$['a'][0]`.
pub fn data_path(expr: &Expr) -> CompileResult<String> {
    match &expr.kind {
        ExprKind::Name(name) if name == DATA_ROOT => Ok("$".into()),
        ExprKind::Subscript { value, index } => {
            let mut path = data_path(value)?;
            match &index.kind {
                ExprKind::Str(key) => {
                    ensure(
                        !key.contains('\'') && !key.contains('\\'),
                        format!("Data key {:?} may not contain quotes or backslashes", key),
                        index.pos,
                    )?;
                    path.push_str(&format!("['{}']", key));
                }
                ExprKind::Int(position) if *position >= 0 => {
                    path.push_str(&format!("[{}]", position));
                }
                other => {
                    return Err(expected(
                        "a string key or non-negative index",
                        other.label(),
                        index,
                    ))
                }
            }
            Ok(path)
        }
        other => Err(UnsupportedOperation::new(
            format!(
                "Expected a reference to {root}, e.g. {root}[\"key\"], got {}",
                other.label(),
                root = DATA_ROOT
            ),
            expr.pos,
        )),
    }
}

/// `Name` or dotted `Name.attr` as a single string
pub fn dotted_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Name(name) => Some(name.clone()),
        ExprKind::Attribute { value, attr } => {
            dotted_name(value).map(|prefix| format!("{}.{}", prefix, attr))
        }
        _ => None,
    }
}

fn float(value: f64, expr: &Expr) -> CompileResult<Value> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| not_serializable(expr))
}

fn expected(what: &str, found: &str, expr: &Expr) -> UnsupportedOperation {
    UnsupportedOperation::new(format!("Expected {}, got {}", what, found), expr.pos)
}

fn not_serializable(expr: &Expr) -> UnsupportedOperation {
    UnsupportedOperation::new(
        format!(
            "Only JSON-serializable literals can be used to update the data object, got {}",
            expr.kind.label()
        ),
        expr.pos,
    )
}
