//! Choice rules from `if` conditions
//!
//! A condition compares a data reference with a literal. The literal's type
//! picks the comparison family (`String*`, `Numeric*`, `BooleanEquals`,
//! `IsNull`); boolean operators nest as `And`, `Or` and `Not`.

use crate::extract::{self, DATA_ROOT};
use fluxio_syntax::{BoolOp, CmpOp, Expr, ExprKind, UnaryOp};
use fluxio_types::{CompileResult, UnsupportedOperation};
use serde_json::{json, Value};

/// Translate a condition into a Choice rule (without `Next`)
pub fn choice_rule(test: &Expr) -> CompileResult<Value> {
    match &test.kind {
        ExprKind::BoolOp { op, values } => {
            let rules = values
                .iter()
                .map(choice_rule)
                .collect::<CompileResult<Vec<_>>>()?;
            Ok(match op {
                BoolOp::And => json!({ "And": rules }),
                BoolOp::Or => json!({ "Or": rules }),
            })
        }
        ExprKind::UnaryOp {
            op: UnaryOp::Not,
            operand,
        } => Ok(json!({ "Not": choice_rule(operand)? })),
        ExprKind::Compare {
            left,
            ops,
            comparators,
        } => {
            let mut rules = Vec::with_capacity(ops.len());
            let mut lhs = left.as_ref();
            for (op, rhs) in ops.iter().zip(comparators) {
                rules.push(comparison(lhs, *op, rhs, test)?);
                lhs = rhs;
            }
            if rules.len() == 1 {
                Ok(rules.remove(0))
            } else {
                Ok(json!({ "And": rules }))
            }
        }
        ExprKind::Name(_) | ExprKind::Subscript { .. } => Ok(json!({
            "Variable": extract::data_path(test)?,
            "BooleanEquals": true,
        })),
        other => Err(UnsupportedOperation::new(
            format!("Unsupported condition: {}", other.label()),
            test.pos,
        )),
    }
}

/// One `lhs op rhs` link of a comparison chain
fn comparison(lhs: &Expr, op: CmpOp, rhs: &Expr, test: &Expr) -> CompileResult<Value> {
    let (path, op, literal) = if is_data_reference(lhs) {
        (extract::data_path(lhs)?, op, rhs)
    } else if is_data_reference(rhs) {
        if matches!(op, CmpOp::In | CmpOp::NotIn) {
            return Err(UnsupportedOperation::new(
                "Membership tests need the data reference on the left",
                test.pos,
            ));
        }
        (extract::data_path(rhs)?, op.flipped(), lhs)
    } else {
        return Err(UnsupportedOperation::new(
            format!(
                "Comparisons must involve a reference to {}, e.g. {}[\"key\"]",
                DATA_ROOT, DATA_ROOT
            ),
            test.pos,
        ));
    };

    match op {
        CmpOp::NotEq => Ok(json!({ "Not": equality(&path, CmpOp::Eq, literal)? })),
        CmpOp::IsNot => Ok(json!({ "Not": equality(&path, CmpOp::Is, literal)? })),
        CmpOp::In => membership(&path, literal),
        CmpOp::NotIn => Ok(json!({ "Not": membership(&path, literal)? })),
        op => equality(&path, op, literal),
    }
}

/// `path in [a, b]` as an `Or` of equality rules
fn membership(path: &str, literal: &Expr) -> CompileResult<Value> {
    let items = match &literal.kind {
        ExprKind::List(items) | ExprKind::Tuple(items) | ExprKind::Set(items) => items,
        other => {
            return Err(UnsupportedOperation::new(
                format!("Membership tests need a list of literals, got {}", other.label()),
                literal.pos,
            ))
        }
    };

    let mut rules = items
        .iter()
        .map(|item| equality(path, CmpOp::Eq, item))
        .collect::<CompileResult<Vec<_>>>()?;
    match rules.len() {
        0 => Err(UnsupportedOperation::new(
            "Membership tests need at least one value",
            literal.pos,
        )),
        1 => Ok(rules.remove(0)),
        _ => Ok(json!({ "Or": rules })),
    }
}

/// A single typed comparison rule
fn equality(path: &str, op: CmpOp, literal: &Expr) -> CompileResult<Value> {
    let value = extract::json(literal)?;

    let operator = match (&value, op) {
        (Value::Null, CmpOp::Eq | CmpOp::Is) => return Ok(json!({ "Variable": path, "IsNull": true })),
        (Value::Bool(_), CmpOp::Eq | CmpOp::Is) => "BooleanEquals",
        (Value::String(_), op) => match op {
            CmpOp::Eq => "StringEquals",
            CmpOp::Lt => "StringLessThan",
            CmpOp::LtE => "StringLessThanEquals",
            CmpOp::Gt => "StringGreaterThan",
            CmpOp::GtE => "StringGreaterThanEquals",
            _ => return Err(unsupported_operator(op, &value, literal)),
        },
        (Value::Number(_), op) => match op {
            CmpOp::Eq => "NumericEquals",
            CmpOp::Lt => "NumericLessThan",
            CmpOp::LtE => "NumericLessThanEquals",
            CmpOp::Gt => "NumericGreaterThan",
            CmpOp::GtE => "NumericGreaterThanEquals",
            _ => return Err(unsupported_operator(op, &value, literal)),
        },
        _ => return Err(unsupported_operator(op, &value, literal)),
    };

    Ok(json!({ "Variable": path, operator: value }))
}

fn unsupported_operator(op: CmpOp, value: &Value, literal: &Expr) -> UnsupportedOperation {
    let kind = match value {
        Value::Null => "None",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    };
    UnsupportedOperation::new(
        format!("Operator '{}' cannot compare against a {} literal", op, kind),
        literal.pos,
    )
}

fn is_data_reference(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Name(name) => name == DATA_ROOT,
        ExprKind::Subscript { value, .. } => is_data_reference(value),
        _ => false,
    }
}
