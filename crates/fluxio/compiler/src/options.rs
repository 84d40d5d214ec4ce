//! Option schema registry
//!
//! Static tables describing the keyword arguments every decorator and
//! intrinsic call accepts: the literal kind of each option, the extractor
//! that turns it into a value, and its default. The tables are constants,
//! shared read-only by every compilation.

use crate::extract;
use fluxio_syntax::{Expr, ExprKind, Keyword, Position};
use fluxio_types::{ensure, CompileResult, UnsupportedOperation};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Syntactic kind an option's argument must have
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Boolean,
    Dict,
    Integer,
    /// Any JSON-serializable literal
    Json,
    /// A `data[...]` reference
    DataPath,
}

impl ValueKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::String => "str",
            Self::Boolean => "bool",
            Self::Dict => "dict",
            Self::Integer => "int",
            Self::Json => "JSON literal",
            Self::DataPath => "data reference",
        }
    }

    /// Whether the node has this kind's shape
    pub fn accepts(self, expr: &Expr) -> bool {
        match self {
            Self::String => matches!(expr.kind, ExprKind::Str(_)),
            Self::Boolean => matches!(expr.kind, ExprKind::Bool(_)),
            Self::Dict => matches!(expr.kind, ExprKind::Dict(_)),
            Self::Integer => matches!(expr.kind, ExprKind::Int(_)),
            Self::Json => matches!(
                expr.kind,
                ExprKind::Str(_)
                    | ExprKind::Int(_)
                    | ExprKind::Float(_)
                    | ExprKind::Bool(_)
                    | ExprKind::NoneLit
                    | ExprKind::List(_)
                    | ExprKind::Dict(_)
                    | ExprKind::UnaryOp { .. }
            ),
            Self::DataPath => matches!(expr.kind, ExprKind::Name(_) | ExprKind::Subscript { .. }),
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What an option resolves to when it is not supplied
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OptionDefault {
    /// Must be supplied
    Required,
    /// Left out of the resolved values
    Absent,
    Null,
    Bool(bool),
    Str(&'static str),
}

impl OptionDefault {
    /// The default as a value, if it produces one
    pub fn value(self) -> Option<Value> {
        match self {
            Self::Required | Self::Absent => None,
            Self::Null => Some(Value::Null),
            Self::Bool(value) => Some(Value::Bool(value)),
            Self::Str(value) => Some(Value::String(value.into())),
        }
    }
}

/// One keyword option
#[derive(Clone, Copy, Debug)]
pub struct OptionSchema {
    pub name: &'static str,
    pub kind: ValueKind,
    pub extractor: fn(&Expr) -> CompileResult<Value>,
    pub default: OptionDefault,
}

/// A decorator or intrinsic call and its options
#[derive(Clone, Copy, Debug)]
pub struct CallableSchema {
    pub name: &'static str,
    /// Applications allowed per function; `None` is unlimited
    pub max_count: Option<usize>,
    pub options: &'static [OptionSchema],
    /// When non-empty, exactly one of these options must be supplied
    pub exactly_one_of: &'static [&'static str],
}

impl CallableSchema {
    pub fn option(&self, name: &str) -> Option<&OptionSchema> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn option_names(&self) -> Vec<&'static str> {
        self.options.iter().map(|o| o.name).collect()
    }
}

// ── Resource decorators ──────────────────────────────────────────────

pub const EXPORT: CallableSchema = CallableSchema {
    name: "export",
    max_count: Some(1),
    options: &[OptionSchema {
        name: "enabled",
        kind: ValueKind::Boolean,
        extractor: extract::boolean,
        default: OptionDefault::Bool(true),
    }],
    exactly_one_of: &[],
};

pub const SCHEDULE: CallableSchema = CallableSchema {
    name: "schedule",
    max_count: Some(1),
    options: &[
        OptionSchema {
            name: "expression",
            kind: ValueKind::String,
            extractor: extract::schedule_expression,
            default: OptionDefault::Required,
        },
        OptionSchema {
            name: "input_data",
            kind: ValueKind::Dict,
            extractor: extract::dict,
            default: OptionDefault::Null,
        },
    ],
    exactly_one_of: &[],
};

pub const SUBSCRIBE: CallableSchema = CallableSchema {
    name: "subscribe",
    max_count: None,
    options: &[
        OptionSchema {
            name: "topic_arn_import_value",
            kind: ValueKind::String,
            extractor: extract::string,
            default: OptionDefault::Absent,
        },
        OptionSchema {
            name: "project",
            kind: ValueKind::String,
            extractor: extract::string,
            default: OptionDefault::Absent,
        },
        OptionSchema {
            name: "state_machine",
            kind: ValueKind::String,
            extractor: extract::string,
            default: OptionDefault::Str("main"),
        },
        OptionSchema {
            name: "status",
            kind: ValueKind::String,
            extractor: extract::subscribe_status,
            default: OptionDefault::Str("success"),
        },
    ],
    exactly_one_of: &["topic_arn_import_value", "project"],
};

/// Every decorator a state machine function may carry
pub static RESOURCE_DECORATORS: &[CallableSchema] = &[EXPORT, SCHEDULE, SUBSCRIBE];

/// Look up a resource decorator by name
pub fn resource_decorator(name: &str) -> Option<&'static CallableSchema> {
    RESOURCE_DECORATORS.iter().find(|d| d.name == name)
}

// ── Intrinsic calls ──────────────────────────────────────────────────

const RETRY: OptionSchema = OptionSchema {
    name: "retry",
    kind: ValueKind::Json,
    extractor: extract::retry_policy,
    default: OptionDefault::Absent,
};

/// Keyword options of a Task call
pub const TASK: CallableSchema = CallableSchema {
    name: "task",
    max_count: None,
    options: &[
        OptionSchema {
            name: "timeout",
            kind: ValueKind::Integer,
            extractor: extract::positive_integer,
            default: OptionDefault::Absent,
        },
        OptionSchema {
            name: "heartbeat",
            kind: ValueKind::Integer,
            extractor: extract::positive_integer,
            default: OptionDefault::Absent,
        },
        RETRY,
    ],
    exactly_one_of: &[],
};

pub const WAIT: CallableSchema = CallableSchema {
    name: "wait",
    max_count: None,
    options: &[
        OptionSchema {
            name: "seconds",
            kind: ValueKind::Integer,
            extractor: extract::integer,
            default: OptionDefault::Absent,
        },
        OptionSchema {
            name: "timestamp",
            kind: ValueKind::String,
            extractor: extract::string,
            default: OptionDefault::Absent,
        },
        OptionSchema {
            name: "seconds_path",
            kind: ValueKind::DataPath,
            extractor: extract::data_path_value,
            default: OptionDefault::Absent,
        },
        OptionSchema {
            name: "timestamp_path",
            kind: ValueKind::DataPath,
            extractor: extract::data_path_value,
            default: OptionDefault::Absent,
        },
    ],
    exactly_one_of: &["seconds", "timestamp", "seconds_path", "timestamp_path"],
};

pub const PARALLEL: CallableSchema = CallableSchema {
    name: "parallel",
    max_count: None,
    options: &[RETRY],
    exactly_one_of: &[],
};

pub const MAP: CallableSchema = CallableSchema {
    name: "map",
    max_count: None,
    options: &[
        OptionSchema {
            name: "max_concurrency",
            kind: ValueKind::Integer,
            extractor: extract::integer,
            default: OptionDefault::Absent,
        },
        RETRY,
    ],
    exactly_one_of: &[],
};

/// Resolve the keyword arguments of one call against its schema
///
/// Supplied options are kind-checked then extracted; missing ones take
/// their default. The result lists options in schema order.
pub fn resolve_options(
    schema: &CallableSchema,
    keywords: &[Keyword],
    call_pos: Position,
) -> CompileResult<Map<String, Value>> {
    let mut supplied = Map::new();
    let mut seen = HashSet::new();

    for keyword in keywords {
        ensure(
            seen.insert(keyword.name.as_str()),
            format!("Option '{}' of {} is given more than once", keyword.name, schema.name),
            keyword.pos,
        )?;
        let option = schema.option(&keyword.name).ok_or_else(|| {
            UnsupportedOperation::new(
                format!(
                    "Unknown option '{}' for {}. Valid options: {}",
                    keyword.name,
                    schema.name,
                    schema.option_names().join(", ")
                ),
                keyword.pos,
            )
        })?;
        ensure(
            option.kind.accepts(&keyword.value),
            format!(
                "Option '{}' of {} must be a {}, got {}",
                option.name,
                schema.name,
                option.kind,
                keyword.value.kind.label()
            ),
            keyword.value.pos,
        )?;
        supplied.insert(option.name.to_string(), (option.extractor)(&keyword.value)?);
    }

    if !schema.exactly_one_of.is_empty() {
        let given = schema
            .exactly_one_of
            .iter()
            .filter(|name| supplied.contains_key(**name))
            .count();
        ensure(
            given == 1,
            format!(
                "{} requires exactly one of: {}",
                schema.name,
                schema.exactly_one_of.join(", ")
            ),
            call_pos,
        )?;
    }

    let mut resolved = Map::new();
    for option in schema.options {
        if let Some(value) = supplied.remove(option.name) {
            resolved.insert(option.name.to_string(), value);
            continue;
        }
        ensure(
            option.default != OptionDefault::Required,
            format!("Option '{}' is required for {}", option.name, schema.name),
            call_pos,
        )?;
        if let Some(value) = option.default.value() {
            resolved.insert(option.name.to_string(), value);
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxio_syntax::{parse, StmtKind};
    use serde_json::json;

    /// Keywords of the bare call statement `source`
    fn keywords(source: &str) -> (Vec<Keyword>, Position) {
        let module = parse(&format!("def main(data):\n    {}\n", source)).unwrap();
        match &module.functions[0].body[0].kind {
            StmtKind::Expr(expr) => match &expr.kind {
                ExprKind::Call { keywords, .. } => (keywords.clone(), expr.pos),
                other => panic!("expected call, got {:?}", other),
            },
            other => panic!("expected expression, got {:?}", other),
        }
    }

    #[test]
    fn test_registry_lookup() {
        assert_eq!(resource_decorator("export").map(|d| d.max_count), Some(Some(1)));
        assert_eq!(resource_decorator("subscribe").map(|d| d.max_count), Some(None));
        assert!(resource_decorator("deploy").is_none());
    }

    #[test]
    fn test_defaults_fill_in() {
        let (kw, pos) = keywords("export()");
        let values = resolve_options(&EXPORT, &kw, pos).unwrap();
        assert_eq!(Value::Object(values), json!({"enabled": true}));

        let (kw, pos) = keywords("subscribe(project=\"billing\")");
        let values = resolve_options(&SUBSCRIBE, &kw, pos).unwrap();
        assert_eq!(
            Value::Object(values),
            json!({"project": "billing", "state_machine": "main", "status": "success"})
        );
    }

    #[test]
    fn test_values_follow_schema_order() {
        let (kw, pos) = keywords("schedule(input_data={\"a\": 1}, expression=\"rate(5 minutes)\")");
        let values = resolve_options(&SCHEDULE, &kw, pos).unwrap();
        let keys: Vec<&str> = values.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["expression", "input_data"]);
    }

    #[test]
    fn test_required_option() {
        let (kw, pos) = keywords("schedule()");
        let err = resolve_options(&SCHEDULE, &kw, pos).unwrap_err();
        assert_eq!(err.message, "Option 'expression' is required for schedule");
    }

    #[test]
    fn test_unknown_and_duplicate_options() {
        let (kw, pos) = keywords("export(enable=True)");
        let err = resolve_options(&EXPORT, &kw, pos).unwrap_err();
        assert!(err.message.contains("Unknown option 'enable'"));
        assert!(err.message.contains("enabled"));

        let (kw, pos) = keywords("export(enabled=True, enabled=False)");
        assert!(resolve_options(&EXPORT, &kw, pos).is_err());
    }

    #[test]
    fn test_kind_mismatch() {
        let (kw, pos) = keywords("export(enabled=\"yes\")");
        let err = resolve_options(&EXPORT, &kw, pos).unwrap_err();
        assert_eq!(err.message, "Option 'enabled' of export must be a bool, got string");
        assert_eq!(err.position.column, 20);
    }

    #[test]
    fn test_exactly_one_of() {
        let (kw, pos) = keywords("subscribe()");
        assert!(resolve_options(&SUBSCRIBE, &kw, pos).is_err());

        let (kw, pos) = keywords("subscribe(project=\"a\", topic_arn_import_value=\"b\")");
        let err = resolve_options(&SUBSCRIBE, &kw, pos).unwrap_err();
        assert!(err.message.contains("exactly one of"));

        let (kw, pos) = keywords("wait(seconds=5, timestamp=\"2024-01-01T00:00:00Z\")");
        assert!(resolve_options(&WAIT, &kw, pos).is_err());

        let (kw, pos) = keywords("wait(seconds_path=data[\"delay\"])");
        let values = resolve_options(&WAIT, &kw, pos).unwrap();
        assert_eq!(Value::Object(values), json!({"seconds_path": "$['delay']"}));
    }

    #[test]
    fn test_extractor_failure_propagates() {
        let (kw, pos) = keywords("subscribe(project=\"a\", status=\"maybe\")");
        let err = resolve_options(&SUBSCRIBE, &kw, pos).unwrap_err();
        assert!(err.message.contains("success|failure"));
    }
}
