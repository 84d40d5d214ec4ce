//! Decorator validator
//!
//! Turns the decorators on a function into [`DecoratorEffect`]s: each one
//! is matched to its registry schema, counted against `max_count`, and
//! its keyword arguments resolved to values.

use crate::options::{resolve_options, resource_decorator, CallableSchema, RESOURCE_DECORATORS};
use fluxio_syntax::{Decorator, ExprKind, FunctionDef, Keyword};
use fluxio_types::{ensure, CompileResult, DecoratorEffect, UnsupportedOperation};
use std::collections::HashMap;

/// Validate every decorator on `function`, in source order
pub fn validate_decorators(function: &FunctionDef) -> CompileResult<Vec<DecoratorEffect>> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut effects = Vec::with_capacity(function.decorators.len());

    for decorator in &function.decorators {
        let (schema, keywords) = decorator_schema(decorator)?;

        let count = counts.entry(schema.name).or_insert(0);
        if let Some(max_count) = schema.max_count {
            ensure(
                *count < max_count,
                format!(
                    "Decorator '{}' can be applied at most {} time(s) to a function",
                    schema.name, max_count
                ),
                decorator.pos,
            )?;
        }
        *count += 1;

        let values = resolve_options(schema, keywords, decorator.pos)?;
        effects.push(DecoratorEffect::new(schema.name, values, decorator.pos));
    }

    tracing::debug!(
        function = %function.name,
        effects = effects.len(),
        "Validated decorators"
    );
    Ok(effects)
}

/// Validate a single decorator application, bare (`@export`) or called
pub fn validate_decorator(decorator: &Decorator) -> CompileResult<DecoratorEffect> {
    let (schema, keywords) = decorator_schema(decorator)?;
    let values = resolve_options(schema, keywords, decorator.pos)?;
    Ok(DecoratorEffect::new(schema.name, values, decorator.pos))
}

/// The registry schema of `decorator` and its keyword arguments
fn decorator_schema(decorator: &Decorator) -> CompileResult<(&'static CallableSchema, &[Keyword])> {
    let (name_expr, args, keywords) = match &decorator.expr.kind {
        ExprKind::Call {
            func,
            args,
            keywords,
        } => (func.as_ref(), args.as_slice(), keywords.as_slice()),
        _ => (&decorator.expr, &[][..], &[][..]),
    };

    let name = match &name_expr.kind {
        ExprKind::Name(name) => name.as_str(),
        ExprKind::Attribute { .. } => {
            return Err(UnsupportedOperation::new(
                "Decorators must be referenced by bare name",
                name_expr.pos,
            ))
        }
        other => {
            return Err(UnsupportedOperation::new(
                format!("Unsupported decorator expression: {}", other.label()),
                name_expr.pos,
            ))
        }
    };

    let schema = resource_decorator(name).ok_or_else(|| unknown(decorator, name))?;
    if let Some(arg) = args.first() {
        return Err(UnsupportedOperation::new(
            format!("Decorator '{}' only takes keyword arguments", name),
            arg.pos,
        ));
    }

    Ok((schema, keywords))
}

fn unknown(decorator: &Decorator, name: &str) -> UnsupportedOperation {
    let known: Vec<&str> = RESOURCE_DECORATORS.iter().map(|d| d.name).collect();
    UnsupportedOperation::new(
        format!(
            "Unknown decorator '{}'. Valid decorators: {}",
            name,
            known.join(", ")
        ),
        decorator.pos,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxio_syntax::parse;
    use serde_json::json;

    fn function(decorators: &str) -> FunctionDef {
        let module = parse(&format!("{}\ndef main(data):\n    pass\n", decorators)).unwrap();
        module.functions.into_iter().next().unwrap()
    }

    #[test]
    fn test_export_defaults_enabled() {
        let effects = validate_decorators(&function("@export()")).unwrap();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].decorator, "export");
        assert_eq!(effects[0].get("enabled"), Some(&json!(true)));

        let effects = validate_decorators(&function("@export")).unwrap();
        assert_eq!(effects[0].get("enabled"), Some(&json!(true)));

        let effects = validate_decorators(&function("@export(enabled=False)")).unwrap();
        assert_eq!(effects[0].get("enabled"), Some(&json!(false)));
    }

    #[test]
    fn test_max_count() {
        let err = validate_decorators(&function("@export()\n@export()")).unwrap_err();
        assert!(err.message.contains("at most 1"));
        assert_eq!(err.position.line, 2);

        // Cardinality is checked before the options of the extra decorator
        let err = validate_decorators(&function("@export()\n@export(enabled=\"no\")")).unwrap_err();
        assert!(err.message.contains("at most 1"), "{}", err.message);
        assert_eq!(err.position.line, 2);

        let effects = validate_decorators(&function(
            "@subscribe(project=\"a\")\n@subscribe(project=\"b\", status=\"failure\")\n@subscribe(topic_arn_import_value=\"Topic\")",
        ))
        .unwrap();
        assert_eq!(effects.len(), 3);
    }

    #[test]
    fn test_schedule_effect() {
        let effects = validate_decorators(&function(
            "@schedule(expression=\"rate(1 day)\", input_data={\"mode\": \"full\"})",
        ))
        .unwrap();
        assert_eq!(
            serde_json::Value::Object(effects[0].values.clone()),
            json!({"expression": "rate(1 day)", "input_data": {"mode": "full"}})
        );
    }

    #[test]
    fn test_rejected_decorators() {
        assert!(validate_decorators(&function("@deploy")).is_err());
        assert!(validate_decorators(&function("@aws.export()")).is_err());
        assert!(validate_decorators(&function("@export(True)")).is_err());
        assert!(validate_decorators(&function("@subscribe(project=\"a\", status=\"maybe\")")).is_err());

        let err = validate_decorators(&function("@export(enabled=\"no\")")).unwrap_err();
        assert!(err.message.contains("enabled"));
    }
}
