//! `fluxio decorators`: the resource decorator registry

use crate::error::CliResult;
use crate::output::{self, OutputFormat};
use fluxio_compiler::options::{CallableSchema, OptionDefault};
use fluxio_compiler::RESOURCE_DECORATORS;
use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

/// Table row for one decorator option
#[derive(Debug, Tabled)]
struct OptionRow {
    /// Decorator name
    decorator: String,
    /// Option name
    option: String,
    /// Literal kind
    kind: String,
    /// Default, or "required"
    default: String,
    /// Applications per function
    max_count: String,
}

#[derive(Debug, Serialize)]
struct DecoratorInfo {
    name: &'static str,
    /// `null` is unlimited
    max_count: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    exactly_one_of: Vec<&'static str>,
    options: Vec<OptionInfo>,
}

#[derive(Debug, Serialize)]
struct OptionInfo {
    name: &'static str,
    kind: &'static str,
    required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
}

impl From<&CallableSchema> for DecoratorInfo {
    fn from(schema: &CallableSchema) -> Self {
        Self {
            name: schema.name,
            max_count: schema.max_count,
            exactly_one_of: schema.exactly_one_of.to_vec(),
            options: schema
                .options
                .iter()
                .map(|option| OptionInfo {
                    name: option.name,
                    kind: option.kind.label(),
                    required: option.default == OptionDefault::Required,
                    default: option.default.value(),
                })
                .collect(),
        }
    }
}

/// Execute decorators command
pub fn execute(format: OutputFormat) -> CliResult<()> {
    let infos: Vec<DecoratorInfo> = RESOURCE_DECORATORS.iter().map(DecoratorInfo::from).collect();

    let mut rows = Vec::new();
    for info in &infos {
        let max_count = info
            .max_count
            .map_or_else(|| "unlimited".to_string(), |n| n.to_string());
        for option in &info.options {
            let default = match (&option.default, option.required) {
                (_, true) => "required".to_string(),
                (Some(value), _) => value.to_string(),
                (None, _) if info.exactly_one_of.contains(&option.name) => "one of".to_string(),
                (None, _) => "-".to_string(),
            };
            rows.push(OptionRow {
                decorator: info.name.to_string(),
                option: option.name.to_string(),
                kind: option.kind.to_string(),
                default,
                max_count: max_count.clone(),
            });
        }
    }

    output::print_output(rows, &infos, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_info() {
        let infos: Vec<DecoratorInfo> = RESOURCE_DECORATORS.iter().map(DecoratorInfo::from).collect();
        let value = serde_json::to_value(&infos).unwrap();
        assert_eq!(
            value[0],
            json!({
                "name": "export",
                "max_count": 1,
                "options": [{"name": "enabled", "kind": "bool", "required": false, "default": true}]
            })
        );
        assert_eq!(value[2]["max_count"], Value::Null);
        assert_eq!(
            value[2]["exactly_one_of"],
            json!(["topic_arn_import_value", "project"])
        );
        assert_eq!(value[1]["options"][0]["required"], json!(true));
    }
}
