//! Compiler configuration

use serde::{Deserialize, Serialize};

/// Placeholder in [`CompilerConfig::task_resource_template`]
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Tuning knobs for a compilation run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Task `Resource` value; `{name}` is replaced by the task function's name
    pub task_resource_template: String,
    /// Emit a function's docstring as the document `Comment`
    pub include_comments: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            task_resource_template: "${{name}}".into(),
            include_comments: true,
        }
    }
}

impl CompilerConfig {
    /// The `Resource` of a Task calling `name`
    pub fn task_resource(&self, name: &str) -> String {
        self.task_resource_template.replace(NAME_PLACEHOLDER, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resource_is_substitution() {
        let config = CompilerConfig::default();
        assert_eq!(config.task_resource("charge_card"), "${charge_card}");
        assert!(config.include_comments);
    }

    #[test]
    fn test_custom_template() {
        let config = CompilerConfig {
            task_resource_template: "arn:aws:states:::lambda:invoke:{name}".into(),
            include_comments: false,
        };
        assert_eq!(
            config.task_resource("notify"),
            "arn:aws:states:::lambda:invoke:notify"
        );
    }

    #[test]
    fn test_partial_config_takes_defaults() {
        let config: CompilerConfig = serde_json::from_str(r#"{"include_comments": false}"#).unwrap();
        assert_eq!(config.task_resource_template, "${{name}}");
        assert!(!config.include_comments);
    }
}
