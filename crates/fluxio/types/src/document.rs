//! Amazon States Language documents

use crate::DecoratorEffect;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A state machine document: `{"Comment"?, "StartAt", "States"}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateMachineDefinition {
    #[serde(rename = "Comment", default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "StartAt")]
    pub start_at: String,
    /// State name to state definition, in source order
    #[serde(rename = "States")]
    pub states: Map<String, Value>,
}

impl StateMachineDefinition {
    pub fn to_value(&self) -> Value {
        let mut document = Map::new();
        if let Some(comment) = &self.comment {
            document.insert("Comment".into(), Value::String(comment.clone()));
        }
        document.insert("StartAt".into(), Value::String(self.start_at.clone()));
        document.insert("States".into(), Value::Object(self.states.clone()));
        Value::Object(document)
    }
}

/// A compiled public function: its document plus decorator metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompiledStateMachine {
    pub name: String,
    pub definition: StateMachineDefinition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<DecoratorEffect>,
}

impl CompiledStateMachine {
    /// Effects of one decorator, in application order
    pub fn effects_for<'a>(&'a self, decorator: &'a str) -> impl Iterator<Item = &'a DecoratorEffect> + 'a {
        self.effects.iter().filter(move |e| e.decorator == decorator)
    }
}
