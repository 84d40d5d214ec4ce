//! Decorator effects: validated infrastructure metadata

use fluxio_syntax::Position;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One validated application of a resource decorator
///
/// `values` holds every option of the decorator, either as supplied or as
/// its schema default, in schema order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecoratorEffect {
    pub decorator: String,
    pub values: Map<String, Value>,
    pub position: Position,
}

impl DecoratorEffect {
    pub fn new(decorator: impl Into<String>, values: Map<String, Value>, position: Position) -> Self {
        Self {
            decorator: decorator.into(),
            values,
            position,
        }
    }

    /// Value of one option
    pub fn get(&self, option: &str) -> Option<&Value> {
        self.values.get(option)
    }
}
