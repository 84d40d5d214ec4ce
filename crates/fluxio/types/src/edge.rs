//! Edges: transitions between states
//!
//! An edge's attributes decide how it serializes on its source state: a
//! plain `Next`, a Choice rule, a Choice `Default`, or a `Catch` entry.

use crate::StateId;
use serde_json::Value;

/// How control moves along an edge
#[derive(Clone, Debug, PartialEq)]
pub enum EdgeAttrs {
    /// Unconditional transition to the following state
    Next,
    /// Choice rule taken when the condition matches
    Rule(Value),
    /// Choice fallback when no rule matches
    Default,
    /// Error handler for a Task, Parallel or Map state
    Catch { errors: Vec<String> },
}

/// A directed transition in a state graph
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub from: StateId,
    pub to: StateId,
    pub attrs: EdgeAttrs,
}

impl Edge {
    pub fn new(from: StateId, to: StateId, attrs: EdgeAttrs) -> Self {
        Self { from, to, attrs }
    }
}
