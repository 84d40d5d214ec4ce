//! State graphs: the intermediate form between source and ASL
//!
//! A StateGraph is an arena of states addressed by [`StateId`] plus an
//! explicit, ordered edge list. Removing a state leaves a tombstone so ids
//! stay stable; shaping rewrites the edge list wholesale instead of editing
//! it while iterating.

use crate::{ensure, CompileResult, Edge, EdgeAttrs, UnsupportedOperation};
use fluxio_syntax::{Stmt, StmtKind};
use std::collections::HashSet;

// ── Identifiers ──────────────────────────────────────────────────────

/// Stable handle of a state within its graph
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub usize);

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── States ───────────────────────────────────────────────────────────

/// The state taxonomy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateKind {
    Pass,
    Task,
    Choice,
    Wait,
    Parallel,
    Map,
    Succeed,
    Fail,
}

impl StateKind {
    /// The ASL `Type` value
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Pass => "Pass",
            Self::Task => "Task",
            Self::Choice => "Choice",
            Self::Wait => "Wait",
            Self::Parallel => "Parallel",
            Self::Map => "Map",
            Self::Succeed => "Succeed",
            Self::Fail => "Fail",
        }
    }

    /// States that accept `Catch` handlers
    pub fn is_catchable(self) -> bool {
        matches!(self, Self::Task | Self::Parallel | Self::Map)
    }

    /// States that never transition onward
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeed | Self::Fail)
    }
}

impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A state and the statement it was built from
#[derive(Clone, Debug)]
pub struct StateNode<'a> {
    pub id: StateId,
    /// `<Type>-L<line>C<column>` of the origin, unique within the graph
    pub name: String,
    pub kind: StateKind,
    pub origin: &'a Stmt,
}

impl StateNode<'_> {
    /// A Pass built from the bare `pass` marker
    pub fn is_placeholder(&self) -> bool {
        self.kind == StateKind::Pass && matches!(self.origin.kind, StmtKind::Pass)
    }
}

// ── State Graph ──────────────────────────────────────────────────────

/// States and transitions for one function body
#[derive(Clone, Debug, Default)]
pub struct StateGraph<'a> {
    states: Vec<Option<StateNode<'a>>>,
    edges: Vec<Edge>,
    start: Option<StateId>,
}

impl<'a> StateGraph<'a> {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            edges: Vec::new(),
            start: None,
        }
    }

    /// Add a state named after its kind and origin position
    pub fn add_state(&mut self, kind: StateKind, origin: &'a Stmt) -> CompileResult<StateId> {
        let name = format!(
            "{}-L{}C{}",
            kind.type_name(),
            origin.pos.line,
            origin.pos.column
        );
        ensure(
            !self.states().any(|s| s.name == name),
            format!("Duplicate state name '{}'", name),
            origin.pos,
        )?;

        let id = StateId(self.states.len());
        self.states.push(Some(StateNode {
            id,
            name,
            kind,
            origin,
        }));
        Ok(id)
    }

    /// Add an edge unless an identical one already exists
    pub fn add_edge(&mut self, from: StateId, to: StateId, attrs: EdgeAttrs) {
        let edge = Edge::new(from, to, attrs);
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    /// Remove a state and every edge touching it
    pub fn remove_state(&mut self, id: StateId) {
        if let Some(slot) = self.states.get_mut(id.0) {
            *slot = None;
        }
        self.edges.retain(|e| e.from != id && e.to != id);
        if self.start == Some(id) {
            self.start = None;
        }
    }

    /// Swap in a new edge list, dropping duplicates but keeping order
    pub fn replace_edges(&mut self, edges: Vec<Edge>) {
        self.edges.clear();
        for edge in edges {
            if !self.edges.contains(&edge) {
                self.edges.push(edge);
            }
        }
    }

    pub fn set_start(&mut self, id: StateId) {
        self.start = Some(id);
    }

    pub fn start(&self) -> Option<StateId> {
        self.start
    }

    pub fn state(&self, id: StateId) -> Option<&StateNode<'a>> {
        self.states.get(id.0).and_then(Option::as_ref)
    }

    /// Live states in creation order
    pub fn states(&self) -> impl Iterator<Item = &StateNode<'a>> {
        self.states.iter().flatten()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Get outgoing edges from a state
    pub fn outgoing(&self, id: StateId) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.from == id).collect()
    }

    /// Get incoming edges to a state
    pub fn incoming(&self, id: StateId) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.to == id).collect()
    }

    /// Name of a live state
    pub fn name_of(&self, id: StateId) -> Option<&str> {
        self.state(id).map(|s| s.name.as_str())
    }

    pub fn state_count(&self) -> usize {
        self.states().count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check the graph is well formed: a start state, edges between live
    /// states only, nothing leaving a terminal state, and every state
    /// reachable from the start
    pub fn validate(&self) -> CompileResult<()> {
        let start = match self.start.and_then(|id| self.state(id)) {
            Some(start) => start,
            None => {
                let pos = self.states().next().map(|s| s.origin.pos).unwrap_or_default();
                return Err(UnsupportedOperation::new(
                    "State machine has no start state",
                    pos,
                ));
            }
        };

        for edge in &self.edges {
            let from = self.state(edge.from);
            let to = self.state(edge.to);
            let (from, _) = match (from, to) {
                (Some(from), Some(to)) => (from, to),
                _ => {
                    return Err(UnsupportedOperation::new(
                        format!("Transition {} -> {} refers to a removed state", edge.from, edge.to),
                        start.origin.pos,
                    ))
                }
            };
            ensure(
                !from.kind.is_terminal(),
                format!("{} state '{}' cannot transition", from.kind, from.name),
                from.origin.pos,
            )?;
        }

        let reachable = self.reachable_from(start.id);
        for state in self.states() {
            ensure(
                reachable.contains(&state.id),
                format!("State '{}' is unreachable", state.name),
                state.origin.pos,
            )?;
        }

        Ok(())
    }

    /// Find all states reachable from a given state
    fn reachable_from(&self, start: StateId) -> HashSet<StateId> {
        let mut visited = HashSet::new();
        let mut queue = vec![start];

        while let Some(current) = queue.pop() {
            if visited.insert(current) {
                for edge in self.outgoing(current) {
                    if !visited.contains(&edge.to) {
                        queue.push(edge.to);
                    }
                }
            }
        }

        visited
    }
}
