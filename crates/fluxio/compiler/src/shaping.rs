//! Graph shaping: placeholder elision
//!
//! A `pass` statement only exists so a branch or handler has a body. When
//! its Pass state has a successor, it is spliced out: every incoming edge
//! is redirected to the successor, keeping the incoming edge's attributes
//! (a Choice rule, a Catch) and dropping the placeholder's own `Next`. A
//! placeholder without successors is a real terminal state and stays.

use fluxio_types::{Edge, StateGraph, StateId};

/// Elide placeholder Pass states until none with a successor remain
///
/// Returns how many states were removed.
pub fn elide_placeholders(graph: &mut StateGraph<'_>) -> usize {
    let mut elided = 0;

    while let Some(placeholder) = next_elidable(graph) {
        let successors: Vec<StateId> = graph.outgoing(placeholder).iter().map(|e| e.to).collect();

        let mut edges = Vec::with_capacity(graph.edge_count());
        for edge in graph.edges() {
            if edge.from == placeholder {
                continue;
            }
            if edge.to == placeholder {
                for &successor in &successors {
                    edges.push(Edge::new(edge.from, successor, edge.attrs.clone()));
                }
            } else {
                edges.push(edge.clone());
            }
        }

        graph.replace_edges(edges);
        if graph.start() == Some(placeholder) {
            if let Some(&successor) = successors.first() {
                graph.set_start(successor);
            }
        }
        graph.remove_state(placeholder);
        elided += 1;
    }

    tracing::debug!(
        elided,
        states = graph.state_count(),
        edges = graph.edge_count(),
        "Shaped state graph"
    );
    elided
}

fn next_elidable(graph: &StateGraph<'_>) -> Option<StateId> {
    graph
        .states()
        .find(|s| s.is_placeholder() && !graph.outgoing(s.id).is_empty())
        .map(|s| s.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxio_syntax::{Position, Stmt, StmtKind};
    use fluxio_types::{EdgeAttrs, StateKind};
    use serde_json::json;

    fn pass(line: usize) -> Stmt {
        Stmt {
            kind: StmtKind::Pass,
            pos: Position::new(line, 5),
        }
    }

    fn ret(line: usize) -> Stmt {
        Stmt {
            kind: StmtKind::Return(None),
            pos: Position::new(line, 5),
        }
    }

    #[test]
    fn test_chain_of_placeholders_collapses() {
        let stmts = [ret(1), pass(2), pass(3), pass(4), ret(5)];
        let mut graph = StateGraph::new();
        // Choice-like source A with a rule edge into a chain of three placeholders
        let a = graph.add_state(StateKind::Choice, &stmts[0]).unwrap();
        let p1 = graph.add_state(StateKind::Pass, &stmts[1]).unwrap();
        let p2 = graph.add_state(StateKind::Pass, &stmts[2]).unwrap();
        let p3 = graph.add_state(StateKind::Pass, &stmts[3]).unwrap();
        let b = graph.add_state(StateKind::Succeed, &stmts[4]).unwrap();
        let rule = EdgeAttrs::Rule(json!({"Variable": "$['x']", "BooleanEquals": true}));
        graph.add_edge(a, p1, rule.clone());
        graph.add_edge(p1, p2, EdgeAttrs::Next);
        graph.add_edge(p2, p3, EdgeAttrs::Next);
        graph.add_edge(p3, b, EdgeAttrs::Next);
        graph.set_start(a);

        assert_eq!(elide_placeholders(&mut graph), 3);
        assert_eq!(graph.state_count(), 2);
        assert_eq!(graph.edges(), &[Edge::new(a, b, rule)]);
    }

    #[test]
    fn test_terminal_placeholder_is_kept() {
        let stmts = [ret(1), pass(2)];
        let mut graph = StateGraph::new();
        let a = graph.add_state(StateKind::Task, &stmts[0]).unwrap();
        let p = graph.add_state(StateKind::Pass, &stmts[1]).unwrap();
        graph.add_edge(a, p, EdgeAttrs::Next);
        graph.set_start(a);

        assert_eq!(elide_placeholders(&mut graph), 0);
        assert!(graph.state(p).is_some());
    }

    #[test]
    fn test_start_moves_past_leading_placeholder() {
        let stmts = [pass(1), ret(2)];
        let mut graph = StateGraph::new();
        let p = graph.add_state(StateKind::Pass, &stmts[0]).unwrap();
        let b = graph.add_state(StateKind::Succeed, &stmts[1]).unwrap();
        graph.add_edge(p, b, EdgeAttrs::Next);
        graph.set_start(p);

        elide_placeholders(&mut graph);
        assert_eq!(graph.start(), Some(b));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_shaping_is_idempotent() {
        let stmts = [pass(1), ret(2), pass(3)];
        let mut graph = StateGraph::new();
        let p = graph.add_state(StateKind::Pass, &stmts[0]).unwrap();
        let t = graph.add_state(StateKind::Task, &stmts[1]).unwrap();
        let end = graph.add_state(StateKind::Pass, &stmts[2]).unwrap();
        graph.add_edge(p, t, EdgeAttrs::Next);
        graph.add_edge(t, end, EdgeAttrs::Next);
        graph.set_start(p);

        elide_placeholders(&mut graph);
        let edges = graph.edges().to_vec();
        assert_eq!(elide_placeholders(&mut graph), 0);
        assert_eq!(graph.edges(), edges.as_slice());
        assert_eq!(graph.state_count(), 2);
    }
}
