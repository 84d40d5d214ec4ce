//! Property tests: placeholder elision over straight-line bodies.
//!
//! A body is a random mix of `pass` and `data[...] = <int>` statements.

use fluxio_compiler::builder::GraphBuilder;
use fluxio_compiler::elide_placeholders;
use fluxio_compiler::Compiler;
use fluxio_syntax::parse;
use proptest::prelude::*;
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

/// `true` is an assignment, `false` a `pass`
fn arb_body() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..12)
}

fn source(body: &[bool]) -> String {
    let mut source = String::from("def main(data):\n");
    for (i, &assign) in body.iter().enumerate() {
        if assign {
            source.push_str(&format!("    data[\"k{}\"] = {}\n", i, i));
        } else {
            source.push_str("    pass\n");
        }
    }
    source
}

/// State name of statement `i` (line `i + 2`, column 5)
fn name(i: usize) -> String {
    format!("Pass-L{}C5", i + 2)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn placeholders_elide_unless_terminal(body in arb_body()) {
        let machine = Compiler::default().compile_machine(&source(&body), "main").unwrap();
        let states = &machine.definition.states;

        let assignments = body.iter().filter(|&&a| a).count();
        let terminal_pass = !body[body.len() - 1];
        prop_assert_eq!(states.len(), assignments + usize::from(terminal_pass));

        // Every surviving state is an assignment (or the final pass), chained in order
        let survivors: Vec<usize> = (0..body.len())
            .filter(|&i| body[i] || i == body.len() - 1)
            .collect();
        prop_assert_eq!(&machine.definition.start_at, &name(survivors[0]));
        for pair in survivors.windows(2) {
            prop_assert_eq!(&states[&name(pair[0])]["Next"], &json!(name(pair[1])));
        }
        let last = &states[&name(survivors[survivors.len() - 1])];
        prop_assert_eq!(&last["End"], &json!(true));
    }

    #[test]
    fn assignments_round_trip_their_value(body in arb_body()) {
        let machine = Compiler::default().compile_machine(&source(&body), "main").unwrap();
        for (i, _) in body.iter().enumerate().filter(|(_, assign)| **assign) {
            let state = &machine.definition.states[&name(i)];
            prop_assert_eq!(&state["Type"], &json!("Pass"));
            prop_assert_eq!(&state["Result"], &json!(i));
            prop_assert_eq!(&state["ResultPath"], &json!(format!("$['k{}']", i)));
        }
    }

    #[test]
    fn elision_is_idempotent(body in arb_body()) {
        let module = parse(&source(&body)).unwrap();
        let mut graph = GraphBuilder::new(&module).build(&module.functions[0]).unwrap();
        let elided = elide_placeholders(&mut graph);
        prop_assert_eq!(elided, body.len() - graph.state_count());

        let edges = graph.edges().to_vec();
        let states = graph.state_count();
        prop_assert_eq!(elide_placeholders(&mut graph), 0);
        prop_assert_eq!(graph.edges(), edges.as_slice());
        prop_assert_eq!(graph.state_count(), states);
        prop_assert!(graph.validate().is_ok());
    }
}
