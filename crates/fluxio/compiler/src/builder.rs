//! State graph builder
//!
//! Walks a function body in source order and creates one state per simple
//! statement. Compound statements become clusters: an `if` chain is one
//! Choice state whose rules lead into each branch, a `try` adds Catch edges
//! from every state in its body that can fail to each handler.
//!
//! A block is built into a [`Fragment`]: its entry state plus the dangling
//! tails that continue into whatever follows. Tails of every branch
//! re-converge on the next statement; tails left at the end of the
//! function become terminal states.

use crate::conditions;
use crate::extract::{self, DATA_ROOT};
use crate::options::{MAP, PARALLEL, WAIT};
use fluxio_syntax::{BinOp, ExceptHandler, Expr, ExprKind, FunctionDef, Module, Stmt, StmtKind};
use fluxio_types::{ensure, CompileResult, EdgeAttrs, StateGraph, StateId, StateKind, UnsupportedOperation};

/// Error name matching every error
pub const CATCH_ALL: &str = "States.ALL";

/// Builds the raw state graph of one function
pub struct GraphBuilder<'a> {
    module: &'a Module,
    graph: StateGraph<'a>,
    /// Catchable states created inside each enclosing `try`, innermost last
    catch_frames: Vec<Vec<StateId>>,
}

/// A built block: where it starts and where control leaves it
struct Fragment {
    entry: StateId,
    tails: Vec<Tail>,
}

/// An edge waiting for its target
struct Tail {
    from: StateId,
    attrs: EdgeAttrs,
}

impl Tail {
    fn next(from: StateId) -> Self {
        Self {
            from,
            attrs: EdgeAttrs::Next,
        }
    }
}

impl<'a> GraphBuilder<'a> {
    pub fn new(module: &'a Module) -> Self {
        Self {
            module,
            graph: StateGraph::new(),
            catch_frames: Vec::new(),
        }
    }

    /// Build the graph for a function body
    pub fn build(mut self, function: &'a FunctionDef) -> CompileResult<StateGraph<'a>> {
        let body = function.statements();
        ensure(
            !body.is_empty(),
            format!("Function '{}' has no statements", function.name),
            function.pos,
        )?;

        let fragment = self.build_block(body)?;
        self.graph.set_start(fragment.entry);
        self.finish(fragment.tails)?;

        tracing::debug!(
            function = %function.name,
            states = self.graph.state_count(),
            edges = self.graph.edge_count(),
            "Built state graph"
        );
        Ok(self.graph)
    }

    /// Close the tails left at the end of the function
    ///
    /// `Next` tails become `End: true`. A Choice whose fallback is still
    /// open gets a synthesized Succeed so a run matching no rule completes.
    fn finish(&mut self, tails: Vec<Tail>) -> CompileResult<()> {
        for tail in tails {
            if tail.attrs != EdgeAttrs::Default {
                continue;
            }
            let origin = match self.graph.state(tail.from) {
                Some(state) => state.origin,
                None => continue,
            };
            let succeed = self.graph.add_state(StateKind::Succeed, origin)?;
            self.graph.add_edge(tail.from, succeed, tail.attrs);
        }
        Ok(())
    }

    fn build_block(&mut self, stmts: &'a [Stmt]) -> CompileResult<Fragment> {
        let mut entry = None;
        let mut tails: Vec<Tail> = Vec::new();

        for stmt in stmts {
            ensure(
                entry.is_none() || !tails.is_empty(),
                "Unreachable statement: the state machine has already ended on every path",
                stmt.pos,
            )?;

            let fragment = self.build_statement(stmt)?;
            for tail in std::mem::take(&mut tails) {
                self.graph.add_edge(tail.from, fragment.entry, tail.attrs);
            }
            entry.get_or_insert(fragment.entry);
            tails = fragment.tails;
        }

        match entry {
            Some(entry) => Ok(Fragment { entry, tails }),
            None => Err(UnsupportedOperation::new("Empty block", Default::default())),
        }
    }

    fn build_statement(&mut self, stmt: &'a Stmt) -> CompileResult<Fragment> {
        match &stmt.kind {
            StmtKind::Pass => self.single(StateKind::Pass, stmt),
            StmtKind::Assign { target, value } => {
                ensure(
                    is_data_key(target),
                    format!(
                        "Assignments must target a key of {root}, e.g. {root}[\"key\"] = ...",
                        root = DATA_ROOT
                    ),
                    target.pos,
                )?;
                let kind = match &value.kind {
                    ExprKind::Call { func, .. } => self.call_kind(func, true)?,
                    _ => StateKind::Pass,
                };
                self.single(kind, stmt)
            }
            StmtKind::AugAssign { target, op, .. } => {
                let supported = *op == BinOp::BitOr && target.as_name() == Some(DATA_ROOT);
                ensure(
                    supported,
                    format!(
                        "Unsupported augmented assignment '{}=': only {} |= {{...}} is allowed",
                        op, DATA_ROOT
                    ),
                    stmt.pos,
                )?;
                self.single(StateKind::Pass, stmt)
            }
            StmtKind::Expr(expr) => match &expr.kind {
                ExprKind::Call {
                    func,
                    args,
                    keywords,
                } if is_data_update(func) => {
                    ensure(
                        args.len() == 1 && keywords.is_empty(),
                        format!("{}.update() takes a single dict literal", DATA_ROOT),
                        expr.pos,
                    )?;
                    self.single(StateKind::Pass, stmt)
                }
                ExprKind::Call { func, .. } => {
                    let kind = self.call_kind(func, false)?;
                    self.single(kind, stmt)
                }
                ExprKind::Str(_) => Err(UnsupportedOperation::new(
                    "String literals are only allowed as the function docstring",
                    expr.pos,
                )),
                other => Err(UnsupportedOperation::new(
                    format!("Expression statements must be calls, got {}", other.label()),
                    expr.pos,
                )),
            },
            StmtKind::Return(_) => self.single(StateKind::Succeed, stmt),
            StmtKind::Raise(Some(_)) => self.single(StateKind::Fail, stmt),
            StmtKind::Raise(None) => Err(UnsupportedOperation::new(
                "Bare raise is not supported; raise an error, e.g. raise Failed(\"cause\")",
                stmt.pos,
            )),
            StmtKind::If { test, body, orelse } => self.build_if(stmt, test, body, orelse),
            StmtKind::Try { body, handlers } => self.build_try(stmt, body, handlers),
        }
    }

    /// A lone state that continues to the next statement unless terminal
    fn single(&mut self, kind: StateKind, stmt: &'a Stmt) -> CompileResult<Fragment> {
        let id = self.graph.add_state(kind, stmt)?;
        if kind.is_catchable() {
            for frame in &mut self.catch_frames {
                frame.push(id);
            }
        }

        let tails = if kind.is_terminal() {
            Vec::new()
        } else {
            vec![Tail::next(id)]
        };
        Ok(Fragment { entry: id, tails })
    }

    /// The state a call statement compiles to
    fn call_kind(&self, func: &Expr, assigned: bool) -> CompileResult<StateKind> {
        let name = match &func.kind {
            ExprKind::Name(name) => name.as_str(),
            _ => {
                return Err(UnsupportedOperation::new(
                    "Only plain function names can be called",
                    func.pos,
                ))
            }
        };

        if name == WAIT.name {
            ensure(
                !assigned,
                "wait() has no result to assign; call it as a statement",
                func.pos,
            )?;
            return Ok(StateKind::Wait);
        }
        if name == PARALLEL.name {
            return Ok(StateKind::Parallel);
        }
        if name == MAP.name {
            return Ok(StateKind::Map);
        }

        ensure(
            self.module.function(name).is_none(),
            format!(
                "'{}' is defined in this module and cannot be called as a task; run it with parallel() or map()",
                name
            ),
            func.pos,
        )?;
        Ok(StateKind::Task)
    }

    /// An `if`/`elif`/`else` chain as one Choice state
    fn build_if(
        &mut self,
        stmt: &'a Stmt,
        test: &'a Expr,
        body: &'a [Stmt],
        orelse: &'a [Stmt],
    ) -> CompileResult<Fragment> {
        let choice = self.graph.add_state(StateKind::Choice, stmt)?;
        let mut tails = Vec::new();
        let (mut test, mut body, mut orelse) = (test, body, orelse);

        loop {
            let rule = conditions::choice_rule(test)?;
            let branch = self.build_block(body)?;
            self.graph.add_edge(choice, branch.entry, EdgeAttrs::Rule(rule));
            tails.extend(branch.tails);

            match orelse {
                [Stmt {
                    kind:
                        StmtKind::If {
                            test: elif_test,
                            body: elif_body,
                            orelse: elif_orelse,
                        },
                    ..
                }] => {
                    test = elif_test;
                    body = elif_body.as_slice();
                    orelse = elif_orelse.as_slice();
                }
                [] => {
                    tails.push(Tail {
                        from: choice,
                        attrs: EdgeAttrs::Default,
                    });
                    break;
                }
                _ => {
                    let branch = self.build_block(orelse)?;
                    self.graph.add_edge(choice, branch.entry, EdgeAttrs::Default);
                    tails.extend(branch.tails);
                    break;
                }
            }
        }

        Ok(Fragment {
            entry: choice,
            tails,
        })
    }

    /// A `try` body with Catch edges into each handler
    fn build_try(
        &mut self,
        stmt: &'a Stmt,
        body: &'a [Stmt],
        handlers: &'a [ExceptHandler],
    ) -> CompileResult<Fragment> {
        self.catch_frames.push(Vec::new());
        let built = self.build_block(body);
        let catchable = self.catch_frames.pop().unwrap_or_default();
        let fragment = built?;

        ensure(
            !catchable.is_empty(),
            "try body has no Task, Parallel or Map state that can fail",
            stmt.pos,
        )?;

        let mut tails = fragment.tails;
        let mut caught_all = false;
        for handler in handlers {
            ensure(
                !caught_all,
                "A catch-all except must be the last handler",
                handler.pos,
            )?;
            ensure(
                handler.name.is_none(),
                "except ... as name is not supported",
                handler.pos,
            )?;

            let errors = handler_errors(handler)?;
            caught_all = errors.iter().any(|e| e == CATCH_ALL);

            let branch = self.build_block(&handler.body)?;
            for &state in &catchable {
                self.graph.add_edge(
                    state,
                    branch.entry,
                    EdgeAttrs::Catch {
                        errors: errors.clone(),
                    },
                );
            }
            tails.extend(branch.tails);
        }

        Ok(Fragment {
            entry: fragment.entry,
            tails,
        })
    }
}

/// Error names an `except` clause catches
fn handler_errors(handler: &ExceptHandler) -> CompileResult<Vec<String>> {
    let typ = match &handler.typ {
        Some(typ) => typ,
        None => return Ok(vec![CATCH_ALL.to_string()]),
    };

    let items = match &typ.kind {
        ExprKind::Tuple(items) => items.iter().collect(),
        _ => vec![typ],
    };

    let mut errors = Vec::with_capacity(items.len());
    for item in items {
        let name = extract::dotted_name(item).ok_or_else(|| {
            UnsupportedOperation::new(
                "Exception types must be names, e.g. except States.Timeout:",
                item.pos,
            )
        })?;
        errors.push(name);
    }

    ensure(
        !errors.iter().any(|e| e == CATCH_ALL) || errors.len() == 1,
        format!("{} must be the only error in its handler", CATCH_ALL),
        typ.pos,
    )?;
    Ok(errors)
}

/// `data[...]`, not bare `data`
fn is_data_key(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Subscript { value, .. } => {
            value.as_name() == Some(DATA_ROOT) || is_data_key(value)
        }
        _ => false,
    }
}

/// The `data.update` callee
fn is_data_update(func: &Expr) -> bool {
    matches!(
        &func.kind,
        ExprKind::Attribute { value, attr } if attr == "update" && value.as_name() == Some(DATA_ROOT)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxio_syntax::parse;
    use fluxio_types::Edge;

    fn build(module: &Module) -> CompileResult<StateGraph<'_>> {
        GraphBuilder::new(module).build(&module.functions[0])
    }

    fn module(body: &str) -> Module {
        let indented: String = body.lines().map(|l| format!("    {}\n", l)).collect();
        parse(&format!("def main(data):\n{}", indented)).unwrap()
    }

    fn names(graph: &StateGraph<'_>) -> Vec<String> {
        graph.states().map(|s| s.name.clone()).collect()
    }

    fn edge(graph: &StateGraph<'_>, from: &str, to: &str) -> Option<Edge> {
        graph
            .edges()
            .iter()
            .find(|e| graph.name_of(e.from) == Some(from) && graph.name_of(e.to) == Some(to))
            .cloned()
    }

    #[test]
    fn test_sequential_statements() {
        let module = module("pass\ndata[\"x\"] = 1\ndata[\"y\"] = work(data)");
        let graph = build(&module).unwrap();

        assert_eq!(names(&graph), vec!["Pass-L2C5", "Pass-L3C5", "Task-L4C5"]);
        assert_eq!(graph.name_of(graph.start().unwrap()), Some("Pass-L2C5"));
        assert!(edge(&graph, "Pass-L2C5", "Pass-L3C5").is_some());
        assert!(edge(&graph, "Pass-L3C5", "Task-L4C5").is_some());
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_docstring_is_not_a_state() {
        let module = module("\"\"\"Docs\"\"\"\ndata[\"x\"] = 1");
        let graph = build(&module).unwrap();
        assert_eq!(names(&graph), vec!["Pass-L3C5"]);
    }

    #[test]
    fn test_if_else_reconverges() {
        let module = module(
            "if data[\"n\"] > 1:\n    data[\"big\"] = True\nelif data[\"n\"] == 1:\n    data[\"one\"] = True\nelse:\n    pass\ndata[\"done\"] = True",
        );
        let graph = build(&module).unwrap();

        let choice = "Choice-L2C5";
        assert!(matches!(edge(&graph, choice, "Pass-L3C9").map(|e| e.attrs), Some(EdgeAttrs::Rule(_))));
        assert!(matches!(edge(&graph, choice, "Pass-L5C9").map(|e| e.attrs), Some(EdgeAttrs::Rule(_))));
        assert_eq!(edge(&graph, choice, "Pass-L7C9").map(|e| e.attrs), Some(EdgeAttrs::Default));
        for branch in ["Pass-L3C9", "Pass-L5C9", "Pass-L7C9"] {
            assert!(edge(&graph, branch, "Pass-L8C5").is_some(), "{} should join", branch);
        }
    }

    #[test]
    fn test_if_without_else_falls_through() {
        let module = module("if data[\"x\"]:\n    data[\"y\"] = 1\ndata[\"z\"] = 2");
        let graph = build(&module).unwrap();
        assert_eq!(
            edge(&graph, "Choice-L2C5", "Pass-L4C5").map(|e| e.attrs),
            Some(EdgeAttrs::Default)
        );
    }

    #[test]
    fn test_trailing_if_gets_synthesized_succeed() {
        let module = module("if data[\"x\"]:\n    data[\"y\"] = 1");
        let graph = build(&module).unwrap();
        assert_eq!(
            edge(&graph, "Choice-L2C5", "Succeed-L2C5").map(|e| e.attrs),
            Some(EdgeAttrs::Default)
        );
        assert!(graph.outgoing(graph.start().unwrap()).len() == 2);
    }

    #[test]
    fn test_try_adds_catch_edges() {
        let module = module(
            "try:\n    data[\"a\"] = first(data)\n    data[\"b\"] = second(data)\nexcept States.Timeout:\n    pass\nexcept:\n    raise Failed(\"boom\")",
        );
        let graph = build(&module).unwrap();

        for task in ["Task-L3C9", "Task-L4C9"] {
            assert_eq!(
                edge(&graph, task, "Pass-L6C9").map(|e| e.attrs),
                Some(EdgeAttrs::Catch {
                    errors: vec!["States.Timeout".into()]
                })
            );
            assert_eq!(
                edge(&graph, task, "Fail-L8C9").map(|e| e.attrs),
                Some(EdgeAttrs::Catch {
                    errors: vec![CATCH_ALL.into()]
                })
            );
        }
    }

    #[test]
    fn test_nested_try_catches_innermost_first() {
        let module = module(
            "try:\n    try:\n        work(data)\n    except Inner:\n        pass\nexcept Outer:\n    pass",
        );
        let graph = build(&module).unwrap();
        let task = graph.states().find(|s| s.kind == StateKind::Task).unwrap().id;
        let catches: Vec<Vec<String>> = graph
            .outgoing(task)
            .into_iter()
            .filter_map(|e| match &e.attrs {
                EdgeAttrs::Catch { errors } => Some(errors.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(catches, vec![vec!["Inner".to_string()], vec!["Outer".to_string()]]);
    }

    #[test]
    fn test_return_and_raise_are_terminal() {
        let module = module("if data[\"x\"]:\n    return\nraise Oops(\"no\")");
        let graph = build(&module).unwrap();
        assert!(graph.outgoing(graph.states().find(|s| s.name == "Succeed-L3C9").unwrap().id).is_empty());
        assert!(edge(&graph, "Choice-L2C5", "Fail-L4C5").is_some());
    }

    #[test]
    fn test_unreachable_statement() {
        let first = module("return\ndata[\"x\"] = 1");
        let err = build(&first).unwrap_err();
        assert!(err.message.contains("Unreachable"));
        assert_eq!(err.position.line, 3);

        let module = module("if data[\"x\"]:\n    return\nelse:\n    raise Oops\npass");
        assert!(build(&module).is_err());
    }

    #[test]
    fn test_rejected_statements() {
        for body in [
            "data.update({\"a\": 1}, {\"b\": 2})",
            "data = {\"a\": 1}",
            "data[\"x\"] += 1",
            "raise",
            "data[\"x\"] = wait(seconds=1)",
            "data[\"x\"] = obj.method(data)",
            "\"stray\"\n\"string\"",
            "data[\"x\"]",
            "try:\n    pass\nexcept:\n    pass",
            "try:\n    work(data)\nexcept Exception as e:\n    pass",
            "try:\n    work(data)\nexcept:\n    pass\nexcept Other:\n    pass",
            "try:\n    work(data)\nexcept (States.ALL, Other):\n    pass",
        ] {
            let module = module(body);
            assert!(build(&module).is_err(), "expected failure for {:?}", body);
        }
    }

    #[test]
    fn test_local_function_is_not_a_task() {
        let module = parse("def main(data):\n    helper(data)\n\ndef helper(data):\n    pass\n").unwrap();
        let err = build(&module).unwrap_err();
        assert!(err.message.contains("parallel() or map()"));
    }

    #[test]
    fn test_intrinsics() {
        let module = module(
            "wait(seconds=5)\ndata[\"p\"] = parallel(_a, _b)\ndata[\"m\"] = map(_each, data[\"items\"])\ndata.update({\"k\": 1})\ndata |= {\"k\": 2}",
        );
        let graph = build(&module).unwrap();
        let kinds: Vec<StateKind> = graph.states().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StateKind::Wait,
                StateKind::Parallel,
                StateKind::Map,
                StateKind::Pass,
                StateKind::Pass
            ]
        );
    }
}
