//! State serialization: shaped graph to ASL
//!
//! Each state is rebuilt from its origin statement. Keys come out in a
//! fixed order: `Type`, the state's own fields, then `Next`/`End` (or
//! `Choices`/`Default`), then `Retry` and `Catch`.

use crate::config::CompilerConfig;
use crate::extract::{self, DATA_ROOT};
use crate::options::{resolve_options, MAP, PARALLEL, TASK, WAIT};
use fluxio_syntax::{Expr, ExprKind, Keyword, Position, Stmt, StmtKind};
use fluxio_types::{
    ensure, CompileResult, EdgeAttrs, StateGraph, StateId, StateKind, StateMachineDefinition,
    StateNode, UnsupportedOperation,
};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::LazyLock;

/// Top-level data keys the runtime reserves for control metadata
pub const RESERVED_KEYS: &[&str] = &["__trace", "Result", "ResultPath", "InputPath", "OutputPath"];

/// Matches a result path whose first key is reserved, in any letter case
static RESERVED_PATH: LazyLock<Regex> = LazyLock::new(|| {
    let keys: Vec<String> = RESERVED_KEYS.iter().map(|k| regex::escape(k)).collect();
    Regex::new(&format!(r"^\$\['(?i:{})'\]", keys.join("|"))).expect("Valid regex pattern")
});

/// Compiles the functions named as Parallel branches or Map iterators
pub trait BranchResolver {
    /// The nested `{StartAt, States}` document of function `name`
    fn resolve(&mut self, name: &str, position: Position) -> CompileResult<Value>;
}

/// Serializes one shaped graph into a state machine document
pub struct Serializer<'g, 'a> {
    graph: &'g StateGraph<'a>,
    config: &'g CompilerConfig,
    branches: &'g mut dyn BranchResolver,
}

/// The call inside a call statement, with its assignment target
struct CallSite<'s> {
    target: Option<&'s Expr>,
    func: &'s Expr,
    args: &'s [Expr],
    keywords: &'s [Keyword],
    pos: Position,
}

impl<'g, 'a> Serializer<'g, 'a> {
    pub fn new(
        graph: &'g StateGraph<'a>,
        config: &'g CompilerConfig,
        branches: &'g mut dyn BranchResolver,
    ) -> Self {
        Self {
            graph,
            config,
            branches,
        }
    }

    pub fn serialize(mut self, comment: Option<String>) -> CompileResult<StateMachineDefinition> {
        let graph = self.graph;
        let start_at = graph
            .start()
            .and_then(|id| graph.name_of(id))
            .ok_or_else(|| UnsupportedOperation::new("State machine has no start state", Position::default()))?
            .to_string();

        let mut states = Map::new();
        for node in graph.states() {
            states.insert(node.name.clone(), self.state(node)?);
        }

        Ok(StateMachineDefinition {
            comment,
            start_at,
            states,
        })
    }

    fn state(&mut self, node: &StateNode<'a>) -> CompileResult<Value> {
        let mut state = Map::new();
        state.insert("Type".into(), json!(node.kind.type_name()));

        let retry = match node.kind {
            StateKind::Pass => {
                self.pass_fields(node.origin, &mut state)?;
                None
            }
            StateKind::Task => self.task_fields(node.origin, &mut state)?,
            StateKind::Wait => {
                self.wait_fields(node.origin, &mut state)?;
                None
            }
            StateKind::Parallel => self.parallel_fields(node.origin, &mut state)?,
            StateKind::Map => self.map_fields(node.origin, &mut state)?,
            StateKind::Succeed => {
                succeed_fields(node.origin, &mut state)?;
                None
            }
            StateKind::Fail => {
                fail_fields(node.origin, &mut state)?;
                None
            }
            StateKind::Choice => None,
        };

        if node.kind == StateKind::Choice {
            self.choice_transitions(node, &mut state)?;
        } else if !node.kind.is_terminal() {
            self.transitions(node, &mut state)?;
        }

        if let Some(retry) = retry {
            state.insert("Retry".into(), retry);
        }
        if node.kind.is_catchable() {
            self.catchers(node.id, &mut state)?;
        }

        Ok(Value::Object(state))
    }

    // ── Transitions ──────────────────────────────────────────────────

    fn transitions(&self, node: &StateNode<'a>, state: &mut Map<String, Value>) -> CompileResult<()> {
        let mut next = None;
        for edge in self.graph.outgoing(node.id) {
            match edge.attrs {
                EdgeAttrs::Next => {
                    ensure(
                        next.is_none(),
                        format!("State '{}' has more than one successor", node.name),
                        node.origin.pos,
                    )?;
                    next = Some(edge.to);
                }
                EdgeAttrs::Catch { .. } => {}
                EdgeAttrs::Rule(_) | EdgeAttrs::Default => {
                    return Err(UnsupportedOperation::new(
                        format!("{} state '{}' cannot branch", node.kind, node.name),
                        node.origin.pos,
                    ))
                }
            }
        }

        match next {
            Some(next) => state.insert("Next".into(), json!(self.name(next)?)),
            None => state.insert("End".into(), json!(true)),
        };
        Ok(())
    }

    fn choice_transitions(&self, node: &StateNode<'a>, state: &mut Map<String, Value>) -> CompileResult<()> {
        let mut choices = Vec::new();
        let mut default = None;

        for edge in self.graph.outgoing(node.id) {
            match &edge.attrs {
                EdgeAttrs::Rule(rule) => {
                    let mut rule = rule.clone();
                    if let Value::Object(fields) = &mut rule {
                        fields.insert("Next".into(), json!(self.name(edge.to)?));
                    }
                    choices.push(rule);
                }
                EdgeAttrs::Default => default = Some(edge.to),
                EdgeAttrs::Next | EdgeAttrs::Catch { .. } => {
                    return Err(UnsupportedOperation::new(
                        format!("Choice state '{}' has an unconditional transition", node.name),
                        node.origin.pos,
                    ))
                }
            }
        }

        ensure(
            !choices.is_empty(),
            format!("Choice state '{}' has no rules", node.name),
            node.origin.pos,
        )?;
        state.insert("Choices".into(), Value::Array(choices));
        if let Some(default) = default {
            state.insert("Default".into(), json!(self.name(default)?));
        }
        Ok(())
    }

    fn catchers(&self, id: StateId, state: &mut Map<String, Value>) -> CompileResult<()> {
        let mut catchers = Vec::new();
        for edge in self.graph.outgoing(id) {
            if let EdgeAttrs::Catch { errors } = &edge.attrs {
                catchers.push(json!({
                    "ErrorEquals": errors,
                    "Next": self.name(edge.to)?,
                }));
            }
        }
        if !catchers.is_empty() {
            state.insert("Catch".into(), Value::Array(catchers));
        }
        Ok(())
    }

    fn name(&self, id: StateId) -> CompileResult<String> {
        self.graph
            .name_of(id)
            .map(str::to_string)
            .ok_or_else(|| UnsupportedOperation::new(format!("Unknown state {}", id), Position::default()))
    }

    // ── Per-kind fields ──────────────────────────────────────────────

    fn pass_fields(&self, origin: &Stmt, state: &mut Map<String, Value>) -> CompileResult<()> {
        match &origin.kind {
            StmtKind::Pass => {}
            StmtKind::Assign { target, value } => {
                state.insert("Result".into(), extract::json(value)?);
                state.insert("ResultPath".into(), json!(result_path(target)?));
            }
            StmtKind::AugAssign { value, .. } => {
                state.insert("Result".into(), extract::dict(value)?);
                state.insert("ResultPath".into(), json!("$"));
            }
            StmtKind::Expr(Expr {
                kind: ExprKind::Call { args, .. },
                ..
            }) if args.len() == 1 => {
                state.insert("Result".into(), extract::dict(&args[0])?);
                state.insert("ResultPath".into(), json!("$"));
            }
            other => return Err(unexpected_origin(StateKind::Pass, other.label(), origin)),
        }
        Ok(())
    }

    fn task_fields(&self, origin: &Stmt, state: &mut Map<String, Value>) -> CompileResult<Option<Value>> {
        let call = call_site(origin)?;
        let name = call.func.as_name().unwrap_or_default();
        state.insert("Resource".into(), json!(self.config.task_resource(name)));

        match call.args {
            [] => {}
            [input] => {
                state.insert("InputPath".into(), json!(extract::data_path(input)?));
            }
            [_, extra, ..] => {
                return Err(UnsupportedOperation::new(
                    "Tasks take at most one positional argument: the input data reference",
                    extra.pos,
                ))
            }
        }
        state.insert("ResultPath".into(), call.result_path()?);

        let mut options = resolve_options(&TASK, call.keywords, call.pos)?;
        if let (Some(timeout), Some(heartbeat)) = (
            options.get("timeout").and_then(Value::as_i64),
            options.get("heartbeat").and_then(Value::as_i64),
        ) {
            ensure(
                heartbeat < timeout,
                "heartbeat must be shorter than timeout",
                call.pos,
            )?;
        }
        if let Some(timeout) = options.remove("timeout") {
            state.insert("TimeoutSeconds".into(), timeout);
        }
        if let Some(heartbeat) = options.remove("heartbeat") {
            state.insert("HeartbeatSeconds".into(), heartbeat);
        }
        Ok(options.remove("retry"))
    }

    fn wait_fields(&self, origin: &Stmt, state: &mut Map<String, Value>) -> CompileResult<()> {
        let call = call_site(origin)?;
        if let Some(arg) = call.args.first() {
            return Err(UnsupportedOperation::new(
                "wait() only takes keyword arguments",
                arg.pos,
            ));
        }

        let options = resolve_options(&WAIT, call.keywords, call.pos)?;
        for (option, value) in options {
            let key = match option.as_str() {
                "seconds" => "Seconds",
                "timestamp" => "Timestamp",
                "seconds_path" => "SecondsPath",
                "timestamp_path" => "TimestampPath",
                other => {
                    return Err(UnsupportedOperation::new(
                        format!("Unknown wait() option '{}'", other),
                        call.pos,
                    ))
                }
            };
            state.insert(key.into(), value);
        }
        Ok(())
    }

    fn parallel_fields(&mut self, origin: &Stmt, state: &mut Map<String, Value>) -> CompileResult<Option<Value>> {
        let call = call_site(origin)?;
        ensure(
            !call.args.is_empty(),
            "parallel() needs at least one branch function",
            call.pos,
        )?;

        let mut branches = Vec::with_capacity(call.args.len());
        for arg in call.args {
            let name = branch_name(arg)?;
            branches.push(self.branches.resolve(name, arg.pos)?);
        }
        state.insert("Branches".into(), Value::Array(branches));
        state.insert("ResultPath".into(), call.result_path()?);

        let mut options = resolve_options(&PARALLEL, call.keywords, call.pos)?;
        Ok(options.remove("retry"))
    }

    fn map_fields(&mut self, origin: &Stmt, state: &mut Map<String, Value>) -> CompileResult<Option<Value>> {
        let call = call_site(origin)?;
        let (iterator, items) = match call.args {
            [iterator, items] => (iterator, items),
            _ => {
                return Err(UnsupportedOperation::new(
                    format!(
                        "map() takes an iterator function and a {} reference, e.g. map(_each, {}[\"items\"])",
                        DATA_ROOT, DATA_ROOT
                    ),
                    call.pos,
                ))
            }
        };

        let mut options = resolve_options(&MAP, call.keywords, call.pos)?;
        state.insert("ItemsPath".into(), json!(extract::data_path(items)?));
        if let Some(max_concurrency) = options.remove("max_concurrency") {
            state.insert("MaxConcurrency".into(), max_concurrency);
        }
        let name = branch_name(iterator)?;
        state.insert("Iterator".into(), self.branches.resolve(name, iterator.pos)?);
        state.insert("ResultPath".into(), call.result_path()?);
        Ok(options.remove("retry"))
    }
}

impl CallSite<'_> {
    /// `ResultPath` of the call: the assignment target, or null to discard
    fn result_path(&self) -> CompileResult<Value> {
        match self.target {
            Some(target) => Ok(json!(result_path(target)?)),
            None => Ok(Value::Null),
        }
    }
}

fn call_site(origin: &Stmt) -> CompileResult<CallSite<'_>> {
    let (target, expr) = match &origin.kind {
        StmtKind::Assign { target, value } => (Some(target), value),
        StmtKind::Expr(expr) => (None, expr),
        other => {
            return Err(UnsupportedOperation::new(
                format!("Expected a call statement, got {}", other.label()),
                origin.pos,
            ))
        }
    };

    match &expr.kind {
        ExprKind::Call {
            func,
            args,
            keywords,
        } => Ok(CallSite {
            target,
            func,
            args,
            keywords,
            pos: expr.pos,
        }),
        other => Err(UnsupportedOperation::new(
            format!("Expected a call, got {}", other.label()),
            expr.pos,
        )),
    }
}

fn branch_name(arg: &Expr) -> CompileResult<&str> {
    arg.as_name().ok_or_else(|| {
        UnsupportedOperation::new(
            format!("Branches are named by function, got {}", arg.kind.label()),
            arg.pos,
        )
    })
}

fn succeed_fields(origin: &Stmt, state: &mut Map<String, Value>) -> CompileResult<()> {
    if let StmtKind::Return(Some(value)) = &origin.kind {
        state.insert("OutputPath".into(), json!(extract::data_path(value)?));
    }
    Ok(())
}

fn fail_fields(origin: &Stmt, state: &mut Map<String, Value>) -> CompileResult<()> {
    let raised = match &origin.kind {
        StmtKind::Raise(Some(raised)) => raised,
        other => return Err(unexpected_origin(StateKind::Fail, other.label(), origin)),
    };

    let (error, cause) = match &raised.kind {
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            if let Some(keyword) = keywords.first() {
                return Err(UnsupportedOperation::new(
                    "Errors take a single string literal cause",
                    keyword.pos,
                ));
            }
            let cause = match args.as_slice() {
                [] => None,
                [cause] => Some(extract::string(cause)?),
                [_, extra, ..] => {
                    return Err(UnsupportedOperation::new(
                        "Errors take a single string literal cause",
                        extra.pos,
                    ))
                }
            };
            (extract::dotted_name(func), cause)
        }
        _ => (extract::dotted_name(raised), None),
    };

    let error = error.ok_or_else(|| {
        UnsupportedOperation::new(
            "Raise an error by name, e.g. raise Failed(\"cause\")",
            raised.pos,
        )
    })?;
    state.insert("Error".into(), json!(error));
    if let Some(cause) = cause {
        state.insert("Cause".into(), cause);
    }
    Ok(())
}

/// The JSONPath of an assignment target, rejecting reserved keys
pub fn result_path(target: &Expr) -> CompileResult<String> {
    let path = extract::data_path(target)?;
    ensure(
        !RESERVED_PATH.is_match(&path),
        format!(
            "Result path {} is invalid. Check that it does not contain reserved keys: {}",
            path,
            RESERVED_KEYS.join(", ")
        ),
        target.pos,
    )?;
    Ok(path)
}

fn unexpected_origin(kind: StateKind, found: &str, origin: &Stmt) -> UnsupportedOperation {
    UnsupportedOperation::new(
        format!("A {} state cannot be built from a {} statement", kind, found),
        origin.pos,
    )
}
