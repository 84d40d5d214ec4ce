//! Compile driver
//!
//! Every public function of a module becomes one state machine. Functions
//! compile independently: a failure is recorded against its function and
//! the rest of the module still compiles.

use crate::builder::GraphBuilder;
use crate::config::CompilerConfig;
use crate::decorators::validate_decorators;
use crate::extract::DATA_ROOT;
use crate::serializer::{BranchResolver, Serializer};
use crate::shaping::elide_placeholders;
use fluxio_syntax::{FunctionDef, Module, Position, SyntaxError};
use fluxio_types::{
    ensure, CompileResult, CompiledStateMachine, StateMachineDefinition, UnsupportedOperation,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// Errors of the text-to-document entry points
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("Unsupported operation: {0}")]
    Unsupported(#[from] UnsupportedOperation),

    #[error("Function '{0}' not found")]
    FunctionNotFound(String),
}

/// A function that did not compile
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FunctionFailure {
    pub function: String,
    pub error: UnsupportedOperation,
}

/// Everything compiled from one module
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CompileOutput {
    pub machines: Vec<CompiledStateMachine>,
    pub failures: Vec<FunctionFailure>,
}

impl CompileOutput {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn machine(&self, name: &str) -> Option<&CompiledStateMachine> {
        self.machines.iter().find(|m| m.name == name)
    }
}

/// Compiles Fluxio modules into state machine documents
#[derive(Clone, Debug, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Parse `source` and compile every public function in it
    pub fn compile_source(&self, source: &str) -> Result<CompileOutput, CompileError> {
        let module = fluxio_syntax::parse(source)?;
        Ok(self.compile_module(&module))
    }

    /// Parse `source` and compile the single function `name`
    pub fn compile_machine(&self, source: &str, name: &str) -> Result<CompiledStateMachine, CompileError> {
        let module = fluxio_syntax::parse(source)?;
        let function = module
            .function(name)
            .ok_or_else(|| CompileError::FunctionNotFound(name.to_string()))?;
        Ok(self.compile_function(&module, function)?)
    }

    pub fn compile_module(&self, module: &Module) -> CompileOutput {
        let mut output = CompileOutput::default();

        for function in &module.functions {
            let result = if function.is_private() {
                match function.decorators.first() {
                    Some(decorator) => Err(UnsupportedOperation::new(
                        format!(
                            "Private function '{}' is only compiled as a branch and cannot take decorators",
                            function.name
                        ),
                        decorator.pos,
                    )),
                    None => continue,
                }
            } else {
                self.compile_function(module, function)
            };

            match result {
                Ok(machine) => output.machines.push(machine),
                Err(error) => {
                    tracing::warn!(
                        function = %function.name,
                        line = error.position.line,
                        column = error.position.column,
                        "Function failed to compile: {}",
                        error.message
                    );
                    output.failures.push(FunctionFailure {
                        function: function.name.clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            machines = output.machines.len(),
            failures = output.failures.len(),
            "Compiled module"
        );
        output
    }

    /// Validate the decorators of `function` and compile its body
    pub fn compile_function(&self, module: &Module, function: &FunctionDef) -> CompileResult<CompiledStateMachine> {
        let effects = validate_decorators(function)?;
        let definition = self.compile_definition(module, function, &mut BranchScope::default())?;
        Ok(CompiledStateMachine {
            name: function.name.clone(),
            definition,
            effects,
        })
    }

    fn compile_definition(
        &self,
        module: &Module,
        function: &FunctionDef,
        scope: &mut BranchScope,
    ) -> CompileResult<StateMachineDefinition> {
        ensure(
            function.params.len() == 1 && function.params[0] == DATA_ROOT,
            format!(
                "Function '{}' must take exactly one parameter named '{}'",
                function.name, DATA_ROOT
            ),
            function.pos,
        )?;

        let mut graph = GraphBuilder::new(module).build(function)?;
        elide_placeholders(&mut graph);
        graph.validate()?;

        let comment = if self.config.include_comments {
            function.docstring().map(|doc| doc.trim().to_string())
        } else {
            None
        };

        scope.stack.push(function.name.clone());
        let mut branches = ModuleBranches {
            compiler: self,
            module,
            scope: &mut *scope,
        };
        let definition = Serializer::new(&graph, &self.config, &mut branches).serialize(comment)?;
        scope.stack.pop();

        tracing::debug!(
            function = %function.name,
            states = definition.states.len(),
            "Serialized state machine"
        );
        Ok(definition)
    }
}

/// Branch bookkeeping for one top-level state machine
#[derive(Debug, Default)]
struct BranchScope {
    /// Functions currently being compiled, outermost first
    stack: Vec<String>,
    /// Branch functions already inlined somewhere in the machine
    used: HashSet<String>,
}

/// Resolves branch functions against the module being compiled
struct ModuleBranches<'c> {
    compiler: &'c Compiler,
    module: &'c Module,
    scope: &'c mut BranchScope,
}

impl BranchResolver for ModuleBranches<'_> {
    fn resolve(&mut self, name: &str, position: Position) -> CompileResult<Value> {
        let function = self.module.function(name).ok_or_else(|| {
            UnsupportedOperation::new(
                format!("Branch function '{}' is not defined in this module", name),
                position,
            )
        })?;

        if self.scope.stack.iter().any(|f| f == name) {
            return Err(UnsupportedOperation::new(
                format!(
                    "Branch function '{}' runs itself recursively: {} -> {}",
                    name,
                    self.scope.stack.join(" -> "),
                    name
                ),
                position,
            ));
        }

        // State names must be unique across every branch of a machine
        ensure(
            self.scope.used.insert(name.to_string()),
            format!(
                "Branch function '{}' is already used in this state machine; each branch function can run in only one place",
                name
            ),
            position,
        )?;

        let definition = self
            .compiler
            .compile_definition(self.module, function, self.scope)?;
        Ok(definition.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failures_do_not_stop_other_functions() {
        let output = Compiler::default()
            .compile_source("def good(data):\n    data[\"a\"] = 1\n\ndef bad(data):\n    data[\"b\"] = other\n")
            .unwrap();
        assert_eq!(output.machines.len(), 1);
        assert_eq!(output.machines[0].name, "good");
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].function, "bad");
        assert_eq!(output.failures[0].error.position.line, 5);
        assert!(!output.is_success());
    }

    #[test]
    fn test_private_functions() {
        let output = Compiler::default()
            .compile_source("def main(data):\n    pass\n\ndef _branch(data):\n    pass\n\n@export\ndef _hidden(data):\n    pass\n")
            .unwrap();
        assert_eq!(output.machines.len(), 1);
        assert!(output.machine("_branch").is_none());
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].function, "_hidden");
        assert!(output.failures[0].error.message.contains("cannot take decorators"));
    }

    #[test]
    fn test_comment_from_docstring() {
        let source = "def main(data):\n    \"\"\" Load the order \"\"\"\n    data[\"a\"] = 1\n";
        let machine = Compiler::default().compile_machine(source, "main").unwrap();
        assert_eq!(machine.definition.comment.as_deref(), Some("Load the order"));

        let quiet = Compiler::new(CompilerConfig {
            include_comments: false,
            ..CompilerConfig::default()
        });
        let machine = quiet.compile_machine(source, "main").unwrap();
        assert_eq!(machine.definition.comment, None);
    }

    #[test]
    fn test_branches_compile_nested_documents() {
        let source = "def main(data):\n    data[\"r\"] = parallel(_left, _right)\n\ndef _left(data):\n    data[\"l\"] = 1\n\ndef _right(data):\n    return data\n";
        let machine = Compiler::default().compile_machine(source, "main").unwrap();
        assert_eq!(
            machine.definition.states["Parallel-L2C5"]["Branches"],
            json!([
                {"StartAt": "Pass-L5C5", "States": {"Pass-L5C5": {"Type": "Pass", "Result": 1, "ResultPath": "$['l']", "End": true}}},
                {"StartAt": "Succeed-L8C5", "States": {"Succeed-L8C5": {"Type": "Succeed", "OutputPath": "$"}}}
            ])
        );
    }

    #[test]
    fn test_branch_errors() {
        let compiler = Compiler::default();
        let missing = compiler
            .compile_machine("def main(data):\n    data[\"r\"] = parallel(_nowhere)\n", "main")
            .unwrap_err();
        assert!(matches!(missing, CompileError::Unsupported(ref e) if e.message.contains("not defined")));

        let recursive = compiler
            .compile_machine(
                "def main(data):\n    data[\"r\"] = map(_each, data[\"items\"])\n\ndef _each(data):\n    data[\"r\"] = parallel(_each)\n",
                "main",
            )
            .unwrap_err();
        assert!(matches!(recursive, CompileError::Unsupported(ref e) if e.message.contains("recursively")));
    }

    #[test]
    fn test_branch_reuse_is_rejected() {
        let compiler = Compiler::default();
        let twice = compiler
            .compile_machine(
                "def main(data):\n    data[\"p\"] = parallel(_a, _a)\n\ndef _a(data):\n    data[\"x\"] = 1\n",
                "main",
            )
            .unwrap_err();
        match twice {
            CompileError::Unsupported(e) => {
                assert!(e.message.contains("already used"));
                assert_eq!((e.position.line, e.position.column), (2, 30));
            }
            other => panic!("expected unsupported operation, got {:?}", other),
        }

        let two_states = compiler
            .compile_machine(
                "def main(data):\n    data[\"p\"] = parallel(_a)\n    data[\"m\"] = map(_a, data[\"items\"])\n\ndef _a(data):\n    data[\"x\"] = 1\n",
                "main",
            )
            .unwrap_err();
        assert!(matches!(two_states, CompileError::Unsupported(ref e) if e.message.contains("'_a' is already used")));

        // Shared through a nested branch
        let nested = compiler
            .compile_machine(
                "def main(data):\n    data[\"p\"] = parallel(_a, _b)\n\ndef _a(data):\n    data[\"q\"] = parallel(_b)\n\ndef _b(data):\n    data[\"x\"] = 1\n",
                "main",
            )
            .unwrap_err();
        assert!(matches!(nested, CompileError::Unsupported(ref e) if e.message.contains("'_b' is already used")));

        // Separate machines may share a branch function
        let output = compiler
            .compile_source(
                "def one(data):\n    data[\"p\"] = parallel(_a)\n\ndef two(data):\n    data[\"p\"] = parallel(_a)\n\ndef _a(data):\n    data[\"x\"] = 1\n",
            )
            .unwrap();
        assert!(output.is_success());
        assert_eq!(output.machines.len(), 2);
    }

    #[test]
    fn test_signature_and_lookup_errors() {
        let compiler = Compiler::default();
        assert!(matches!(
            compiler.compile_machine("def main(event):\n    pass\n", "main"),
            Err(CompileError::Unsupported(_))
        ));
        assert!(matches!(
            compiler.compile_machine("def main(data):\n    pass\n", "other"),
            Err(CompileError::FunctionNotFound(name)) if name == "other"
        ));
        assert!(matches!(
            compiler.compile_source("def main(data):\n    while True:\n        pass\n"),
            Err(CompileError::Syntax(_))
        ));
    }
}
