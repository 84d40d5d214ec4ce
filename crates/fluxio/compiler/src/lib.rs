//! Fluxio compiler: source functions to Amazon States Language
//!
//! Each public function of a Fluxio module compiles to one state machine
//! document plus the decorator effects that describe how it is deployed.
//!
//! ```ignore
//! use fluxio_compiler::Compiler;
//!
//! let output = Compiler::default().compile_source(
//!     "@export\ndef main(data):\n    data[\"status\"] = \"ok\"\n",
//! )?;
//! let machine = output.machine("main").unwrap();
//! println!("{}", serde_json::to_string_pretty(&machine.definition)?);
//! ```
//!
//! # Pipeline
//!
//! 1. **Decorators** ([`decorators`]): each decorator is checked against the
//!    option schema registry ([`options`]) and its arguments extracted
//!    ([`extract`])
//! 2. **Build** ([`builder`]): the body becomes a [`StateGraph`], with `if`
//!    conditions translated to Choice rules ([`conditions`])
//! 3. **Shape** ([`shaping`]): placeholder Pass states are elided
//! 4. **Serialize** ([`serializer`]): the graph becomes a
//!    [`StateMachineDefinition`]
//!
//! [`StateGraph`]: fluxio_types::StateGraph
//! [`StateMachineDefinition`]: fluxio_types::StateMachineDefinition

#![deny(unsafe_code)]

pub mod builder;
pub mod compiler;
pub mod conditions;
pub mod config;
pub mod decorators;
pub mod extract;
pub mod options;
pub mod serializer;
pub mod shaping;

pub use compiler::{CompileError, CompileOutput, Compiler, FunctionFailure};
pub use config::CompilerConfig;
pub use decorators::{validate_decorator, validate_decorators};
pub use options::{CallableSchema, OptionSchema, RESOURCE_DECORATORS};
pub use serializer::{BranchResolver, RESERVED_KEYS};
pub use shaping::elide_placeholders;

pub use fluxio_types::{
    CompileResult, CompiledStateMachine, DecoratorEffect, StateMachineDefinition, UnsupportedOperation,
};
