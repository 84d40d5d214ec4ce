//! Domain types for the Fluxio state machine compiler
//!
//! A compiled function passes through three representations:
//!
//! - [`StateGraph`]: an arena of [`StateNode`]s joined by [`Edge`]s, built
//!   from the function body and then shaped
//! - [`StateMachineDefinition`]: the Amazon States Language document
//!   serialized from the shaped graph
//! - [`CompiledStateMachine`]: the definition together with the
//!   [`DecoratorEffect`]s validated from the function's decorators
//!
//! Every compile-time violation is an [`UnsupportedOperation`] carrying
//! the source position of the offending construct.

#![deny(unsafe_code)]

pub mod document;
pub mod edge;
pub mod effect;
pub mod error;
pub mod graph;

pub use document::{CompiledStateMachine, StateMachineDefinition};
pub use edge::{Edge, EdgeAttrs};
pub use effect::DecoratorEffect;
pub use error::{ensure, CompileResult, UnsupportedOperation};
pub use graph::{StateGraph, StateId, StateKind, StateNode};

pub use fluxio_syntax::Position;
