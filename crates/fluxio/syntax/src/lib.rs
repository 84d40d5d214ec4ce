//! Syntax layer for Fluxio state machine source
//!
//! State machines are written as a small, indentation-sensitive subset of
//! Python: decorated top-level `def` blocks whose bodies use assignments,
//! calls, `if`/`elif`/`else`, `try`/`except`, `return` and `raise`.
//!
//! ```text
//! @export
//! def main(data):
//!     """Process an order"""
//!     data["order"] = fetch_order(data["order_id"])
//!     if data["order"]["total"] > 100:
//!         data["review"] = True
//!     return data["order"]
//! ```
//!
//! # Pipeline
//!
//! 1. **Lex** ([`lexer`]): source text into tokens, including
//!    `Indent`/`Dedent` for block structure
//! 2. **Parse** ([`parser`]): tokens into a [`Module`] of [`FunctionDef`]s
//!
//! Everything outside the supported subset is rejected here, with the
//! line and column of the offending token.

#![deny(unsafe_code)]

pub mod ast;
pub mod errors;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use errors::{SyntaxError, SyntaxResult};
pub use parser::Parser;

/// Parse state machine source into a [`Module`]
pub fn parse(source: &str) -> SyntaxResult<Module> {
    Parser::parse(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry_point() {
        let module = parse("def main(data):\n    pass\n").unwrap();
        assert!(module.function("main").is_some());
    }

    #[test]
    fn test_position_serializes() {
        let json = serde_json::to_value(Position::new(4, 2)).unwrap();
        assert_eq!(json, serde_json::json!({"line": 4, "column": 2}));
    }

    #[test]
    fn test_error_display() {
        let err = parse("def main(data):\n    for x in data:\n        pass\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().contains("'for'"));
    }
}
