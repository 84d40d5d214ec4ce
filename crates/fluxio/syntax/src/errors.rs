//! Syntax error types

/// Errors that can occur while tokenizing or parsing state machine source
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SyntaxError {
    #[error("Parse error at line {line}, column {col}: {message}")]
    ParseError {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("Unexpected token at line {line}, column {col}: expected {expected}, found '{found}'")]
    UnexpectedToken {
        line: usize,
        col: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of input: expected {0}")]
    UnexpectedEof(String),

    #[error("Unsupported keyword at line {line}, column {col}: '{keyword}' is not part of the state machine language")]
    UnsupportedKeyword {
        line: usize,
        col: usize,
        keyword: String,
    },

    #[error("Indentation error at line {line}: {message}")]
    Indentation { line: usize, message: String },
}

impl SyntaxError {
    /// Line the error points at, when known
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::ParseError { line, .. }
            | Self::UnexpectedToken { line, .. }
            | Self::UnsupportedKeyword { line, .. }
            | Self::Indentation { line, .. } => Some(*line),
            Self::UnexpectedEof(_) => None,
        }
    }
}

/// Result type alias for syntax operations
pub type SyntaxResult<T> = Result<T, SyntaxError>;
