//! The compile-time error kind

use fluxio_syntax::Position;
use serde::{Deserialize, Serialize};

/// A construct the compiler cannot translate, with where it was found
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (line {}, column {})", .position.line, .position.column)]
pub struct UnsupportedOperation {
    pub message: String,
    pub position: Position,
}

impl UnsupportedOperation {
    pub fn new(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Result type alias for compile operations
pub type CompileResult<T> = Result<T, UnsupportedOperation>;

/// Fail with `message` at `position` unless `condition` holds
pub fn ensure(condition: bool, message: impl Into<String>, position: Position) -> CompileResult<()> {
    if condition {
        Ok(())
    } else {
        Err(UnsupportedOperation::new(message, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UnsupportedOperation::new("Unknown decorator 'deploy'", Position::new(3, 2));
        assert_eq!(err.to_string(), "Unknown decorator 'deploy' (line 3, column 2)");
    }

    #[test]
    fn test_ensure() {
        assert!(ensure(true, "never", Position::new(1, 1)).is_ok());

        let err = ensure(false, "must hold", Position::new(7, 9)).unwrap_err();
        assert_eq!(err.message, "must hold");
        assert_eq!(err.position, Position::new(7, 9));
    }

    #[test]
    fn test_error_serializes_with_position() {
        let err = UnsupportedOperation::new("bad", Position::new(2, 5));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["position"]["line"], 2);
        assert_eq!(json["message"], "bad");
    }
}
