//! Abstract syntax tree for state machine source
//!
//! Every statement and expression carries the [`Position`] it was parsed
//! from so later stages can point diagnostics at the offending construct.
//! The tree is a closed set of shapes: consumers match on [`StmtKind`] and
//! [`ExprKind`] exhaustively instead of probing node types.

use serde::{Deserialize, Serialize};

/// A 1-based source location
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A parsed source file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Module {
    pub functions: Vec<FunctionDef>,
}

impl Module {
    /// Look up a top-level function by name
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// A top-level `def`
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub decorators: Vec<Decorator>,
    pub body: Vec<Stmt>,
    pub pos: Position,
}

impl FunctionDef {
    /// The leading string literal of the body, if any
    pub fn docstring(&self) -> Option<&str> {
        match self.body.first().map(|s| &s.kind) {
            Some(StmtKind::Expr(Expr {
                kind: ExprKind::Str(text),
                ..
            })) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Body statements with the docstring removed
    pub fn statements(&self) -> &[Stmt] {
        if self.docstring().is_some() {
            &self.body[1..]
        } else {
            &self.body
        }
    }

    /// Private functions (leading underscore) only serve as branch bodies
    pub fn is_private(&self) -> bool {
        self.name.starts_with('_')
    }
}

/// `@expr` line attached to a function
#[derive(Clone, Debug, PartialEq)]
pub struct Decorator {
    pub expr: Expr,
    pub pos: Position,
}

/// A statement
#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    /// The explicit no-op marker
    Pass,
    Expr(Expr),
    Assign {
        target: Expr,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    Return(Option<Expr>),
    Raise(Option<Expr>),
    /// `elif` chains are nested as a single `If` inside `orelse`
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
    },
}

impl StmtKind {
    /// Short label used in diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Expr(_) => "expression",
            Self::Assign { .. } => "assignment",
            Self::AugAssign { .. } => "augmented assignment",
            Self::Return(_) => "return",
            Self::Raise(_) => "raise",
            Self::If { .. } => "if",
            Self::Try { .. } => "try",
        }
    }
}

/// One `except` clause
#[derive(Clone, Debug, PartialEq)]
pub struct ExceptHandler {
    /// `None` for a bare `except:`
    pub typ: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub pos: Position,
}

/// An expression
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Self { kind, pos }
    }

    /// The identifier if this is a bare name
    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Name(String),
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    NoneLit,
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Set(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BinOp {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    BoolOp {
        op: BoolOp,
        values: Vec<Expr>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
}

impl ExprKind {
    /// Short label used in diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name(_) => "name",
            Self::Str(_) => "string",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "boolean",
            Self::NoneLit => "None",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Set(_) => "set",
            Self::Dict(_) => "dict",
            Self::Subscript { .. } => "subscript",
            Self::Attribute { .. } => "attribute",
            Self::Call { .. } => "call",
            Self::UnaryOp { .. } => "unary operation",
            Self::BinOp { .. } => "binary operation",
            Self::BoolOp { .. } => "boolean operation",
            Self::Compare { .. } => "comparison",
        }
    }
}

/// `name=value` argument of a call
#[derive(Clone, Debug, PartialEq)]
pub struct Keyword {
    pub name: String,
    pub value: Expr,
    pub pos: Position,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitOr,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::BitOr => "|",
        };
        f.write_str(symbol)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOp {
    /// The operator with its operands swapped (`a < b` == `b > a`)
    pub fn flipped(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::LtE => Self::GtE,
            Self::Gt => Self::Lt,
            Self::GtE => Self::LtE,
            other => other,
        }
    }
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        };
        f.write_str(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt {
            kind,
            pos: Position::new(1, 1),
        }
    }

    #[test]
    fn test_docstring_is_split_from_statements() {
        let func = FunctionDef {
            name: "main".into(),
            params: vec!["data".into()],
            decorators: vec![],
            body: vec![
                stmt(StmtKind::Expr(Expr::new(
                    ExprKind::Str("Say hello".into()),
                    Position::new(2, 5),
                ))),
                stmt(StmtKind::Pass),
            ],
            pos: Position::new(1, 1),
        };

        assert_eq!(func.docstring(), Some("Say hello"));
        assert_eq!(func.statements().len(), 1);
        assert!(!func.is_private());
    }

    #[test]
    fn test_flipped_comparison() {
        assert_eq!(CmpOp::Lt.flipped(), CmpOp::Gt);
        assert_eq!(CmpOp::GtE.flipped(), CmpOp::LtE);
        assert_eq!(CmpOp::Eq.flipped(), CmpOp::Eq);
    }

    #[test]
    fn test_position_display() {
        assert_eq!(Position::new(3, 14).to_string(), "3:14");
    }
}
