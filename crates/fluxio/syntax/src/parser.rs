//! Parser: recursive descent parser for state machine source
//!
//! Consumes tokens from the lexer and produces a [`Module`]: the
//! top-level function definitions with their decorators and bodies.
//! Only the statement and expression shapes the compiler understands are
//! accepted; keywords such as `while` or `import` fail here with their
//! position instead of reaching the compiler.

use crate::ast::{
    BinOp, BoolOp, CmpOp, Decorator, ExceptHandler, Expr, ExprKind, FunctionDef, Keyword, Module,
    Stmt, StmtKind, UnaryOp,
};
use crate::errors::{SyntaxError, SyntaxResult};
use crate::lexer::{Lexer, Token, TokenKind};

/// Parser for state machine source
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Parse source text into a Module
    pub fn parse(input: &str) -> SyntaxResult<Module> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;
        let mut parser = Self { tokens, pos: 0 };
        parser.parse_module()
    }

    fn parse_module(&mut self) -> SyntaxResult<Module> {
        let mut module = Module::default();

        loop {
            match self.peek_kind() {
                TokenKind::Newline => {
                    self.advance();
                }
                TokenKind::Eof => break,
                TokenKind::At | TokenKind::Def => {
                    let function = self.parse_function()?;
                    if module.function(&function.name).is_some() {
                        return Err(SyntaxError::ParseError {
                            line: function.pos.line,
                            col: function.pos.column,
                            message: format!("Function '{}' is defined more than once", function.name),
                        });
                    }
                    module.functions.push(function);
                }
                TokenKind::Reserved => return Err(self.unsupported_keyword()),
                _ => {
                    let tok = self.peek();
                    return Err(SyntaxError::ParseError {
                        line: tok.line,
                        col: tok.col,
                        message: "Only function definitions are allowed at the top level".into(),
                    });
                }
            }
        }

        Ok(module)
    }

    fn parse_function(&mut self) -> SyntaxResult<FunctionDef> {
        // @decorator(...) lines
        let mut decorators = Vec::new();
        while self.check(TokenKind::At) {
            let pos = self.advance().pos();
            let expr = self.parse_expression()?;
            self.expect(TokenKind::Newline)?;
            decorators.push(Decorator { expr, pos });
        }

        // def name(params):
        let pos = self.expect(TokenKind::Def)?.pos();
        let name = self.expect_identifier()?;
        self.expect(TokenKind::OpenParen)?;

        let mut params = Vec::new();
        while !self.check(TokenKind::CloseParen) {
            params.push(self.expect_identifier()?);
            if self.check(TokenKind::Colon) {
                // Annotations carry no meaning here
                self.advance();
                self.parse_expression()?;
            }
            if self.check(TokenKind::Assign) {
                let tok = self.peek();
                return Err(SyntaxError::ParseError {
                    line: tok.line,
                    col: tok.col,
                    message: "Default parameter values are not supported".into(),
                });
            }
            if !self.check(TokenKind::CloseParen) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.expect(TokenKind::CloseParen)?;

        if self.check(TokenKind::Arrow) {
            self.advance();
            self.parse_expression()?;
        }
        self.expect(TokenKind::Colon)?;
        let body = self.parse_block()?;

        Ok(FunctionDef {
            name,
            params,
            decorators,
            body,
            pos,
        })
    }

    fn parse_block(&mut self) -> SyntaxResult<Vec<Stmt>> {
        if !self.check(TokenKind::Newline) {
            // `if x: pass` style one-liner
            let stmt = self.parse_simple_statement()?;
            self.expect(TokenKind::Newline)?;
            return Ok(vec![stmt]);
        }

        self.advance();
        self.expect(TokenKind::Indent)?;
        let mut body = Vec::new();
        while !self.check(TokenKind::Dedent) && !self.check(TokenKind::Eof) {
            body.push(self.parse_statement()?);
        }
        self.expect(TokenKind::Dedent)?;
        Ok(body)
    }

    fn parse_statement(&mut self) -> SyntaxResult<Stmt> {
        match self.peek_kind() {
            TokenKind::If => self.parse_if(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Reserved => Err(self.unsupported_keyword()),
            TokenKind::Def | TokenKind::At => {
                let tok = self.peek();
                Err(SyntaxError::ParseError {
                    line: tok.line,
                    col: tok.col,
                    message: "Nested function definitions are not supported".into(),
                })
            }
            TokenKind::Indent => {
                let tok = self.peek();
                Err(SyntaxError::Indentation {
                    line: tok.line,
                    message: "unexpected indent".into(),
                })
            }
            _ => {
                let stmt = self.parse_simple_statement()?;
                self.expect(TokenKind::Newline)?;
                Ok(stmt)
            }
        }
    }

    fn parse_simple_statement(&mut self) -> SyntaxResult<Stmt> {
        let start = self.peek().pos();
        let kind = match self.peek_kind() {
            TokenKind::Pass => {
                self.advance();
                StmtKind::Pass
            }
            TokenKind::Return => {
                self.advance();
                StmtKind::Return(self.parse_optional_expression()?)
            }
            TokenKind::Raise => {
                self.advance();
                StmtKind::Raise(self.parse_optional_expression()?)
            }
            TokenKind::Reserved => return Err(self.unsupported_keyword()),
            _ => {
                let expr = self.parse_expression()?;
                if self.check(TokenKind::Assign) {
                    self.advance();
                    let value = self.parse_expression()?;
                    if self.check(TokenKind::Assign) {
                        let tok = self.peek();
                        return Err(SyntaxError::ParseError {
                            line: tok.line,
                            col: tok.col,
                            message: "Chained assignment is not supported".into(),
                        });
                    }
                    StmtKind::Assign {
                        target: expr,
                        value,
                    }
                } else if self.check(TokenKind::AugAssign) {
                    let tok = self.advance().clone();
                    let op = augmented_operator(&tok)?;
                    let value = self.parse_expression()?;
                    StmtKind::AugAssign {
                        target: expr,
                        op,
                        value,
                    }
                } else {
                    StmtKind::Expr(expr)
                }
            }
        };

        Ok(Stmt { kind, pos: start })
    }

    fn parse_optional_expression(&mut self) -> SyntaxResult<Option<Expr>> {
        if self.check(TokenKind::Newline) {
            Ok(None)
        } else {
            Ok(Some(self.parse_expression()?))
        }
    }

    /// Parses `if` and `elif`; an `elif` becomes a nested `If` in `orelse`
    fn parse_if(&mut self) -> SyntaxResult<Stmt> {
        let pos = self.advance().pos();
        let test = self.parse_expression()?;
        self.expect(TokenKind::Colon)?;
        let body = self.parse_block()?;

        let orelse = match self.peek_kind() {
            TokenKind::Elif => vec![self.parse_if()?],
            TokenKind::Else => {
                self.advance();
                self.expect(TokenKind::Colon)?;
                self.parse_block()?
            }
            _ => Vec::new(),
        };

        Ok(Stmt {
            kind: StmtKind::If { test, body, orelse },
            pos,
        })
    }

    fn parse_try(&mut self) -> SyntaxResult<Stmt> {
        let pos = self.expect(TokenKind::Try)?.pos();
        self.expect(TokenKind::Colon)?;
        let body = self.parse_block()?;

        let mut handlers = Vec::new();
        while self.check(TokenKind::Except) {
            let handler_pos = self.advance().pos();
            let typ = if self.check(TokenKind::Colon) {
                None
            } else {
                Some(self.parse_expression()?)
            };
            let name = if self.check(TokenKind::As) {
                self.advance();
                Some(self.expect_identifier()?)
            } else {
                None
            };
            self.expect(TokenKind::Colon)?;
            let handler_body = self.parse_block()?;
            handlers.push(ExceptHandler {
                typ,
                name,
                body: handler_body,
                pos: handler_pos,
            });
        }

        match self.peek_kind() {
            TokenKind::Reserved => return Err(self.unsupported_keyword()),
            TokenKind::Else => {
                let tok = self.peek();
                return Err(SyntaxError::UnsupportedKeyword {
                    line: tok.line,
                    col: tok.col,
                    keyword: "else".into(),
                });
            }
            _ => {}
        }

        if handlers.is_empty() {
            self.expect(TokenKind::Except)?;
        }

        Ok(Stmt {
            kind: StmtKind::Try { body, handlers },
            pos,
        })
    }

    // ── Expressions ─────────────────────────────────────────────────

    fn parse_expression(&mut self) -> SyntaxResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> SyntaxResult<Expr> {
        self.parse_bool_chain(TokenKind::Or, BoolOp::Or, Self::parse_and)
    }

    fn parse_and(&mut self) -> SyntaxResult<Expr> {
        self.parse_bool_chain(TokenKind::And, BoolOp::And, Self::parse_not)
    }

    fn parse_bool_chain(
        &mut self,
        token: TokenKind,
        op: BoolOp,
        operand: fn(&mut Self) -> SyntaxResult<Expr>,
    ) -> SyntaxResult<Expr> {
        let first = operand(self)?;
        if !self.check(token) {
            return Ok(first);
        }

        let pos = first.pos;
        let mut values = vec![first];
        while self.check(token) {
            self.advance();
            values.push(operand(self)?);
        }
        Ok(Expr::new(ExprKind::BoolOp { op, values }, pos))
    }

    fn parse_not(&mut self) -> SyntaxResult<Expr> {
        if self.check(TokenKind::Not) {
            let pos = self.advance().pos();
            let operand = self.parse_not()?;
            return Ok(Expr::new(
                ExprKind::UnaryOp {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                pos,
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> SyntaxResult<Expr> {
        let left = self.parse_bitor()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();

        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => CmpOp::Eq,
                TokenKind::NotEq => CmpOp::NotEq,
                TokenKind::Lt => CmpOp::Lt,
                TokenKind::LtE => CmpOp::LtE,
                TokenKind::Gt => CmpOp::Gt,
                TokenKind::GtE => CmpOp::GtE,
                TokenKind::In => CmpOp::In,
                TokenKind::Is if self.peek_kind_at(1) == TokenKind::Not => {
                    self.advance();
                    CmpOp::IsNot
                }
                TokenKind::Is => CmpOp::Is,
                TokenKind::Not if self.peek_kind_at(1) == TokenKind::In => {
                    self.advance();
                    CmpOp::NotIn
                }
                _ => break,
            };
            self.advance();
            ops.push(op);
            comparators.push(self.parse_bitor()?);
        }

        if ops.is_empty() {
            return Ok(left);
        }
        let pos = left.pos;
        Ok(Expr::new(
            ExprKind::Compare {
                left: Box::new(left),
                ops,
                comparators,
            },
            pos,
        ))
    }

    fn parse_bitor(&mut self) -> SyntaxResult<Expr> {
        let mut left = self.parse_arith()?;
        while self.check(TokenKind::Pipe) {
            self.advance();
            let right = self.parse_arith()?;
            left = binary(left, BinOp::BitOr, right);
        }
        Ok(left)
    }

    fn parse_arith(&mut self) -> SyntaxResult<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> SyntaxResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> SyntaxResult<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.parse_postfix(),
        };
        let pos = self.advance().pos();
        let operand = self.parse_unary()?;
        Ok(Expr::new(
            ExprKind::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            pos,
        ))
    }

    fn parse_postfix(&mut self) -> SyntaxResult<Expr> {
        let mut expr = self.parse_atom()?;

        loop {
            match self.peek_kind() {
                TokenKind::OpenBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    if self.check(TokenKind::Colon) {
                        let tok = self.peek();
                        return Err(SyntaxError::ParseError {
                            line: tok.line,
                            col: tok.col,
                            message: "Slices are not supported".into(),
                        });
                    }
                    self.expect(TokenKind::CloseBracket)?;
                    let pos = expr.pos;
                    expr = Expr::new(
                        ExprKind::Subscript {
                            value: Box::new(expr),
                            index: Box::new(index),
                        },
                        pos,
                    );
                }
                TokenKind::OpenParen => {
                    self.advance();
                    let (args, keywords) = self.parse_call_arguments()?;
                    let pos = expr.pos;
                    expr = Expr::new(
                        ExprKind::Call {
                            func: Box::new(expr),
                            args,
                            keywords,
                        },
                        pos,
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    let attr = self.expect_identifier()?;
                    let pos = expr.pos;
                    expr = Expr::new(
                        ExprKind::Attribute {
                            value: Box::new(expr),
                            attr,
                        },
                        pos,
                    );
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_call_arguments(&mut self) -> SyntaxResult<(Vec<Expr>, Vec<Keyword>)> {
        let mut args = Vec::new();
        let mut keywords: Vec<Keyword> = Vec::new();

        while !self.check(TokenKind::CloseParen) {
            if self.check(TokenKind::Identifier) && self.peek_kind_at(1) == TokenKind::Assign {
                let tok = self.advance().clone();
                self.advance();
                let value = self.parse_expression()?;
                keywords.push(Keyword {
                    name: tok.text.clone(),
                    value,
                    pos: tok.pos(),
                });
            } else {
                let arg = self.parse_expression()?;
                if !keywords.is_empty() {
                    return Err(SyntaxError::ParseError {
                        line: arg.pos.line,
                        col: arg.pos.column,
                        message: "Positional argument follows keyword argument".into(),
                    });
                }
                args.push(arg);
            }

            if !self.check(TokenKind::CloseParen) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.expect(TokenKind::CloseParen)?;

        Ok((args, keywords))
    }

    fn parse_atom(&mut self) -> SyntaxResult<Expr> {
        let tok = self.peek().clone();
        let pos = tok.pos();

        let kind = match tok.kind {
            TokenKind::Identifier => {
                self.advance();
                ExprKind::Name(tok.text)
            }
            TokenKind::StringLiteral => {
                // Adjacent literals concatenate
                let mut text = String::new();
                while self.check(TokenKind::StringLiteral) {
                    text.push_str(&self.advance().text);
                }
                ExprKind::Str(text)
            }
            TokenKind::IntLiteral => {
                self.advance();
                let value = tok.text.parse::<i64>().map_err(|_| SyntaxError::ParseError {
                    line: tok.line,
                    col: tok.col,
                    message: format!("Integer literal '{}' is out of range", tok.text),
                })?;
                ExprKind::Int(value)
            }
            TokenKind::FloatLiteral => {
                self.advance();
                let value = tok.text.parse::<f64>().map_err(|_| SyntaxError::ParseError {
                    line: tok.line,
                    col: tok.col,
                    message: format!("'{}' is not a valid number", tok.text),
                })?;
                ExprKind::Float(value)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::None => {
                self.advance();
                ExprKind::NoneLit
            }
            TokenKind::OpenParen => {
                self.advance();
                if self.check(TokenKind::CloseParen) {
                    self.advance();
                    ExprKind::Tuple(Vec::new())
                } else {
                    let first = self.parse_expression()?;
                    if self.check(TokenKind::Comma) {
                        let items = self.parse_sequence_tail(first, TokenKind::CloseParen)?;
                        ExprKind::Tuple(items)
                    } else {
                        self.expect(TokenKind::CloseParen)?;
                        return Ok(first);
                    }
                }
            }
            TokenKind::OpenBracket => {
                self.advance();
                if self.check(TokenKind::CloseBracket) {
                    self.advance();
                    ExprKind::List(Vec::new())
                } else {
                    let first = self.parse_expression()?;
                    ExprKind::List(self.parse_sequence_tail(first, TokenKind::CloseBracket)?)
                }
            }
            TokenKind::OpenBrace => {
                self.advance();
                self.parse_brace_literal()?
            }
            TokenKind::Reserved => return Err(self.unsupported_keyword()),
            TokenKind::Eof => return Err(SyntaxError::UnexpectedEof("expression".into())),
            _ => {
                return Err(SyntaxError::UnexpectedToken {
                    line: tok.line,
                    col: tok.col,
                    expected: "expression".into(),
                    found: display_text(&tok),
                })
            }
        };

        Ok(Expr::new(kind, pos))
    }

    /// Items after the first one of a list/tuple/set, consuming the closer
    fn parse_sequence_tail(&mut self, first: Expr, close: TokenKind) -> SyntaxResult<Vec<Expr>> {
        let mut items = vec![first];
        while self.check(TokenKind::Comma) {
            self.advance();
            if self.check(close) {
                break;
            }
            items.push(self.parse_expression()?);
        }
        self.expect(close)?;
        Ok(items)
    }

    fn parse_brace_literal(&mut self) -> SyntaxResult<ExprKind> {
        if self.check(TokenKind::CloseBrace) {
            self.advance();
            return Ok(ExprKind::Dict(Vec::new()));
        }

        let first = self.parse_expression()?;
        if !self.check(TokenKind::Colon) {
            return Ok(ExprKind::Set(
                self.parse_sequence_tail(first, TokenKind::CloseBrace)?,
            ));
        }

        self.advance();
        let mut entries = vec![(first, self.parse_expression()?)];
        while self.check(TokenKind::Comma) {
            self.advance();
            if self.check(TokenKind::CloseBrace) {
                break;
            }
            let key = self.parse_expression()?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expression()?;
            entries.push((key, value));
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(ExprKind::Dict(entries))
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        self.tokens[index].kind
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> &Token {
        let index = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        &self.tokens[index]
    }

    fn expect(&mut self, kind: TokenKind) -> SyntaxResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else if self.check(TokenKind::Eof) {
            Err(SyntaxError::UnexpectedEof(format!("{}", kind)))
        } else {
            let tok = self.peek();
            Err(SyntaxError::UnexpectedToken {
                line: tok.line,
                col: tok.col,
                expected: format!("{}", kind),
                found: display_text(tok),
            })
        }
    }

    fn expect_identifier(&mut self) -> SyntaxResult<String> {
        let tok = self.expect(TokenKind::Identifier)?;
        Ok(tok.text.clone())
    }

    fn unsupported_keyword(&self) -> SyntaxError {
        let tok = self.peek();
        SyntaxError::UnsupportedKeyword {
            line: tok.line,
            col: tok.col,
            keyword: tok.text.clone(),
        }
    }
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    let pos = left.pos;
    Expr::new(
        ExprKind::BinOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        pos,
    )
}

fn augmented_operator(tok: &Token) -> SyntaxResult<BinOp> {
    match tok.text.as_str() {
        "+=" => Ok(BinOp::Add),
        "-=" => Ok(BinOp::Sub),
        "*=" => Ok(BinOp::Mul),
        "/=" => Ok(BinOp::Div),
        "%=" => Ok(BinOp::Mod),
        "|=" => Ok(BinOp::BitOr),
        other => Err(SyntaxError::ParseError {
            line: tok.line,
            col: tok.col,
            message: format!("Unknown augmented assignment operator '{}'", other),
        }),
    }
}

fn display_text(tok: &Token) -> String {
    if tok.text.is_empty() {
        tok.kind.to_string()
    } else {
        tok.text.clone()
    }
}
