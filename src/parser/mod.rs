//! # Parser
//!
//! Recursive descent over declarations and statements; Pratt-style
//! precedence climbing for expressions. Consumes the full token stream —
//! any leftover tokens after the last function is a [`ParseError`].
//!
//! [`ParseError`]: crate::error::ErrorKind::Parse

pub mod ast;

#[cfg(test)]
mod tests;

use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::lexer::token::{Token, TokenKind};
use ast::*;

#[must_use]
pub fn parse(tokens: &[Token]) -> CompileResult<Program> {
    let span = tracing::debug_span!("parse");
    let _enter = span.enter();

    let mut parser = Parser { tokens, pos: 0 };
    let program = parser.parse_program()?;

    tracing::debug!(functions = program.functions.len(), "parsed");
    Ok(program)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: &TokenKind) -> CompileResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        let tok = self.peek();
        CompileError::new(
            ErrorKind::Parse,
            format!("expected {expected}, found {}", tok.kind.describe()),
            tok.span,
        )
    }

    fn expect_identifier(&mut self) -> CompileResult<String> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn parse_program(&mut self) -> CompileResult<Program> {
        let mut functions = Vec::new();
        while !self.check(&TokenKind::Eof) {
            functions.push(self.parse_function()?);
        }
        Ok(Program { functions })
    }

    fn parse_function(&mut self) -> CompileResult<Function> {
        self.expect(&TokenKind::KwInt)?;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::OpenParen)?;
        self.expect(&TokenKind::KwVoid)?;
        self.expect(&TokenKind::CloseParen)?;
        let body = self.parse_block()?;
        Ok(Function { name, body })
    }

    fn parse_block(&mut self) -> CompileResult<Block> {
        self.expect(&TokenKind::OpenBrace)?;
        let mut items = Vec::new();
        while !self.check(&TokenKind::CloseBrace) {
            items.push(self.parse_block_item()?);
        }
        self.expect(&TokenKind::CloseBrace)?;
        Ok(Block { items })
    }

    fn parse_block_item(&mut self) -> CompileResult<BlockItem> {
        if self.check(&TokenKind::KwInt) {
            Ok(BlockItem::Decl(self.parse_declaration()?))
        } else {
            Ok(BlockItem::Stmt(self.parse_statement()?))
        }
    }

    fn parse_declaration(&mut self) -> CompileResult<Declaration> {
        self.expect(&TokenKind::KwInt)?;
        let name = self.expect_identifier()?;
        let init = if self.check(&TokenKind::Equal) {
            self.advance();
            Some(self.parse_expression(0)?)
        } else {
            None
        };
        self.expect(&TokenKind::Semicolon)?;
        Ok(Declaration { name, init })
    }

    fn parse_for_init(&mut self) -> CompileResult<ForInit> {
        if self.check(&TokenKind::KwInt) {
            return Ok(ForInit::Decl(self.parse_declaration()?));
        }
        if self.check(&TokenKind::Semicolon) {
            self.advance();
            return Ok(ForInit::Expr(None));
        }
        let expr = self.parse_expression(0)?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(ForInit::Expr(Some(expr)))
    }

    /// A labeled statement is `IDENT :` followed by another statement; this
    /// needs one token of lookahead past the leading identifier.
    fn looks_like_label(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Identifier(_))
            && self
                .tokens
                .get(self.pos + 1)
                .is_some_and(|t| t.kind == TokenKind::Colon)
    }

    fn parse_statement(&mut self) -> CompileResult<Statement> {
        match self.peek_kind() {
            TokenKind::KwReturn => {
                self.advance();
                let expr = self.parse_expression(0)?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Statement::Return(expr))
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Null)
            }
            TokenKind::KwIf => {
                self.advance();
                self.expect(&TokenKind::OpenParen)?;
                let cond = self.parse_expression(0)?;
                self.expect(&TokenKind::CloseParen)?;
                let then_branch = Box::new(self.parse_statement()?);
                let else_branch = if self.check(&TokenKind::KwElse) {
                    self.advance();
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Statement::If {
                    cond,
                    then_branch,
                    else_branch,
                })
            }
            TokenKind::KwGoto => {
                self.advance();
                let label = self.expect_identifier()?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Statement::Goto(label))
            }
            TokenKind::OpenBrace => Ok(Statement::Compound(self.parse_block()?)),
            TokenKind::KwBreak => {
                self.advance();
                self.expect(&TokenKind::Semicolon)?;
                Ok(Statement::Break { target: None })
            }
            TokenKind::KwContinue => {
                self.advance();
                self.expect(&TokenKind::Semicolon)?;
                Ok(Statement::Continue { target: None })
            }
            TokenKind::KwWhile => {
                self.advance();
                self.expect(&TokenKind::OpenParen)?;
                let cond = self.parse_expression(0)?;
                self.expect(&TokenKind::CloseParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::While {
                    cond,
                    body,
                    label: None,
                })
            }
            TokenKind::KwDo => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect(&TokenKind::KwWhile)?;
                self.expect(&TokenKind::OpenParen)?;
                let cond = self.parse_expression(0)?;
                self.expect(&TokenKind::CloseParen)?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Statement::DoWhile {
                    body,
                    cond,
                    label: None,
                })
            }
            TokenKind::KwFor => {
                self.advance();
                self.expect(&TokenKind::OpenParen)?;
                let init = self.parse_for_init()?;
                let cond = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression(0)?)
                };
                self.expect(&TokenKind::Semicolon)?;
                let post = if self.check(&TokenKind::CloseParen) {
                    None
                } else {
                    Some(self.parse_expression(0)?)
                };
                self.expect(&TokenKind::CloseParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::For {
                    init,
                    cond,
                    post,
                    body,
                    label: None,
                })
            }
            TokenKind::KwSwitch => {
                self.advance();
                self.expect(&TokenKind::OpenParen)?;
                let expr = self.parse_expression(0)?;
                self.expect(&TokenKind::CloseParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::Switch {
                    expr,
                    body,
                    label: None,
                    cases: Vec::new(),
                    has_default: false,
                })
            }
            TokenKind::KwCase => {
                self.advance();
                let const_expr = self.parse_expression(0)?;
                self.expect(&TokenKind::Colon)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::Case { const_expr, body })
            }
            TokenKind::KwDefault => {
                self.advance();
                self.expect(&TokenKind::Colon)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::Default { body })
            }
            _ if self.looks_like_label() => {
                let label = self.expect_identifier()?;
                self.expect(&TokenKind::Colon)?;
                let stmt = Box::new(self.parse_statement()?);
                Ok(Statement::LabeledStmt(label, stmt))
            }
            _ => {
                let expr = self.parse_expression(0)?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Statement::Expression(expr))
            }
        }
    }

    fn parse_expression(&mut self, min_prec: u8) -> CompileResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            if let Some(op) = assignment_op(self.peek_kind()) {
                if ASSIGNMENT_PREC < min_prec {
                    break;
                }
                self.advance();
                let rhs = self.parse_expression(ASSIGNMENT_PREC)?;
                left = match op {
                    Some(binop) => {
                        Expr::Assignment(Box::new(left.clone()), Box::new(Expr::Binary(binop, Box::new(left), Box::new(rhs))))
                    }
                    None => Expr::Assignment(Box::new(left), Box::new(rhs)),
                };
                continue;
            }

            if self.check(&TokenKind::Question) {
                if TERNARY_PREC < min_prec {
                    break;
                }
                self.advance();
                let then_expr = self.parse_expression(0)?;
                self.expect(&TokenKind::Colon)?;
                let else_expr = self.parse_expression(TERNARY_PREC)?;
                left = Expr::Conditional(Box::new(left), Box::new(then_expr), Box::new(else_expr));
                continue;
            }

            if let Some((op, prec)) = binary_op(self.peek_kind()) {
                if prec < min_prec {
                    break;
                }
                self.advance();
                let right = self.parse_expression(prec + 1)?;
                left = Expr::Binary(op, Box::new(left), Box::new(right));
                continue;
            }

            break;
        }

        Ok(left)
    }

    /// Prefix operators are right-binding: each recurses back into the full
    /// unary parser for its operand, so `~-!x` parses with `~` outermost.
    fn parse_unary(&mut self) -> CompileResult<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnaryOp::Negate),
            TokenKind::Tilde => Some(UnaryOp::Complement),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::PlusPlus => Some(UnaryOp::PreIncrement),
            TokenKind::MinusMinus => Some(UnaryOp::PreDecrement),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(op, Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> CompileResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::PlusPlus => {
                    self.advance();
                    expr = Expr::Unary(UnaryOp::PostIncrement, Box::new(expr));
                }
                TokenKind::MinusMinus => {
                    self.advance();
                    expr = Expr::Unary(UnaryOp::PostDecrement, Box::new(expr));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> CompileResult<Expr> {
        match self.peek_kind().clone() {
            TokenKind::Constant(lexeme) => {
                self.advance();
                let value = lexeme.parse::<i64>().map_err(|_| {
                    CompileError::new(
                        ErrorKind::Parse,
                        format!("invalid integer constant '{lexeme}'"),
                        self.peek().span,
                    )
                })?;
                Ok(Expr::Constant(value))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::Var(name))
            }
            TokenKind::OpenParen => {
                self.advance();
                let expr = self.parse_expression(0)?;
                self.expect(&TokenKind::CloseParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}

const TERNARY_PREC: u8 = 3;
const ASSIGNMENT_PREC: u8 = 1;

fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    use TokenKind::*;
    Some(match kind {
        Star => (BinaryOp::Multiply, 50),
        Slash => (BinaryOp::Divide, 50),
        Percent => (BinaryOp::Remainder, 50),
        Plus => (BinaryOp::Add, 45),
        Minus => (BinaryOp::Subtract, 45),
        LessLess => (BinaryOp::ShiftLeft, 40),
        GreaterGreater => (BinaryOp::ShiftRight, 40),
        Less => (BinaryOp::Less, 38),
        LessEqual => (BinaryOp::LessEqual, 38),
        Greater => (BinaryOp::Greater, 38),
        GreaterEqual => (BinaryOp::GreaterEqual, 38),
        EqualEqual => (BinaryOp::Equal, 37),
        BangEqual => (BinaryOp::NotEqual, 37),
        Amp => (BinaryOp::BitAnd, 30),
        Caret => (BinaryOp::BitXor, 25),
        Pipe => (BinaryOp::BitOr, 20),
        AmpAmp => (BinaryOp::And, 15),
        PipePipe => (BinaryOp::Or, 10),
        _ => return None,
    })
}

/// `None` for plain `=`, `Some(op)` for a compound-assignment token.
fn assignment_op(kind: &TokenKind) -> Option<Option<BinaryOp>> {
    if *kind == TokenKind::Equal {
        return Some(None);
    }
    BinaryOp::from_compound_token(kind).map(Some)
}
