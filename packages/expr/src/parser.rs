//! Pratt parser over the logos token stream.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{ExprError, ExprResult};
use crate::token::{unescape, Token};
use logos::Logos;

/// Parse an expression body into an AST.
pub fn parse_expression(source: &str) -> ExprResult<Expr> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(result) = lexer.next() {
        let offset = lexer.span().start;
        match result {
            Ok(token) => tokens.push((token, offset)),
            Err(_) => {
                return Err(ExprError::Parse {
                    message: format!("unexpected character '{}'", lexer.slice()),
                    offset,
                })
            }
        }
    }

    let mut parser = Parser {
        tokens,
        position: 0,
        source_len: source.len(),
    };
    let expr = parser.parse_ternary()?;
    if let Some((token, offset)) = parser.peek_with_offset() {
        return Err(ExprError::Parse {
            message: format!("unexpected token {:?}", token),
            offset,
        });
    }
    Ok(expr)
}

struct Parser<'src> {
    tokens: Vec<(Token<'src>, usize)>,
    position: usize,
    source_len: usize,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<&Token<'src>> {
        self.tokens.get(self.position).map(|(t, _)| t)
    }

    fn peek_with_offset(&self) -> Option<(&Token<'src>, usize)> {
        self.tokens.get(self.position).map(|(t, o)| (t, *o))
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.position)
            .map(|(_, o)| *o)
            .unwrap_or(self.source_len)
    }

    fn advance(&mut self) -> Option<Token<'src>> {
        let token = self.tokens.get(self.position).map(|(t, _)| t.clone());
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token<'src>) -> ExprResult<()> {
        match self.peek() {
            Some(token) if *token == expected => {
                self.position += 1;
                Ok(())
            }
            other => Err(ExprError::Parse {
                message: format!("expected {:?}, found {:?}", expected, other),
                offset: self.offset(),
            }),
        }
    }

    fn parse_ternary(&mut self) -> ExprResult<Expr> {
        let condition = self.parse_binary(0)?;
        if matches!(self.peek(), Some(Token::Question)) {
            self.position += 1;
            let then_branch = self.parse_ternary()?;
            self.expect(Token::Colon)?;
            let else_branch = self.parse_ternary()?;
            return Ok(Expr::Ternary {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }
        Ok(condition)
    }

    fn binding_power(token: &Token) -> Option<(BinaryOp, u8)> {
        match token {
            Token::OrOr => Some((BinaryOp::Or, 1)),
            Token::AndAnd => Some((BinaryOp::And, 2)),
            Token::EqEq => Some((BinaryOp::Equals, 3)),
            Token::NotEq => Some((BinaryOp::NotEquals, 3)),
            Token::Less => Some((BinaryOp::LessThan, 4)),
            Token::LessEq => Some((BinaryOp::LessThanOrEqual, 4)),
            Token::Greater => Some((BinaryOp::GreaterThan, 4)),
            Token::GreaterEq => Some((BinaryOp::GreaterThanOrEqual, 4)),
            Token::Plus => Some((BinaryOp::Add, 5)),
            Token::Minus => Some((BinaryOp::Subtract, 5)),
            Token::Star => Some((BinaryOp::Multiply, 6)),
            Token::Slash => Some((BinaryOp::Divide, 6)),
            Token::Percent => Some((BinaryOp::Modulo, 6)),
            _ => None,
        }
    }

    fn parse_binary(&mut self, min_power: u8) -> ExprResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(token) = self.peek() {
            let Some((op, power)) = Self::binding_power(token) else {
                break;
            };
            if power < min_power {
                break;
            }
            self.position += 1;
            let right = self.parse_binary(power + 1)?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ExprResult<Expr> {
        match self.peek() {
            Some(Token::Bang) => {
                self.position += 1;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(self.parse_unary()?),
                })
            }
            Some(Token::Minus) => {
                self.position += 1;
                Ok(Expr::Unary {
                    op: UnaryOp::Negate,
                    operand: Box::new(self.parse_unary()?),
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> ExprResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.position += 1;
                    let property = match self.advance() {
                        Some(Token::Ident(name)) => name.to_string(),
                        other => {
                            return Err(ExprError::Parse {
                                message: format!("expected property name, found {:?}", other),
                                offset: self.offset(),
                            })
                        }
                    };
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                    };
                }
                Some(Token::LBracket) => {
                    self.position += 1;
                    let index = self.parse_ternary()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(Token::LParen) => {
                    self.position += 1;
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Some(Token::RParen)) {
                        loop {
                            args.push(self.parse_ternary()?);
                            if matches!(self.peek(), Some(Token::Comma)) {
                                self.position += 1;
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(Token::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ExprResult<Expr> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Null) => Ok(Expr::Null),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(unescape(s))),
            Some(Token::Ident(name)) => Ok(Expr::Ident(name.to_string())),
            Some(Token::LParen) => {
                let inner = self.parse_ternary()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if !matches!(self.peek(), Some(Token::RBracket)) {
                    loop {
                        items.push(self.parse_ternary()?);
                        if matches!(self.peek(), Some(Token::Comma)) {
                            self.position += 1;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RBracket)?;
                Ok(Expr::Array(items))
            }
            Some(Token::LBrace) => {
                let mut entries = Vec::new();
                if !matches!(self.peek(), Some(Token::RBrace)) {
                    loop {
                        let key = match self.advance() {
                            Some(Token::Ident(name)) => name.to_string(),
                            Some(Token::Str(s)) => unescape(s),
                            other => {
                                return Err(ExprError::Parse {
                                    message: format!("expected object key, found {:?}", other),
                                    offset: self.offset(),
                                })
                            }
                        };
                        self.expect(Token::Colon)?;
                        entries.push((key, self.parse_ternary()?));
                        if matches!(self.peek(), Some(Token::Comma)) {
                            self.position += 1;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RBrace)?;
                Ok(Expr::Object(entries))
            }
            other => Err(ExprError::Parse {
                message: format!("unexpected token {:?}", other),
                offset,
            }),
        }
    }
}
