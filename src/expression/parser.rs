//! Precedence-climbing parser producing metadata-carrying nodes.
//!
//! Precedence, highest to lowest: postfix access, unary sign (folded
//! into numeric literals), `* / %`, `+ -`, comparisons / `BETWEEN` /
//! `LIKE` / `IN` (non-associative), `AND`, `OR`. Postfix `[*]` and
//! `[predicate]` followed by further access lower to `MAP` during
//! parsing, so the canonical form never contains the dotted-after-
//! bracket shorthand.

use std::sync::Arc;

use crate::document::Value;
use crate::error::{Error, Result};
use crate::expression::functions;
use crate::expression::node::{BinaryOp, Node, Quantifier, Shape};
use crate::expression::tokenizer::{Token, TokenKind, Tokenizer};

/// Nesting budget rejecting pathological expressions before the stack
/// overflows.
pub const MAX_EXPRESSION_DEPTH: usize = 256;

const RESERVED: &[&str] = &["AND", "OR", "BETWEEN", "LIKE", "IN", "ANY", "ALL"];

/// Parses a complete expression, requiring the input to be fully
/// consumed.
pub fn parse_source(source: &str) -> Result<Arc<Node>> {
    let mut parser = Parser {
        tokenizer: Tokenizer::new(source),
        depth: 0,
    };
    let node = parser.parse_or()?;
    parser.tokenizer.expect(TokenKind::Eof)?;
    Ok(node)
}

struct Parser {
    tokenizer: Tokenizer,
    depth: usize,
}

impl Parser {
    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_EXPRESSION_DEPTH {
            return Err(Error::InvalidExpressionType {
                expression: String::new(),
                reason: "expression exceeds the maximum nesting depth",
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_or(&mut self) -> Result<Arc<Node>> {
        self.enter()?;
        let mut left = self.parse_and()?;
        while self.tokenizer.look_ahead()?.is_keyword("OR") {
            self.tokenizer.read()?;
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, Quantifier::Implicit, left, right);
        }
        self.leave();
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Arc<Node>> {
        let mut left = self.parse_predicate()?;
        while self.tokenizer.look_ahead()?.is_keyword("AND") {
            self.tokenizer.read()?;
            let right = self.parse_predicate()?;
            left = binary(BinaryOp::And, Quantifier::Implicit, left, right);
        }
        Ok(left)
    }

    /// Comparisons are non-associative: at most one comparison applies
    /// to an additive operand; chains surface as leftover tokens.
    fn parse_predicate(&mut self) -> Result<Arc<Node>> {
        let left = self.parse_additive()?;
        let ahead = self.tokenizer.look_ahead()?;

        let quantifier = if ahead.is_keyword("ANY") {
            self.tokenizer.read()?;
            Quantifier::Any
        } else if ahead.is_keyword("ALL") {
            self.tokenizer.read()?;
            Quantifier::All
        } else {
            Quantifier::Implicit
        };

        let ahead = self.tokenizer.look_ahead()?;
        if let Some(op) = comparison_op(ahead.kind) {
            self.tokenizer.read()?;
            let right = self.parse_additive()?;
            return Ok(binary(op, quantifier, left, right));
        }
        if quantifier != Quantifier::Implicit {
            // ANY/ALL must be followed by a comparison operator.
            let token = self.tokenizer.read()?;
            return Err(token.unexpected());
        }
        if ahead.is_keyword("BETWEEN") {
            self.tokenizer.read()?;
            // Bounds parse at additive level so the separating AND and
            // any outer AND stay unconsumed by the bounds themselves.
            let low = self.parse_additive()?;
            let and = self.tokenizer.read()?;
            if !and.is_keyword("AND") {
                return Err(and.unexpected());
            }
            let high = self.parse_additive()?;
            let bounds = Node::build(Shape::ArrayInit(vec![low, high]));
            return Ok(binary(BinaryOp::Between, Quantifier::Implicit, left, bounds));
        }
        if ahead.is_keyword("LIKE") {
            self.tokenizer.read()?;
            let right = self.parse_additive()?;
            return Ok(binary(BinaryOp::Like, Quantifier::Implicit, left, right));
        }
        if ahead.is_keyword("IN") {
            self.tokenizer.read()?;
            let right = self.parse_additive()?;
            return Ok(binary(BinaryOp::In, Quantifier::Implicit, left, right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Arc<Node>> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.tokenizer.look_ahead()?.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.tokenizer.read()?;
            let right = self.parse_multiplicative()?;
            left = binary(op, Quantifier::Implicit, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Arc<Node>> {
        let mut left = self.parse_postfix()?;
        loop {
            let op = match self.tokenizer.look_ahead()?.kind {
                TokenKind::Asterisk => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ => return Ok(left),
            };
            self.tokenizer.read()?;
            let right = self.parse_postfix()?;
            left = binary(op, Quantifier::Implicit, left, right);
        }
    }

    fn parse_postfix(&mut self) -> Result<Arc<Node>> {
        let atom = self.parse_atom()?;
        self.parse_postfix_from(atom)
    }

    /// Applies `.name`, `.["name"]`, and `[...]` accessors. When the
    /// current node is a sequence, the remaining accessors bind to `@`
    /// inside an implicit MAP over it.
    fn parse_postfix_from(&mut self, mut current: Arc<Node>) -> Result<Arc<Node>> {
        self.enter()?;
        loop {
            match self.tokenizer.look_ahead()?.kind {
                TokenKind::Dot => {
                    self.tokenizer.read()?;
                    let name = self.parse_field_name()?;
                    if current.scalar {
                        current = Node::build(Shape::Field {
                            base: current,
                            name,
                        });
                    } else {
                        let inner = Node::build(Shape::Field {
                            base: Node::build(Shape::Current),
                            name,
                        });
                        let projection = self.parse_postfix_from(inner)?;
                        current = Node::build(Shape::Map {
                            input: current,
                            projection,
                        });
                        break;
                    }
                }
                TokenKind::OpenBracket => {
                    self.tokenizer.read()?;
                    if current.scalar {
                        current = self.parse_bracket(current)?;
                    } else {
                        let inner = self.parse_bracket(Node::build(Shape::Current))?;
                        let projection = self.parse_postfix_from(inner)?;
                        current = Node::build(Shape::Map {
                            input: current,
                            projection,
                        });
                        break;
                    }
                }
                _ => break,
            }
        }
        self.leave();
        Ok(current)
    }

    fn parse_field_name(&mut self) -> Result<String> {
        let token = self.tokenizer.read()?;
        match token.kind {
            TokenKind::Word => Ok(token.value),
            TokenKind::OpenBracket => {
                let name = self.tokenizer.expect(TokenKind::String)?;
                self.tokenizer.expect(TokenKind::CloseBracket)?;
                Ok(name.value)
            }
            _ => Err(token.unexpected()),
        }
    }

    /// Parses the inside of a `[...]` accessor; the opening bracket is
    /// already consumed.
    fn parse_bracket(&mut self, base: Arc<Node>) -> Result<Arc<Node>> {
        if self.tokenizer.look_ahead()?.kind == TokenKind::Asterisk {
            self.tokenizer.read()?;
            self.tokenizer.expect(TokenKind::CloseBracket)?;
            return Ok(Node::build(Shape::AllAccess { base }));
        }
        let inner = self.parse_or()?;
        self.tokenizer.expect(TokenKind::CloseBracket)?;
        if inner.kind.is_predicate() {
            Ok(Node::build(Shape::FilterAccess {
                base,
                predicate: inner,
            }))
        } else {
            Ok(Node::build(Shape::IndexAccess { base, index: inner }))
        }
    }

    fn parse_atom(&mut self) -> Result<Arc<Node>> {
        self.enter()?;
        let token = self.tokenizer.read()?;
        let node = match token.kind {
            TokenKind::Int => literal_int(&token)?,
            TokenKind::Double => literal_double(&token)?,
            TokenKind::String => Node::build(Shape::Literal(Value::String(token.value))),
            TokenKind::Minus | TokenKind::Plus => self.parse_signed(&token)?,
            TokenKind::Dollar => Node::build(Shape::Root),
            TokenKind::Asterisk => Node::build(Shape::Source),
            TokenKind::At => self.parse_at(&token)?,
            TokenKind::OpenParen => {
                let inner = self.parse_or()?;
                self.tokenizer.expect(TokenKind::CloseParen)?;
                inner
            }
            TokenKind::OpenBracket => self.parse_array_init()?,
            TokenKind::OpenBrace => self.parse_document_init()?,
            TokenKind::Word => self.parse_word(token)?,
            _ => return Err(token.unexpected()),
        };
        self.leave();
        Ok(node)
    }

    /// A sign is valid only when attached directly to a numeric
    /// literal; it folds into the literal value.
    fn parse_signed(&mut self, sign: &Token) -> Result<Arc<Node>> {
        let next = self.tokenizer.look_ahead()?.clone();
        let adjacent = next
            .position
            .checked_sub(next.value.chars().count())
            .is_some_and(|start| start == sign.position);
        if !adjacent {
            return Err(next.unexpected());
        }
        match next.kind {
            TokenKind::Int | TokenKind::Double => {
                self.tokenizer.read()?;
                let negate = sign.kind == TokenKind::Minus;
                if next.kind == TokenKind::Int {
                    signed_int_literal(&next, negate)
                } else {
                    let value: f64 = next.value.parse().map_err(|_| next.unexpected())?;
                    let value = if negate { -value } else { value };
                    Ok(Node::build(Shape::Literal(Value::Double(value))))
                }
            }
            _ => Err(next.unexpected()),
        }
    }

    /// `@` directly followed by a word or integer is a parameter
    /// reference; a bare `@` is the current value.
    fn parse_at(&mut self, at: &Token) -> Result<Arc<Node>> {
        let next = self.tokenizer.look_ahead()?.clone();
        let adjacent = next
            .position
            .checked_sub(next.value.chars().count())
            .is_some_and(|start| start == at.position);
        if adjacent && matches!(next.kind, TokenKind::Word | TokenKind::Int) {
            self.tokenizer.read()?;
            return Ok(Node::build(Shape::Parameter(next.value)));
        }
        Ok(Node::build(Shape::Current))
    }

    fn parse_array_init(&mut self) -> Result<Arc<Node>> {
        let mut items = Vec::new();
        if self.tokenizer.look_ahead()?.kind == TokenKind::CloseBracket {
            self.tokenizer.read()?;
            return Ok(Node::build(Shape::ArrayInit(items)));
        }
        loop {
            items.push(self.parse_or()?);
            let token = self.tokenizer.read()?;
            match token.kind {
                TokenKind::Comma => continue,
                TokenKind::CloseBracket => return Ok(Node::build(Shape::ArrayInit(items))),
                _ => return Err(token.unexpected()),
            }
        }
    }

    fn parse_document_init(&mut self) -> Result<Arc<Node>> {
        let mut pairs: Vec<(String, Arc<Node>)> = Vec::new();
        if self.tokenizer.look_ahead()?.kind == TokenKind::CloseBrace {
            self.tokenizer.read()?;
            return Ok(Node::build(Shape::DocumentInit(pairs)));
        }
        loop {
            let token = self.tokenizer.read()?;
            let key = match token.kind {
                TokenKind::Word | TokenKind::String => token.value.clone(),
                _ => return Err(token.unexpected()),
            };
            if key.contains('\0') {
                return Err(Error::InvalidNullCharInString(key.replace('\0', "\\0")));
            }
            let value = if self.tokenizer.look_ahead()?.kind == TokenKind::Colon {
                self.tokenizer.read()?;
                self.parse_or()?
            } else {
                // `{name}` is shorthand for `{name: $.name}`.
                if token.kind != TokenKind::Word {
                    return Err(token.unexpected());
                }
                Node::build(Shape::Field {
                    base: Node::build(Shape::Root),
                    name: key.clone(),
                })
            };
            pairs.push((key, value));
            let token = self.tokenizer.read()?;
            match token.kind {
                TokenKind::Comma => continue,
                TokenKind::CloseBrace => return Ok(Node::build(Shape::DocumentInit(pairs))),
                _ => return Err(token.unexpected()),
            }
        }
    }

    fn parse_word(&mut self, token: Token) -> Result<Arc<Node>> {
        if token.is_keyword("true") {
            return Ok(Node::build(Shape::Literal(Value::Boolean(true))));
        }
        if token.is_keyword("false") {
            return Ok(Node::build(Shape::Literal(Value::Boolean(false))));
        }
        if token.is_keyword("null") {
            return Ok(Node::build(Shape::Literal(Value::Null)));
        }
        if RESERVED.iter().any(|kw| token.is_keyword(kw)) {
            return Err(token.unexpected());
        }
        if token.is_keyword("MAP") && self.tokenizer.look_ahead()?.kind == TokenKind::OpenParen {
            return self.parse_transform(true);
        }
        if token.is_keyword("FILTER") && self.tokenizer.look_ahead()?.kind == TokenKind::OpenParen {
            return self.parse_transform(false);
        }
        if self.tokenizer.look_ahead()?.kind == TokenKind::OpenParen {
            return self.parse_call(token);
        }
        // Bare identifier: sugar for `$.identifier`.
        Ok(Node::build(Shape::Field {
            base: Node::build(Shape::Root),
            name: token.value,
        }))
    }

    /// `MAP(input => projection)` / `FILTER(input => predicate)`.
    fn parse_transform(&mut self, map: bool) -> Result<Arc<Node>> {
        self.tokenizer.expect(TokenKind::OpenParen)?;
        let input = self.parse_or()?;
        self.tokenizer.expect(TokenKind::Equals)?;
        self.tokenizer.expect(TokenKind::Greater)?;
        let body = self.parse_or()?;
        self.tokenizer.expect(TokenKind::CloseParen)?;
        Ok(if map {
            Node::build(Shape::Map {
                input,
                projection: body,
            })
        } else {
            Node::build(Shape::Filter {
                input,
                predicate: body,
            })
        })
    }

    fn parse_call(&mut self, name: Token) -> Result<Arc<Node>> {
        let Some(func) = functions::lookup(&name.value) else {
            return Err(name.unexpected());
        };
        self.tokenizer.expect(TokenKind::OpenParen)?;
        let mut args = Vec::new();
        if self.tokenizer.look_ahead()?.kind == TokenKind::CloseParen {
            self.tokenizer.read()?;
        } else {
            loop {
                args.push(self.parse_or()?);
                let token = self.tokenizer.read()?;
                match token.kind {
                    TokenKind::Comma => continue,
                    TokenKind::CloseParen => break,
                    _ => return Err(token.unexpected()),
                }
            }
        }
        if !func.accepts(args.len()) {
            return Err(name.unexpected());
        }
        Ok(Node::build(Shape::Call { func, args }))
    }
}

fn binary(op: BinaryOp, quantifier: Quantifier, left: Arc<Node>, right: Arc<Node>) -> Arc<Node> {
    Node::build(Shape::Binary {
        op,
        quantifier,
        left,
        right,
    })
}

fn comparison_op(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Equals => Some(BinaryOp::Equal),
        TokenKind::NotEquals => Some(BinaryOp::NotEqual),
        TokenKind::Greater => Some(BinaryOp::GreaterThan),
        TokenKind::GreaterOrEquals => Some(BinaryOp::GreaterThanOrEqual),
        TokenKind::Less => Some(BinaryOp::LessThan),
        TokenKind::LessOrEquals => Some(BinaryOp::LessThanOrEqual),
        _ => None,
    }
}

fn literal_int(token: &Token) -> Result<Arc<Node>> {
    signed_int_literal(token, false)
}

fn signed_int_literal(token: &Token, negate: bool) -> Result<Arc<Node>> {
    let text = if negate {
        format!("-{}", token.value)
    } else {
        token.value.clone()
    };
    if let Ok(small) = text.parse::<i32>() {
        return Ok(Node::build(Shape::Literal(Value::Int32(small))));
    }
    if let Ok(wide) = text.parse::<i64>() {
        return Ok(Node::build(Shape::Literal(Value::Int64(wide))));
    }
    let wide: f64 = text.parse().map_err(|_| token.unexpected())?;
    Ok(Node::build(Shape::Literal(Value::Double(wide))))
}

fn literal_double(token: &Token) -> Result<Arc<Node>> {
    let value: f64 = token.value.parse().map_err(|_| token.unexpected())?;
    Ok(Node::build(Shape::Literal(Value::Double(value))))
}
