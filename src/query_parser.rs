//! Query parser
//!
//! Converts the token stream from the lexer into an [`Expression`].
//!
//! Precedence, loosest first, all binary operators left-associative:
//! 1. `||`
//! 2. `&&`, `--`
//! 3. `!`, `~`
//!
//! Parentheses override. The whole query is parsed before anything is
//! evaluated, so malformed input never yields a partial result.

use crate::error::{GendersError, Result};
use crate::query_ast::{Expression, Predicate};
use crate::query_lexer::{Lexer, Spanned, Token};
use crate::types::DEFAULT_MAX_QUERY_DEPTH;
use tracing::debug;

pub struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
    max_depth: usize,
    /// Open `!` and `(` enclosing the current position
    depth: usize,
}

/// Parsed expression with the height of its tree
struct Subtree {
    expr: Expression,
    height: usize,
}

type BinaryOp = fn(Box<Expression>, Box<Expression>) -> Expression;

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            position: 0,
            max_depth: DEFAULT_MAX_QUERY_DEPTH,
            depth: 0,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parse a query string
    pub fn parse(query: &str) -> Result<Expression> {
        Parser::parse_with_depth(query, DEFAULT_MAX_QUERY_DEPTH)
    }

    /// Parse a query string whose expression tree may be at most
    /// `max_depth` levels deep
    pub fn parse_with_depth(query: &str, max_depth: usize) -> Result<Expression> {
        let mut lexer = Lexer::new(query);
        let tokens = lexer.tokenize()?;
        let mut parser = Parser::new(tokens).with_max_depth(max_depth);
        let expr = parser.parse_query()?;
        debug!(query, parsed = %expr, "parsed query");
        Ok(expr)
    }

    /// Parse a complete query, rejecting trailing tokens
    pub fn parse_query(&mut self) -> Result<Expression> {
        if self.current() == &Token::Eof {
            return Err(self.error("empty query"));
        }

        let tree = self.parse_or()?;

        if self.current() != &Token::Eof {
            return Err(self.error(format!("unexpected {}", self.current())));
        }

        Ok(tree.expr)
    }

    fn parse_or(&mut self) -> Result<Subtree> {
        let mut left = self.parse_and()?;

        while self.current() == &Token::Or {
            let column = self.column();
            self.advance();
            let right = self.parse_and()?;
            left = self.combine(Expression::Or, left, right, column)?;
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Subtree> {
        let mut left = self.parse_unary()?;

        loop {
            let op: BinaryOp = match self.current() {
                Token::And => Expression::And,
                Token::Difference => Expression::Difference,
                _ => break,
            };
            let column = self.column();
            self.advance();
            let right = self.parse_unary()?;
            left = self.combine(op, left, right, column)?;
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Subtree> {
        if self.current() == &Token::Not {
            let column = self.column();
            self.enter()?;
            self.advance();
            let inner = self.parse_unary()?;
            self.depth -= 1;

            let height = inner.height + 1;
            if height > self.max_depth {
                return Err(self.too_deep(column));
            }
            Ok(Subtree {
                expr: Expression::Not(Box::new(inner.expr)),
                height,
            })
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Result<Subtree> {
        match self.current().clone() {
            Token::LeftParen => {
                self.enter()?;
                self.advance();
                let tree = self.parse_or()?;
                self.expect(&Token::RightParen)?;
                self.depth -= 1;
                Ok(tree)
            }
            Token::Word(attr) | Token::String(attr) => {
                self.advance();
                Ok(Subtree {
                    expr: self.parse_predicate(attr)?,
                    height: 1,
                })
            }
            other => Err(self.error(format!("expected attribute or '(', found {}", other))),
        }
    }

    /// Open one nesting level at the current token
    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(self.too_deep(self.column()));
        }
        self.depth += 1;
        Ok(())
    }

    fn combine(&self, op: BinaryOp, left: Subtree, right: Subtree, column: usize) -> Result<Subtree> {
        let height = left.height.max(right.height) + 1;
        if height > self.max_depth {
            return Err(self.too_deep(column));
        }
        Ok(Subtree {
            expr: op(Box::new(left.expr), Box::new(right.expr)),
            height,
        })
    }

    fn too_deep(&self, column: usize) -> GendersError {
        GendersError::syntax(
            1,
            column,
            format!("query nested deeper than {} levels", self.max_depth),
        )
    }

    fn parse_predicate(&mut self, attr: String) -> Result<Expression> {
        let predicate = match self.current() {
            Token::Equal => {
                self.advance();
                Predicate::Equals(attr, self.parse_value()?)
            }
            Token::NotEqual => {
                self.advance();
                Predicate::NotEquals(attr, self.parse_value()?)
            }
            _ => Predicate::Has(attr),
        };

        Ok(Expression::Predicate(predicate))
    }

    fn parse_value(&mut self) -> Result<String> {
        match self.current().clone() {
            Token::Word(value) | Token::String(value) => {
                self.advance();
                Ok(value)
            }
            other => Err(self.error(format!("expected value, found {}", other))),
        }
    }

    // Helper methods

    fn current(&self) -> &Token {
        self.tokens
            .get(self.position)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn column(&self) -> usize {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|s| s.column)
            .unwrap_or(1)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.current() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {}", expected, self.current())))
        }
    }

    fn error(&self, reason: impl Into<String>) -> GendersError {
        GendersError::syntax(1, self.column(), reason)
    }
}
