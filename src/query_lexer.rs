//! Genders query lexer
//!
//! Tokenizes query expressions over attributes and values.
//!
//! Example query:
//! ```text
//! (rack=1 || rack=2) && compute && !login -- down
//! ```

use crate::error::{GendersError, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Word(String),
    String(String),

    // Predicates
    Equal,      // =
    NotEqual,   // !=

    // Set operators
    And,        // &&
    Or,         // ||
    Difference, // --
    Not,        // ! or ~

    // Grouping
    LeftParen,  // (
    RightParen, // )

    // Special
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(s) => write!(f, "'{}'", s),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Equal => f.write_str("'='"),
            Token::NotEqual => f.write_str("'!='"),
            Token::And => f.write_str("'&&'"),
            Token::Or => f.write_str("'||'"),
            Token::Difference => f.write_str("'--'"),
            Token::Not => f.write_str("'!'"),
            Token::LeftParen => f.write_str("'('"),
            Token::RightParen => f.write_str("')'"),
            Token::Eof => f.write_str("end of query"),
        }
    }
}

/// A token and the 1-based column it starts at
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub column: usize,
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current = chars.first().copied();
        Lexer {
            input: chars,
            position: 0,
            current_char: current,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::new();

        loop {
            let spanned = self.next_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                break;
            }
        }

        Ok(tokens)
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Spanned> {
        self.skip_whitespace();
        let column = self.position + 1;

        let token = match self.current_char {
            None => Token::Eof,
            Some(ch) if ch == '\'' || ch == '"' => self.read_string()?,
            Some(ch) if is_operator_start(ch) || self.at_difference() => self.read_operator()?,
            Some(_) => self.read_word(),
        };

        Ok(Spanned { token, column })
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn at_difference(&self) -> bool {
        self.current_char == Some('-') && self.peek() == Some('-')
    }

    fn read_word(&mut self) -> Token {
        let mut result = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_whitespace() || is_operator_start(ch) || ch == '\'' || ch == '"' || self.at_difference() {
                break;
            }
            result.push(ch);
            self.advance();
        }

        Token::Word(result)
    }

    fn read_string(&mut self) -> Result<Token> {
        let start = self.position + 1;
        let quote_char = self.current_char;
        self.advance(); // skip opening quote

        let mut result = String::new();
        let mut escaped = false;

        while let Some(ch) = self.current_char {
            if escaped {
                match ch {
                    'n' => result.push('\n'),
                    't' => result.push('\t'),
                    '\\' => result.push('\\'),
                    '\'' => result.push('\''),
                    '"' => result.push('"'),
                    _ => {
                        result.push('\\');
                        result.push(ch);
                    }
                }
                escaped = false;
                self.advance();
            } else if ch == '\\' {
                escaped = true;
                self.advance();
            } else if Some(ch) == quote_char {
                self.advance(); // skip closing quote
                return Ok(Token::String(result));
            } else {
                result.push(ch);
                self.advance();
            }
        }

        Err(GendersError::syntax(1, start, "unterminated string literal"))
    }

    fn read_operator(&mut self) -> Result<Token> {
        let column = self.position + 1;
        let ch = self.current_char.unwrap_or_default();
        let next = self.peek();

        let token = match (ch, next) {
            ('=', _) => {
                self.advance();
                Token::Equal
            }
            ('!', Some('=')) => {
                self.advance();
                self.advance();
                Token::NotEqual
            }
            ('!', _) | ('~', _) => {
                self.advance();
                Token::Not
            }
            ('&', Some('&')) => {
                self.advance();
                self.advance();
                Token::And
            }
            ('|', Some('|')) => {
                self.advance();
                self.advance();
                Token::Or
            }
            ('-', Some('-')) => {
                self.advance();
                self.advance();
                Token::Difference
            }
            ('(', _) => {
                self.advance();
                Token::LeftParen
            }
            (')', _) => {
                self.advance();
                Token::RightParen
            }
            ('&', _) => return Err(GendersError::syntax(1, column, "expected '&&'")),
            ('|', _) => return Err(GendersError::syntax(1, column, "expected '||'")),
            _ => {
                return Err(GendersError::syntax(
                    1,
                    column,
                    format!("unexpected character '{}'", ch),
                ))
            }
        };

        Ok(token)
    }
}

fn is_operator_start(ch: char) -> bool {
    matches!(ch, '=' | '!' | '~' | '&' | '|' | '(' | ')')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_words_and_predicates() {
        assert_eq!(
            tokens("rack=1 compute"),
            vec![
                Token::Word("rack".to_string()),
                Token::Equal,
                Token::Word("1".to_string()),
                Token::Word("compute".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("&& || -- ! ~ != ( )"),
            vec![
                Token::And,
                Token::Or,
                Token::Difference,
                Token::Not,
                Token::Not,
                Token::NotEqual,
                Token::LeftParen,
                Token::RightParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_hyphenated_names() {
        assert_eq!(
            tokens("ib-switch--down"),
            vec![
                Token::Word("ib-switch".to_string()),
                Token::Difference,
                Token::Word("down".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            tokens(r#"a="" b='x y' c="it\"s""#),
            vec![
                Token::Word("a".to_string()),
                Token::Equal,
                Token::String(String::new()),
                Token::Word("b".to_string()),
                Token::Equal,
                Token::String("x y".to_string()),
                Token::Word("c".to_string()),
                Token::Equal,
                Token::String("it\"s".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_columns() {
        let spans = Lexer::new("a && !b").tokenize().unwrap();
        let columns: Vec<usize> = spans.iter().map(|s| s.column).collect();
        assert_eq!(columns, vec![1, 3, 6, 7, 8]);
    }

    #[test]
    fn test_lex_errors() {
        let err = Lexer::new("a & b").tokenize().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseSyntax);
        assert!(matches!(err, GendersError::ParseSyntax { line: 1, column: 3, .. }));

        let err = Lexer::new("a='open").tokenize().unwrap_err();
        assert!(matches!(err, GendersError::ParseSyntax { column: 3, .. }));
    }
}
