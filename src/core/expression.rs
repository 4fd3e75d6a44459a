//! # ID Expression Module / ID 表达式模块
//!
//! A small boolean language for filtering scenario ids, in the spirit of
//! pytest's `-k` option: `web and not (slow or flaky)`.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr    := and_expr ("or" and_expr)*
//! and_expr:= not_expr ("and" not_expr)*
//! not_expr:= "not" not_expr | primary
//! primary := "(" expr ")" | WORD
//! ```
//!
//! A `WORD` matches when it is a substring of the scenario id.
//!
//! 一个用于过滤场景 ID 的小型布尔语言，类似 pytest 的 `-k` 选项。
//! `WORD` 在其为场景 ID 的子串时匹配。

use thiserror::Error;
use tracing::warn;

/// Maximum nesting of `not` and parentheses accepted by the parser.
pub const MAX_NESTING: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    And,
    Or,
    Not,
    LParen,
    RParen,
    Word(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("expression is empty")]
    Empty,
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("missing closing parenthesis")]
    UnclosedParen,
    #[error("expression nests deeper than {} levels", MAX_NESTING)]
    TooDeep,
}

/// Parsed boolean expression tree. `and`/`or` chains are kept flat, so the
/// tree is never deeper than [`MAX_NESTING`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdExpression {
    Word(String),
    Not(Box<IdExpression>),
    And(Vec<IdExpression>),
    Or(Vec<IdExpression>),
}

impl IdExpression {
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(input);
        if tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_or()?;
        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(ExpressionError::UnexpectedToken(describe(token))),
        }
    }

    pub fn matches(&self, id: &str) -> bool {
        match self {
            IdExpression::Word(word) => id.contains(word.as_str()),
            IdExpression::Not(inner) => !inner.matches(id),
            IdExpression::And(terms) => terms.iter().all(|t| t.matches(id)),
            IdExpression::Or(terms) => terms.iter().any(|t| t.matches(id)),
        }
    }
}

/// A compiled `-k` filter that never fails to evaluate.
///
/// An empty expression matches every id; a malformed one matches none.
///
/// 编译后的 `-k` 过滤器，求值永不失败。空表达式匹配所有 ID，格式错误的表达式不匹配任何 ID。
#[derive(Debug, Clone)]
pub enum IdMatcher {
    Any,
    Expr(IdExpression),
    Invalid,
}

impl IdMatcher {
    pub fn compile(input: &str) -> Self {
        if input.trim().is_empty() {
            return IdMatcher::Any;
        }
        match IdExpression::parse(input) {
            Ok(expr) => IdMatcher::Expr(expr),
            Err(e) => {
                warn!(expression = input, error = %e, "Invalid -k expression, nothing will match");
                IdMatcher::Invalid
            }
        }
    }

    pub fn matches(&self, id: &str) -> bool {
        match self {
            IdMatcher::Any => true,
            IdMatcher::Expr(expr) => expr.matches(id),
            IdMatcher::Invalid => false,
        }
    }
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    let flush = |word: &mut String, tokens: &mut Vec<Token>| {
        if word.is_empty() {
            return;
        }
        let token = match word.as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            _ => Token::Word(word.clone()),
        };
        tokens.push(token);
        word.clear();
    };

    for c in input.chars() {
        match c {
            '(' | ')' => {
                flush(&mut word, &mut tokens);
                tokens.push(if c == '(' { Token::LParen } else { Token::RParen });
            }
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

fn describe(token: &Token) -> String {
    match token {
        Token::And => "and".into(),
        Token::Or => "or".into(),
        Token::Not => "not".into(),
        Token::LParen => "(".into(),
        Token::RParen => ")".into(),
        Token::Word(w) => w.clone(),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn descend(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ExpressionError::TooDeep);
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<IdExpression, ExpressionError> {
        let mut terms = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            IdExpression::Or(terms)
        })
    }

    fn parse_and(&mut self) -> Result<IdExpression, ExpressionError> {
        let mut terms = vec![self.parse_not()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.parse_not()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            IdExpression::And(terms)
        })
    }

    fn parse_not(&mut self) -> Result<IdExpression, ExpressionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            self.descend()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(IdExpression::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<IdExpression, ExpressionError> {
        match self.next() {
            Some(Token::Word(word)) => Ok(IdExpression::Word(word)),
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(ExpressionError::UnexpectedToken(describe(&other))),
                    None => Err(ExpressionError::UnclosedParen),
                }
            }
            Some(other) => Err(ExpressionError::UnexpectedToken(describe(&other))),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(expr: &str, id: &str) -> bool {
        IdMatcher::compile(expr).matches(id)
    }

    #[test]
    fn bare_word_is_substring_match() {
        assert!(matches("web", "roles_web:default"));
        assert!(!matches("db", "web:default"));
    }

    #[test]
    fn and_not_combination() {
        assert!(matches("a and not b", "xax"));
        assert!(!matches("a and not b", "ab"));
        assert!(!matches("a and not b", "zzz"));
    }

    #[test]
    fn precedence_and_binds_tighter_than_or() {
        // a or (b and c)
        assert!(matches("a or b and c", "a"));
        assert!(!matches("a or b and c", "b"));
        assert!(matches("(a or b) and c", "bc"));
        assert!(!matches("(a or b) and c", "b"));
    }

    #[test]
    fn double_negation() {
        assert!(matches("not not web", "web:default"));
    }

    #[test]
    fn parentheses_without_spaces() {
        assert!(matches("(web)and(not db)", "web:x"));
    }

    #[test]
    fn malformed_expressions_match_nothing() {
        for expr in ["a and", "(a", "a)", "and", "a b", "not", "()"] {
            assert!(!matches(expr, "a"), "expression {expr:?} should match nothing");
            assert!(!matches(expr, "a b"), "expression {expr:?} should match nothing");
        }
    }

    #[test]
    fn empty_expression_matches_everything() {
        assert!(matches("", "anything"));
        assert!(matches("   ", "anything"));
    }

    #[test]
    fn deep_nesting_is_rejected_without_overflowing() {
        let nots = format!("{}a", "not ".repeat(100_000));
        assert_eq!(IdExpression::parse(&nots), Err(ExpressionError::TooDeep));
        assert!(!matches(&nots, "a"));

        let parens = format!("{}a{}", "(".repeat(100_000), ")".repeat(100_000));
        assert_eq!(IdExpression::parse(&parens), Err(ExpressionError::TooDeep));
        assert!(!matches(&parens, "a"));
    }

    #[test]
    fn nesting_up_to_the_limit_still_parses() {
        let expr = format!("{}web{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(matches(&expr, "web:default"));
        let expr = format!("{}web", "not ".repeat(MAX_NESTING));
        assert!(matches(&expr, "web:default"));
    }

    #[test]
    fn long_or_chains_stay_flat() {
        let expr = vec!["x"; 100_000].join(" or ") + " or web";
        assert!(matches(&expr, "web:default"));
        assert!(!matches(&expr, "db:default"));
    }

    #[test]
    fn parse_errors_are_reported() {
        assert_eq!(IdExpression::parse(""), Err(ExpressionError::Empty));
        assert_eq!(IdExpression::parse("(a"), Err(ExpressionError::UnclosedParen));
        assert_eq!(IdExpression::parse("a and"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(
            IdExpression::parse("a b"),
            Err(ExpressionError::UnexpectedToken("b".into()))
        );
    }
}
