//! Boolean filter expressions over scalar fields.
//!
//! Grammar:
//!
//! ```text
//! expr       := or
//! or         := and (("||" | "or") and)*
//! and        := unary (("&&" | "and") unary)*
//! unary      := ("!" | "not") unary | "(" expr ")" | predicate
//! predicate  := IDENT CMP NUMBER | IDENT ["not"] "in" "[" NUMBER ("," NUMBER)* "]"
//! CMP        := "==" | "!=" | "<" | "<=" | ">" | ">="
//! ```
//!
//! Expressions are evaluated column-wise into a row mask.

use crate::error::{Result, VdbError};
use std::fmt;

/// Deepest nesting of parentheses, negations and connectives accepted in a
/// filter expression.
pub const MAX_DEPTH: usize = 256;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn apply<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// Numeric literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
}

impl Literal {
    fn as_f64(self) -> f64 {
        match self {
            Literal::Int(i) => i as f64,
            Literal::Float(f) => f,
        }
    }
}

/// Parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        field: String,
        op: CmpOp,
        value: Literal,
    },
    In {
        field: String,
        values: Vec<Literal>,
        negated: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// Borrowed scalar column used during evaluation.
#[derive(Debug, Clone, Copy)]
pub enum ScalarColumn<'a> {
    Int64(&'a [i64]),
    Double(&'a [f64]),
}

impl Expr {
    /// Parse an expression string.
    pub fn parse(input: &str) -> Result<Expr> {
        let tokens = tokenize(input)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(VdbError::search(format!(
                "unexpected token {:?} in filter expression",
                tok
            )));
        }
        Ok(expr)
    }

    /// Evaluate over `rows` rows, resolving field names through `lookup`.
    pub fn evaluate<'a, F>(&self, rows: usize, lookup: &F) -> Result<Vec<bool>>
    where
        F: Fn(&str) -> Result<ScalarColumn<'a>>,
    {
        match self {
            Expr::Compare { field, op, value } => {
                let column = lookup(field)?;
                Ok(compare_column(column, rows, |x| match (x, value) {
                    (Scalar::Int(x), Literal::Int(v)) => op.apply(x, *v),
                    (Scalar::Int(x), Literal::Float(v)) => op.apply(x as f64, *v),
                    (Scalar::Float(x), v) => op.apply(x, v.as_f64()),
                }))
            }
            Expr::In {
                field,
                values,
                negated,
            } => {
                let column = lookup(field)?;
                Ok(compare_column(column, rows, |x| {
                    let found = values.iter().any(|v| match (x, v) {
                        (Scalar::Int(x), Literal::Int(v)) => x == *v,
                        (Scalar::Int(x), Literal::Float(v)) => x as f64 == *v,
                        (Scalar::Float(x), v) => x == v.as_f64(),
                    });
                    found != *negated
                }))
            }
            Expr::And(l, r) => {
                let lhs = l.evaluate(rows, lookup)?;
                let rhs = r.evaluate(rows, lookup)?;
                Ok(lhs.into_iter().zip(rhs).map(|(a, b)| a && b).collect())
            }
            Expr::Or(l, r) => {
                let lhs = l.evaluate(rows, lookup)?;
                let rhs = r.evaluate(rows, lookup)?;
                Ok(lhs.into_iter().zip(rhs).map(|(a, b)| a || b).collect())
            }
            Expr::Not(e) => Ok(e.evaluate(rows, lookup)?.into_iter().map(|b| !b).collect()),
        }
    }
}

#[derive(Clone, Copy)]
enum Scalar {
    Int(i64),
    Float(f64),
}

fn compare_column(column: ScalarColumn<'_>, rows: usize, pred: impl Fn(Scalar) -> bool) -> Vec<bool> {
    match column {
        ScalarColumn::Int64(values) => values.iter().take(rows).map(|&x| pred(Scalar::Int(x))).collect(),
        ScalarColumn::Double(values) => values
            .iter()
            .take(rows)
            .map(|&x| pred(Scalar::Float(x)))
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(Literal),
    Cmp(CmpOp),
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Eq));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Ne));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' | '>' => {
                let op = match (c, next == Some('=')) {
                    ('<', true) => CmpOp::Le,
                    ('<', false) => CmpOp::Lt,
                    (_, true) => CmpOp::Ge,
                    (_, false) => CmpOp::Gt,
                };
                tokens.push(Token::Cmp(op));
                i += if next == Some('=') { 2 } else { 1 };
            }
            c if c.is_ascii_digit() || c == '.' || ((c == '-' || c == '+') && next.map_or(false, |n| n.is_ascii_digit() || n == '.')) => {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.'
                        || chars[i] == 'e'
                        || chars[i] == 'E'
                        || ((chars[i] == '-' || chars[i] == '+') && matches!(chars[i - 1], 'e' | 'E')))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Number(parse_number(&text)?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let token = match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    _ => Token::Ident(word),
                };
                tokens.push(token);
            }
            other => {
                return Err(VdbError::search(format!(
                    "unexpected character '{}' in filter expression",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

fn parse_number(text: &str) -> Result<Literal> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Literal::Int(i));
    }
    text.parse::<f64>()
        .map(Literal::Float)
        .map_err(|_| VdbError::search(format!("invalid number '{}' in filter expression", text)))
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
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(tok) if tok == expected => Ok(()),
            other => Err(VdbError::search(format!(
                "expected {:?} in filter expression, found {:?}",
                expected, other
            ))),
        }
    }

    // Evaluation and drop recurse over the tree, so chains count as nesting
    // as well as parentheses.
    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(VdbError::search("filter expression nested too deeply"));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            self.descend()?;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut lhs = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            self.descend()?;
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let expr = match self.next() {
            Some(Token::Not) => {
                self.descend()?;
                Expr::Not(Box::new(self.parse_unary()?))
            }
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                inner
            }
            Some(Token::Ident(field)) => self.parse_predicate(field)?,
            other => {
                return Err(VdbError::search(format!(
                    "expected field name in filter expression, found {:?}",
                    other
                )))
            }
        };
        self.depth = depth;
        Ok(expr)
    }

    fn parse_predicate(&mut self, field: String) -> Result<Expr> {
        match self.next() {
            Some(Token::Cmp(op)) => match self.next() {
                Some(Token::Number(value)) => Ok(Expr::Compare { field, op, value }),
                other => Err(VdbError::search(format!(
                    "expected number after '{} {}', found {:?}",
                    field, op, other
                ))),
            },
            Some(Token::In) => self.parse_list(field, false),
            Some(Token::Not) => {
                self.expect(Token::In)?;
                self.parse_list(field, true)
            }
            other => Err(VdbError::search(format!(
                "expected comparison after '{}', found {:?}",
                field, other
            ))),
        }
    }

    fn parse_list(&mut self, field: String, negated: bool) -> Result<Expr> {
        self.expect(Token::LBracket)?;
        let mut values = Vec::new();
        loop {
            match self.next() {
                Some(Token::Number(v)) => values.push(v),
                Some(Token::RBracket) if values.is_empty() => break,
                other => {
                    return Err(VdbError::search(format!(
                        "expected number in list for '{}', found {:?}",
                        field, other
                    )))
                }
            }
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => break,
                other => {
                    return Err(VdbError::search(format!(
                        "expected ',' or ']' in list for '{}', found {:?}",
                        field, other
                    )))
                }
            }
        }
        Ok(Expr::In {
            field,
            values,
            negated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> Vec<bool> {
        let ids: Vec<i64> = (0..6).collect();
        let scores = vec![0.1, 0.9, 0.5, 0.3, 0.7, 0.2];
        let lookup = |name: &str| match name {
            "id" => Ok(ScalarColumn::Int64(&ids)),
            "score" => Ok(ScalarColumn::Double(&scores)),
            other => Err(VdbError::search(format!("field {} not found", other))),
        };
        Expr::parse(expr).unwrap().evaluate(6, &lookup).unwrap()
    }

    #[test]
    fn test_simple_comparison() {
        assert_eq!(eval("id >= 0"), vec![true; 6]);
        assert_eq!(eval("id < 2"), vec![true, true, false, false, false, false]);
        assert_eq!(eval("id == 3"), vec![false, false, false, true, false, false]);
        assert_eq!(eval("score > 0.5"), vec![false, true, false, false, true, false]);
    }

    #[test]
    fn test_boolean_connectives() {
        assert_eq!(
            eval("id > 1 && score < 0.6"),
            vec![false, false, true, true, false, true]
        );
        assert_eq!(
            eval("id == 0 or id == 5"),
            vec![true, false, false, false, false, true]
        );
        assert_eq!(
            eval("not (id > 1 and id < 4)"),
            vec![true, true, false, false, true, true]
        );
        assert_eq!(eval("!(id != 2)"), vec![false, false, true, false, false, false]);
    }

    #[test]
    fn test_in_lists() {
        assert_eq!(eval("id in [1, 3, 5]"), vec![false, true, false, true, false, true]);
        assert_eq!(eval("id not in [0, 1]"), vec![false, false, true, true, true, true]);
        assert_eq!(eval("id in []"), vec![false; 6]);
    }

    #[test]
    fn test_negative_and_float_literals() {
        assert_eq!(eval("id > -1"), vec![true; 6]);
        assert_eq!(eval("id <= 2.5"), vec![true, true, true, false, false, false]);
        assert_eq!(eval("score >= 1e-1"), vec![true; 6]);
    }

    #[test]
    fn test_precedence_and_binds_tighter() {
        let expr = Expr::parse("id == 0 || id == 1 && id == 2").unwrap();
        assert!(matches!(expr, Expr::Or(_, _)));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "id >=", "id >= 0 )", "(id > 1", "id ~ 3", "0 < id", "id in [1, 2"] {
            assert!(
                matches!(Expr::parse(bad), Err(VdbError::Search { .. })),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let n = 100_000;
        let parens = format!("{}id >= 0{}", "(".repeat(n), ")".repeat(n));
        let negations = format!("{}id >= 0", "!".repeat(n));
        let chain = vec!["id >= 0"; n].join(" && ");
        for input in [parens, negations, chain] {
            assert!(matches!(Expr::parse(&input), Err(VdbError::Search { .. })));
        }
    }

    #[test]
    fn test_nesting_up_to_limit_accepted() {
        let n = MAX_DEPTH - 1;
        let parens = format!("{}id >= 0{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(eval(&parens), vec![true; 6]);
        let sequential = (0..200).map(|_| "(id >= 0)").collect::<Vec<_>>().join(" || ");
        assert!(Expr::parse(&sequential).is_ok());
    }

    #[test]
    fn test_unknown_field_reported() {
        let ids: Vec<i64> = vec![0];
        let lookup = |name: &str| match name {
            "id" => Ok(ScalarColumn::Int64(&ids)),
            other => Err(VdbError::search(format!("field {} not found", other))),
        };
        let expr = Expr::parse("id_field >= 0").unwrap();
        assert!(matches!(
            expr.evaluate(1, &lookup),
            Err(VdbError::Search { reason }) if reason.contains("id_field")
        ));
    }
}
