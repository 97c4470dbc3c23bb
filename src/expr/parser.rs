//! Precedence-climbing parser and tree-walking interpreter.
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons (chainable),
//! `+ -`, `* / %`, unary `-`, `**` (right associative).

use logos::Logos;

use crate::domain::{ModelError, ModelResult, Scalar};
use crate::expr::lexer::Token;
use crate::tree::CallArgs;

/// Deepest expression tree the parser builds; evaluation recurses once per level.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Scalar),
    Name(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// `a < b <= c` holds when every adjacent pair holds.
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

pub fn parse(text: &str) -> ModelResult<Expr> {
    let mut tokens = Vec::new();
    for (token, span) in Token::lexer(text).spanned() {
        let token = token.map_err(|_| {
            ModelError::expression(text, format!("unexpected character at {}", span.start))
        })?;
        tokens.push(token);
    }
    if tokens.is_empty() {
        return Err(ModelError::expression(text, "empty expression"));
    }
    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.or_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error(format!("unexpected token {:?}", parser.tokens[parser.pos])));
    }
    Ok(expr)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, reason: impl Into<String>) -> ModelError {
        ModelError::expression(self.text, reason)
    }

    /// One level deeper in the tree being built. Callers reset `depth` when done.
    fn descend(&mut self) -> ModelResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(format!("nesting deeper than {MAX_DEPTH} levels")));
        }
        Ok(())
    }

    fn or_expr(&mut self) -> ModelResult<Expr> {
        let depth = self.depth;
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Or) {
            self.descend()?;
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn and_expr(&mut self) -> ModelResult<Expr> {
        let depth = self.depth;
        let mut lhs = self.not_expr()?;
        while self.eat(&Token::And) {
            self.descend()?;
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn not_expr(&mut self) -> ModelResult<Expr> {
        if self.eat(&Token::Not) {
            self.descend()?;
            let inner = self.not_expr()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ModelResult<Expr> {
        let first = self.additive()?;
        let mut rest = Vec::new();
        while let Some(op) = self.peek().and_then(cmp_op) {
            self.pos += 1;
            rest.push((op, self.additive()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn additive(&mut self) -> ModelResult<Expr> {
        let depth = self.depth;
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => {
                    self.depth = depth;
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.descend()?;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> ModelResult<Expr> {
        let depth = self.depth;
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => {
                    self.depth = depth;
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.descend()?;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> ModelResult<Expr> {
        if self.eat(&Token::Minus) {
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        if self.eat(&Token::Plus) {
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(inner);
        }
        self.power()
    }

    fn power(&mut self) -> ModelResult<Expr> {
        let base = self.atom()?;
        if self.eat(&Token::Pow) {
            // right associative, and binds tighter than a unary minus on its left
            self.descend()?;
            let exponent = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> ModelResult<Expr> {
        match self.advance() {
            Some(Token::Int(v)) => Ok(Expr::Literal(Scalar::Integer(v))),
            Some(Token::Float(v)) => Ok(Expr::Literal(Scalar::Float(v))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Scalar::Text(s))),
            Some(Token::True) => Ok(Expr::Literal(Scalar::Boolean(true))),
            Some(Token::False) => Ok(Expr::Literal(Scalar::Boolean(false))),
            Some(Token::Ident(name)) => Ok(Expr::Name(name)),
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.or_expr()?;
                self.depth -= 1;
                if !self.eat(&Token::RParen) {
                    return Err(self.error("missing closing parenthesis"));
                }
                Ok(inner)
            }
            Some(other) => Err(self.error(format!("unexpected token {other:?}"))),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

fn cmp_op(token: &Token) -> Option<CmpOp> {
    match token {
        Token::Lt => Some(CmpOp::Lt),
        Token::Le => Some(CmpOp::Le),
        Token::Gt => Some(CmpOp::Gt),
        Token::Ge => Some(CmpOp::Ge),
        Token::EqEq => Some(CmpOp::Eq),
        Token::NotEq => Some(CmpOp::Ne),
        _ => None,
    }
}

// ----------------------------------------------------------------------
// evaluation
// ----------------------------------------------------------------------

pub fn eval(expr: &Expr, text: &str, context: &CallArgs) -> ModelResult<Scalar> {
    let fail = |reason: String| ModelError::expression(text, reason);
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Name(name) => context
            .get(name)
            .cloned()
            .ok_or_else(|| fail(format!("name '{name}' is not defined"))),
        Expr::Neg(inner) => match eval(inner, text, context)? {
            Scalar::Integer(v) => v
                .checked_neg()
                .map(Scalar::Integer)
                .ok_or_else(|| fail("integer overflow".into())),
            Scalar::Boolean(v) => Ok(Scalar::Integer(-i64::from(v))),
            Scalar::Float(v) => Ok(Scalar::Float(-v)),
            Scalar::Text(_) => Err(fail("cannot negate text".into())),
        },
        Expr::Not(inner) => Ok(Scalar::Boolean(!eval(inner, text, context)?.truthy())),
        Expr::And(lhs, rhs) => {
            let left = eval(lhs, text, context)?;
            if !left.truthy() {
                return Ok(left);
            }
            eval(rhs, text, context)
        }
        Expr::Or(lhs, rhs) => {
            let left = eval(lhs, text, context)?;
            if left.truthy() {
                return Ok(left);
            }
            eval(rhs, text, context)
        }
        Expr::Compare(first, rest) => {
            let mut left = eval(first, text, context)?;
            for (op, rhs) in rest {
                let right = eval(rhs, text, context)?;
                if !compare(*op, &left, &right).map_err(fail)? {
                    return Ok(Scalar::Boolean(false));
                }
                left = right;
            }
            Ok(Scalar::Boolean(true))
        }
        Expr::Binary(op, lhs, rhs) => {
            let left = eval(lhs, text, context)?;
            let right = eval(rhs, text, context)?;
            arithmetic(*op, &left, &right).map_err(fail)
        }
    }
}

fn compare(op: CmpOp, left: &Scalar, right: &Scalar) -> Result<bool, String> {
    use std::cmp::Ordering;

    let ordering = match (left, right) {
        (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
        (Scalar::Text(_), _) | (_, Scalar::Text(_)) => None,
        (a, b) => match (a, b) {
            (Scalar::Integer(x), Scalar::Integer(y)) => Some(x.cmp(y)),
            _ => {
                let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                x.partial_cmp(&y)
            }
        },
    };
    match (op, ordering) {
        (CmpOp::Eq, ord) => Ok(ord == Some(Ordering::Equal)),
        (CmpOp::Ne, ord) => Ok(ord != Some(Ordering::Equal)),
        (_, None) if matches!((left, right), (Scalar::Text(_), _) | (_, Scalar::Text(_))) => {
            Err(format!("cannot order {left:?} and {right:?}"))
        }
        (_, None) => Ok(false),
        (CmpOp::Lt, Some(ord)) => Ok(ord == Ordering::Less),
        (CmpOp::Le, Some(ord)) => Ok(ord != Ordering::Greater),
        (CmpOp::Gt, Some(ord)) => Ok(ord == Ordering::Greater),
        (CmpOp::Ge, Some(ord)) => Ok(ord != Ordering::Less),
    }
}

fn as_int(value: &Scalar) -> Option<i64> {
    match value {
        Scalar::Integer(v) => Some(*v),
        Scalar::Boolean(v) => Some(i64::from(*v)),
        _ => None,
    }
}

fn arithmetic(op: BinOp, left: &Scalar, right: &Scalar) -> Result<Scalar, String> {
    if let (Scalar::Text(a), Scalar::Text(b), BinOp::Add) = (left, right, op) {
        return Ok(Scalar::Text(format!("{a}{b}")));
    }
    if let (Some(a), Some(b)) = (as_int(left), as_int(right)) {
        let overflow = || "integer overflow".to_string();
        return match op {
            BinOp::Add => a.checked_add(b).map(Scalar::Integer).ok_or_else(overflow),
            BinOp::Sub => a.checked_sub(b).map(Scalar::Integer).ok_or_else(overflow),
            BinOp::Mul => a.checked_mul(b).map(Scalar::Integer).ok_or_else(overflow),
            BinOp::Div if b == 0 => Err("division by zero".into()),
            BinOp::Div => Ok(Scalar::Float(a as f64 / b as f64)),
            BinOp::Rem if b == 0 => Err("modulo by zero".into()),
            // result takes the sign of the divisor
            BinOp::Rem => match a.checked_rem(b) {
                Some(r) if r != 0 && (r < 0) != (b < 0) => Ok(Scalar::Integer(r + b)),
                Some(r) => Ok(Scalar::Integer(r)),
                None => Err(overflow()),
            },
            BinOp::Pow if b >= 0 => u32::try_from(b)
                .ok()
                .and_then(|e| a.checked_pow(e))
                .map(Scalar::Integer)
                .ok_or_else(overflow),
            BinOp::Pow => Ok(Scalar::Float((a as f64).powf(b as f64))),
        };
    }
    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(format!("unsupported operand types {left:?} and {right:?}"));
    };
    match op {
        BinOp::Add => Ok(Scalar::Float(a + b)),
        BinOp::Sub => Ok(Scalar::Float(a - b)),
        BinOp::Mul => Ok(Scalar::Float(a * b)),
        BinOp::Div if b == 0.0 => Err("division by zero".into()),
        BinOp::Div => Ok(Scalar::Float(a / b)),
        BinOp::Rem if b == 0.0 => Err("modulo by zero".into()),
        BinOp::Rem => Ok(Scalar::Float(a - b * (a / b).floor())),
        BinOp::Pow => Ok(Scalar::Float(a.powf(b))),
    }
}
