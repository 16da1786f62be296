//! Expression AST, parser and evaluator.
//!
//! Expressions are parsed from a shared [`Cursor`], so several expressions can
//! be read one after another from the same line: parsing stops as soon as the
//! next token cannot continue the current expression. Identifiers are
//! resolved at parse time through an [`ExpressionContext`]; evaluation happens
//! later against an [`Env`].
//!
//! Operator precedence (lowest → highest):
//!   comparison (`== != < > <= >=`)  →  additive (`+ -`)  →
//!   multiplicative (`* /`)  →  prefix (`- ! not sqrt abs`)  →  term

use std::fmt;

use crate::error::{EvalError, SyntaxError};
use crate::value::Value;

/// A function callable from expressions. Receives the evaluation environment
/// and the value of its single argument.
pub type Function = fn(&dyn Env, Value) -> Result<Value, EvalError>;

/// Runtime environment expressions are evaluated against.
pub trait Env {
    /// Value bound to a runtime variable.
    fn variable(&self, name: &str) -> Option<Value>;

    /// Current value of a named progress state.
    fn state(&self, name: &str) -> Option<Value>;
}

/// The empty environment: nothing is bound.
impl Env for () {
    fn variable(&self, _name: &str) -> Option<Value> {
        None
    }

    fn state(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Parse-time resolution of identifiers.
pub trait ExpressionContext {
    fn is_variable(&self, name: &str) -> bool;

    /// The expression a variable name stands for.
    fn variable(&self, name: &str) -> Option<Expression>;

    fn is_function(&self, name: &str) -> bool;

    fn function(&self, name: &str) -> Option<Function>;
}

/// Resolves nothing. Only literals and operators parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyContext;

impl ExpressionContext for EmptyContext {
    fn is_variable(&self, _name: &str) -> bool {
        false
    }

    fn variable(&self, _name: &str) -> Option<Expression> {
        None
    }

    fn is_function(&self, _name: &str) -> bool {
        false
    }

    fn function(&self, _name: &str) -> Option<Function> {
        None
    }
}

/// Context used for statement keywords: every bare identifier is a string
/// literal of its own name.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordContext;

impl ExpressionContext for KeywordContext {
    fn is_variable(&self, _name: &str) -> bool {
        true
    }

    fn variable(&self, name: &str) -> Option<Expression> {
        Some(Expression::Literal(Value::Str(name.to_string())))
    }

    fn is_function(&self, _name: &str) -> bool {
        false
    }

    fn function(&self, _name: &str) -> Option<Function> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::LtEq => "<=",
            BinOp::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Sqrt,
    Abs,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::Sqrt => "sqrt ",
            UnaryOp::Abs => "abs ",
        }
    }
}

/// An immutable, lazily evaluated expression tree.
#[derive(Clone)]
pub enum Expression {
    Literal(Value),
    /// Bound at evaluation time through [`Env::variable`].
    Variable(String),
    FunctionCall {
        name: String,
        function: Function,
        arg: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(Value::Str(s)) => {
                write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::FunctionCall { name, arg, .. } => write!(f, "{}({})", name, arg),
            Expression::Unary { op, operand } => write!(f, "{}{}", op.symbol(), operand),
            Expression::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
        }
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expression({})", self)
    }
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn eval(&self, env: &dyn Env) -> Result<Value, EvalError> {
        match self {
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Variable(name) => env
                .variable(name)
                .ok_or_else(|| EvalError::UnresolvedReference(format!("variable '{}' is not bound", name))),
            Expression::FunctionCall { function, arg, .. } => {
                let arg = arg.eval(env)?;
                function(env, arg)
            }
            Expression::Unary { op, operand } => apply_unary(*op, operand.eval(env)?),
            Expression::Binary { op, left, right } => {
                let lhs = left.eval(env)?;
                let rhs = right.eval(env)?;
                apply_binary(*op, lhs, rhs)
            }
        }
    }
}

fn apply_unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Neg => {
            let n = expect_int(&value, "-")?;
            n.checked_neg()
                .map(Value::Int)
                .ok_or_else(|| EvalError::Arithmetic("integer overflow in negation".to_string()))
        }
        UnaryOp::Abs => {
            let n = expect_int(&value, "abs")?;
            n.checked_abs()
                .map(Value::Int)
                .ok_or_else(|| EvalError::Arithmetic("integer overflow in abs".to_string()))
        }
        UnaryOp::Sqrt => {
            let n = expect_int(&value, "sqrt")?;
            if n < 0 {
                return Err(EvalError::Arithmetic(format!("square root of negative number {}", n)));
            }
            Ok(Value::Int(integer_sqrt(n)))
        }
    }
}

fn integer_sqrt(n: i64) -> i64 {
    let mut root = (n as f64).sqrt() as i64;
    while root > 0 && root.saturating_mul(root) > n {
        root -= 1;
    }
    while (root + 1).saturating_mul(root + 1) <= n {
        root += 1;
    }
    root
}

fn expect_int(value: &Value, op: &str) -> Result<i64, EvalError> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(EvalError::TypeMismatch(format!(
            "operator '{}' requires integer operands, got {}",
            op,
            other.kind()
        ))),
    }
}

fn apply_binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    let overflow = || EvalError::Arithmetic(format!("integer overflow in '{}'", op.symbol()));
    match op {
        BinOp::Add => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
            (Value::Int(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            (Value::Str(a), Value::Int(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            (a, b) => Err(EvalError::TypeMismatch(format!(
                "cannot add {} and {}",
                a.kind(),
                b.kind()
            ))),
        },
        BinOp::Sub | BinOp::Mul | BinOp::Div => {
            let a = expect_int(&lhs, op.symbol())?;
            let b = expect_int(&rhs, op.symbol())?;
            let result = match op {
                BinOp::Sub => a.checked_sub(b),
                BinOp::Mul => a.checked_mul(b),
                _ => {
                    if b == 0 {
                        return Err(EvalError::Arithmetic("division by zero".to_string()));
                    }
                    a.checked_div(b)
                }
            };
            result.map(Value::Int).ok_or_else(overflow)
        }
        BinOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinOp::NotEq => Ok(Value::Bool(lhs != rhs)),
        BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => {
            let ordering = match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => a.cmp(b),
                (Value::Str(a), Value::Str(b)) => a.cmp(b),
                (a, b) => {
                    return Err(EvalError::TypeMismatch(format!(
                        "cannot compare {} with {}",
                        a.kind(),
                        b.kind()
                    )))
                }
            };
            let result = match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Gt => ordering.is_gt(),
                BinOp::LtEq => ordering.is_le(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
    }
}

/// A read position into a line of source text.
///
/// The only state carried between successive [`parse_expression`] calls.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    /// Open parentheses and call arguments around the current position.
    depth: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0, depth: 0 }
    }

    /// Byte offset of the next unread character.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The unconsumed remainder of the text.
    pub fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    pub fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.bump();
        }
    }

    /// True when only whitespace remains.
    pub fn is_at_end(&self) -> bool {
        self.rest().trim_start().is_empty()
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Parses `inner` one nesting level deeper, then expects a closing `)`.
    fn nested<T>(
        &mut self,
        inner: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
        missing: impl FnOnce() -> String,
    ) -> Result<T, SyntaxError> {
        self.depth += 1;
        let result = inner(self);
        self.depth -= 1;
        let value = result?;
        self.skip_whitespace();
        if self.bump() != Some(')') {
            return Err(self.error(missing()));
        }
        Ok(value)
    }

    /// True where a `-digit` after whitespace may start the next expression
    /// of a parameter list rather than continue a subtraction.
    fn at_expression_boundary(&self) -> bool {
        self.depth == 0
            && self.previous_is_whitespace()
            && self.peek_second().is_some_and(|c| c.is_ascii_digit())
    }

    fn previous_is_whitespace(&self) -> bool {
        self.text[..self.pos]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.pos)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parses one full expression starting at the cursor.
pub fn parse_expression(cursor: &mut Cursor, ctx: &dyn ExpressionContext) -> Result<Expression, SyntaxError> {
    parse_comparison(cursor, ctx)
}

/// Parses a string from start to end, rejecting anything left over.
pub fn parse_complete(text: &str, ctx: &dyn ExpressionContext) -> Result<Expression, SyntaxError> {
    let mut cursor = Cursor::new(text);
    let expr = parse_expression(&mut cursor, ctx)?;
    cursor.skip_whitespace();
    if !cursor.is_at_end() {
        return Err(cursor.error(format!("Unexpected input '{}'", cursor.rest())));
    }
    Ok(expr)
}

fn parse_comparison(cursor: &mut Cursor, ctx: &dyn ExpressionContext) -> Result<Expression, SyntaxError> {
    let mut left = parse_additive(cursor, ctx)?;
    loop {
        cursor.skip_whitespace();
        let op = if cursor.eat("==") {
            BinOp::Eq
        } else if cursor.eat("!=") {
            BinOp::NotEq
        } else if cursor.eat("<=") {
            BinOp::LtEq
        } else if cursor.eat(">=") {
            BinOp::GtEq
        } else if cursor.eat("<") {
            BinOp::Lt
        } else if cursor.eat(">") {
            BinOp::Gt
        } else {
            return Ok(left);
        };
        let right = parse_additive(cursor, ctx)?;
        left = binary(op, left, right);
    }
}

fn parse_additive(cursor: &mut Cursor, ctx: &dyn ExpressionContext) -> Result<Expression, SyntaxError> {
    let mut left = parse_multiplicative(cursor, ctx)?;
    loop {
        cursor.skip_whitespace();
        let op = match cursor.peek() {
            Some('+') => BinOp::Add,
            // `a -1` reads as two expressions, `a - 1`, `a-1` and `(a -1)` as one.
            Some('-') if !cursor.at_expression_boundary() => BinOp::Sub,
            _ => return Ok(left),
        };
        cursor.bump();
        let right = parse_multiplicative(cursor, ctx)?;
        left = binary(op, left, right);
    }
}

fn parse_multiplicative(cursor: &mut Cursor, ctx: &dyn ExpressionContext) -> Result<Expression, SyntaxError> {
    let mut left = parse_unary(cursor, ctx)?;
    loop {
        cursor.skip_whitespace();
        let op = match cursor.peek() {
            Some('*') => BinOp::Mul,
            Some('/') => BinOp::Div,
            _ => return Ok(left),
        };
        cursor.bump();
        let right = parse_unary(cursor, ctx)?;
        left = binary(op, left, right);
    }
}

fn parse_unary(cursor: &mut Cursor, ctx: &dyn ExpressionContext) -> Result<Expression, SyntaxError> {
    cursor.skip_whitespace();
    let op = match cursor.peek() {
        Some('-') => Some(UnaryOp::Neg),
        Some('!') if cursor.peek_second() != Some('=') => Some(UnaryOp::Not),
        _ => None,
    };
    if let Some(op) = op {
        cursor.bump();
        let operand = parse_unary(cursor, ctx)?;
        return Ok(unary(op, operand));
    }

    let word: String = cursor.rest().chars().take_while(|c| is_ident_char(*c)).collect();
    let op = match word.as_str() {
        "sqrt" => Some(UnaryOp::Sqrt),
        "abs" => Some(UnaryOp::Abs),
        "not" => Some(UnaryOp::Not),
        _ => None,
    };
    if let Some(op) = op {
        cursor.pos += word.len();
        let operand = parse_unary(cursor, ctx)?;
        return Ok(unary(op, operand));
    }

    parse_term(cursor, ctx)
}

/// Parses a single operand: a literal, an identifier, a function call or a
/// parenthesised expression. No operators are consumed after it.
pub fn parse_term(cursor: &mut Cursor, ctx: &dyn ExpressionContext) -> Result<Expression, SyntaxError> {
    cursor.skip_whitespace();
    match cursor.peek() {
        Some(c) if c.is_ascii_digit() => parse_integer(cursor),
        Some(q @ ('"' | '\'')) => parse_string(cursor, q),
        Some('(') => {
            cursor.bump();
            cursor.nested(|c| parse_expression(c, ctx), || "Expected ')'".to_string())
        }
        Some(c) if is_ident_start(c) => parse_identifier(cursor, ctx),
        Some(c) => Err(cursor.error(format!("Unexpected character '{}'", c))),
        None => Err(cursor.error("Unexpected end of input, expected expression")),
    }
}

fn parse_integer(cursor: &mut Cursor) -> Result<Expression, SyntaxError> {
    let start = cursor.position();
    while cursor.peek().is_some_and(|c| c.is_ascii_digit()) {
        cursor.bump();
    }
    let digits = &cursor.text[start..cursor.position()];
    digits
        .parse::<i64>()
        .map(|n| Expression::Literal(Value::Int(n)))
        .map_err(|_| SyntaxError::new(format!("Invalid number: {}", digits), start))
}

fn parse_string(cursor: &mut Cursor, quote: char) -> Result<Expression, SyntaxError> {
    let start = cursor.position();
    cursor.bump();
    let mut s = String::new();
    loop {
        match cursor.bump() {
            Some('\\') => match cursor.bump() {
                Some(c) if c == quote || c == '\\' => s.push(c),
                Some(c) => {
                    s.push('\\');
                    s.push(c);
                }
                None => return Err(SyntaxError::new("Unterminated string", start)),
            },
            Some(c) if c == quote => break,
            Some(c) => s.push(c),
            None => return Err(SyntaxError::new("Unterminated string", start)),
        }
    }
    Ok(Expression::Literal(Value::Str(s)))
}

fn parse_identifier(cursor: &mut Cursor, ctx: &dyn ExpressionContext) -> Result<Expression, SyntaxError> {
    let start = cursor.position();
    while cursor.peek().is_some_and(is_ident_char) {
        cursor.bump();
    }
    let name = cursor.text[start..cursor.position()].to_string();

    match name.as_str() {
        "true" => return Ok(Expression::Literal(Value::Bool(true))),
        "false" => return Ok(Expression::Literal(Value::Bool(false))),
        "null" => return Ok(Expression::Literal(Value::Null)),
        _ => {}
    }

    let followed_by_paren = cursor.peek() == Some('(');
    if followed_by_paren {
        if let Some(function) = ctx.function(&name).filter(|_| ctx.is_function(&name)) {
            cursor.bump();
            let arg = cursor.nested(
                |c| parse_expression(c, ctx),
                || format!("Expected ')' after argument to '{}'", name),
            )?;
            return Ok(Expression::FunctionCall {
                name,
                function,
                arg: Box::new(arg),
            });
        }
    }

    if ctx.is_variable(&name) {
        if let Some(bound) = ctx.variable(&name) {
            return Ok(bound);
        }
    }

    let what = if followed_by_paren { "function" } else { "variable" };
    Err(SyntaxError::new(format!("Unknown {} '{}'", what, name), start))
}

fn binary(op: BinOp, left: Expression, right: Expression) -> Expression {
    Expression::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn unary(op: UnaryOp, operand: Expression) -> Expression {
    Expression::Unary {
        op,
        operand: Box::new(operand),
    }
}
