//! Parser and evaluator for condition, update, and projection expressions.
//!
//! Placeholders are resolved while parsing, so a parsed expression is
//! self-contained and can be evaluated against any number of items.
//! Attribute paths are dotted; a `#name` placeholder whose binding
//! contains dots contributes one segment per dot.

use std::cmp::Ordering;

use mm_core::Entity;
use serde_json::Value;

use super::{AttributeNames, AttributeValues, StoreError};

/// Maximum nesting depth of parentheses, `NOT`, and `if_not_exists`.
const MAX_EXPRESSION_DEPTH: usize = 16;

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::Expression(message.into())
}

// ---------------------------------------------------------------------------
// Placeholder bindings
// ---------------------------------------------------------------------------

/// The `#name` and `:value` maps an expression is resolved against.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bindings<'a> {
    names: Option<&'a AttributeNames>,
    values: Option<&'a AttributeValues>,
}

impl<'a> Bindings<'a> {
    #[must_use]
    pub const fn new(
        names: Option<&'a AttributeNames>,
        values: Option<&'a AttributeValues>,
    ) -> Self {
        Self { names, values }
    }

    fn name(&self, placeholder: &str) -> Result<&'a str, StoreError> {
        self.names
            .and_then(|names| names.get(placeholder))
            .map(String::as_str)
            .ok_or_else(|| invalid(format!("unbound attribute name placeholder {placeholder}")))
    }

    fn value(&self, placeholder: &str) -> Result<&'a Value, StoreError> {
        self.values
            .and_then(|values| values.get(placeholder))
            .ok_or_else(|| invalid(format!("unbound attribute value placeholder {placeholder}")))
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    fn holds(self, ordering: Option<Ordering>) -> bool {
        match self {
            Self::Eq => ordering == Some(Ordering::Equal),
            Self::Ne => ordering != Some(Ordering::Equal),
            Self::Lt => ordering == Some(Ordering::Less),
            Self::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Self::Gt => ordering == Some(Ordering::Greater),
            Self::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    Value(String),
    Ident(String),
    Cmp(Comparator),
    Dot,
    Comma,
    LParen,
    RParen,
    Plus,
    Minus,
}

const fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(input: &str) -> Result<Vec<Token>, StoreError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    let take_word = |chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>| {
        let mut word = String::new();
        while let Some(&(_, c)) = chars.peek() {
            if !is_word_char(c) {
                break;
            }
            word.push(c);
            chars.next();
        }
        word
    };

    while let Some(&(offset, c)) = chars.peek() {
        let single = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '.' => Some(Token::Dot),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '=' => Some(Token::Cmp(Comparator::Eq)),
            _ => None,
        };
        if let Some(token) = single {
            chars.next();
            tokens.push(token);
            continue;
        }

        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '<' | '>' => {
                chars.next();
                let next = chars.peek().map(|&(_, n)| n);
                let cmp = match (c, next) {
                    ('<', Some('>')) => Comparator::Ne,
                    ('<', Some('=')) => Comparator::Le,
                    ('>', Some('=')) => Comparator::Ge,
                    ('<', _) => Comparator::Lt,
                    _ => Comparator::Gt,
                };
                if matches!(cmp, Comparator::Ne | Comparator::Le | Comparator::Ge) {
                    chars.next();
                }
                tokens.push(Token::Cmp(cmp));
            }
            '#' | ':' => {
                chars.next();
                let word = take_word(&mut chars);
                if word.is_empty() {
                    return Err(invalid(format!("empty placeholder at offset {offset}")));
                }
                tokens.push(if c == '#' {
                    Token::Name(format!("#{word}"))
                } else {
                    Token::Value(format!(":{word}"))
                });
            }
            c if is_word_char(c) => tokens.push(Token::Ident(take_word(&mut chars))),
            other => {
                return Err(invalid(format!("unexpected character `{other}` at offset {offset}")));
            }
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Syntax tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Path(String),
    Value(Value),
}

impl Operand {
    fn resolve<'e>(&'e self, item: &'e Entity) -> Option<&'e Value> {
        match self {
            Self::Path(path) => item.get_path(path),
            Self::Value(value) => Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Cond {
    Compare(Operand, Comparator, Operand),
    Between(Operand, Operand, Operand),
    In(Operand, Vec<Operand>),
    BeginsWith(Operand, Operand),
    Contains(Operand, Operand),
    Exists(String),
    NotExists(String),
    And(Box<Cond>, Box<Cond>),
    Or(Box<Cond>, Box<Cond>),
    Not(Box<Cond>),
}

#[derive(Debug, Clone, PartialEq)]
enum UpdateValue {
    Operand(Operand),
    IfNotExists(String, Box<UpdateValue>),
    Add(Box<UpdateValue>, Box<UpdateValue>),
    Sub(Box<UpdateValue>, Box<UpdateValue>),
}

#[derive(Debug, Clone, PartialEq)]
enum UpdateAction {
    Set(String, UpdateValue),
    Remove(String),
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    bindings: Bindings<'a>,
}

impl<'a> Parser<'a> {
    fn new(input: &str, bindings: Bindings<'a>) -> Result<Self, StoreError> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
            depth: 0,
            bindings,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), StoreError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(invalid(format!("expected {token:?}, found {:?}", self.peek())))
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = self.is_keyword(keyword);
        if found {
            self.pos += 1;
        }
        found
    }

    fn is_function_call(&self) -> bool {
        matches!(self.peek(), Some(Token::Ident(_)))
            && self.tokens.get(self.pos + 1) == Some(&Token::LParen)
    }

    fn enter(&mut self) -> Result<(), StoreError> {
        self.depth += 1;
        if self.depth > MAX_EXPRESSION_DEPTH {
            return Err(invalid(format!(
                "expression depth exceeds maximum of {MAX_EXPRESSION_DEPTH}"
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn finish(&self) -> Result<(), StoreError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(invalid(format!("unexpected trailing token {:?}", self.peek())))
        }
    }

    // --- Paths and operands ---

    fn segment(&mut self, path: &mut String) -> Result<(), StoreError> {
        let segment = match self.next() {
            Some(Token::Name(placeholder)) => self.bindings.name(&placeholder)?.to_string(),
            Some(Token::Ident(word)) => word,
            other => return Err(invalid(format!("expected attribute name, found {other:?}"))),
        };
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(&segment);
        Ok(())
    }

    fn path(&mut self) -> Result<String, StoreError> {
        let mut path = String::new();
        self.segment(&mut path)?;
        while self.eat(&Token::Dot) {
            self.segment(&mut path)?;
        }
        Ok(path)
    }

    fn operand(&mut self) -> Result<Operand, StoreError> {
        if let Some(Token::Value(placeholder)) = self.peek() {
            let value = self.bindings.value(placeholder)?.clone();
            self.pos += 1;
            return Ok(Operand::Value(value));
        }
        self.path().map(Operand::Path)
    }

    // --- Conditions ---

    fn or(&mut self) -> Result<Cond, StoreError> {
        let mut left = self.and()?;
        while self.eat_keyword("OR") {
            let right = self.and()?;
            left = Cond::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Cond, StoreError> {
        let mut left = self.not()?;
        while self.eat_keyword("AND") {
            let right = self.not()?;
            left = Cond::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Cond, StoreError> {
        if self.eat_keyword("NOT") {
            self.enter()?;
            let inner = self.not()?;
            self.leave();
            return Ok(Cond::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Cond, StoreError> {
        if self.eat(&Token::LParen) {
            self.enter()?;
            let inner = self.or()?;
            self.expect(&Token::RParen)?;
            self.leave();
            return Ok(inner);
        }
        if self.is_function_call() {
            return self.function();
        }

        let left = self.operand()?;
        if let Some(Token::Cmp(cmp)) = self.peek() {
            let cmp = *cmp;
            self.pos += 1;
            return Ok(Cond::Compare(left, cmp, self.operand()?));
        }
        if self.eat_keyword("BETWEEN") {
            let low = self.operand()?;
            if !self.eat_keyword("AND") {
                return Err(invalid("BETWEEN requires `AND`"));
            }
            return Ok(Cond::Between(left, low, self.operand()?));
        }
        if self.eat_keyword("IN") {
            self.expect(&Token::LParen)?;
            let mut list = vec![self.operand()?];
            while self.eat(&Token::Comma) {
                list.push(self.operand()?);
            }
            self.expect(&Token::RParen)?;
            return Ok(Cond::In(left, list));
        }
        Err(invalid(format!("expected a comparison, found {:?}", self.peek())))
    }

    fn function(&mut self) -> Result<Cond, StoreError> {
        let Some(Token::Ident(name)) = self.next() else {
            return Err(invalid("expected a function name"));
        };
        self.expect(&Token::LParen)?;
        let cond = match name.to_ascii_lowercase().as_str() {
            "attribute_exists" => Cond::Exists(self.path()?),
            "attribute_not_exists" => Cond::NotExists(self.path()?),
            "begins_with" | "contains" => {
                let subject = self.operand()?;
                self.expect(&Token::Comma)?;
                let operand = self.operand()?;
                if name.eq_ignore_ascii_case("begins_with") {
                    Cond::BeginsWith(subject, operand)
                } else {
                    Cond::Contains(subject, operand)
                }
            }
            _ => return Err(invalid(format!("unknown function `{name}`"))),
        };
        self.expect(&Token::RParen)?;
        Ok(cond)
    }

    // --- Updates ---

    fn update_value(&mut self) -> Result<UpdateValue, StoreError> {
        let left = self.update_term()?;
        if self.eat(&Token::Plus) {
            return Ok(UpdateValue::Add(Box::new(left), Box::new(self.update_term()?)));
        }
        if self.eat(&Token::Minus) {
            return Ok(UpdateValue::Sub(Box::new(left), Box::new(self.update_term()?)));
        }
        Ok(left)
    }

    fn update_term(&mut self) -> Result<UpdateValue, StoreError> {
        if self.is_function_call() {
            let Some(Token::Ident(name)) = self.next() else {
                return Err(invalid("expected a function name"));
            };
            if !name.eq_ignore_ascii_case("if_not_exists") {
                return Err(invalid(format!("unknown update function `{name}`")));
            }
            self.expect(&Token::LParen)?;
            self.enter()?;
            let path = self.path()?;
            self.expect(&Token::Comma)?;
            let fallback = self.update_value()?;
            self.leave();
            self.expect(&Token::RParen)?;
            return Ok(UpdateValue::IfNotExists(path, Box::new(fallback)));
        }
        self.operand().map(UpdateValue::Operand)
    }

    fn update_actions(&mut self) -> Result<Vec<UpdateAction>, StoreError> {
        let mut actions = Vec::new();
        while !self.at_end() {
            if self.eat_keyword("SET") {
                loop {
                    let path = self.path()?;
                    self.expect(&Token::Cmp(Comparator::Eq))?;
                    actions.push(UpdateAction::Set(path, self.update_value()?));
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
            } else if self.eat_keyword("REMOVE") {
                loop {
                    actions.push(UpdateAction::Remove(self.path()?));
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
            } else {
                return Err(invalid(format!("expected SET or REMOVE, found {:?}", self.peek())));
            }
        }
        if actions.is_empty() {
            return Err(invalid("update expression is empty"));
        }
        Ok(actions)
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// A parsed condition, key-condition, or filter expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionExpr(Cond);

impl ConditionExpr {
    /// Parse `input`, resolving placeholders from `bindings`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Expression` on a syntax error, an unbound
    /// placeholder, or nesting deeper than 16 levels.
    pub fn parse(input: &str, bindings: Bindings<'_>) -> Result<Self, StoreError> {
        let mut parser = Parser::new(input, bindings)?;
        let cond = parser.or()?;
        parser.finish()?;
        Ok(Self(cond))
    }

    /// Whether `item` satisfies the condition. An absent item is an
    /// empty entity.
    #[must_use]
    pub fn matches(&self, item: &Entity) -> bool {
        eval(&self.0, item)
    }

    /// The value `attribute` is pinned to by a top-level `attribute = :v`
    /// conjunct, if any.
    #[must_use]
    pub fn equality_on(&self, attribute: &str) -> Option<&Value> {
        fn walk<'c>(cond: &'c Cond, attribute: &str) -> Option<&'c Value> {
            match cond {
                Cond::And(left, right) => walk(left, attribute).or_else(|| walk(right, attribute)),
                Cond::Compare(Operand::Path(path), Comparator::Eq, Operand::Value(value))
                | Cond::Compare(Operand::Value(value), Comparator::Eq, Operand::Path(path))
                    if path == attribute =>
                {
                    Some(value)
                }
                _ => None,
            }
        }
        walk(&self.0, attribute)
    }
}

fn eval(cond: &Cond, item: &Entity) -> bool {
    match cond {
        Cond::Compare(left, cmp, right) => {
            let ordering = match (left.resolve(item), right.resolve(item)) {
                (Some(l), Some(r)) => compare_values(l, r),
                _ => None,
            };
            cmp.holds(ordering)
        }
        Cond::Between(subject, low, high) => {
            let bounds = (subject.resolve(item), low.resolve(item), high.resolve(item));
            let (Some(v), Some(lo), Some(hi)) = bounds else {
                return false;
            };
            Comparator::Ge.holds(compare_values(v, lo))
                && Comparator::Le.holds(compare_values(v, hi))
        }
        Cond::In(subject, list) => subject.resolve(item).is_some_and(|v| {
            list.iter()
                .filter_map(|candidate| candidate.resolve(item))
                .any(|candidate| compare_values(v, candidate) == Some(Ordering::Equal))
        }),
        Cond::BeginsWith(subject, prefix) => matches!(
            (subject.resolve(item), prefix.resolve(item)),
            (Some(Value::String(s)), Some(Value::String(p))) if s.starts_with(p.as_str())
        ),
        Cond::Contains(subject, needle) => match (subject.resolve(item), needle.resolve(item)) {
            (Some(Value::String(s)), Some(Value::String(n))) => s.contains(n.as_str()),
            (Some(Value::Array(items)), Some(n)) => items.contains(n),
            _ => false,
        },
        Cond::Exists(path) => item.get_path(path).is_some(),
        Cond::NotExists(path) => item.get_path(path).is_none(),
        Cond::And(left, right) => eval(left, item) && eval(right, item),
        Cond::Or(left, right) => eval(left, item) || eval(right, item),
        Cond::Not(inner) => !eval(inner, item),
    }
}

/// Order two JSON values of the same kind.
///
/// Numbers compare as `f64`, strings lexicographically, booleans
/// `false < true`, and `null == null`. Mismatched kinds are unordered.
#[must_use]
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Array(_) | Value::Object(_), _) => (left == right).then_some(Ordering::Equal),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// A parsed `SET ... REMOVE ...` update expression.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateExpr(Vec<UpdateAction>);

impl UpdateExpr {
    /// Parse `input`, resolving placeholders from `bindings`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Expression` on a syntax error or an unbound
    /// placeholder.
    pub fn parse(input: &str, bindings: Bindings<'_>) -> Result<Self, StoreError> {
        let mut parser = Parser::new(input, bindings)?;
        let actions = parser.update_actions()?;
        parser.finish()?;
        Ok(Self(actions))
    }

    /// Paths written or removed by this update, in declaration order.
    #[must_use]
    pub fn touched(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|action| match action {
                UpdateAction::Set(path, _) | UpdateAction::Remove(path) => path.clone(),
            })
            .collect()
    }

    /// Apply to a copy of `item`. Every operand is read from the original
    /// item, so `SET #v = #v + :one` sees the pre-update value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Expression` when an operand path is missing
    /// or arithmetic meets a non-numeric value.
    pub fn apply(&self, item: &Entity) -> Result<Entity, StoreError> {
        let mut resolved = Vec::with_capacity(self.0.len());
        for action in &self.0 {
            resolved.push(match action {
                UpdateAction::Set(path, value) => (path, Some(eval_update(value, item)?)),
                UpdateAction::Remove(path) => (path, None),
            });
        }

        let mut updated = item.clone();
        for (path, value) in resolved {
            match value {
                Some(value) => updated.set_path(path, value),
                None => {
                    updated.remove_path(path);
                }
            }
        }
        Ok(updated)
    }
}

fn eval_update(value: &UpdateValue, item: &Entity) -> Result<Value, StoreError> {
    match value {
        UpdateValue::Operand(operand) => operand.resolve(item).cloned().ok_or_else(|| {
            invalid(format!(
                "update operand `{}` does not exist",
                match operand {
                    Operand::Path(path) => path.as_str(),
                    Operand::Value(_) => "value",
                }
            ))
        }),
        UpdateValue::IfNotExists(path, fallback) => match item.get_path(path) {
            Some(existing) => Ok(existing.clone()),
            None => eval_update(fallback, item),
        },
        UpdateValue::Add(left, right) => {
            arithmetic(&eval_update(left, item)?, &eval_update(right, item)?, false)
        }
        UpdateValue::Sub(left, right) => {
            arithmetic(&eval_update(left, item)?, &eval_update(right, item)?, true)
        }
    }
}

fn arithmetic(left: &Value, right: &Value, subtract: bool) -> Result<Value, StoreError> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        let exact = if subtract { a.checked_sub(b) } else { a.checked_add(b) };
        if let Some(n) = exact {
            return Ok(Value::from(n));
        }
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => Ok(Value::from(if subtract { a - b } else { a + b })),
        _ => Err(invalid("arithmetic requires numeric operands")),
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// A parsed projection: the attribute paths to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection(Vec<String>);

impl Projection {
    /// Parse a comma-separated list of paths.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Expression` on a syntax error or an unbound
    /// placeholder.
    pub fn parse(input: &str, bindings: Bindings<'_>) -> Result<Self, StoreError> {
        let mut parser = Parser::new(input, bindings)?;
        let mut paths = vec![parser.path()?];
        while parser.eat(&Token::Comma) {
            paths.push(parser.path()?);
        }
        parser.finish()?;
        Ok(Self(paths))
    }

    /// Copy of `item` holding only the projected paths that exist.
    #[must_use]
    pub fn apply(&self, item: &Entity) -> Entity {
        let mut projected = Entity::new();
        for path in &self.0 {
            if let Some(value) = item.get_path(path) {
                projected.set_path(path, value.clone());
            }
        }
        projected
    }

    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.0
    }
}
