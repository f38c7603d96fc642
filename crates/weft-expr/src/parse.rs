#![forbid(unsafe_code)]

//! Attribute expression parsing.
//!
//! Attribute values are parsed exactly once into a [`ParsedExpr`]: the
//! expression form, the root variable, the property path, and the closure of
//! variable names the expression can read. The grammar is deliberately
//! bounded; it is a binding language, not a programming language:
//!
//! ```text
//! input      := loop | statement | expression
//! expression := path
//! path       := ident segment*
//! segment    := "." ident | "[" bracket "]"
//! bracket    := literal | path
//! statement  := path "=" rhs
//! rhs        := object | literal | path
//! object     := "{" "}" | "{" entry ("," entry)* "}"
//! entry      := ident ":" (literal | path)
//! loop       := binding "in" path
//! binding    := ident | "(" ident "," ident ")"
//! ident      := alpha ("_" "$" alnum)*
//! literal    := number | "'...'" | '"..."' | true | false | null
//! ```
//!
//! Bracket literals fold into static segments of their key string (`[0]`
//! reads like `.0`, matching host property-key coercion), so only brackets
//! holding a nested path stay dynamic.
//!
//! # Invariants
//!
//! 1. Parsing is pure and deterministic: equal input strings produce equal
//!    [`ParsedExpr`] values, which makes results cacheable by content.
//! 2. `dependencies()` is the superset closure of every variable name the
//!    expression can touch: the root plus the roots of all nested bracket
//!    expressions and assignment values, recursively, in first-appearance
//!    order without duplicates. Loop item/index names are introduced
//!    bindings and never appear as dependencies.
//! 3. A [`ParsedExpr`] is immutable after construction.

use std::fmt;

use bitflags::bitflags;
use smallvec::SmallVec;
use thiserror::Error;
use weft_core::Value;

/// Which of the three expression forms a parse produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    /// A readable property path.
    Expression,
    /// A `target = value` assignment.
    Statement,
    /// An `item in collection` iteration form.
    Loop,
}

impl ExprKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ExprKind::Expression => "expression",
            ExprKind::Statement => "statement",
            ExprKind::Loop => "loop",
        }
    }

    /// The singleton [`ExprKinds`] set for this kind.
    #[must_use]
    pub const fn as_flag(self) -> ExprKinds {
        match self {
            ExprKind::Expression => ExprKinds::EXPRESSION,
            ExprKind::Statement => ExprKinds::STATEMENT,
            ExprKind::Loop => ExprKinds::LOOP,
        }
    }
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Allow-set of expression forms. Directives use this to gate which
    /// forms their attributes may contain.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExprKinds: u8 {
        const EXPRESSION = 1 << 0;
        const STATEMENT = 1 << 1;
        const LOOP = 1 << 2;
    }
}

impl ExprKinds {
    #[must_use]
    pub const fn allows(self, kind: ExprKind) -> bool {
        self.contains(kind.as_flag())
    }
}

/// One step of a property path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// A fixed key: `.name`, or a bracket literal folded to its key string.
    Static(String),
    /// A bracket expression resolved against the live context at
    /// evaluation time.
    Dynamic(Box<ParsedExpr>),
}

/// The right-hand side of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignValue {
    Literal(Value),
    Expr(Box<ParsedExpr>),
    /// Brace object; entries are applied key by key under the target.
    Object(Vec<(String, AssignValue)>),
}

/// Names introduced by a loop form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopBinding {
    pub item: String,
    pub index: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Detail {
    Expression,
    Statement(AssignValue),
    Loop(LoopBinding),
}

/// A parsed attribute expression.
///
/// Produced by [`parse`]; immutable afterwards. For statements, `var_name`
/// and `path` describe the assignment target; for loops, the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExpr {
    var_name: String,
    path: SmallVec<[PathSegment; 4]>,
    dependencies: Vec<String>,
    detail: Detail,
}

impl ParsedExpr {
    #[must_use]
    pub fn kind(&self) -> ExprKind {
        match self.detail {
            Detail::Expression => ExprKind::Expression,
            Detail::Statement(_) => ExprKind::Statement,
            Detail::Loop(_) => ExprKind::Loop,
        }
    }

    /// Root variable identifier: what the path starts from.
    #[must_use]
    pub fn var_name(&self) -> &str {
        &self.var_name
    }

    /// Property path below the root, possibly empty.
    #[must_use]
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// Every variable name this expression can read, in first-appearance
    /// order, without duplicates. Subscribing to all of these covers every
    /// value the expression depends on.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// The assignment value, for statement-kind expressions.
    #[must_use]
    pub fn assign_value(&self) -> Option<&AssignValue> {
        match &self.detail {
            Detail::Statement(value) => Some(value),
            _ => None,
        }
    }

    /// The item/index names, for loop-kind expressions.
    #[must_use]
    pub fn loop_binding(&self) -> Option<&LoopBinding> {
        match &self.detail {
            Detail::Loop(binding) => Some(binding),
            _ => None,
        }
    }

    fn expression(var_name: String, path: SmallVec<[PathSegment; 4]>) -> Self {
        let mut dependencies = Vec::new();
        collect_path_deps(&var_name, &path, &mut dependencies);
        Self {
            var_name,
            path,
            dependencies,
            detail: Detail::Expression,
        }
    }

    fn statement(target: ParsedExpr, value: AssignValue) -> Self {
        let mut dependencies = target.dependencies;
        collect_assign_deps(&value, &mut dependencies);
        Self {
            var_name: target.var_name,
            path: target.path,
            dependencies,
            detail: Detail::Statement(value),
        }
    }

    fn loop_over(collection: ParsedExpr, binding: LoopBinding) -> Self {
        Self {
            var_name: collection.var_name,
            path: collection.path,
            dependencies: collection.dependencies,
            detail: Detail::Loop(binding),
        }
    }
}

/// Parse failures. Each names the first grammar rule the input broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,
    #[error("expression root `{token}` is not a valid identifier")]
    InvalidRoot { token: String },
    #[error("expected identifier after `.`")]
    MissingProperty,
    #[error("empty `[]` path segment")]
    EmptyBracket,
    #[error("unterminated `[` path segment")]
    UnterminatedBracket,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid number literal `{token}`")]
    InvalidNumber { token: String },
    #[error("loop binding must be `item` or `(item, index)`")]
    MalformedLoopBinding,
    #[error("incomplete loop: expected `in <collection>` after the binding")]
    IncompleteLoop,
    #[error("expected a literal or property path")]
    ExpectedValue,
    #[error("malformed object entry: expected `key: value`")]
    MalformedEntry,
    #[error("unterminated `{{` object value")]
    UnterminatedObject,
    #[error("unexpected trailing input `{rest}`")]
    TrailingInput { rest: String },
}

/// Parse one attribute value.
pub fn parse(input: &str) -> Result<ParsedExpr, ParseError> {
    let mut cur = Cursor::new(input);
    cur.skip_ws();
    if cur.at_end() {
        return Err(ParseError::Empty);
    }

    // `(item, index) in coll`: nothing else starts with a parenthesis.
    if cur.peek() == Some('(') {
        let (item, index) = parse_paren_binding(&mut cur)?;
        return parse_loop_tail(
            &mut cur,
            LoopBinding {
                item,
                index: Some(index),
            },
        );
    }

    // `item in coll`: an identifier followed by the `in` keyword. Anything
    // else backtracks to the expression/statement grammar.
    let start = cur.pos;
    if let Some(name) = cur.ident() {
        let item = name.to_string();
        cur.skip_ws();
        if cur.at_keyword("in") {
            return parse_loop_tail(&mut cur, LoopBinding { item, index: None });
        }
    }
    cur.pos = start;

    let target = parse_path_expr(&mut cur)?;
    cur.skip_ws();
    if cur.eat('=') {
        cur.skip_ws();
        let value = match cur.peek() {
            Some('{') => parse_object(&mut cur)?,
            _ => parse_atom(&mut cur)?,
        };
        cur.skip_ws();
        if !cur.at_end() {
            return Err(cur.trailing());
        }
        return Ok(ParsedExpr::statement(target, value));
    }
    if !cur.at_end() {
        return Err(cur.trailing());
    }
    Ok(target)
}

// ---------------------------------------------------------------------------
// Grammar rules
// ---------------------------------------------------------------------------

fn parse_loop_tail(cur: &mut Cursor<'_>, binding: LoopBinding) -> Result<ParsedExpr, ParseError> {
    if !cur.eat_keyword("in") {
        return Err(ParseError::IncompleteLoop);
    }
    cur.skip_ws();
    if cur.at_end() {
        return Err(ParseError::IncompleteLoop);
    }
    let collection = parse_path_expr(cur)?;
    cur.skip_ws();
    if !cur.at_end() {
        return Err(cur.trailing());
    }
    Ok(ParsedExpr::loop_over(collection, binding))
}

fn parse_paren_binding(cur: &mut Cursor<'_>) -> Result<(String, String), ParseError> {
    cur.bump();
    cur.skip_ws();
    let Some(item) = cur.ident() else {
        return Err(ParseError::MalformedLoopBinding);
    };
    let item = item.to_string();
    cur.skip_ws();
    if !cur.eat(',') {
        return Err(ParseError::MalformedLoopBinding);
    }
    cur.skip_ws();
    let Some(index) = cur.ident() else {
        return Err(ParseError::MalformedLoopBinding);
    };
    let index = index.to_string();
    cur.skip_ws();
    if !cur.eat(')') {
        return Err(ParseError::MalformedLoopBinding);
    }
    cur.skip_ws();
    Ok((item, index))
}

fn parse_path_expr(cur: &mut Cursor<'_>) -> Result<ParsedExpr, ParseError> {
    let root = match cur.ident() {
        Some(name) => name.to_string(),
        None => {
            let token: String = cur
                .rest()
                .chars()
                .take_while(|c| !c.is_whitespace())
                .collect();
            return Err(ParseError::InvalidRoot { token });
        }
    };
    let mut path: SmallVec<[PathSegment; 4]> = SmallVec::new();
    loop {
        if cur.eat('.') {
            let Some(name) = cur.ident() else {
                return Err(ParseError::MissingProperty);
            };
            path.push(PathSegment::Static(name.to_string()));
        } else if cur.eat('[') {
            cur.skip_ws();
            if cur.eat(']') {
                return Err(ParseError::EmptyBracket);
            }
            let segment = parse_bracket(cur)?;
            cur.skip_ws();
            if !cur.eat(']') {
                return Err(ParseError::UnterminatedBracket);
            }
            path.push(segment);
        } else {
            break;
        }
    }
    Ok(ParsedExpr::expression(root, path))
}

fn parse_bracket(cur: &mut Cursor<'_>) -> Result<PathSegment, ParseError> {
    match cur.peek() {
        None => Err(ParseError::UnterminatedBracket),
        Some('\'' | '"') => Ok(PathSegment::Static(parse_string_literal(cur)?)),
        Some(c) if c.is_ascii_digit() || c == '-' => {
            let n = parse_number_literal(cur)?;
            Ok(PathSegment::Static(Value::Number(n).key_string()))
        }
        Some(_) => {
            if let Some(lit) = try_keyword_literal(cur) {
                return Ok(PathSegment::Static(lit.key_string()));
            }
            let sub = parse_path_expr(cur)?;
            Ok(PathSegment::Dynamic(Box::new(sub)))
        }
    }
}

fn parse_atom(cur: &mut Cursor<'_>) -> Result<AssignValue, ParseError> {
    match cur.peek() {
        None => Err(ParseError::ExpectedValue),
        Some('\'' | '"') => Ok(AssignValue::Literal(Value::Str(parse_string_literal(cur)?))),
        Some(c) if c.is_ascii_digit() || c == '-' => {
            Ok(AssignValue::Literal(Value::Number(parse_number_literal(cur)?)))
        }
        Some(c) if is_ident_start(c) => {
            if let Some(lit) = try_keyword_literal(cur) {
                return Ok(AssignValue::Literal(lit));
            }
            Ok(AssignValue::Expr(Box::new(parse_path_expr(cur)?)))
        }
        Some(_) => Err(ParseError::ExpectedValue),
    }
}

fn parse_object(cur: &mut Cursor<'_>) -> Result<AssignValue, ParseError> {
    cur.bump();
    let mut entries = Vec::new();
    cur.skip_ws();
    if cur.eat('}') {
        return Ok(AssignValue::Object(entries));
    }
    loop {
        cur.skip_ws();
        let Some(key) = cur.ident() else {
            return Err(if cur.at_end() {
                ParseError::UnterminatedObject
            } else {
                ParseError::MalformedEntry
            });
        };
        let key = key.to_string();
        cur.skip_ws();
        if !cur.eat(':') {
            return Err(ParseError::MalformedEntry);
        }
        cur.skip_ws();
        if cur.peek() == Some('{') {
            // Entries hold literals or paths; objects do not nest.
            return Err(ParseError::MalformedEntry);
        }
        let value = parse_atom(cur)?;
        entries.push((key, value));
        cur.skip_ws();
        if cur.eat(',') {
            continue;
        }
        if cur.eat('}') {
            return Ok(AssignValue::Object(entries));
        }
        return Err(if cur.at_end() {
            ParseError::UnterminatedObject
        } else {
            ParseError::MalformedEntry
        });
    }
}

fn parse_string_literal(cur: &mut Cursor<'_>) -> Result<String, ParseError> {
    let Some(quote) = cur.bump() else {
        return Err(ParseError::UnterminatedString);
    };
    let start = cur.pos;
    while let Some(ch) = cur.peek() {
        if ch == quote {
            let s = cur.src[start..cur.pos].to_string();
            cur.bump();
            return Ok(s);
        }
        cur.bump();
    }
    Err(ParseError::UnterminatedString)
}

fn parse_number_literal(cur: &mut Cursor<'_>) -> Result<f64, ParseError> {
    let start = cur.pos;
    if cur.peek() == Some('-') {
        cur.bump();
    }
    while cur
        .peek()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
    {
        cur.bump();
    }
    let token = &cur.src[start..cur.pos];
    token
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidNumber {
            token: token.to_string(),
        })
}

/// Consume `true`, `false`, or `null` when the next identifier is exactly
/// one of them; otherwise leave the cursor untouched.
fn try_keyword_literal(cur: &mut Cursor<'_>) -> Option<Value> {
    let start = cur.pos;
    let word = cur.ident()?;
    match word {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        _ => {
            cur.pos = start;
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Dependency closure
// ---------------------------------------------------------------------------

fn push_unique(out: &mut Vec<String>, name: &str) {
    if !out.iter().any(|existing| existing == name) {
        out.push(name.to_string());
    }
}

fn collect_path_deps(root: &str, path: &[PathSegment], out: &mut Vec<String>) {
    push_unique(out, root);
    for segment in path {
        if let PathSegment::Dynamic(sub) = segment {
            for dep in &sub.dependencies {
                push_unique(out, dep);
            }
        }
    }
}

fn collect_assign_deps(value: &AssignValue, out: &mut Vec<String>) {
    match value {
        AssignValue::Literal(_) => {}
        AssignValue::Expr(sub) => {
            for dep in &sub.dependencies {
                push_unique(out, dep);
            }
        }
        AssignValue::Object(entries) => {
            for (_, entry) in entries {
                collect_assign_deps(entry, out);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    /// Consume a maximal identifier, or leave the cursor untouched.
    fn ident(&mut self) -> Option<&'a str> {
        let start = self.pos;
        match self.peek() {
            Some(ch) if is_ident_start(ch) => {
                self.bump();
            }
            _ => return None,
        }
        while self.peek().is_some_and(is_ident_char) {
            self.bump();
        }
        Some(&self.src[start..self.pos])
    }

    /// Whether the cursor sits on `word` followed by a non-identifier
    /// character (so `in` does not match inside `index`).
    fn at_keyword(&self, word: &str) -> bool {
        self.rest().starts_with(word)
            && self.src[self.pos + word.len()..]
                .chars()
                .next()
                .is_none_or(|c| !is_ident_char(c))
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.at_keyword(word) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    fn trailing(&self) -> ParseError {
        ParseError::TrailingInput {
            rest: self.rest().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
