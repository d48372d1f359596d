//! Lightweight GraphQL document summary.
//!
//! This is not a GraphQL parser in the validating sense. It lexes a query
//! document and extracts, per operation, the operation kind, its name, and the
//! root fields of its selection set (with simple literal/variable arguments).
//! That is enough to classify a request and to route the gateway's own
//! session fields; full validation stays with the execution engine.

use std::iter::Peekable;
use std::vec::IntoIter;

use serde::Deserialize;
use thiserror::Error;

/// JSON envelope of a GraphQL-over-HTTP POST request.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlRequest {
    pub query: String,
    #[serde(default, rename = "operationName")]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),

    #[error("unterminated string")]
    UnterminatedString,

    #[error("unexpected token {0}")]
    UnexpectedToken(String),

    #[error("unexpected end of document")]
    UnexpectedEnd,

    #[error("document contains no operations")]
    NoOperations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
    String(String),
    Variable(String),
    /// Numbers, booleans, enums, lists, objects.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootField {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<(String, ArgumentValue)>,
}

impl RootField {
    /// Key under which the field's result appears in `data`.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn argument(&self, name: &str) -> Option<&ArgumentValue> {
        self.arguments
            .iter()
            .find(|(arg, _)| arg == name)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSummary {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub root_fields: Vec<RootField>,
    /// A `...Fragment` or inline fragment appears directly in the root
    /// selection set, so `root_fields` is incomplete.
    pub has_root_spread: bool,
}

/// Summarise every operation in a document. Fragment definitions are skipped.
pub fn parse_document(query: &str) -> Result<Vec<OperationSummary>, DocumentError> {
    let tokens = Lexer::new(query).collect::<Result<Vec<_>, _>>()?;
    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
    };

    let mut operations = Vec::new();
    while let Some(token) = parser.tokens.next() {
        match token {
            Token::Punct('{') => operations.push(parser.selection_set(OperationKind::Query, None)?),
            Token::Name(keyword @ ("query" | "mutation" | "subscription")) => {
                let kind = match keyword {
                    "query" => OperationKind::Query,
                    "mutation" => OperationKind::Mutation,
                    _ => OperationKind::Subscription,
                };
                let name = match parser.tokens.peek() {
                    Some(Token::Name(n)) => {
                        let n = n.to_string();
                        parser.tokens.next();
                        Some(n)
                    }
                    _ => None,
                };
                parser.skip_to_selection_set()?;
                parser.expect('{')?;
                operations.push(parser.selection_set(kind, name)?);
            }
            Token::Name("fragment") => {
                parser.skip_to_selection_set()?;
                parser.expect('{')?;
                parser.skip_balanced('{', '}')?;
            }
            other => return Err(DocumentError::UnexpectedToken(other.describe())),
        }
    }

    if operations.is_empty() {
        return Err(DocumentError::NoOperations);
    }
    Ok(operations)
}

/// Pick the operation a request executes: the named one when `operationName`
/// is given, otherwise the document's only operation.
pub fn select_operation<'a>(
    operations: &'a [OperationSummary],
    operation_name: Option<&str>,
) -> Option<&'a OperationSummary> {
    match operation_name {
        Some(name) => operations.iter().find(|op| op.name.as_deref() == Some(name)),
        None if operations.len() == 1 => operations.first(),
        None => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Name(&'a str),
    Punct(char),
    Spread,
    Str(String),
    /// Numeric literal.
    Other,
}

impl Token<'_> {
    fn describe(&self) -> String {
        match self {
            Token::Name(n) => format!("'{n}'"),
            Token::Punct(c) => format!("'{c}'"),
            Token::Spread => "'...'".to_string(),
            Token::Str(_) => "string".to_string(),
            Token::Other => "literal".to_string(),
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ignored(&mut self) {
        loop {
            let rest = self.rest();
            let Some(c) = rest.chars().next() else { return };
            match c {
                ' ' | '\t' | '\n' | '\r' | ',' | '\u{feff}' => self.pos += c.len_utf8(),
                '#' => self.pos += rest.find('\n').unwrap_or(rest.len()),
                _ => return,
            }
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn string(&mut self) -> Result<String, DocumentError> {
        // Opening quote already consumed.
        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(out);
                }
                '\n' | '\r' => return Err(DocumentError::UnterminatedString),
                '\\' => {
                    let (_, esc) = chars.next().ok_or(DocumentError::UnterminatedString)?;
                    match esc {
                        '"' | '\\' | '/' => out.push(esc),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        'u' => {
                            let mut code = 0u32;
                            for _ in 0..4 {
                                let (_, h) = chars.next().ok_or(DocumentError::UnterminatedString)?;
                                let digit = h.to_digit(16).ok_or(DocumentError::UnexpectedCharacter(h))?;
                                code = code * 16 + digit;
                            }
                            out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                        }
                        other => return Err(DocumentError::UnexpectedCharacter(other)),
                    }
                }
                _ => out.push(c),
            }
        }
        Err(DocumentError::UnterminatedString)
    }

    fn block_string(&mut self) -> Result<String, DocumentError> {
        // Opening `"""` already consumed. Content is kept raw apart from the
        // `\"""` escape; indentation is not normalised.
        let rest = self.rest();
        let mut search = 0;
        while let Some(found) = rest[search..].find("\"\"\"") {
            let at = search + found;
            if rest[..at].ends_with('\\') {
                search = at + 3;
                continue;
            }
            self.pos += at + 3;
            return Ok(rest[..at].replace("\\\"\"\"", "\"\"\""));
        }
        Err(DocumentError::UnterminatedString)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, DocumentError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_ignored();
        let rest = self.rest();
        let c = rest.chars().next()?;

        let token = match c {
            '{' | '}' | '(' | ')' | '[' | ']' | ':' | '@' | '$' | '=' | '!' | '|' | '&' => {
                self.pos += 1;
                Ok(Token::Punct(c))
            }
            '.' if rest.starts_with("...") => {
                self.pos += 3;
                Ok(Token::Spread)
            }
            '"' if rest.starts_with("\"\"\"") => {
                self.pos += 3;
                self.block_string().map(Token::Str)
            }
            '"' => {
                self.pos += 1;
                self.string().map(Token::Str)
            }
            c if c == '_' || c.is_ascii_alphabetic() => {
                Ok(Token::Name(self.take_while(|c| c == '_' || c.is_ascii_alphanumeric())))
            }
            c if c == '-' || c.is_ascii_digit() => {
                self.pos += 1;
                self.take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-'));
                Ok(Token::Other)
            }
            other => Err(DocumentError::UnexpectedCharacter(other)),
        };

        if token.is_err() {
            // Stop lexing after the first error.
            self.pos = self.src.len();
        }
        Some(token)
    }
}

struct Parser<'a> {
    tokens: Peekable<IntoIter<Token<'a>>>,
}

impl<'a> Parser<'a> {
    fn next(&mut self) -> Result<Token<'a>, DocumentError> {
        self.tokens.next().ok_or(DocumentError::UnexpectedEnd)
    }

    fn expect(&mut self, punct: char) -> Result<(), DocumentError> {
        match self.next()? {
            Token::Punct(c) if c == punct => Ok(()),
            other => Err(DocumentError::UnexpectedToken(other.describe())),
        }
    }

    fn expect_name(&mut self) -> Result<&'a str, DocumentError> {
        match self.next()? {
            Token::Name(n) => Ok(n),
            other => Err(DocumentError::UnexpectedToken(other.describe())),
        }
    }

    /// Advance past variable definitions and directives up to (not including)
    /// the opening brace of a selection set.
    fn skip_to_selection_set(&mut self) -> Result<(), DocumentError> {
        loop {
            match self.tokens.peek() {
                None => return Err(DocumentError::UnexpectedEnd),
                Some(Token::Punct('{')) => return Ok(()),
                Some(Token::Punct('(')) => {
                    self.tokens.next();
                    self.skip_balanced('(', ')')?;
                }
                Some(_) => {
                    self.tokens.next();
                }
            }
        }
    }

    /// Skip to the matching `close`, assuming `open` was just consumed.
    fn skip_balanced(&mut self, open: char, close: char) -> Result<(), DocumentError> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.next()? {
                Token::Punct(c) if c == open => depth += 1,
                Token::Punct(c) if c == close => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    /// Summarise a selection set whose opening brace was just consumed.
    fn selection_set(
        &mut self,
        kind: OperationKind,
        name: Option<String>,
    ) -> Result<OperationSummary, DocumentError> {
        let mut root_fields: Vec<RootField> = Vec::new();
        let mut has_root_spread = false;
        let mut depth = 1usize;

        while depth > 0 {
            match self.next()? {
                Token::Punct('{') => depth += 1,
                Token::Punct('}') => depth -= 1,
                Token::Punct('(') if depth == 1 => {
                    let arguments = self.arguments()?;
                    if let Some(field) = root_fields.last_mut() {
                        field.arguments = arguments;
                    }
                }
                Token::Punct('(') => self.skip_balanced('(', ')')?,
                Token::Punct('@') => {
                    self.expect_name()?;
                    if self.tokens.peek() == Some(&Token::Punct('(')) {
                        self.tokens.next();
                        self.skip_balanced('(', ')')?;
                    }
                }
                Token::Spread => {
                    if depth == 1 {
                        has_root_spread = true;
                    }
                    // Fragment name, or `on Type` of an inline fragment.
                    if let Some(Token::Name(n)) = self.tokens.peek() {
                        let is_on = *n == "on";
                        self.tokens.next();
                        if is_on {
                            self.expect_name()?;
                        }
                    }
                }
                Token::Name(first) if depth == 1 => {
                    let field = if self.tokens.peek() == Some(&Token::Punct(':')) {
                        self.tokens.next();
                        RootField {
                            alias: Some(first.to_string()),
                            name: self.expect_name()?.to_string(),
                            arguments: Vec::new(),
                        }
                    } else {
                        RootField {
                            alias: None,
                            name: first.to_string(),
                            arguments: Vec::new(),
                        }
                    };
                    root_fields.push(field);
                }
                _ => {}
            }
        }

        Ok(OperationSummary {
            kind,
            name,
            root_fields,
            has_root_spread,
        })
    }

    fn arguments(&mut self) -> Result<Vec<(String, ArgumentValue)>, DocumentError> {
        let mut arguments = Vec::new();
        loop {
            match self.next()? {
                Token::Punct(')') => return Ok(arguments),
                Token::Name(arg) => {
                    self.expect(':')?;
                    let value = self.value()?;
                    arguments.push((arg.to_string(), value));
                }
                other => return Err(DocumentError::UnexpectedToken(other.describe())),
            }
        }
    }

    fn value(&mut self) -> Result<ArgumentValue, DocumentError> {
        Ok(match self.next()? {
            Token::Str(s) => ArgumentValue::String(s),
            Token::Punct('$') => ArgumentValue::Variable(self.expect_name()?.to_string()),
            Token::Punct('{') => {
                self.skip_balanced('{', '}')?;
                ArgumentValue::Other
            }
            Token::Punct('[') => {
                self.skip_balanced('[', ']')?;
                ArgumentValue::Other
            }
            Token::Name(_) | Token::Other => ArgumentValue::Other,
            other => return Err(DocumentError::UnexpectedToken(other.describe())),
        })
    }
}
