//! Prolog term syntax
//!
//! A small strict parser for the subset of Prolog terms exchanged with the
//! collaborators: atoms, quoted atoms, strings, numbers, variables, compounds
//! and lists. Rendering is canonical: `f(a, b)`, `[a, b]`, quotes only where
//! needed. Double-quoted strings keep their delimiter.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position} in '{input}'")]
pub struct TermParseError {
    pub input: String,
    pub position: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Atom(String),
    Quoted(String),
    /// A double-quoted string, distinct from an atom with the same text.
    Str(String),
    Number(String),
    Variable(String),
    Compound { functor: String, args: Vec<Term> },
    List(Vec<Term>),
}

impl Term {
    pub fn parse(input: &str) -> Result<Term, TermParseError> {
        let mut parser = Parser::new(input);
        parser.skip_ws();
        let term = parser.term()?;
        parser.skip_ws();
        if !parser.at_end() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(term)
    }

    /// True when no variable occurs anywhere in the term.
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Variable(_) => false,
            Term::Compound { args, .. } => args.iter().all(Term::is_ground),
            Term::List(items) => items.iter().all(Term::is_ground),
            _ => true,
        }
    }

    /// Name and arity for atoms and compounds.
    pub fn signature(&self) -> Option<(&str, usize)> {
        match self {
            Term::Atom(name) => Some((name.as_str(), 0)),
            Term::Compound { functor, args } => Some((functor.as_str(), args.len())),
            _ => None,
        }
    }

    pub fn args(&self) -> &[Term] {
        match self {
            Term::Compound { args, .. } => args,
            _ => &[],
        }
    }
}

pub(crate) fn is_plain_atom(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// Render `value` as a Prolog atom, quoting unless it is a plain atom, an
/// unsigned integer or already quoted.
pub(crate) fn quote_atom(value: &str) -> String {
    let numeric = !value.is_empty() && value.chars().all(|c| c.is_ascii_digit());
    let quoted = value.len() > 1 && value.starts_with('\'') && value.ends_with('\'');
    if is_plain_atom(value) || numeric || quoted {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "\\'"))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Atom(name) | Term::Number(name) | Term::Variable(name) => write!(f, "{}", name),
            Term::Quoted(text) => {
                if is_plain_atom(text) {
                    write!(f, "{}", text)
                } else {
                    write!(f, "'{}'", text.replace('\'', "\\'"))
                }
            }
            Term::Str(text) => write!(f, "\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\"")),
            Term::Compound { functor, args } => {
                write!(f, "{}(", functor)?;
                write_items(f, args)?;
                write!(f, ")")
            }
            Term::List(items) => {
                write!(f, "[")?;
                write_items(f, items)?;
                write!(f, "]")
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Term]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: &str) -> TermParseError {
        TermParseError {
            input: self.input.to_string(),
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), TermParseError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn term(&mut self) -> Result<Term, TermParseError> {
        match self.peek() {
            Some('[') => self.list(),
            Some('\'') => self.quoted('\''),
            Some('"') => self.quoted('"'),
            Some(c) if c.is_ascii_digit() => Ok(Term::Number(self.number())),
            Some('-') if matches!(self.chars.get(self.pos + 1), Some(d) if d.is_ascii_digit()) => {
                self.pos += 1;
                Ok(Term::Number(format!("-{}", self.number())))
            }
            Some(c) if c.is_ascii_lowercase() => {
                let name = self.name();
                if self.peek() == Some('(') {
                    self.pos += 1;
                    let args = self.items(')')?;
                    if args.is_empty() {
                        return Err(self.error("compound term without arguments"));
                    }
                    Ok(Term::Compound { functor: name, args })
                } else {
                    Ok(Term::Atom(name))
                }
            }
            Some(c) if c.is_ascii_uppercase() || c == '_' => Ok(Term::Variable(self.name())),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn number(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') && matches!(self.chars.get(self.pos + 1), Some(d) if d.is_ascii_digit()) {
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn quoted(&mut self, quote: char) -> Result<Term, TermParseError> {
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted text")),
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => {
                            text.push(c);
                            self.pos += 1;
                        }
                        None => return Err(self.error("dangling escape")),
                    }
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    // Prolog escapes a quote by doubling it.
                    if self.peek() == Some(quote) {
                        text.push(quote);
                        self.pos += 1;
                    } else if quote == '"' {
                        return Ok(Term::Str(text));
                    } else {
                        return Ok(Term::Quoted(text));
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn list(&mut self) -> Result<Term, TermParseError> {
        self.expect('[')?;
        Ok(Term::List(self.items(']')?))
    }

    fn items(&mut self, close: char) -> Result<Vec<Term>, TermParseError> {
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(close) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            self.skip_ws();
            items.push(self.term()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok(items);
                }
                _ => return Err(self.error(&format!("expected ',' or '{}'", close))),
            }
        }
    }
}
