//! Path expressions into structured outcomes
//!
//! A path such as `response.body.data[0].id` is parsed once into a sequence
//! of field and index accessors, then evaluated against a `serde_json::Value`.
//! Evaluation never fails: a missing segment yields [`Lookup::Missing`].

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::common::{Error, Result};

/// One accessor in a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object key (numeric keys also index arrays)
    Field(String),
    /// Array index
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => write!(f, ".{}", name),
            Segment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// Result of evaluating a path
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a Value),
    /// `at` is the longest prefix that did resolve
    Missing { at: String },
}

impl<'a> Lookup<'a> {
    pub fn found(self) -> Option<&'a Value> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::Missing { .. } => None,
        }
    }
}

/// A parsed path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    /// Parse a path expression
    pub fn parse(expression: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut chars = expression.chars().peekable();
        let mut field = String::new();
        // Whether a '.' is allowed (or required) before the next field
        let mut after_segment = false;

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if !field.is_empty() {
                        segments.push(Segment::Field(std::mem::take(&mut field)));
                    } else if !after_segment {
                        return Err(Error::invalid_path(expression, "empty field name"));
                    }
                    after_segment = false;
                    if chars.peek().map_or(true, |&n| n == '.' || n == '[') {
                        return Err(Error::invalid_path(expression, "empty field name"));
                    }
                }
                '[' => {
                    if !field.is_empty() {
                        segments.push(Segment::Field(std::mem::take(&mut field)));
                    }
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        return Err(Error::invalid_path(expression, "unclosed '['"));
                    }
                    segments.push(parse_bracket(expression, inner.trim())?);
                    after_segment = true;
                }
                ']' => return Err(Error::invalid_path(expression, "unexpected ']'")),
                _ => {
                    if after_segment && field.is_empty() {
                        return Err(Error::invalid_path(expression, "expected '.' or '['"));
                    }
                    field.push(c);
                }
            }
        }

        if !field.is_empty() {
            segments.push(Segment::Field(field));
        }
        if segments.is_empty() {
            return Err(Error::invalid_path(expression, "empty path"));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Evaluate against a value
    pub fn lookup<'a>(&self, root: &'a Value) -> Lookup<'a> {
        let mut current = root;
        let mut resolved = String::new();

        for segment in &self.segments {
            let next = match (segment, current) {
                (Segment::Field(name), Value::Object(map)) => map.get(name),
                (Segment::Field(name), Value::Array(items)) => {
                    name.parse::<usize>().ok().and_then(|i| items.get(i))
                }
                (Segment::Index(i), Value::Array(items)) => items.get(*i),
                _ => None,
            };
            match next {
                Some(value) => {
                    current = value;
                    resolved.push_str(&segment.to_string());
                }
                None => {
                    return Lookup::Missing {
                        at: resolved.trim_start_matches('.').to_string(),
                    }
                }
            }
        }

        Lookup::Found(current)
    }
}

fn parse_bracket(expression: &str, inner: &str) -> Result<Segment> {
    if let Ok(index) = inner.parse::<usize>() {
        return Ok(Segment::Index(index));
    }
    let quoted = inner.len() >= 2
        && ((inner.starts_with('"') && inner.ends_with('"'))
            || (inner.starts_with('\'') && inner.ends_with('\'')));
    if quoted {
        return Ok(Segment::Field(inner[1..inner.len() - 1].to_string()));
    }
    Err(Error::invalid_path(
        expression,
        "brackets must hold an index or a quoted key",
    ))
}

impl FromStr for JsonPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: String = self.segments.iter().map(Segment::to_string).collect();
        f.write_str(rendered.trim_start_matches('.'))
    }
}
