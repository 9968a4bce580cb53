//! JSON path expressions.
//!
//! A small, compiled subset of the usual `$`-rooted path syntax, enough to
//! address values inside fetched documents:
//!
//! | Syntax            | Meaning                                   |
//! |-------------------|-------------------------------------------|
//! | `$`               | the whole value                           |
//! | `.name`           | object field                              |
//! | `['name']`        | object field (any characters but quotes)  |
//! | `[3]` / `[-1]`    | array element, negative counts from end   |
//! | `.*` / `[*]`      | every element or field value              |
//!
//! Paths without wildcards are *definite* and read a single value. A path
//! containing a wildcard reads the array of every match.

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The expression could not be compiled.
    #[error("invalid path at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// The compiled path addresses nothing in the given value.
    #[error("no value at {0}")]
    NotFound(String),
}

/// One navigation step of a compiled path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(i64),
    Wildcard,
}

/// A compiled path expression.
///
/// Two paths are equal when they navigate the same segments, whatever
/// spelling they were compiled from (`$[0]` and `$.[0]`).
#[derive(Debug, Clone)]
pub struct CompiledPath {
    source: String,
    segments: Vec<Segment>,
}

impl CompiledPath {
    /// The path addressing the whole value (`$`).
    pub fn root() -> Self {
        Self {
            source: "$".to_string(),
            segments: Vec::new(),
        }
    }

    /// Compiles `expression`, which must start with `$`.
    pub fn compile(expression: &str) -> Result<Self, PathError> {
        let chars: Vec<char> = expression.chars().collect();
        if chars.first() != Some(&'$') {
            return Err(syntax(0, "path must start with '$'"));
        }

        let mut segments = Vec::new();
        let mut pos = 1;
        while pos < chars.len() {
            match chars[pos] {
                '.' => {
                    pos += 1;
                    match chars.get(pos) {
                        Some('[') => {}
                        Some('.') => return Err(syntax(pos, "deep scan is not supported")),
                        Some('*') => {
                            segments.push(Segment::Wildcard);
                            pos += 1;
                        }
                        Some(_) => {
                            let start = pos;
                            while pos < chars.len() && chars[pos] != '.' && chars[pos] != '[' {
                                pos += 1;
                            }
                            let name: String = chars[start..pos].iter().collect();
                            segments.push(Segment::Field(name));
                        }
                        None => return Err(syntax(pos, "expected a field name after '.'")),
                    }
                }
                '[' => {
                    let (segment, next) = compile_bracket(&chars, pos)?;
                    segments.push(segment);
                    pos = next;
                }
                other => {
                    return Err(syntax(pos, format!("unexpected character '{}'", other)));
                }
            }
        }

        Ok(Self {
            source: expression.to_string(),
            segments,
        })
    }

    /// The expression without its leading `$` (empty for the root path).
    pub fn suffix(&self) -> &str {
        &self.source[1..]
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True when the path addresses at most one value.
    pub fn is_definite(&self) -> bool {
        !self.segments.iter().any(|s| *s == Segment::Wildcard)
    }

    /// Reads the value this path addresses inside `value`.
    pub fn read(&self, value: &Value) -> Result<Value, PathError> {
        let mut current: Vec<&Value> = vec![value];

        for segment in &self.segments {
            let mut next = Vec::new();
            for item in current {
                match (segment, item) {
                    (Segment::Field(name), Value::Object(map)) => {
                        if let Some(found) = map.get(name) {
                            next.push(found);
                        }
                    }
                    (Segment::Index(index), Value::Array(items)) => {
                        if let Some(found) = element_at(items, *index) {
                            next.push(found);
                        }
                    }
                    (Segment::Wildcard, Value::Array(items)) => next.extend(items.iter()),
                    (Segment::Wildcard, Value::Object(map)) => next.extend(map.values()),
                    _ => {}
                }
            }
            current = next;
        }

        if self.is_definite() {
            current
                .first()
                .map(|v| (*v).clone())
                .ok_or_else(|| PathError::NotFound(self.source.clone()))
        } else {
            Ok(Value::Array(current.into_iter().cloned().collect()))
        }
    }
}

impl PartialEq for CompiledPath {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for CompiledPath {}

impl std::fmt::Display for CompiledPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn syntax(offset: usize, message: impl Into<String>) -> PathError {
    PathError::Syntax {
        offset,
        message: message.into(),
    }
}

fn element_at(items: &[Value], index: i64) -> Option<&Value> {
    let len = items.len() as i64;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        items.get(resolved as usize)
    } else {
        None
    }
}

/// Compiles the bracket segment starting at `chars[open]` (which is `[`).
/// Returns the segment and the position just past the closing `]`.
fn compile_bracket(chars: &[char], open: usize) -> Result<(Segment, usize), PathError> {
    let mut pos = open + 1;
    let segment = match chars.get(pos) {
        Some(&quote) if quote == '\'' || quote == '"' => {
            pos += 1;
            let start = pos;
            while pos < chars.len() && chars[pos] != quote {
                pos += 1;
            }
            if pos >= chars.len() {
                return Err(syntax(open, "unterminated quoted field"));
            }
            let name: String = chars[start..pos].iter().collect();
            pos += 1;
            Segment::Field(name)
        }
        Some('*') => {
            pos += 1;
            Segment::Wildcard
        }
        Some(_) => {
            let start = pos;
            while pos < chars.len() && chars[pos] != ']' {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            let index = text
                .parse::<i64>()
                .map_err(|_| syntax(start, format!("invalid index '{}'", text)))?;
            Segment::Index(index)
        }
        None => return Err(syntax(open, "unterminated '['")),
    };

    if chars.get(pos) != Some(&']') {
        return Err(syntax(pos, "expected ']'"));
    }
    Ok((segment, pos + 1))
}
