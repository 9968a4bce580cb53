//! Syntax tree shared by the parser and the executor.
//!
//! Nodes are built once by the parser and only read afterwards. Blocks keep
//! their children behind an `Arc<[Node]>` so a child can be handed to a
//! spawned task as (block, index) without copying the tree.
//!
//! The [`Display`](std::fmt::Display) impls print the canonical source form
//! of a tree: one statement per line, two spaces per nesting level,
//! templates always quoted. Parsing that text yields the same tree.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::error::ParseError;
use crate::lexer::INDENT_UNIT;
use crate::path::CompiledPath;

/// A validated variable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binding(String);

fn binding_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("binding regex is valid"))
}

impl Binding {
    pub fn new(name: &str) -> Result<Self, ParseError> {
        if binding_regex().is_match(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(ParseError::InvalidBindingName(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// "Read from the value bound to `name`, at `path`."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSpec {
    pub name: Binding,
    pub path: CompiledPath,
}

impl ValueSpec {
    pub fn new(name: Binding, path: CompiledPath) -> Self {
        Self { name, path }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    Reference(ValueSpec),
}

/// Literal text interleaved with value references.
///
/// Construction merges adjacent literals and drops empty ones, so two
/// templates that render the same text from the same references compare
/// equal.
///
/// Source text is read one line at a time, so a literal containing `\n` or
/// `\r` has no source form. The parser never builds one; a template built
/// by hand with a line break prints as text that reads back as two lines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringTemplate {
    parts: Vec<TemplatePart>,
}

impl StringTemplate {
    pub fn new(parts: impl IntoIterator<Item = TemplatePart>) -> Self {
        let mut normalized: Vec<TemplatePart> = Vec::new();
        for part in parts {
            match part {
                TemplatePart::Literal(text) if text.is_empty() => {}
                TemplatePart::Literal(text) => match normalized.last_mut() {
                    Some(TemplatePart::Literal(previous)) => previous.push_str(&text),
                    _ => normalized.push(TemplatePart::Literal(text)),
                },
                reference => normalized.push(reference),
            }
        }
        Self { parts: normalized }
    }

    /// A template consisting of a single literal.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::new([TemplatePart::Literal(text.into())])
    }

    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }
}

/// Anything the language accepts as "a value".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueRef {
    Spec(ValueSpec),
    Template(StringTemplate),
}

/// An ordered block of statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statements(Arc<[Node]>);

impl Statements {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self(Arc::from(nodes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.0.iter()
    }
}

impl Default for Statements {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Statements(Statements),
    /// Fetch JSON from `source`, bind it to `name` in a child scope, run `body`.
    Fetch {
        name: Binding,
        source: ValueRef,
        body: Statements,
    },
    /// Run `body` once per element of the sequence at `source`.
    Foreach {
        name: Binding,
        source: ValueSpec,
        body: Statements,
    },
    Download {
        source: ValueRef,
        destination: ValueRef,
    },
    /// Run `body` with the concurrency bound set to `level`.
    Concurrently {
        level: NonZeroUsize,
        body: Statements,
    },
    Debug {
        message: ValueRef,
    },
}

// ---------------------------------------------------------------------------
// Canonical printing
// ---------------------------------------------------------------------------

/// Writes `text` so the lexer and template parser read it back unchanged.
/// `special` lists the characters that need a backslash in this position.
fn write_escaped(f: &mut fmt::Formatter<'_>, text: &str, special: &[char]) -> fmt::Result {
    for c in text.chars() {
        if c == ' ' || c == '\t' || special.contains(&c) {
            f.write_str("\\")?;
        }
        write!(f, "{}", c)?;
    }
    Ok(())
}

const LITERAL_SPECIALS: &[char] = &['\\', '{', '}', '"'];
const REFERENCE_SPECIALS: &[char] = &['\\', '{', '}', '"', ','];

/// Writes `name` and its path so that the first `.` separates the two.
/// Paths opening with a bracket (`$[0]`) get a dot inserted (`h.[0]`).
fn write_spec(f: &mut fmt::Formatter<'_>, spec: &ValueSpec, special: &[char]) -> fmt::Result {
    write!(f, "{}", spec.name)?;
    let suffix = spec.path.suffix();
    if !suffix.is_empty() && !suffix.starts_with('.') {
        f.write_str(".")?;
    }
    write_escaped(f, suffix, special)
}

impl fmt::Display for ValueSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_spec(f, self, &[])
    }
}

impl fmt::Display for StringTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => write_escaped(f, text, LITERAL_SPECIALS)?,
                TemplatePart::Reference(spec) => {
                    f.write_str("{")?;
                    write_spec(f, spec, REFERENCE_SPECIALS)?;
                    f.write_str("}")?;
                }
            }
        }
        f.write_str("\"")
    }
}

impl fmt::Display for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRef::Spec(spec) => write!(f, "{}", spec),
            ValueRef::Template(template) => write!(f, "{}", template),
        }
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &Statements, depth: usize) -> fmt::Result {
    for node in block.iter() {
        write_node(f, node, depth)?;
    }
    Ok(())
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &Node, depth: usize) -> fmt::Result {
    let indent = depth * INDENT_UNIT;
    match node {
        // A nested bare block has no syntax of its own; its statements are
        // printed in place.
        Node::Statements(inner) => write_block(f, inner, depth),
        Node::Fetch { name, source, body } => {
            writeln!(f, "{:indent$}fetch {} {}", "", name, source)?;
            write_block(f, body, depth + 1)
        }
        Node::Foreach { name, source, body } => {
            writeln!(f, "{:indent$}foreach {} {}", "", name, source)?;
            write_block(f, body, depth + 1)
        }
        Node::Download {
            source,
            destination,
        } => writeln!(f, "{:indent$}download {} {}", "", source, destination),
        Node::Concurrently { level, body } => {
            writeln!(f, "{:indent$}concurrently {}", "", level)?;
            write_block(f, body, depth + 1)
        }
        Node::Debug { message } => writeln!(f, "{:indent$}debug {}", "", message),
    }
}

impl fmt::Display for Statements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_block(f, self, 0)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, self, 0)
    }
}
