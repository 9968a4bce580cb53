//! Recursive-descent parser over the lexer's token stream.
//!
//! ```text
//! block      := Indent statement* Dedent | ε
//! statement  := "debug" valueRef
//!             | "fetch" ident valueRef block
//!             | "foreach" ident valueSpec block
//!             | "download" valueRef valueRef
//!             | "concurrently" integer block
//! ```
//!
//! Keywords are case-insensitive. Operands are single symbols whose inner
//! structure (value specs, quoted text, `{ref}` templates) is parsed here.

use std::num::NonZeroUsize;

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::Token;
use crate::path::CompiledPath;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    /// Consumes the next token, which must be a symbol operand of `keyword`.
    fn expect_symbol(&mut self, keyword: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Symbol(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(s)
            }
            _ => Err(ParseError::ExpectedSymbol {
                keyword: keyword.to_string(),
            }),
        }
    }

    fn parse_script(&mut self) -> Result<Statements, ParseError> {
        let nodes = self.parse_statements()?;
        if self.peek() == Some(&Token::Dedent) {
            return Err(ParseError::UnexpectedDedent);
        }
        Ok(Statements::new(nodes))
    }

    /// Parses statements until a `Dedent` (left in place) or end of input.
    fn parse_statements(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            match self.peek() {
                None | Some(Token::Dedent) => return Ok(nodes),
                Some(Token::Indent) => return Err(ParseError::UnexpectedIndent),
                Some(Token::Symbol(_)) => nodes.push(self.parse_statement()?),
            }
        }
    }

    /// Parses the optional indented child block of a statement.
    fn parse_block(&mut self) -> Result<Statements, ParseError> {
        if self.peek() != Some(&Token::Indent) {
            return Ok(Statements::default());
        }
        self.advance();
        let nodes = self.parse_statements()?;
        if self.peek() == Some(&Token::Dedent) {
            self.advance();
        }
        Ok(Statements::new(nodes))
    }

    fn parse_statement(&mut self) -> Result<Node, ParseError> {
        let keyword = self.expect_symbol("statement")?;
        match keyword.to_lowercase().as_str() {
            "debug" => self.parse_debug(),
            "fetch" => self.parse_fetch(),
            "foreach" => self.parse_foreach(),
            "download" => self.parse_download(),
            "concurrently" => self.parse_concurrently(),
            _ => Err(ParseError::UnknownStatement(keyword)),
        }
    }

    fn parse_debug(&mut self) -> Result<Node, ParseError> {
        let message = parse_value_ref(&self.expect_symbol("debug")?)?;
        Ok(Node::Debug { message })
    }

    fn parse_fetch(&mut self) -> Result<Node, ParseError> {
        let name = Binding::new(&self.expect_symbol("fetch")?)?;
        let source = parse_value_ref(&self.expect_symbol("fetch")?)?;
        let body = self.parse_block()?;
        Ok(Node::Fetch { name, source, body })
    }

    fn parse_foreach(&mut self) -> Result<Node, ParseError> {
        let name = Binding::new(&self.expect_symbol("foreach")?)?;
        let source = parse_value_spec(&self.expect_symbol("foreach")?)?;
        let body = self.parse_block()?;
        Ok(Node::Foreach { name, source, body })
    }

    fn parse_download(&mut self) -> Result<Node, ParseError> {
        let source = parse_value_ref(&self.expect_symbol("download")?)?;
        let destination = parse_value_ref(&self.expect_symbol("download")?)?;
        Ok(Node::Download {
            source,
            destination,
        })
    }

    fn parse_concurrently(&mut self) -> Result<Node, ParseError> {
        let found = self.expect_symbol("concurrently")?;
        let level = found
            .parse::<usize>()
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or(ParseError::ExpectedInteger { found })?;
        let body = self.parse_block()?;
        Ok(Node::Concurrently { level, body })
    }
}

/// Parses a whole token stream into the top-level block.
pub fn parse(tokens: Vec<Token>) -> Result<Statements, ParseError> {
    Parser::new(tokens).parse_script()
}

/// Parses `name[.path]` into a [`ValueSpec`].
///
/// Text before the first dot is the binding; the dot and everything after
/// it become the path, rooted at `$`.
pub fn parse_value_spec(text: &str) -> Result<ValueSpec, ParseError> {
    let Some(dot) = text.find('.') else {
        return Ok(ValueSpec::new(Binding::new(text)?, CompiledPath::root()));
    };
    let name = Binding::new(&text[..dot])?;
    let path = CompiledPath::compile(&format!("${}", &text[dot..])).map_err(|e| {
        ParseError::InvalidPathExpression {
            expression: text.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(ValueSpec::new(name, path))
}

/// Parses an operand that may be either a value spec or a template.
///
/// Quoted text is always a template. Unquoted text is read as a value spec
/// when it is one, and as a template otherwise.
pub fn parse_value_ref(text: &str) -> Result<ValueRef, ParseError> {
    if let Some(inner) = quoted_inner(text)? {
        return parse_template(inner).map(ValueRef::Template);
    }
    match parse_value_spec(text) {
        Ok(spec) => Ok(ValueRef::Spec(spec)),
        Err(_) => parse_template(text).map(ValueRef::Template),
    }
}

/// Returns the text between a surrounding pair of double quotes, `None` if
/// `text` is not quoted at all.
fn quoted_inner(text: &str) -> Result<Option<&str>, ParseError> {
    if !text.starts_with('"') {
        return Ok(None);
    }
    if text.len() < 2 || !text.ends_with('"') {
        return Err(ParseError::UnbalancedQuote(text.to_string()));
    }
    let inner = &text[1..text.len() - 1];
    let trailing_escapes = inner.chars().rev().take_while(|c| *c == '\\').count();
    if trailing_escapes % 2 == 1 {
        return Err(ParseError::UnbalancedQuote(text.to_string()));
    }
    Ok(Some(inner))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemplateState {
    Literal,
    LiteralEscape,
    Reference,
    ReferenceEscape,
}

/// Parses `{ref}` templates, e.g. `ll={l.lat,l.lng}&q={c.name}`.
///
/// A comma inside a reference span closes the current reference and
/// inserts a literal comma. A backslash makes the next character literal.
pub fn parse_template(text: &str) -> Result<StringTemplate, ParseError> {
    let mut parts = Vec::new();
    let mut buf = String::new();
    let mut state = TemplateState::Literal;

    for c in text.chars() {
        state = match (state, c) {
            (TemplateState::Literal, '\\') => TemplateState::LiteralEscape,
            (TemplateState::Literal, '{') => {
                parts.push(TemplatePart::Literal(std::mem::take(&mut buf)));
                TemplateState::Reference
            }
            (TemplateState::Literal, '}') => {
                return Err(ParseError::UnexpectedTemplateBrace(text.to_string()));
            }
            (TemplateState::Literal | TemplateState::LiteralEscape, c) => {
                buf.push(c);
                TemplateState::Literal
            }
            (TemplateState::Reference, '\\') => TemplateState::ReferenceEscape,
            (TemplateState::Reference, '}') => {
                let spec = parse_value_spec(&std::mem::take(&mut buf))?;
                parts.push(TemplatePart::Reference(spec));
                TemplateState::Literal
            }
            (TemplateState::Reference, ',') => {
                let spec = parse_value_spec(&std::mem::take(&mut buf))?;
                parts.push(TemplatePart::Reference(spec));
                parts.push(TemplatePart::Literal(",".to_string()));
                TemplateState::Reference
            }
            (TemplateState::Reference | TemplateState::ReferenceEscape, c) => {
                buf.push(c);
                TemplateState::Reference
            }
        };
    }

    match state {
        TemplateState::Literal => parts.push(TemplatePart::Literal(buf)),
        TemplateState::LiteralEscape => {
            buf.push('\\');
            parts.push(TemplatePart::Literal(buf));
        }
        TemplateState::Reference | TemplateState::ReferenceEscape => {
            return Err(ParseError::UnterminatedTemplateReference(text.to_string()));
        }
    }

    Ok(StringTemplate::new(parts))
}
