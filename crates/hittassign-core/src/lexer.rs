//! Indentation-sensitive lexer.
//!
//! The source is read line by line. Each non-blank line contributes its
//! whitespace-separated symbols, preceded by the `Indent`/`Dedent` tokens
//! needed to move from the previous line's indentation to its own. Blank
//! and whitespace-only lines produce nothing at all.

use crate::error::LexError;

/// Width of one indentation level. A tab counts as one full level.
pub const INDENT_UNIT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Opens a child block.
    Indent,
    /// Closes the innermost open block.
    Dedent,
    /// A word of source text, with whitespace escapes already applied.
    Symbol(String),
}

/// Scanner state for a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Still measuring leading whitespace.
    Indentation,
    /// Between symbols.
    Gap,
    /// Inside a symbol.
    Symbol,
    /// Just read a backslash inside (or at the start of) a symbol.
    Escape,
}

struct ScannedLine {
    width: usize,
    symbols: Vec<String>,
}

/// Tokenizes `source`, closing every open block at end of input.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut level = 0usize;

    for (index, raw) in source.split('\n').enumerate() {
        let line = index + 1;
        let text = raw.strip_suffix('\r').unwrap_or(raw);

        let Some(scanned) = scan_line(text, line)? else {
            continue;
        };

        level = change_level(&mut tokens, level, scanned.width, line)?;
        tokens.extend(scanned.symbols.into_iter().map(Token::Symbol));
    }

    tokens.extend(std::iter::repeat(Token::Dedent).take(level / INDENT_UNIT));
    Ok(tokens)
}

/// Measures the indentation of one line and splits it into symbols.
///
/// Returns `None` for lines without any symbol.
fn scan_line(text: &str, line: usize) -> Result<Option<ScannedLine>, LexError> {
    let mut state = State::Indentation;
    let mut width = 0usize;
    let mut symbols = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        state = match (state, c) {
            (State::Indentation, ' ') => {
                width += 1;
                State::Indentation
            }
            (State::Indentation, '\t') => {
                width += INDENT_UNIT;
                State::Indentation
            }
            (State::Indentation | State::Gap, ' ' | '\t') => State::Gap,
            (State::Indentation | State::Gap | State::Symbol, '\\') => State::Escape,
            (State::Indentation | State::Gap, c) => {
                current.push(c);
                State::Symbol
            }
            (State::Symbol, ' ' | '\t') => {
                symbols.push(std::mem::take(&mut current));
                State::Gap
            }
            (State::Symbol, c) => {
                current.push(c);
                State::Symbol
            }
            // Escaped whitespace joins the symbol; any other escape is kept
            // verbatim for the template parser.
            (State::Escape, ' ' | '\t') => {
                current.push(c);
                State::Symbol
            }
            (State::Escape, c) => {
                current.push('\\');
                current.push(c);
                State::Symbol
            }
        };
    }

    match state {
        State::Escape => return Err(LexError::UnterminatedState { line }),
        State::Symbol => symbols.push(current),
        State::Indentation | State::Gap => {}
    }

    if symbols.is_empty() {
        Ok(None)
    } else {
        Ok(Some(ScannedLine { width, symbols }))
    }
}

/// Emits the block tokens that move from `level` to `width` and returns the
/// new level.
fn change_level(
    tokens: &mut Vec<Token>,
    level: usize,
    width: usize,
    line: usize,
) -> Result<usize, LexError> {
    if width == level {
        Ok(level)
    } else if width == level + INDENT_UNIT {
        tokens.push(Token::Indent);
        Ok(width)
    } else if width < level && (level - width) % INDENT_UNIT == 0 {
        let closed = (level - width) / INDENT_UNIT;
        tokens.extend(std::iter::repeat(Token::Dedent).take(closed));
        Ok(width)
    } else {
        Err(LexError::InvalidIndent { line, width, level })
    }
}
