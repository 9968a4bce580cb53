//! Error types for every stage of the interpreter pipeline.
//!
//! Each stage has its own enum so callers can tell "the script never parsed"
//! apart from "the script parsed but a fetch failed". [`AppError`] wraps them
//! in pipeline order for the top-level entry points.

use std::path::PathBuf;

use thiserror::Error;

use crate::network::NetworkError;

/// Errors produced while turning source text into tokens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    /// A line is indented by something other than one extra unit, or its
    /// dedent does not land on an enclosing level.
    #[error("invalid indentation at line {line}: width {width}, enclosing level {level}")]
    InvalidIndent {
        line: usize,
        width: usize,
        level: usize,
    },

    /// A backslash escape was left dangling at the end of a line.
    #[error("unterminated escape at end of line {line}")]
    UnterminatedState { line: usize },
}

/// Errors produced while turning tokens into an AST.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown statement \"{0}\"")]
    UnknownStatement(String),

    #[error("unexpected indented block")]
    UnexpectedIndent,

    #[error("unexpected end of block")]
    UnexpectedDedent,

    #[error("expected an operand for \"{keyword}\"")]
    ExpectedSymbol { keyword: String },

    #[error("invalid binding name \"{0}\"")]
    InvalidBindingName(String),

    #[error("invalid path expression \"{expression}\": {reason}")]
    InvalidPathExpression { expression: String, reason: String },

    #[error("unterminated reference in template \"{0}\"")]
    UnterminatedTemplateReference(String),

    #[error("unexpected '}}' in template \"{0}\"")]
    UnexpectedTemplateBrace(String),

    #[error("unbalanced quote in \"{0}\"")]
    UnbalancedQuote(String),

    #[error("expected a positive integer, got \"{found}\"")]
    ExpectedInteger { found: String },
}

/// Errors produced while executing a parsed script.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// No scope binds `name`, or the path does not resolve inside its value.
    #[error("value not found: {name}{path}")]
    ValueNotFound { name: String, path: String },

    /// The value exists but has the wrong kind for the requested use.
    #[error("invalid value type at {name}{path}")]
    InvalidValueType { name: String, path: String },

    #[error("fetch of \"{url}\" into {name} failed: {reason}")]
    FetchFailed {
        name: String,
        url: String,
        reason: String,
    },

    #[error("download of \"{url}\" to \"{destination}\" failed: {reason}")]
    DownloadFailed {
        url: String,
        destination: String,
        reason: String,
    },

    #[error("cannot create directory \"{}\": {reason}", path.display())]
    MkdirFailed { path: PathBuf, reason: String },

    /// A batch member panicked or was cancelled by the runtime.
    #[error("task aborted: {0}")]
    TaskPanicked(String),
}

/// Top-level error, ordered by the pipeline stage that failed.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("cannot read \"{}\": {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// The HTTP client could not be set up.
    #[error("network setup failed: {0}")]
    Network(#[from] NetworkError),
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Runtime(_) | AppError::Network(_) => 1,
            AppError::Lex(_) | AppError::Parse(_) => 2,
            AppError::Read { .. } => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_stage() {
        let read = AppError::Read {
            path: PathBuf::from("missing.hit"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(read.exit_code(), 4);
        assert_eq!(AppError::from(LexError::UnterminatedState { line: 1 }).exit_code(), 2);
        assert_eq!(AppError::from(ParseError::UnexpectedIndent).exit_code(), 2);
        assert_eq!(
            AppError::from(RuntimeError::TaskPanicked("boom".to_string())).exit_code(),
            1
        );
    }

    #[test]
    fn value_not_found_message_joins_name_and_path() {
        let err = RuntimeError::ValueNotFound {
            name: "h".to_string(),
            path: ".name".to_string(),
        };
        assert_eq!(err.to_string(), "value not found: h.name");
    }
}
