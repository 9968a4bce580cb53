//! # hittassign-core
//!
//! Interpreter for hittassign, a small indentation-structured language for
//! harvesting data from JSON APIs.
//!
//! A script fetches JSON documents, binds them to names, iterates over
//! sequences found inside them and downloads files, with explicit control
//! over how many branches run at once:
//!
//! ```text
//! fetch h "https://api.example/search?q=cafe"
//!   concurrently 4
//!     foreach c h.result.items
//!       debug "found {c.name}"
//!       download c.photo "photos/{c.id}.jpg"
//! ```
//!
//! ## Modules
//!
//! - [`lexer`] - Indentation-sensitive tokenizer
//! - [`parser`] - Recursive-descent parser producing the [`ast`]
//! - [`path`] - Compiled JSON path expressions used by value references
//! - [`context`] - Immutable, parent-linked variable scopes
//! - [`batch`] - Bounded, fail-aware task batches
//! - [`executor`] - Tree-walking executor
//! - [`network`] - HTTP and debug-output collaborators
//! - [`config`] - Persistent configuration in `~/.hittassign/config.json`
//! - [`error`] - Error types for every pipeline stage
//!
//! ## Example
//!
//! ```no_run
//! #[tokio::main]
//! async fn main() {
//!     let script = "fetch h \"https://api.example/items\"\n  foreach i h.items\n    debug i.name\n";
//!     if let Err(e) = hittassign_core::run(script).await {
//!         eprintln!("Error: {}", e);
//!         std::process::exit(e.exit_code());
//!     }
//! }
//! ```

use std::num::NonZeroUsize;
use std::sync::Arc;

pub mod ast;
pub mod batch;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod lexer;
pub mod network;
pub mod parser;
pub mod path;

use ast::Statements;
use config::HittassignConfig;
use context::RuntimeContext;
use error::AppError;
use executor::Executor;
use network::{HttpNetwork, NetworkError, StdoutSink};

/// Lexes and parses `source`.
pub fn parse_source(source: &str) -> Result<Statements, AppError> {
    let tokens = lexer::lex(source)?;
    Ok(parser::parse(tokens)?)
}

/// Runs scripts against one executor and root concurrency bound.
#[derive(Clone)]
pub struct Interpreter {
    executor: Executor,
    concurrency: NonZeroUsize,
}

impl Interpreter {
    /// An interpreter that talks HTTP and prints debug output to stdout.
    pub fn new(config: &HittassignConfig) -> Result<Self, NetworkError> {
        let network = HttpNetwork::new(config)?;
        Ok(Self::with_executor(
            Executor::new(Arc::new(network), Arc::new(StdoutSink)),
            config.concurrency,
        ))
    }

    pub fn with_executor(executor: Executor, concurrency: NonZeroUsize) -> Self {
        Self {
            executor,
            concurrency,
        }
    }

    pub fn concurrency(&self) -> NonZeroUsize {
        self.concurrency
    }

    /// Lexes and parses `source` without running it.
    pub fn check(&self, source: &str) -> Result<Statements, AppError> {
        parse_source(source)
    }

    /// Parses `source` and runs it in a fresh root scope.
    pub async fn run(&self, source: &str) -> Result<(), AppError> {
        let script = self.check(source)?;
        self.run_parsed(&script).await
    }

    /// Runs an already parsed script in a fresh root scope.
    pub async fn run_parsed(&self, script: &Statements) -> Result<(), AppError> {
        let root = RuntimeContext::root(self.concurrency);
        self.executor.execute_block(script, root).await?;
        Ok(())
    }
}

/// Runs `source` with the persisted configuration, over HTTP.
pub async fn run(source: &str) -> Result<(), AppError> {
    let config = HittassignConfig::load();
    let interpreter = Interpreter::new(&config)?;
    interpreter.run(source).await
}
