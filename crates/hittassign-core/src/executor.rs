//! Tree-walking execution of parsed scripts.
//!
//! This module provides the [`Executor`] type, which walks a [`Statements`]
//! tree against a [`RuntimeContext`] and dispatches its effects to the
//! injected [`Network`] and [`DebugSink`].
//!
//! Every block and every `foreach` runs its children as a bounded batch (see
//! [`crate::batch`]); each child becomes its own task on the runtime. Tasks
//! interleave at their await points, so requests overlap even on a
//! current-thread runtime.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hittassign_core::config::HittassignConfig;
//! use hittassign_core::context::RuntimeContext;
//! use hittassign_core::executor::Executor;
//! use hittassign_core::network::{HttpNetwork, StdoutSink};
//! use hittassign_core::parse_source;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = HittassignConfig::load();
//!     let network = HttpNetwork::new(&config).expect("http client");
//!     let executor = Executor::new(Arc::new(network), Arc::new(StdoutSink));
//!
//!     let script = parse_source("debug \"hello\"").expect("valid script");
//!     let root = RuntimeContext::root(config.concurrency);
//!     executor.execute_block(&script, root).await.expect("script ran");
//! }
//! ```

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, info_span, Instrument};

use crate::ast::{Binding, Node, Statements, ValueRef, ValueSpec};
use crate::batch::run_bounded;
use crate::context::RuntimeContext;
use crate::error::RuntimeError;
use crate::network::{DebugSink, Network};

/// Boxed future returned by the recursive execution entry points.
pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RuntimeError>> + Send + 'a>>;

/// Executes AST nodes.
///
/// Cloning is cheap: both collaborators are shared.
#[derive(Clone)]
pub struct Executor {
    network: Arc<dyn Network>,
    output: Arc<dyn DebugSink>,
}

impl Executor {
    pub fn new(network: Arc<dyn Network>, output: Arc<dyn DebugSink>) -> Self {
        Self { network, output }
    }

    /// Runs every statement of `block` in `ctx`, at most
    /// `ctx.concurrency()` at a time, in declaration order.
    pub fn execute_block<'a>(&'a self, block: &'a Statements, ctx: Arc<RuntimeContext>) -> ExecFuture<'a> {
        Box::pin(async move {
            run_bounded(0..block.len(), ctx.concurrency(), |index| {
                let executor = self.clone();
                let block = block.clone();
                let ctx = Arc::clone(&ctx);
                async move {
                    match block.get(index) {
                        Some(node) => executor.execute(node, ctx).await,
                        None => Ok(()),
                    }
                }
            })
            .await
        })
    }

    /// Runs a single node in `ctx`.
    pub fn execute<'a>(&'a self, node: &'a Node, ctx: Arc<RuntimeContext>) -> ExecFuture<'a> {
        Box::pin(async move {
            match node {
                Node::Statements(block) => self.execute_block(block, ctx).await,
                Node::Fetch { name, source, body } => {
                    let span = info_span!("fetch", name = %name);
                    self.fetch(name, source, body, ctx).instrument(span).await
                }
                Node::Foreach { name, source, body } => {
                    let span = info_span!("foreach", name = %name, source = %source);
                    self.foreach(name, source, body, ctx).instrument(span).await
                }
                Node::Download {
                    source,
                    destination,
                } => self.download(source, destination, &ctx).await,
                Node::Concurrently { level, body } => {
                    debug!(level = level.get(), "entering concurrently block");
                    self.execute_block(body, ctx.with_concurrency(*level)).await
                }
                Node::Debug { message } => {
                    let message = ctx.resolve(message)?;
                    debug!(message = %message, "debug statement");
                    self.output.emit(&message);
                    Ok(())
                }
            }
        })
    }

    async fn fetch(
        &self,
        name: &Binding,
        source: &ValueRef,
        body: &Statements,
        ctx: Arc<RuntimeContext>,
    ) -> Result<(), RuntimeError> {
        let url = ctx.resolve(source)?;
        info!(url = %url, "fetching");

        let failed = |reason: String| RuntimeError::FetchFailed {
            name: name.to_string(),
            url: url.clone(),
            reason,
        };
        let text = self
            .network
            .fetch(&url)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let value: Value = serde_json::from_str(&text).map_err(|e| failed(e.to_string()))?;

        self.execute_block(body, ctx.child(name.clone(), value)).await
    }

    async fn foreach(
        &self,
        name: &Binding,
        source: &ValueSpec,
        body: &Statements,
        ctx: Arc<RuntimeContext>,
    ) -> Result<(), RuntimeError> {
        let items = ctx.get_sequence(source)?;
        debug!(count = items.len(), "iterating");

        run_bounded(items, ctx.concurrency(), |item| {
            let executor = self.clone();
            let body = body.clone();
            let child = ctx.child(name.clone(), item);
            async move { executor.execute_block(&body, child).await }
        })
        .await
    }

    async fn download(
        &self,
        source: &ValueRef,
        destination: &ValueRef,
        ctx: &RuntimeContext,
    ) -> Result<(), RuntimeError> {
        let url = ctx.resolve(source)?;
        let destination = ctx.resolve(destination)?;
        let path = Path::new(&destination);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RuntimeError::MkdirFailed {
                    path: parent.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }

        self.network
            .download(&url, path)
            .await
            .map_err(|e| RuntimeError::DownloadFailed {
                url: url.clone(),
                destination: destination.clone(),
                reason: e.to_string(),
            })?;
        info!(url = %url, destination = %destination, "downloaded");
        Ok(())
    }
}
