//! Shared test helpers for hittassign-core integration tests.
//!
//! This module provides a programmable in-memory network, a recording debug
//! sink and helpers wiring both into an [`Interpreter`].

#![allow(dead_code)]

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use hittassign_core::executor::Executor;
use hittassign_core::network::{DebugSink, Network, NetworkError};
use hittassign_core::Interpreter;

// ---------------------------------------------------------------------------
// Programmable mock network
// ---------------------------------------------------------------------------

/// Describes how the mock network answers one URL.
#[derive(Clone)]
pub enum MockBehavior {
    /// Reply immediately with the given body.
    Respond(String),
    /// Sleep for `Duration`, then reply.
    Delay(Duration, String),
    /// Sleep for `Duration`, then fail with the given message.
    FailAfter(Duration, String),
}

/// In-memory [`Network`] answering from a URL table.
///
/// Unknown URLs fail with "404 Not Found". Every request is logged when it
/// starts and when it completes, and the number of requests in flight is
/// tracked so tests can assert on the concurrency bound.
#[derive(Default)]
pub struct MockNetwork {
    routes: HashMap<String, MockBehavior>,
    launched: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    downloads: Mutex<Vec<(String, PathBuf)>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), MockBehavior::Respond(body.to_string()));
        self
    }

    pub fn delay(mut self, url: &str, millis: u64, body: &str) -> Self {
        self.routes.insert(
            url.to_string(),
            MockBehavior::Delay(Duration::from_millis(millis), body.to_string()),
        );
        self
    }

    pub fn fail_after(mut self, url: &str, millis: u64, message: &str) -> Self {
        self.routes.insert(
            url.to_string(),
            MockBehavior::FailAfter(Duration::from_millis(millis), message.to_string()),
        );
        self
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }

    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<(String, PathBuf)> {
        self.downloads.lock().unwrap().clone()
    }

    /// Highest number of requests that were in flight at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn serve(&self, url: &str) -> Result<String, NetworkError> {
        self.launched.lock().unwrap().push(url.to_string());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let outcome = match self.routes.get(url).cloned() {
            Some(MockBehavior::Respond(body)) => Ok(body),
            Some(MockBehavior::Delay(duration, body)) => {
                tokio::time::sleep(duration).await;
                Ok(body)
            }
            Some(MockBehavior::FailAfter(duration, message)) => {
                tokio::time::sleep(duration).await;
                Err(NetworkError::Http(message))
            }
            None => Err(NetworkError::Http("404 Not Found".to_string())),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.completed.lock().unwrap().push(url.to_string());
        outcome
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, url: &str) -> Result<String, NetworkError> {
        self.serve(url).await
    }

    async fn download(&self, url: &str, destination: &Path) -> Result<(), NetworkError> {
        let body = self.serve(url).await?;
        tokio::fs::write(destination, body).await?;
        self.downloads
            .lock()
            .unwrap()
            .push((url.to_string(), destination.to_path_buf()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recording debug sink
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl DebugSink for RecordingSink {
    fn emit(&self, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// An interpreter over `network` whose debug output lands in the returned sink.
pub fn interpreter(network: Arc<MockNetwork>, concurrency: usize) -> (Interpreter, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let executor = Executor::new(network, sink.clone());
    let concurrency = NonZeroUsize::new(concurrency).expect("concurrency must be positive");
    (Interpreter::with_executor(executor, concurrency), sink)
}

/// A fresh directory path under the system temp dir. Not created.
pub fn unique_temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!(
        "hittassign_test_{}",
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    ))
}
