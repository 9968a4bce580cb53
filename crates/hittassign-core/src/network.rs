//! Side-effect collaborators of the executor.
//!
//! The executor never talks to the outside world directly. Fetches and
//! downloads go through a [`Network`], debug output through a [`DebugSink`],
//! so tests can substitute recording doubles for both.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::HittassignConfig;

#[derive(Error, Debug)]
pub enum NetworkError {
    /// Transport failure or a non-success status.
    #[error("{0}")]
    Http(String),

    /// The downloaded body could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for NetworkError {
    fn from(e: reqwest::Error) -> Self {
        NetworkError::Http(e.to_string())
    }
}

#[async_trait]
pub trait Network: Send + Sync {
    /// Fetches `url` and returns the response body as text.
    async fn fetch(&self, url: &str) -> Result<String, NetworkError>;

    /// Streams the body of `url` into a file at `destination`.
    async fn download(&self, url: &str, destination: &Path) -> Result<(), NetworkError>;
}

/// Receives the rendered message of every `debug` statement.
pub trait DebugSink: Send + Sync {
    fn emit(&self, message: &str);
}

/// Prints each message on its own line of standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl DebugSink for StdoutSink {
    fn emit(&self, message: &str) {
        println!("{}", message);
    }
}

/// [`Network`] over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    pub fn new(config: &HittassignConfig) -> Result<Self, NetworkError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, NetworkError> {
        let response = self.client.get(url).send().await?;
        Ok(response.error_for_status()?)
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, url: &str) -> Result<String, NetworkError> {
        let body = self.get(url).await?.text().await?;
        debug!(url, bytes = body.len(), "fetched");
        Ok(body)
    }

    async fn download(&self, url: &str, destination: &Path) -> Result<(), NetworkError> {
        let mut response = self.get(url).await?;
        let mut file = tokio::fs::File::create(destination).await?;
        match write_body(&mut response, &mut file).await {
            Ok(written) => {
                debug!(url, destination = %destination.display(), bytes = written, "downloaded");
                Ok(())
            }
            Err(e) => {
                // No partial file is left behind.
                drop(file);
                if let Err(remove) = tokio::fs::remove_file(destination).await {
                    warn!(destination = %destination.display(), error = %remove, "could not remove partial download");
                }
                Err(e)
            }
        }
    }
}

/// Streams the response body into `file`, returning the byte count.
async fn write_body(
    response: &mut reqwest::Response,
    file: &mut tokio::fs::File,
) -> Result<usize, NetworkError> {
    let mut written = 0usize;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;
    Ok(written)
}
