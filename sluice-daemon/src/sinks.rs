//! Concrete sinks built from `[[sinks]]`.
//!
//! - [`StdoutSink`]: one JSON object per line on stdout
//! - [`FileSink`]: JSON lines appended to `<path>.<kind>.jsonl`
//!
//! Both serialize any `serde::Serialize` record, so the same configured sink
//! name can be bound by the DNS and the L7 reporter.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use sluice_aggregator::{SinkError, SinkMap};
use sluice_core::config::SinkConfig;

/// Encode a batch as newline-delimited JSON.
fn encode_lines<R: Serialize>(batch: &[R]) -> Result<Vec<u8>, SinkError> {
    let mut buf = Vec::with_capacity(batch.len() * 256);
    for record in batch {
        serde_json::to_writer(&mut buf, record)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

// ─── StdoutSink ─────────────────────────────────────────────────────

/// Writes records to stdout as JSON lines.
#[derive(Debug, Default, Clone)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }
}

impl<R: Serialize + Send + Sync + 'static> sluice_aggregator::Sink<R> for StdoutSink {
    async fn start(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn report(&self, batch: &[R]) -> Result<(), SinkError> {
        let buf = encode_lines(batch)?;
        let mut stdout = tokio::io::stdout();
        stdout.write_all(&buf).await?;
        stdout.flush().await?;
        Ok(())
    }
}

// ─── FileSink ───────────────────────────────────────────────────────

/// Appends records to a JSON-lines file.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Create a sink writing to `<base>.<kind>.jsonl`.
    pub fn new(base: impl AsRef<Path>, kind: &str) -> Self {
        let mut path = base.as_ref().as_os_str().to_owned();
        path.push(format!(".{kind}.jsonl"));
        Self {
            path: PathBuf::from(path),
        }
    }

    /// Output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> Result<tokio::fs::File, SinkError> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(file)
    }
}

impl<R: Serialize + Send + Sync + 'static> sluice_aggregator::Sink<R> for FileSink {
    /// Creates the parent directory and touches the file.
    async fn start(&self) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        self.open().await?;
        Ok(())
    }

    async fn report(&self, batch: &[R]) -> Result<(), SinkError> {
        let buf = encode_lines(batch)?;
        let mut file = self.open().await?;
        file.write_all(&buf).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Build the named sink map for one record kind (`dns` or `l7`).
///
/// Every configured sink is built. Binding an aggregator to a name
/// that is missing here is rejected by the reporter.
pub fn build_sinks<R>(configs: &[SinkConfig], kind: &str) -> SinkMap<R>
where
    R: Serialize + Send + Sync + 'static,
{
    let mut sinks: SinkMap<R> = HashMap::new();
    for config in configs {
        let sink: Arc<dyn sluice_aggregator::DynSink<R>> = match config.kind.as_str() {
            "file" => Arc::new(FileSink::new(&config.path, kind)),
            _ => Arc::new(StdoutSink::new()),
        };
        tracing::debug!(sink = %config.name, sink_kind = %config.kind, records = kind, "sink built");
        sinks.insert(config.name.clone(), sink);
    }
    sinks
}
