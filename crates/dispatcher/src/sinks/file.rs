//! FileSink - appends each batch set as one JSON line

use contracts::{BatchSink, ContractError, Envelope};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file, created if missing and appended to otherwise
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> std::io::Result<Self> {
        let path = params.get("path").map(PathBuf::from).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing 'path' param")
        })?;

        Ok(Self { path })
    }
}

/// Sink that writes batch sets to a JSON-lines file
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    file: File,
    lines_written: u64,
}

impl FileSink {
    /// Create a new FileSink, opening the file in append mode
    pub async fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
            .await?;

        Ok(Self {
            name: name.into(),
            config,
            file,
            lines_written: 0,
        })
    }

    /// Create from params map (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params)?;
        Self::new(name, config).await
    }

    async fn append_line(&mut self, envelope: &Envelope) -> std::io::Result<()> {
        let mut line = Vec::with_capacity(envelope.body.len() + 1);
        line.extend_from_slice(&envelope.body);
        line.push(b'\n');
        self.file.write_all(&line).await?;
        self.lines_written += 1;
        Ok(())
    }
}

impl BatchSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, envelope),
        fields(sink = %self.name, dispatch_id = envelope.dispatch_id)
    )]
    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        self.append_line(envelope).await.map_err(|e| {
            error!(
                sink = %self.name,
                path = %self.config.path.display(),
                error = %e,
                "Write failed"
            );
            ContractError::sink_write(&self.name, e.to_string())
        })
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.file
            .flush()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.file
            .sync_all()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        debug!(sink = %self.name, lines = self.lines_written, "FileSink closed");
        Ok(())
    }
}
