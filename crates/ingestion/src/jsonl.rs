//! JSON-lines message source
//!
//! Reads one `{"destination","text","timestamp"}` document per line from any
//! async reader (stdin, file, socket) and hands it to a `MessageIntake`.

use std::sync::Arc;

use contracts::Message;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, instrument, warn};

use crate::error::{IngestionError, Result};
use crate::intake::MessageIntake;

/// Summary of one source run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Lines read (including blank lines)
    pub lines: u64,
    /// Messages accepted by the intake
    pub appended: u64,
    /// Lines skipped because they failed to decode or were rejected
    pub skipped: u64,
}

/// Line-delimited JSON reader feeding a `MessageIntake`
pub struct JsonLinesSource<R> {
    name: String,
    reader: R,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
        }
    }

    /// Read until EOF, submitting every decoded message
    ///
    /// Malformed lines (bad UTF-8, bad JSON, missing fields) and lines the
    /// intake rejects are logged and counted, never fatal. Only a read
    /// failure ends the run with an error.
    #[instrument(name = "jsonl_source_run", skip(self, intake), fields(source = %self.name))]
    pub async fn run<I: MessageIntake>(self, intake: Arc<I>) -> Result<SourceStats> {
        let metrics = intake.metrics();
        let mut reader = self.reader;
        let mut buf = Vec::new();
        let mut stats = SourceStats::default();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            stats.lines += 1;

            let line = trim_line_ending(&buf);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let message = match decode_line(line, stats.lines) {
                Ok(message) => message,
                Err(e) => {
                    metrics.record_parse_error();
                    stats.skipped += 1;
                    warn!(source = %self.name, error = %e, "Skipping input line");
                    continue;
                }
            };

            match intake.accept(message) {
                Ok(()) => stats.appended += 1,
                Err(e) => {
                    stats.skipped += 1;
                    let e = IngestionError::Rejected {
                        line: stats.lines,
                        message: e.to_string(),
                    };
                    warn!(source = %self.name, error = %e, "Skipping input line");
                }
            }
        }

        debug!(
            source = %self.name,
            lines = stats.lines,
            appended = stats.appended,
            skipped = stats.skipped,
            "Source reached end of input"
        );
        Ok(stats)
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Decode a single line into a message
///
/// Field checks beyond presence are left to the intake.
pub fn decode_line(line: &[u8], line_no: u64) -> Result<Message> {
    let text = std::str::from_utf8(line).map_err(|e| IngestionError::ParseFailed {
        line: line_no,
        message: format!("invalid UTF-8: {e}"),
    })?;

    serde_json::from_str(text).map_err(|e| IngestionError::ParseFailed {
        line: line_no,
        message: e.to_string(),
    })
}
