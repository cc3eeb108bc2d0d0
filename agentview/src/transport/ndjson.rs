//! Newline-delimited JSON envelope reader.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

/// Boxed line source, either a file or stdin.
pub type DynReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// Reads one envelope per line, skipping blank lines and lines that are not
/// JSON objects.
pub struct EnvelopeReader<R> {
    lines: Lines<R>,
    line_no: usize,
    skipped: usize,
}

impl<R: AsyncBufRead + Unpin> EnvelopeReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Lines that could not be parsed so far.
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    pub async fn next_envelope(&mut self) -> Result<Option<Value>> {
        while let Some(line) = self
            .lines
            .next_line()
            .await
            .context("Failed to read envelope stream")?
        {
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Some(value) => return Ok(Some(value)),
                None => {
                    self.skipped += 1;
                    tracing::warn!(line = self.line_no, "skipping line that is not a JSON object");
                }
            }
        }
        Ok(None)
    }

    pub async fn read_all(mut self) -> Result<Vec<Value>> {
        let mut envelopes = Vec::new();
        while let Some(envelope) = self.next_envelope().await? {
            envelopes.push(envelope);
        }
        Ok(envelopes)
    }
}

impl EnvelopeReader<DynReader> {
    /// Open a file, or stdin for `-`.
    pub async fn open(source: &str) -> Result<Self> {
        let reader: DynReader = if source == "-" {
            Box::new(BufReader::new(tokio::io::stdin()))
        } else {
            let file = tokio::fs::File::open(Path::new(source))
                .await
                .with_context(|| format!("Failed to open {source}"))?;
            Box::new(BufReader::new(file))
        };
        Ok(Self::new(reader))
    }
}

pub fn parse_line(line: &str) -> Option<Value> {
    serde_json::from_str::<Value>(line.trim())
        .ok()
        .filter(Value::is_object)
}
