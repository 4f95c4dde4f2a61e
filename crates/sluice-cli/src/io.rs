//! Line-oriented connectors: JSON lines in, JSON lines out.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use sluice_core::domain::{PipelineError, Record};
use sluice_core::ports::{ReadConnector, WriteConnector};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::time::Instant;
use tracing::debug;

/// Reads one record per non-blank line. Lines that are not valid JSON
/// become string records.
pub struct LineReadConnector<R> {
    source: String,
    lines: Option<Lines<R>>,
    reader: Option<R>,
    batch_size: usize,
    eof: bool,
    line_no: u64,
}

impl<R> LineReadConnector<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(source: impl Into<String>, reader: R, batch_size: usize) -> Self {
        Self {
            source: source.into(),
            lines: None,
            reader: Some(reader),
            batch_size: batch_size.max(1),
            eof: false,
            line_no: 0,
        }
    }

    /// Non-JSON lines are kept verbatim, surrounding whitespace included.
    fn parse(line: String) -> Record {
        match serde_json::from_str::<Value>(&line) {
            Ok(value) => Record::Data(value),
            Err(_) => Record::data(line),
        }
    }
}

#[async_trait]
impl<R> ReadConnector for LineReadConnector<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn connect(&mut self) -> Result<(), PipelineError> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| PipelineError::connection(format!("{}: already connected", self.source)))?;
        self.lines = Some(reader.lines());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), PipelineError> {
        self.lines = None;
        Ok(())
    }

    async fn next(&mut self, timeout: Duration) -> Result<Vec<Record>, PipelineError> {
        let lines = self
            .lines
            .as_mut()
            .ok_or_else(|| PipelineError::connection(format!("{}: not connected", self.source)))?;

        let deadline = Instant::now() + timeout;
        let mut batch = Vec::new();
        while batch.len() < self.batch_size {
            // next_line is cancel safe, so a timeout never loses a partial line
            let line = match tokio::time::timeout_at(deadline, lines.next_line()).await {
                Ok(read) => read.map_err(|e| PipelineError::connection(format!("{}: {e}", self.source)))?,
                Err(_) => break,
            };
            let Some(line) = line else {
                self.eof = true;
                break;
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            batch.push(Self::parse(line));
        }

        debug!(source = %self.source, records = batch.len(), line = self.line_no, "read batch");
        Ok(batch)
    }

    async fn is_dry(&mut self) -> bool {
        self.eof
    }

    fn reader_context(&self) -> Option<Value> {
        Some(json!({ "source": self.source }))
    }
}

/// Writes data records to `out` and fault records to `faults`, one JSON
/// document per line.
pub struct LineWriteConnector<W, E> {
    out: W,
    faults: E,
    written: u64,
    faulted: u64,
}

impl<W, E> LineWriteConnector<W, E>
where
    W: AsyncWrite + Unpin + Send,
    E: AsyncWrite + Unpin + Send,
{
    pub fn new(out: W, faults: E) -> Self {
        Self {
            out,
            faults,
            written: 0,
            faulted: 0,
        }
    }

    #[cfg(test)]
    pub fn into_parts(self) -> (W, E) {
        (self.out, self.faults)
    }
}

fn io_error(err: std::io::Error) -> PipelineError {
    PipelineError::connection(format!("write failed: {err}"))
}

#[async_trait]
impl<W, E> WriteConnector for LineWriteConnector<W, E>
where
    W: AsyncWrite + Unpin + Send,
    E: AsyncWrite + Unpin + Send,
{
    async fn connect(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), PipelineError> {
        self.out.flush().await.map_err(io_error)?;
        self.faults.flush().await.map_err(io_error)
    }

    async fn deliver(&mut self, records: &[Record]) -> Result<Value, PipelineError> {
        let (mut written, mut faulted) = (0u64, 0u64);
        for record in records {
            match record {
                Record::Data(value) => {
                    let mut line = serde_json::to_vec(value)
                        .map_err(|e| PipelineError::processing(format!("encode: {e}")))?;
                    line.push(b'\n');
                    self.out.write_all(&line).await.map_err(io_error)?;
                    written += 1;
                }
                Record::Fault(_) => {
                    let mut line = serde_json::to_vec(record)
                        .map_err(|e| PipelineError::processing(format!("encode: {e}")))?;
                    line.push(b'\n');
                    self.faults.write_all(&line).await.map_err(io_error)?;
                    faulted += 1;
                }
            }
        }
        self.out.flush().await.map_err(io_error)?;
        self.faults.flush().await.map_err(io_error)?;

        self.written += written;
        self.faulted += faulted;
        Ok(json!({
            "written": written,
            "faults": faulted,
            "total_written": self.written,
            "total_faults": self.faulted,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::domain::FaultMarker;

    #[tokio::test]
    async fn reads_json_and_plain_lines_in_batches() {
        let input: &[u8] = b"{\"a\":1}\n\nplain text\n[1,2]\n";
        let mut reader = LineReadConnector::new("test", input, 2);
        reader.connect().await.unwrap();

        let first = reader.next(Duration::from_secs(1)).await.unwrap();
        assert_eq!(first, vec![Record::data(json!({"a": 1})), Record::data("plain text")]);
        assert!(!reader.is_dry().await);

        let second = reader.next(Duration::from_secs(1)).await.unwrap();
        assert_eq!(second, vec![Record::data(json!([1, 2]))]);
        assert!(reader.is_dry().await);
        assert_eq!(reader.reader_context(), Some(json!({"source": "test"})));
    }

    #[tokio::test]
    async fn plain_lines_keep_their_whitespace() {
        let input: &[u8] = b"  indented text \n   \n\t{\"a\": 1}\n";
        let mut reader = LineReadConnector::new("test", input, 10);
        reader.connect().await.unwrap();

        let batch = reader.next(Duration::from_secs(1)).await.unwrap();
        assert_eq!(batch, vec![Record::data("  indented text "), Record::data(json!({"a": 1}))]);
    }

    #[tokio::test]
    async fn next_before_connect_is_a_connection_error() {
        let input: &[u8] = b"x\n";
        let mut reader = LineReadConnector::new("test", input, 10);
        let err = reader.next(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Connection(_)));
    }

    #[tokio::test]
    async fn faults_go_to_the_fault_stream() {
        let mut writer = LineWriteConnector::new(Vec::new(), Vec::new());
        let cause = PipelineError::processing("boom");
        let records = vec![
            Record::data("ok"),
            Record::Fault(FaultMarker::new(json!("bad"), &cause, None)),
        ];

        let receipt = writer.deliver(&records).await.unwrap();
        assert_eq!(receipt["written"], 1);
        assert_eq!(receipt["faults"], 1);

        let (out, faults) = writer.into_parts();
        assert_eq!(String::from_utf8(out).unwrap(), "\"ok\"\n");
        let fault_line = String::from_utf8(faults).unwrap();
        assert!(fault_line.contains("boom"));
        assert!(fault_line.ends_with('\n'));
    }
}
