// src/protocol.rs

//! Controller <-> worker wire protocol.
//!
//! Messages are newline-delimited JSON objects:
//!
//! ```text
//! controller -> worker   {"cmd":"start","data":["/src/a.less", ...]}
//!                        {"cmd":"build","file":"/src/a.less","dest":"/out/a.css"}
//! worker -> controller   {"evt":"ready","id":0}
//!                        {"evt":"drain","id":0}
//!                        {"evt":"error","id":0,"message":"..."}
//! ```
//!
//! The same codec is used over a child's stdin/stdout and over in-memory
//! duplex pipes, so in-process workers exercise exactly the production path.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};

use crate::errors::{ParlessError, Result};

/// Identity of a worker within one run.
pub type WorkerId = usize;

/// Command sent from the controller to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum WorkerCommand {
    /// Preload these files into the worker's cache.
    Start { data: Vec<PathBuf> },
    /// Compile one file.
    Build { file: PathBuf, dest: PathBuf },
}

/// Event sent from a worker back to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "evt", rename_all = "lowercase")]
pub enum WorkerEvent {
    Ready {
        id: WorkerId,
    },
    Drain {
        id: WorkerId,
    },
    Error {
        id: WorkerId,
        #[serde(default)]
        message: String,
    },
}

impl WorkerEvent {
    pub fn worker_id(&self) -> WorkerId {
        match self {
            WorkerEvent::Ready { id } | WorkerEvent::Drain { id } | WorkerEvent::Error { id, .. } => {
                *id
            }
        }
    }
}

pub fn encode<T: Serialize>(message: &T) -> Result<String> {
    serde_json::to_string(message)
        .map_err(|e| ParlessError::ProtocolError(format!("encoding message: {e}")))
}

pub fn decode_command(line: &str) -> Result<WorkerCommand> {
    serde_json::from_str(line)
        .map_err(|e| ParlessError::ProtocolError(format!("invalid command {line:?}: {e}")))
}

pub fn decode_event(line: &str) -> Result<WorkerEvent> {
    serde_json::from_str(line)
        .map_err(|e| ParlessError::ProtocolError(format!("invalid event {line:?}: {e}")))
}

/// Reads newline-delimited messages, skipping blank lines.
pub struct LineReader<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Next non-empty line, or `None` at end of stream.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            match self.lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(line)),
                None => return Ok(None),
            }
        }
    }
}

/// Writes one JSON message per line and flushes after each.
pub struct LineWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let json = encode(message)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Flush and close the underlying stream; the peer sees end-of-input.
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_cmd_tag() {
        let cmd = WorkerCommand::Build {
            file: PathBuf::from("/src/a.less"),
            dest: PathBuf::from("/out/a.css"),
        };
        assert_eq!(
            encode(&cmd).unwrap(),
            r#"{"cmd":"build","file":"/src/a.less","dest":"/out/a.css"}"#
        );
    }

    #[test]
    fn unknown_command_is_a_protocol_error() {
        let err = decode_command(r#"{"cmd":"explode"}"#).unwrap_err();
        assert!(matches!(err, ParlessError::ProtocolError(_)));

        let err = decode_command(r#"{"data":[]}"#).unwrap_err();
        assert!(matches!(err, ParlessError::ProtocolError(_)));
    }

    #[test]
    fn error_event_message_is_optional() {
        let evt = decode_event(r#"{"evt":"error","id":3}"#).unwrap();
        assert_eq!(
            evt,
            WorkerEvent::Error {
                id: 3,
                message: String::new()
            }
        );
        assert_eq!(evt.worker_id(), 3);
    }

    #[tokio::test]
    async fn line_reader_skips_blank_lines_and_stops_at_eof() {
        let (client, server) = tokio::io::duplex(256);
        let mut writer = LineWriter::new(client);
        writer.send(&WorkerEvent::Ready { id: 1 }).await.unwrap();
        writer.writer.write_all(b"\n  \n").await.unwrap();
        writer.send(&WorkerEvent::Drain { id: 1 }).await.unwrap();
        writer.close().await.unwrap();

        let mut reader = LineReader::new(server);
        let first = reader.next_line().await.unwrap().unwrap();
        assert_eq!(decode_event(&first).unwrap(), WorkerEvent::Ready { id: 1 });
        let second = reader.next_line().await.unwrap().unwrap();
        assert_eq!(decode_event(&second).unwrap(), WorkerEvent::Drain { id: 1 });
        assert!(reader.next_line().await.unwrap().is_none());
    }
}
