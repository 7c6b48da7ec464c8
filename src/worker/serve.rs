// src/worker/serve.rs

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info};

use crate::compile::InlineCompiler;
use crate::errors::{ParlessError, Result};
use crate::fs::RealFileSystem;
use crate::protocol::{decode_command, LineReader, LineWriter, WorkerCommand, WorkerEvent, WorkerId};

use super::{Worker, WorkerSettings};

/// Run `worker` until its command stream ends.
///
/// Every `start` is answered with `ready` or `error`, every `build` with
/// `drain` or `error`. End of input is a graceful shutdown. A malformed
/// command is returned as a `ProtocolError` without being answered.
pub async fn serve<R, W>(mut worker: Worker, commands: R, events: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let id = worker.id();
    let mut commands = LineReader::new(commands);
    let mut events = LineWriter::new(events);

    while let Some(line) = commands.next_line().await? {
        let command = decode_command(&line)?;
        debug!(worker = id, ?command, "command received");

        let reply = match command {
            WorkerCommand::Start { data } => match worker.initialize(&data).await {
                Ok(()) => WorkerEvent::Ready { id },
                Err(err) => failure(id, err),
            },
            WorkerCommand::Build { file, dest } => match worker.build_one(&file, &dest) {
                Ok(_) => WorkerEvent::Drain { id },
                Err(err) => failure(id, err),
            },
        };
        events.send(&reply).await?;
    }

    info!(worker = id, "command stream closed");
    worker.shutdown();
    events.close().await
}

fn failure(id: WorkerId, err: ParlessError) -> WorkerEvent {
    error!(worker = id, error = %err, "job failed");
    WorkerEvent::Error {
        id,
        message: err.to_string(),
    }
}

/// Entry point of a worker child process: serve over stdin/stdout.
pub async fn run_process(id: WorkerId, settings: WorkerSettings) -> Result<()> {
    info!(worker = id, pid = std::process::id(), "worker process started");
    let worker = Worker::new(
        id,
        Arc::new(RealFileSystem),
        Arc::new(InlineCompiler::new()),
        settings,
    );
    serve(worker, tokio::io::stdin(), tokio::io::stdout()).await
}
