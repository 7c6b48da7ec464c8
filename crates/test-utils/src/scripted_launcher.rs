use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parless::errors::{ParlessError, Result};
use parless::protocol::{decode_command, LineReader, LineWriter, WorkerCommand, WorkerEvent, WorkerId};
use parless::scheduler::{InProcessLauncher, WorkerConnection, WorkerExit, WorkerLauncher};
use tokio::io::{DuplexStream, duplex};

/// How a scripted worker behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Real in-process worker.
    Normal,
    /// `launch` itself fails.
    FailSpawn,
    /// Exits as soon as it receives its first command.
    ExitBeforeReady,
    /// Never answers; exits cleanly when its input closes.
    Silent,
    /// Becomes ready, then exits while holding its first job.
    CrashOnBuild,
    /// Becomes ready, drains its first job without output, then exits.
    DrainThenExit,
    /// Becomes ready and drains every job after `delay`, writing nothing.
    Slow(Duration),
}

/// Launcher that runs per-id scripts and real workers for everything else.
pub struct ScriptedLauncher {
    inner: InProcessLauncher,
    scripts: HashMap<WorkerId, Script>,
    launched: Arc<Mutex<Vec<WorkerId>>>,
}

impl ScriptedLauncher {
    pub fn new(inner: InProcessLauncher) -> Self {
        Self {
            inner,
            scripts: HashMap::new(),
            launched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn script(mut self, id: WorkerId, script: Script) -> Self {
        self.scripts.insert(id, script);
        self
    }

    /// Shared view of every id passed to `launch`, in order.
    pub fn launched(&self) -> Arc<Mutex<Vec<WorkerId>>> {
        Arc::clone(&self.launched)
    }
}

impl WorkerLauncher for ScriptedLauncher {
    fn launch(&mut self, id: WorkerId) -> Result<WorkerConnection> {
        self.launched.lock().unwrap().push(id);

        match self.scripts.get(&id).copied().unwrap_or(Script::Normal) {
            Script::Normal => self.inner.launch(id),
            Script::FailSpawn => Err(ParlessError::Other(anyhow::anyhow!(
                "scripted spawn failure for worker {id}"
            ))),
            script => Ok(scripted_connection(id, script)),
        }
    }
}

fn scripted_connection(id: WorkerId, script: Script) -> WorkerConnection {
    let (commands, worker_commands) = duplex(64 * 1024);
    let (worker_events, events) = duplex(64 * 1024);

    let task = tokio::spawn(run_script(id, script, worker_commands, worker_events));
    let exit = Box::pin(async move {
        let success = task.await.unwrap_or(false);
        WorkerExit {
            success,
            detail: format!("scripted worker {script:?} ended"),
        }
    });

    WorkerConnection {
        commands: Box::new(commands),
        events: Box::new(events),
        exit,
    }
}

/// Returns whether the scripted worker ended cleanly.
async fn run_script(
    id: WorkerId,
    script: Script,
    commands: DuplexStream,
    events: DuplexStream,
) -> bool {
    let mut reader = LineReader::new(commands);
    let mut writer = LineWriter::new(events);

    while let Ok(Some(line)) = reader.next_line().await {
        let Ok(command) = decode_command(&line) else {
            return false;
        };

        match (script, command) {
            (Script::ExitBeforeReady, _) => return false,
            (Script::Silent, _) => continue,
            (_, WorkerCommand::Start { .. }) => {
                if writer.send(&WorkerEvent::Ready { id }).await.is_err() {
                    return false;
                }
            }
            (Script::CrashOnBuild, WorkerCommand::Build { .. }) => return false,
            (Script::DrainThenExit, WorkerCommand::Build { .. }) => {
                let _ = writer.send(&WorkerEvent::Drain { id }).await;
                return false;
            }
            (Script::Slow(delay), WorkerCommand::Build { .. }) => {
                tokio::time::sleep(delay).await;
                if writer.send(&WorkerEvent::Drain { id }).await.is_err() {
                    return false;
                }
            }
            (_, WorkerCommand::Build { .. }) => return false,
        }
    }

    true
}
