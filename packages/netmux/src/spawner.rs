use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{error, info};

use crate::error::RelayError;
use crate::write::write_once;

/// The relayed program and the two pipes wired to its standard streams.
///
/// `stdin` is the parent's write-end (child input), `stdout` the parent's
/// read-end (child output). stderr is inherited and goes straight to the
/// operator's terminal.
pub struct ChildProcess {
    child: Child,
    pid: Option<u32>,
    command: String,
    pub(crate) stdin: ChildStdin,
    pub(crate) stdout: ChildStdout,
}

impl ChildProcess {
    /// Launch `command` with `args`, stdin and stdout piped to the parent.
    ///
    /// Any failure here (pipe allocation, fork, exec) is fatal to the relay.
    pub fn spawn(command: &str, args: &[String]) -> Result<Self, RelayError> {
        info!("Spawning command: {} with args: {:?}", command, args);

        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                error!("Failed to spawn command '{}': {}", command, e);
                RelayError::Spawn {
                    command: command.to_string(),
                    source: e,
                }
            })?;

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe(command, "stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| missing_pipe(command, "stdout"))?;

        let pid = child.id();
        info!("Child process started with PID: {:?}", pid);

        Ok(Self {
            child,
            pid,
            command: command.to_string(),
            stdin,
            stdout,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Offer `data` to the child's input once. A full pipe is `WouldBlock`;
    /// a short count means the rest was not taken.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        write_once(&mut self.stdin, data).await
    }

    /// Reap the child if it has already exited. Never blocks.
    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }
}

fn missing_pipe(command: &str, stream: &str) -> RelayError {
    RelayError::Spawn {
        command: command.to_string(),
        source: io::Error::other(format!("child {stream} was not piped")),
    }
}
