//! Shell command execution.
//!
//! `ShellProcessHost` runs each command as `<shell> -c <command>` with stdin
//! and stdout detached. A watcher task awaits the child and posts a
//! [`ProcessExit`] back to the reactor; the engine never waits on a child.

use std::process::Stdio;

use tokio::process::Command;

use crate::event_bus::{EventSender, ExitOutcome, ProcessExit, ReactorEvent};
use crate::platform::{PlatformError, ProcessHost};

pub struct ShellProcessHost {
    shell: String,
    events: EventSender,
}

impl ShellProcessHost {
    pub fn new(shell: impl Into<String>, events: EventSender) -> Self {
        Self { shell: shell.into(), events }
    }
}

impl ProcessHost for ShellProcessHost {
    /// Must be called from within a tokio runtime.
    fn spawn(&mut self, command: &str) -> Result<u32, PlatformError> {
        let spawn_error = |source| PlatformError::Spawn { command: command.to_owned(), source };

        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(spawn_error)?;
        let pid = child.id().ok_or_else(|| {
            spawn_error(std::io::Error::other("child exited before its pid was read"))
        })?;

        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = match child.wait().await {
                Ok(status) => ExitOutcome::from_status(status),
                Err(e) => ExitOutcome::WaitFailed(e.to_string()),
            };
            // The reactor may already be gone during shutdown.
            let _ = events.send(ReactorEvent::ProcessExit(ProcessExit { pid, outcome })).await;
        });

        Ok(pid)
    }
}
