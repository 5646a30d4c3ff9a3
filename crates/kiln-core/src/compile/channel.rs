//! Child process channel: one long-lived shell with a merged output pipe.
//!
//! Provides `ChildProcessChannel` for spawning the shell that hosts compiles,
//! writing commands into it, and tearing it down destructively.

use std::io::{self, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

use super::pump::{CompletionSignal, OutputPump};
use super::sink::DiagnosticSink;
use super::toolchain::ShellCommand;

/// Settings a channel needs from the driver.
#[derive(Debug, Clone)]
pub(crate) struct ChannelSettings {
    pub shell: ShellCommand,
    pub completion_token: String,
    pub error_markers: Vec<String>,
    pub teardown_grace: Duration,
}

/// Handle to the shell process hosting compiles.
///
/// A channel is either fully live (process, input pipe, output pipe and pump
/// all running) or does not exist: construction returns an error instead of
/// a partial channel. The output pipe's read end belongs to the pump thread.
pub(crate) struct ChildProcessChannel {
    /// The shell process.
    child: Child,
    /// Input pipe; closed on teardown.
    input: Option<ChildStdin>,
    /// Output pump thread draining stdout+stderr.
    pump: Option<JoinHandle<()>>,
    /// Completion flag written by this channel's pump.
    signal: CompletionSignal,
    /// How long teardown waits for the pump to drain.
    teardown_grace: Duration,
    /// Whether the shell has been killed.
    terminated: bool,
    /// Whether the shell has already been waited on. Its PID, and with it
    /// the process group ID, may since have been reused.
    reaped: bool,
}

impl ChildProcessChannel {
    /// Spawn the shell and start its output pump.
    ///
    /// stdout and stderr share one pipe so their relative order survives.
    /// The pump is running before this returns, so no early output is lost.
    pub(crate) fn spawn(
        settings: &ChannelSettings,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self> {
        let shell = &settings.shell;

        let (output_read, output_write) = io::pipe().map_err(|e| {
            Error::Channel(format!("failed to create output redirection pipe: {}", e))
        })?;
        let error_write = output_write.try_clone().map_err(|e| {
            Error::Channel(format!("failed to duplicate error output redirection pipe: {}", e))
        })?;

        let mut child = {
            let mut command = Command::new(&shell.program);
            command
                .args(&shell.args)
                .stdin(Stdio::piped())
                .stdout(output_write)
                .stderr(error_write);

            // Own process group, so teardown also reaches a running toolchain.
            #[cfg(unix)]
            {
                use std::os::unix::process::CommandExt;
                command.process_group(0);
            }

            command.spawn().map_err(|e| {
                Error::Channel(format!(
                    "failed to spawn compiler shell '{}': {}",
                    shell.program.display(),
                    e
                ))
            })?
            // `command` drops here with our copies of the write ends, so the
            // pump sees end-of-stream once the shell and its children exit.
        };

        let Some(input) = child.stdin.take() else {
            kill_and_reap(&mut child, false);
            return Err(Error::Channel("failed to open compiler shell input pipe".to_string()));
        };

        let signal = CompletionSignal::new();
        let pump = OutputPump::new(
            output_read,
            &settings.completion_token,
            settings.error_markers.clone(),
            signal.clone(),
            sink,
        )
        .start();
        let pump = match pump {
            Ok(handle) => handle,
            Err(e) => {
                drop(input);
                kill_and_reap(&mut child, false);
                return Err(e);
            }
        };

        tracing::debug!(pid = child.id(), "compiler shell started");

        Ok(Self {
            child,
            input: Some(input),
            pump: Some(pump),
            signal,
            teardown_grace: settings.teardown_grace,
            terminated: false,
            reaped: false,
        })
    }

    /// The completion flag this channel's pump writes.
    pub fn signal(&self) -> &CompletionSignal {
        &self.signal
    }

    /// Process ID of the shell.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Check if the shell is still running.
    pub fn is_alive(&mut self) -> bool {
        if self.terminated {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.reaped = true;
                tracing::debug!(%status, "compiler shell exited");
                false
            }
            Err(_) => false,
        }
    }

    /// Write text to the shell's input.
    pub fn write_input(&mut self, text: &str) -> Result<()> {
        let input = self
            .input
            .as_mut()
            .ok_or_else(|| Error::Channel("compiler shell has been terminated".to_string()))?;
        input
            .write_all(text.as_bytes())
            .and_then(|()| input.flush())
            .map_err(|e| Error::Channel(format!("failed to write to compiler shell: {}", e)))
    }

    /// Kill the shell and everything it started, then release the pipes.
    ///
    /// Destructive: a compile in flight is abandoned and may leave partial
    /// artifacts behind. Safe to call more than once.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        kill_and_reap(&mut self.child, self.reaped);
        self.input = None;

        let Some(pump) = self.pump.take() else {
            return;
        };

        // The pump exits once every writer of the output pipe is gone.
        let deadline = Instant::now() + self.teardown_grace;
        while !pump.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        if pump.is_finished() {
            if pump.join().is_err() {
                tracing::warn!("output pump panicked");
            }
        } else {
            // Something outside the process group still holds the pipe open.
            tracing::warn!(
                grace_ms = self.teardown_grace.as_millis() as u64,
                "output pump still running after teardown, detaching it"
            );
        }

        tracing::debug!("compiler shell terminated");
    }
}

impl Drop for ChildProcessChannel {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Kill the shell's process group and reap the shell.
///
/// Once the shell has been reaped its PID is free for reuse, so the group
/// is only signalled while the shell is known to be unreaped.
fn kill_and_reap(child: &mut Child, reaped: bool) {
    #[cfg(unix)]
    {
        if !reaped {
            // SIGKILL the whole group: the shell and any toolchain it is running.
            let pgid = child.id() as libc::pid_t;
            // SAFETY: kill(2) takes no pointers. The shell leads its own group
            // and is not yet reaped, so `pgid` still names that group.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
    #[cfg(not(unix))]
    let _ = reaped;

    if let Err(e) = child.kill() {
        // Already exited is fine
        if e.kind() != io::ErrorKind::InvalidInput {
            tracing::warn!("failed to kill compiler shell: {}", e);
        }
    }

    // Wait to reap zombie
    let _ = child.wait();
}
