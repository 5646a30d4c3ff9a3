//! Compiler driver: the façade hosts use to recompile modules at runtime.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

use super::channel::{ChannelSettings, ChildProcessChannel};
use super::invocation::{Invocation, ensure_intermediate_dir};
use super::options::{CompileOptions, CompileRequest};
use super::pump::{DEFAULT_COMPLETION_TOKEN, default_error_markers};
use super::sink::DiagnosticSink;
use super::toolchain::{ShellCommand, find_toolchain};

/// Lifecycle of the current compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileSessionState {
    /// No compile has been issued since the last teardown.
    NotStarted,
    /// A compile was issued and its completion token has not been seen.
    Running,
    /// The completion token was seen.
    Complete,
}

/// Configuration for the compiler driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Keep the shell alive across compiles instead of tearing it down after
    /// each one. Saves process startup per compile.
    pub fast_mode: bool,

    /// Shell hosting the toolchain
    pub shell: ShellCommand,

    /// Token echoed after each command to mark completion.
    pub completion_token: String,

    /// Output containing any of these is reported as an error.
    pub error_markers: Vec<String>,

    /// How long teardown waits for the output pump to drain.
    pub teardown_grace: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            fast_mode: false,
            shell: ShellCommand::platform_default(),
            completion_token: DEFAULT_COMPLETION_TOKEN.to_string(),
            error_markers: default_error_markers(),
            teardown_grace: Duration::from_secs(2),
        }
    }
}

impl DriverConfig {
    /// Config that keeps one shell alive for every compile.
    pub fn fast() -> Self {
        Self {
            fast_mode: true,
            ..Default::default()
        }
    }

    fn channel_settings(&self) -> ChannelSettings {
        ChannelSettings {
            shell: self.shell.clone(),
            completion_token: self.completion_token.clone(),
            error_markers: self.error_markers.clone(),
            teardown_grace: self.teardown_grace,
        }
    }
}

/// Drives out-of-process compiles of hot-reloadable modules.
///
/// `run_compile` hands a command line to a long-lived shell and returns
/// immediately; `is_complete` is polled until the shell has finished it.
/// Toolchain output goes to the diagnostic sink bound at construction.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use kiln_core::{CompileOptions, CompileRequest, CompilerDriver, DriverConfig, TracingSink};
///
/// let mut driver = CompilerDriver::new(Arc::new(TracingSink), DriverConfig::default());
/// let options = CompileOptions::development();
/// let request = CompileRequest::new(["physics.cpp"], "libphysics.so");
///
/// driver.run_compile(&options, &request)?;
/// while !driver.is_complete() {
///     std::thread::sleep(std::time::Duration::from_millis(50));
/// }
/// # Ok::<(), kiln_core::Error>(())
/// ```
pub struct CompilerDriver {
    sink: Arc<dyn DiagnosticSink>,
    config: DriverConfig,
    channel: Option<ChildProcessChannel>,
    state: CompileSessionState,
    /// Completion of the last compile has been observed by `is_complete`.
    observed: bool,
}

impl CompilerDriver {
    /// Create a driver reporting to `sink`.
    ///
    /// No process is started until the first compile.
    pub fn new(sink: Arc<dyn DiagnosticSink>, config: DriverConfig) -> Self {
        Self {
            sink,
            config,
            channel: None,
            state: CompileSessionState::NotStarted,
            observed: false,
        }
    }

    /// The driver configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Whether a shell process is currently held.
    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Process ID of the current shell, if any.
    pub fn shell_pid(&self) -> Option<u32> {
        self.channel.as_ref().map(ChildProcessChannel::pid)
    }

    /// Current compile state, without side effects.
    pub fn state(&self) -> CompileSessionState {
        match (self.state, &self.channel) {
            (CompileSessionState::Running, Some(channel)) if channel.signal().is_set() => {
                CompileSessionState::Complete
            }
            (state, _) => state,
        }
    }

    /// Start compiling `request` and return without waiting.
    ///
    /// Fails with [`Error::CompileInProgress`] if the previous compile has
    /// not finished, and with [`Error::UnresolvedOptimization`] if the
    /// options still carry `OptimizationLevel::Default`. Channel setup
    /// failures are reported to the sink and returned; the next call retries
    /// from scratch.
    pub fn run_compile(&mut self, options: &CompileOptions, request: &CompileRequest) -> Result<()> {
        self.settle();
        if self.state == CompileSessionState::Running {
            return Err(Error::CompileInProgress);
        }

        let invocation = Invocation::new(options, request)?;

        let toolchain = invocation.toolchain();
        if find_toolchain(Path::new(toolchain.as_ref())).is_none() {
            tracing::warn!(toolchain = %toolchain, "toolchain not found on PATH");
        }

        let intermediate_ready = invocation
            .intermediate_dir()
            .is_some_and(|dir| ensure_intermediate_dir(dir, self.sink.as_ref()));

        let command_line = invocation.command_line(intermediate_ready);
        self.sink.info(&command_line);

        if self.channel.as_mut().is_some_and(|c| !c.is_alive()) {
            tracing::warn!("compiler shell exited unexpectedly, restarting it");
            self.teardown();
        }

        let channel = match self.channel.take() {
            Some(channel) => channel,
            None => match ChildProcessChannel::spawn(&self.config.channel_settings(), self.sink.clone()) {
                Ok(channel) => channel,
                Err(e) => {
                    self.sink.error(&format!("[kiln] {}\n", e));
                    return Err(e);
                }
            },
        };
        let channel = self.channel.insert(channel);

        channel.signal().reset();
        self.state = CompileSessionState::Running;
        self.observed = false;

        let input = format!("{}\necho {}\n", command_line, self.config.completion_token);
        if let Err(e) = channel.write_input(&input) {
            self.sink.error(&format!("[kiln] {}\n", e));
            self.teardown();
            return Err(e);
        }

        tracing::debug!(
            module = %request.module.display(),
            sources = request.sources.len(),
            "compile started"
        );
        Ok(())
    }

    /// Check whether the last compile has finished.
    ///
    /// Outside fast mode, the first call that observes completion tears the
    /// shell down so the next compile starts fresh. Further calls keep
    /// returning `true` until the next compile is started.
    pub fn is_complete(&mut self) -> bool {
        self.settle();
        if self.state == CompileSessionState::Complete {
            self.observed = true;
            if !self.config.fast_mode {
                self.teardown();
            }
        }
        self.observed
    }

    /// Abandon any compile in flight and kill the shell.
    ///
    /// This is how a caller gives up on a hung toolchain.
    pub fn abort(&mut self) {
        if self.state == CompileSessionState::Running {
            tracing::info!("aborting compile in progress");
        }
        self.teardown();
    }

    /// Move Running to Complete if the pump has signalled.
    ///
    /// A shell that died mid-compile never signals. It is torn down, which
    /// drains whatever it wrote, and the compile fails back to NotStarted
    /// unless the drained output carried the completion token.
    fn settle(&mut self) {
        if self.state != CompileSessionState::Running {
            return;
        }
        let Some(channel) = self.channel.as_mut() else {
            self.state = CompileSessionState::NotStarted;
            return;
        };
        if channel.signal().is_set() {
            self.state = CompileSessionState::Complete;
            return;
        }
        if channel.is_alive() {
            return;
        }

        let signal = channel.signal().clone();
        self.teardown();
        if signal.is_set() {
            self.state = CompileSessionState::Complete;
        } else {
            tracing::warn!("compiler shell exited during a compile");
            self.sink
                .error("[kiln] Compiler shell exited before the compile completed\n");
        }
    }

    fn teardown(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.terminate();
        }
        self.state = CompileSessionState::NotStarted;
    }
}

impl Drop for CompilerDriver {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::options::OptimizationLevel;
    use crate::compile::sink::RecordingSink;

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default();
        assert!(!config.fast_mode);
        assert_eq!(config.completion_token, DEFAULT_COMPLETION_TOKEN);
        assert_eq!(config.error_markers.len(), 4);
        assert!(DriverConfig::fast().fast_mode);
    }

    #[test]
    fn test_new_driver_is_idle() {
        let mut driver = CompilerDriver::new(Arc::new(RecordingSink::new()), DriverConfig::default());
        assert_eq!(driver.state(), CompileSessionState::NotStarted);
        assert!(!driver.has_channel());
        assert!(!driver.is_complete());
    }

    #[test]
    fn test_unresolved_optimization_starts_nothing() {
        let sink = RecordingSink::new();
        let mut driver = CompilerDriver::new(Arc::new(sink.clone()), DriverConfig::default());
        let options = CompileOptions {
            optimization: OptimizationLevel::Default,
            ..Default::default()
        };
        let request = CompileRequest::new(["src.cpp"], "out.so");

        assert!(matches!(
            driver.run_compile(&options, &request),
            Err(Error::UnresolvedOptimization)
        ));
        assert!(!driver.has_channel());
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn test_spawn_failure_is_logged_and_retryable() {
        let sink = RecordingSink::new();
        let config = DriverConfig {
            shell: ShellCommand::new("/nonexistent/kiln-shell", Vec::<String>::new()),
            ..Default::default()
        };
        let mut driver = CompilerDriver::new(Arc::new(sink.clone()), config);
        let options = CompileOptions::development();
        let request = CompileRequest::new(["src.cpp"], "out.so");

        assert!(matches!(
            driver.run_compile(&options, &request),
            Err(Error::Channel(_))
        ));
        assert_eq!(sink.error_count(), 1);
        assert_eq!(driver.state(), CompileSessionState::NotStarted);

        // Not stuck in Running: a retry fails the same way instead of
        // being rejected as overlapping.
        assert!(matches!(
            driver.run_compile(&options, &request),
            Err(Error::Channel(_))
        ));
    }
}
