//! Apply context and provider traits
//!
//! These traits allow the declarative crate to be used without
//! depending on a specific process executor, UI, or prompt library.

use crate::error::CommandError;
use crate::types::{ApplyResult, CommandOutput};
use anyhow::Result;

/// A shell script to run under a given identity
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Script passed to `sh -c`
    pub script: &'a str,
    /// User the script runs as
    pub user: &'a str,
    /// `KEY=VALUE` entries merged into the environment
    pub env: &'a [String],
}

impl<'a> Invocation<'a> {
    pub fn new(script: &'a str, user: &'a str, env: &'a [String]) -> Self {
        Self { script, user, env }
    }
}

/// Executor for shell commands
///
/// Implement this trait to run probe/apply scripts. The implementation owns
/// identity switching and environment handling.
pub trait CommandRunner: Send + Sync {
    /// Run a script and capture its output
    ///
    /// Returns `Err` only when the process could not be started; a non-zero
    /// exit is reported through [`CommandOutput::success`].
    fn run(&self, invocation: &Invocation<'_>) -> Result<CommandOutput>;

    /// Run a script and return just success/failure
    fn run_status(&self, invocation: &Invocation<'_>) -> Result<bool> {
        Ok(self.run(invocation)?.success)
    }

    /// Run a script, failing with [`CommandError::Failed`] on non-zero exit
    fn run_checked(&self, invocation: &Invocation<'_>) -> Result<CommandOutput> {
        let output = self.run(invocation)?;
        if !output.success {
            return Err(CommandError::Failed {
                command: invocation.script.to_string(),
                code: output.code,
                stdout: output.stdout_str(),
                stderr: output.stderr_str(),
            }
            .into());
        }
        Ok(output)
    }
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when starting a dependency wave
    fn on_wave_start(&mut self, index: usize, count: usize);

    /// Called when starting to converge a single resource
    fn on_resource_start(&mut self, id: &str, description: &str);

    /// Called when a resource completes
    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult);

    /// Called when a wave completes
    fn on_wave_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// Returns `true` if the user confirmed.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_wave_start(&mut self, _index: usize, _count: usize) {}
    fn on_resource_start(&mut self, _id: &str, _description: &str) {}
    fn on_resource_complete(&mut self, _id: &str, _result: &ApplyResult) {}
    fn on_wave_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Context passed to resource probe and apply operations
pub struct ApplyContext<'a> {
    /// Whether this is a dry run (no actual changes)
    pub dry_run: bool,
    /// Whether to output verbose information
    pub verbose: bool,
    /// Executor for shell commands
    pub runner: &'a dyn CommandRunner,
}

impl<'a> ApplyContext<'a> {
    /// Create a new apply context
    pub fn new(dry_run: bool, verbose: bool, runner: &'a dyn CommandRunner) -> Self {
        Self {
            dry_run,
            verbose,
            runner,
        }
    }
}
