//! Core types for declarative resource management

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::process::Output;

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    /// Resource exists/is configured
    Present { details: Option<String> },
    /// Resource does not exist/is not configured
    Absent,
    /// Resource exists but differs from desired
    Modified { from: String, to: String },
    /// State cannot be determined
    Unknown,
}

impl ResourceState {
    /// Check if state represents presence
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    /// Check if state represents absence
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Result of converging a single resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// Probe reported the resource already satisfied
    NoChange,
    /// Resource was created
    Created,
    /// Resource existed but was rewritten
    Modified,
    /// Resource was satisfied but re-triggered because a dependency changed
    Refreshed,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change dependents must hear about
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Refreshed)
    }

    /// Short symbol used in progress output
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::NoChange => "○",
            Self::Created | Self::Modified | Self::Refreshed => "✓",
            Self::Failed { .. } => "✗",
            Self::Skipped { .. } => "⊘",
        }
    }
}

/// Outcome of one resource in an execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOutcome {
    pub id: String,
    pub resource_type: String,
    pub result: ApplyResult,
}

/// Summary of execution results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub refreshed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
    /// Per-resource outcomes in execution order
    #[serde(default)]
    pub outcomes: Vec<ResourceOutcome>,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.refreshed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.created + self.modified + self.refreshed + self.skipped + self.failed + self.no_change
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Refreshed => self.refreshed += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }

    /// Record a resource outcome and count it
    pub fn record(&mut self, outcome: ResourceOutcome) {
        self.add_result(&outcome.result);
        self.outcomes.push(outcome);
    }

    /// Look up the outcome for a resource id
    pub fn outcome(&self, id: &str) -> Option<&ApplyResult> {
        self.outcomes.iter().find(|o| o.id == id).map(|o| &o.result)
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of parallel jobs within a dependency wave
    pub jobs: usize,
    /// Verbose output
    pub verbose: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            verbose: false,
        }
    }
}

/// A guarded shell command pair.
///
/// `probe` must be read-only and exit 0 iff the resource is already in its
/// desired form. `apply` runs only when `probe` fails. `refresh`, when set,
/// runs instead of nothing when the resource is satisfied but one of its
/// dependencies changed during the same run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub probe: String,
    pub apply: String,
    pub run_as_user: String,
    /// Ordered `KEY=VALUE` entries merged into the command environment
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl CommandSpec {
    pub fn new(probe: impl Into<String>, apply: impl Into<String>, run_as_user: &str) -> Self {
        Self {
            probe: probe.into(),
            apply: apply.into(),
            run_as_user: run_as_user.to_string(),
            env: Vec::new(),
            depends_on: BTreeSet::new(),
            refresh: None,
        }
    }

    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.insert(id.into());
        self
    }

    pub fn with_refresh(mut self, refresh: impl Into<String>) -> Self {
        self.refresh = Some(refresh.into());
        self
    }
}

/// Output from an executed command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            code: output.status.code(),
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}
