//! # Declarative
//!
//! A framework for idempotent, declarative resource convergence.
//!
//! This crate provides the core abstractions for declaring desired state,
//! probing current state, and converging a host to match: a resource is
//! applied only when its probe reports it unsatisfied, and dependents are
//! notified only when something upstream actually changed.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed
//! - **CommandSpec**: A guarded `probe`/`apply` shell command pair
//! - **GuardedCommand**: A resource backed by a `CommandSpec`
//! - **DependencyGraph**: Explicit ordering between resources, cycle-checked
//! - **Executor**: Converges resources wave by wave with parallelism
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{CommandSpec, ExecuteOptions, ExecutionPlan, GuardedCommand, execute_simple};
//!
//! let spec = CommandSpec::new(
//!     "aptly repo show main >/dev/null",
//!     "aptly repo create main",
//!     "root",
//! );
//!
//! let mut plan = ExecutionPlan::new();
//! plan.add_resource(Box::new(GuardedCommand::new("repo.main", "repo", "Create repo main", spec)));
//!
//! let summary = execute_simple(plan, ExecuteOptions::default(), &my_runner)?;
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`CommandRunner`]: Runs shell scripts under a given identity
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks or process executors.

pub mod command;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod graph;
pub mod planner;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use command::GuardedCommand;
pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, CommandRunner, ConfirmCallback, Invocation,
    NoProgress, ProgressCallback,
};
pub use diff::{DiffSummary, ResourceDiff, compute_diffs, group_by_type};
pub use error::{CommandError, GraphError};
pub use executor::{execute, execute_simple};
pub use graph::DependencyGraph;
pub use planner::ExecutionPlan;
pub use resource::{BoxedResource, Resource};
pub use types::{
    ApplyResult, CommandOutput, CommandSpec, ExecuteOptions, ExecuteSummary, ResourceOutcome,
    ResourceState,
};
