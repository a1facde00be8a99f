//! Resource trait for declarative state management
//!
//! A Resource represents something that can be in a certain state,
//! and can be changed to reach a desired state.

use crate::context::ApplyContext;
use crate::types::{ApplyResult, ResourceState};
use anyhow::Result;
use std::fmt;

/// Core trait for declarative resources
///
/// Every resource in the system implements this trait, which provides:
/// - Identity (id, description, type)
/// - Ordering (ids of the resources it depends on)
/// - State detection (current vs desired)
/// - State convergence (apply, refresh)
///
/// # Example
///
/// ```ignore
/// use declarative::{Resource, ResourceState, ApplyResult, ApplyContext};
///
/// #[derive(Debug)]
/// struct Marker {
///     path: String,
/// }
///
/// impl Resource for Marker {
///     fn id(&self) -> String {
///         format!("marker.{}", self.path)
///     }
///
///     fn description(&self) -> String {
///         format!("Ensure marker exists at {}", self.path)
///     }
///
///     fn resource_type(&self) -> &'static str {
///         "marker"
///     }
///
///     fn current_state(&self, _ctx: &ApplyContext) -> anyhow::Result<ResourceState> {
///         if std::path::Path::new(&self.path).exists() {
///             Ok(ResourceState::Present { details: None })
///         } else {
///             Ok(ResourceState::Absent)
///         }
///     }
///
///     fn desired_state(&self) -> ResourceState {
///         ResourceState::Present { details: None }
///     }
///
///     fn apply(&self, ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
///         if ctx.dry_run {
///             return Ok(ApplyResult::Skipped { reason: "Dry run".into() });
///         }
///         std::fs::write(&self.path, "")?;
///         Ok(ApplyResult::Created)
///     }
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// Unique identifier for this resource
    ///
    /// Conventionally `type.name`, e.g. "mirror.debian-main" or
    /// "package.aptly". Other resources refer to this id in
    /// [`Resource::dependencies`].
    fn id(&self) -> String;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Resource type category, used for grouping and target filters
    fn resource_type(&self) -> &'static str;

    /// Ids of resources that must converge before this one
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Detect the current state of this resource
    ///
    /// Must not mutate the system.
    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState>;

    /// Get the desired state for this resource
    fn desired_state(&self) -> ResourceState;

    /// Check if the resource needs changes to reach desired state
    ///
    /// Default implementation compares current and desired states.
    fn needs_apply(&self, ctx: &ApplyContext) -> Result<bool> {
        let current = self.current_state(ctx)?;
        let desired = self.desired_state();
        Ok(current != desired)
    }

    /// Apply changes to reach the desired state
    ///
    /// Called only when [`Resource::needs_apply`] returned true. Should
    /// respect `ctx.dry_run` by returning `Skipped`.
    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult>;

    /// React to a change in one of this resource's dependencies
    ///
    /// Called instead of `apply` when the resource is already satisfied but
    /// an upstream resource changed during this run. The default does nothing.
    fn refresh(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        Ok(ApplyResult::NoChange)
    }

    /// Whether this resource can be applied in parallel with others
    fn can_parallelize(&self) -> bool {
        true
    }

    /// Text diff between current and desired content, when meaningful
    fn content_diff(&self) -> Option<(String, String)> {
        None
    }
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;
