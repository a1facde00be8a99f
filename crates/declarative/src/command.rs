//! Guarded command resource
//!
//! Wraps a [`CommandSpec`]: the probe decides whether the resource is
//! satisfied, and the apply command runs only when it is not.

use crate::context::{ApplyContext, Invocation};
use crate::resource::Resource;
use crate::types::{ApplyResult, CommandSpec, ResourceState};
use anyhow::Result;

/// A resource converged by shelling out
#[derive(Debug, Clone)]
pub struct GuardedCommand {
    id: String,
    resource_type: &'static str,
    description: String,
    spec: CommandSpec,
    parallel: bool,
}

impl GuardedCommand {
    pub fn new(
        id: impl Into<String>,
        resource_type: &'static str,
        description: impl Into<String>,
        spec: CommandSpec,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type,
            description: description.into(),
            spec,
            parallel: true,
        }
    }

    /// Force sequential execution (e.g. commands taking a global lock)
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    fn invocation<'a>(&'a self, script: &'a str) -> Invocation<'a> {
        Invocation::new(script, &self.spec.run_as_user, &self.spec.env)
    }

    /// Run a changing command; in verbose mode echo what it printed
    fn run_change(&self, ctx: &ApplyContext, script: &str) -> Result<()> {
        let output = ctx.runner.run_checked(&self.invocation(script))?;
        if ctx.verbose {
            for line in output.stdout_str().lines().chain(output.stderr_str().lines()) {
                log::info!("{}: {line}", self.id);
            }
        }
        Ok(())
    }
}

impl Resource for GuardedCommand {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn resource_type(&self) -> &'static str {
        self.resource_type
    }

    fn dependencies(&self) -> Vec<String> {
        self.spec.depends_on.iter().cloned().collect()
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState> {
        log::debug!("probe {}: {}", self.id, self.spec.probe);
        if ctx.runner.run_status(&self.invocation(&self.spec.probe))? {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        log::info!("apply {}: {}", self.id, self.spec.apply);
        self.run_change(ctx, &self.spec.apply)?;
        Ok(ApplyResult::Created)
    }

    fn refresh(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let Some(refresh) = &self.spec.refresh else {
            return Ok(ApplyResult::NoChange);
        };
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        log::info!("refresh {}: {}", self.id, refresh);
        self.run_change(ctx, refresh)?;
        Ok(ApplyResult::Refreshed)
    }

    fn can_parallelize(&self) -> bool {
        self.parallel
    }
}
