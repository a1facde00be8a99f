//! Execution engine - converges resources wave by wave
//!
//! For every resource: run its probe; apply only when the probe reports it
//! unsatisfied; when it is satisfied but an upstream resource changed during
//! this run, refresh it instead. A failed resource blocks its dependents
//! (transitively) and nothing else.

use crate::context::{ApplyContext, CommandRunner, ConfirmCallback, ProgressCallback};
use crate::planner::ExecutionPlan;
use crate::resource::Resource;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary, ResourceOutcome};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashSet;

/// Execute a plan with the given options and callbacks
///
/// # Arguments
/// * `plan` - The execution plan to run
/// * `opts` - Execution options (dry_run, jobs, verbose)
/// * `runner` - Executor for probe/apply/refresh scripts
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback, asked once before anything runs
///
/// # Errors
/// Fails before running anything if the dependency graph is invalid. Resource
/// failures do not fail the call; they are reported in the summary.
pub fn execute<P, C>(
    plan: ExecutionPlan,
    opts: ExecuteOptions,
    runner: &dyn CommandRunner,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let graph = plan.graph()?;
    let resources = plan.resources;
    let mut summary = ExecuteSummary::default();

    if resources.is_empty() {
        return Ok(summary);
    }

    if !opts.dry_run && !confirm.confirm("Apply changes?")? {
        for resource in &resources {
            summary.record(outcome(
                resource.as_ref(),
                ApplyResult::Skipped {
                    reason: "Declined".to_string(),
                },
            ));
        }
        return Ok(summary);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .context("Failed to create apply thread pool")?;

    let mut failed: HashSet<usize> = HashSet::new();
    let mut changed: HashSet<usize> = HashSet::new();

    for (index, wave) in graph.waves().into_iter().enumerate() {
        progress.on_wave_start(index, wave.len());
        for &position in &wave {
            let resource = &resources[position];
            progress.on_resource_start(&resource.id(), &resource.description());
        }

        let (parallel, sequential): (Vec<usize>, Vec<usize>) = wave
            .iter()
            .copied()
            .partition(|&p| resources[p].can_parallelize());

        let converge_one = |position: usize| {
            let deps = graph.dependencies_of(position);
            let result = converge(
                resources[position].as_ref(),
                &deps,
                &resources,
                &failed,
                &changed,
                &opts,
                runner,
            );
            (position, result)
        };

        let mut results: Vec<(usize, ApplyResult)> =
            pool.install(|| parallel.par_iter().map(|&p| converge_one(p)).collect());
        results.extend(sequential.iter().map(|&p| converge_one(p)));
        results.sort_by_key(|(position, _)| wave.iter().position(|p| p == position));

        for (position, result) in results {
            let resource = resources[position].as_ref();
            if result.is_change() {
                changed.insert(position);
            }
            // dependencies always sit in earlier waves
            let blocked = graph
                .dependencies_of(position)
                .iter()
                .any(|d| failed.contains(d));
            if blocked || matches!(result, ApplyResult::Failed { .. }) {
                failed.insert(position);
            }
            progress.on_resource_complete(&resource.id(), &result);
            log::info!("{} {} {:?}", result.symbol(), resource.id(), result);
            summary.record(outcome(resource, result));
        }

        progress.on_wave_complete();
    }

    Ok(summary)
}

/// Converge a single resource given what happened upstream
fn converge(
    resource: &dyn Resource,
    deps: &[usize],
    resources: &[Box<dyn Resource>],
    failed: &HashSet<usize>,
    changed: &HashSet<usize>,
    opts: &ExecuteOptions,
    runner: &dyn CommandRunner,
) -> ApplyResult {
    if let Some(&dep) = deps.iter().find(|d| failed.contains(d)) {
        return ApplyResult::Skipped {
            reason: format!("dependency {} failed", resources[dep].id()),
        };
    }

    let mut ctx = ApplyContext::new(opts.dry_run, opts.verbose, runner);
    let upstream_changed = deps.iter().any(|d| changed.contains(d));

    match probe_then_apply(resource, &mut ctx, upstream_changed) {
        Ok(result) => result,
        Err(e) => ApplyResult::Failed {
            error: format!("{e:#}"),
        },
    }
}

fn probe_then_apply(
    resource: &dyn Resource,
    ctx: &mut ApplyContext,
    upstream_changed: bool,
) -> Result<ApplyResult> {
    if resource.needs_apply(ctx)? {
        resource.apply(ctx)
    } else if upstream_changed {
        resource.refresh(ctx)
    } else {
        Ok(ApplyResult::NoChange)
    }
}

fn outcome(resource: &dyn Resource, result: ApplyResult) -> ResourceOutcome {
    ResourceOutcome {
        id: resource.id(),
        resource_type: resource.resource_type().to_string(),
        result,
    }
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple(
    plan: ExecutionPlan,
    opts: ExecuteOptions,
    runner: &dyn CommandRunner,
) -> Result<ExecuteSummary> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(plan, opts, runner, &mut NoProgress, &mut AutoConfirm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::GuardedCommand;
    use crate::context::{AutoDecline, Invocation, NoProgress};
    use crate::types::{CommandOutput, CommandSpec};
    use std::sync::Mutex;

    /// Simulated host: probes succeed for names in `present`, applies add to it
    struct FakeHost {
        present: Mutex<HashSet<String>>,
        broken: HashSet<String>,
        log: Mutex<Vec<String>>,
    }

    impl FakeHost {
        fn new(present: &[&str], broken: &[&str]) -> Self {
            Self {
                present: Mutex::new(present.iter().map(|s| s.to_string()).collect()),
                broken: broken.iter().map(|s| s.to_string()).collect(),
                log: Mutex::new(Vec::new()),
            }
        }

        fn ran(&self, script: &str) -> bool {
            self.log.lock().unwrap().iter().any(|s| s == script)
        }
    }

    impl CommandRunner for FakeHost {
        fn run(&self, invocation: &Invocation<'_>) -> Result<CommandOutput> {
            self.log.lock().unwrap().push(invocation.script.to_string());
            let (verb, name) = invocation.script.split_once(' ').unwrap();
            let success = match verb {
                "show" => self.present.lock().unwrap().contains(name),
                "create" if self.broken.contains(name) => false,
                "create" => {
                    self.present.lock().unwrap().insert(name.to_string());
                    true
                }
                _ => true,
            };
            Ok(CommandOutput {
                stdout: Vec::new(),
                stderr: if success { Vec::new() } else { b"boom".to_vec() },
                code: Some(i32::from(!success)),
                success,
            })
        }
    }

    fn node(name: &str, deps: &[&str]) -> Box<dyn Resource> {
        let mut spec = CommandSpec::new(format!("show {name}"), format!("create {name}"), "root")
            .with_refresh(format!("restart {name}"));
        for dep in deps {
            spec = spec.depends_on(*dep);
        }
        Box::new(GuardedCommand::new(name, "test", name, spec))
    }

    fn plan(nodes: Vec<Box<dyn Resource>>) -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();
        for node in nodes {
            plan.add_resource(node);
        }
        plan
    }

    fn chain() -> ExecutionPlan {
        plan(vec![
            node("package", &[]),
            node("mirror", &["package"]),
            node("snapshot", &["mirror"]),
            node("repo", &["package"]),
        ])
    }

    #[test]
    fn test_execute_empty_plan() {
        let host = FakeHost::new(&[], &[]);
        let result = execute_simple(ExecutionPlan::new(), ExecuteOptions::default(), &host).unwrap();
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn applies_unsatisfied_resources_in_dependency_order() {
        let host = FakeHost::new(&[], &[]);
        let summary = execute_simple(chain(), ExecuteOptions::default(), &host).unwrap();

        assert_eq!(summary.created, 4);
        let log = host.log.lock().unwrap();
        let pos = |s: &str| log.iter().position(|l| l == s).unwrap();
        assert!(pos("create package") < pos("show mirror"));
        assert!(pos("create mirror") < pos("show snapshot"));
    }

    #[test]
    fn second_run_changes_nothing() {
        let host = FakeHost::new(&[], &[]);
        execute_simple(chain(), ExecuteOptions::default(), &host).unwrap();
        let summary = execute_simple(chain(), ExecuteOptions::default(), &host).unwrap();

        assert_eq!(summary.no_change, 4);
        assert_eq!(summary.total_changes(), 0);
    }

    #[test]
    fn failure_skips_dependents_only() {
        let host = FakeHost::new(&[], &["mirror"]);
        let summary = execute_simple(chain(), ExecuteOptions::default(), &host).unwrap();

        assert!(matches!(summary.outcome("mirror"), Some(ApplyResult::Failed { .. })));
        assert_eq!(
            summary.outcome("snapshot"),
            Some(&ApplyResult::Skipped {
                reason: "dependency mirror failed".to_string()
            })
        );
        assert_eq!(summary.outcome("repo"), Some(&ApplyResult::Created));
        assert!(!host.ran("show snapshot"));
        assert!(!summary.is_success());
    }

    #[test]
    fn failure_message_carries_command_output() {
        let host = FakeHost::new(&[], &["package"]);
        let summary = execute_simple(chain(), ExecuteOptions::default(), &host).unwrap();

        let Some(ApplyResult::Failed { error }) = summary.outcome("package") else {
            panic!("package should fail");
        };
        assert!(error.contains("exit code 1"));
        assert!(error.contains("boom"));
    }

    #[test]
    fn failure_blocks_transitive_dependents() {
        let host = FakeHost::new(&[], &["package"]);
        let summary = execute_simple(chain(), ExecuteOptions::default(), &host).unwrap();

        assert_eq!(
            summary.outcome("snapshot"),
            Some(&ApplyResult::Skipped {
                reason: "dependency mirror failed".to_string()
            })
        );
        assert_eq!(summary.skipped, 3);
        assert!(!host.ran("show snapshot"));
    }

    #[test]
    fn skipped_by_dry_run_does_not_block_dependents() {
        let host = FakeHost::new(&[], &[]);
        let opts = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };
        let summary = execute_simple(chain(), opts, &host).unwrap();

        assert!(host.ran("show snapshot"));
        assert!(summary.outcomes.iter().all(|o| matches!(
            &o.result,
            ApplyResult::Skipped { reason } if reason == "Dry run"
        )));
    }

    #[test]
    fn satisfied_dependent_is_refreshed_when_upstream_changes() {
        let host = FakeHost::new(&["mirror", "snapshot", "repo"], &[]);
        let summary = execute_simple(chain(), ExecuteOptions::default(), &host).unwrap();

        assert_eq!(summary.outcome("package"), Some(&ApplyResult::Created));
        assert_eq!(summary.outcome("mirror"), Some(&ApplyResult::Refreshed));
        assert_eq!(summary.outcome("repo"), Some(&ApplyResult::Refreshed));
        assert!(host.ran("restart mirror"));
    }

    #[test]
    fn dry_run_probes_but_never_applies() {
        let host = FakeHost::new(&["package"], &[]);
        let opts = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };
        let summary = execute_simple(chain(), opts, &host).unwrap();

        assert_eq!(summary.no_change, 1);
        assert_eq!(summary.skipped, 3);
        assert!(!host.log.lock().unwrap().iter().any(|s| s.starts_with("create")));
    }

    #[test]
    fn declined_confirmation_runs_nothing() {
        let host = FakeHost::new(&[], &[]);
        let summary = execute(
            chain(),
            ExecuteOptions::default(),
            &host,
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();

        assert_eq!(summary.skipped, 4);
        assert!(host.log.lock().unwrap().is_empty());
    }

    #[test]
    fn cycle_fails_before_any_command() {
        let host = FakeHost::new(&[], &[]);
        let cyclic = plan(vec![node("a", &["b"]), node("b", &["a"])]);
        let err = execute_simple(cyclic, ExecuteOptions::default(), &host).unwrap_err();

        assert!(err.to_string().contains("cycle"));
        assert!(host.log.lock().unwrap().is_empty());
    }
}
