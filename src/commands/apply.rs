//! `apply` - converge the host

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use declarative::{
    ApplyContext, ApplyResult, AutoConfirm, ConfirmCallback, ExecuteOptions, ExecuteSummary,
    ProgressCallback, ResourceDiff, compute_diffs, execute,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use super::diff::display_diff;
use crate::Context;
use crate::catalog::Catalog;
use crate::cli::ApplyArgs;
use crate::runner::{self, ShellRunner};
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let catalog = super::load_catalog(ctx, args.target.as_deref())?;
    let runner = ShellRunner::new();
    let plan = catalog.plan();

    let probe_ctx = ApplyContext::new(true, ctx.verbose > 0, &runner);
    let diffs = compute_diffs(&plan.resources, &probe_ctx);
    display_diff(&diffs);

    if diffs.is_empty() {
        return Ok(());
    }

    if args.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(());
    }

    let writes = pending_writes(&catalog, &diffs);
    if !writes.is_empty() && !runner::is_root() {
        let paths: Vec<String> = writes.iter().map(|p| p.display().to_string()).collect();
        anyhow::bail!(
            "Writing {} requires root; re-run apply as root",
            paths.join(", ")
        );
    }

    let opts = ExecuteOptions {
        dry_run: false,
        jobs: usize::from(args.jobs),
        verbose: ctx.verbose > 0,
    };

    let mut progress = BarProgress::new(plan.total_resources(), ctx.quiet)?;
    let summary = if args.yes {
        execute(plan, opts, &runner, &mut progress, &mut AutoConfirm)?
    } else {
        execute(plan, opts, &runner, &mut progress, &mut DialoguerConfirm)?
    };
    progress.finish();

    print_summary(&summary);

    if !summary.is_success() {
        anyhow::bail!("{} resource(s) failed", summary.failed);
    }
    Ok(())
}

/// Managed files the diff says apply would write
///
/// Files are written in-process, so unlike guarded commands they cannot
/// escalate through `runuser` or `sudo`.
pub(crate) fn pending_writes<'a>(catalog: &'a Catalog, diffs: &[ResourceDiff]) -> Vec<&'a Path> {
    catalog
        .files()
        .filter(|f| diffs.iter().any(|d| d.resource_id == f.id))
        .map(|f| f.path.as_path())
        .collect()
}

fn print_summary(summary: &ExecuteSummary) {
    let failures: Vec<_> = summary
        .outcomes
        .iter()
        .filter_map(|o| match &o.result {
            ApplyResult::Failed { error } => Some((o.id.as_str(), error.as_str())),
            _ => None,
        })
        .collect();

    if !failures.is_empty() {
        ui::header("Failures");
        for (id, error) in failures {
            println!("  {} {}", "✗".red(), id.bold());
            for line in error.lines() {
                ui::dim(line);
            }
        }
    }

    println!();
    println!(
        "  {} created, {} modified, {} refreshed, {} unchanged, {} skipped, {} failed",
        summary.created.to_string().green(),
        summary.modified.to_string().yellow(),
        summary.refreshed.to_string().cyan(),
        summary.no_change,
        summary.skipped.to_string().dimmed(),
        summary.failed.to_string().red()
    );

    if summary.is_success() {
        ui::success(&format!("Applied {} changes", summary.total_changes()));
    }
}

/// Progress bar over every resource in the plan
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(total: usize, quiet: bool) -> Result<Self> {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .context("Invalid progress template")?
                .progress_chars("=>-"),
        );
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for BarProgress {
    fn on_wave_start(&mut self, index: usize, count: usize) {
        self.bar
            .set_message(format!("wave {} ({count} resources)", index + 1));
    }

    fn on_resource_start(&mut self, id: &str, description: &str) {
        log::debug!("start {id}: {description}");
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        let symbol = match result {
            ApplyResult::NoChange => result.symbol().dimmed(),
            ApplyResult::Created | ApplyResult::Modified | ApplyResult::Refreshed => {
                result.symbol().green()
            }
            ApplyResult::Failed { .. } => result.symbol().red(),
            ApplyResult::Skipped { .. } => result.symbol().yellow(),
        };
        let detail = match result {
            ApplyResult::NoChange => "unchanged".to_string(),
            ApplyResult::Created => "applied".to_string(),
            ApplyResult::Modified => "updated".to_string(),
            ApplyResult::Refreshed => "refreshed".to_string(),
            ApplyResult::Failed { .. } => "failed".to_string(),
            ApplyResult::Skipped { reason } => format!("skipped: {reason}"),
        };
        self.bar
            .println(format!("  {symbol} {id} {}", detail.dimmed()));
        self.bar.inc(1);
    }

    fn on_wave_complete(&mut self) {}
}

struct DialoguerConfirm;

impl ConfirmCallback for DialoguerConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;
        Ok(confirmed)
    }
}
