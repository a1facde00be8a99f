//! `diff` - run every probe and show what apply would change

use anyhow::Result;
use colored::Colorize;
use declarative::{ApplyContext, DiffSummary, ResourceDiff, ResourceState, compute_diffs, group_by_type};

use crate::Context;
use crate::runner::ShellRunner;
use crate::ui;

pub fn run(ctx: &Context, target: Option<&str>) -> Result<()> {
    let catalog = super::load_catalog(ctx, target)?;
    let runner = ShellRunner::new();
    let plan = catalog.plan();

    let probe_ctx = ApplyContext::new(true, ctx.verbose > 0, &runner);
    let diffs = compute_diffs(&plan.resources, &probe_ctx);
    display_diff(&diffs);
    Ok(())
}

/// Display a list of diffs grouped by resource type
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Convergence Diff".bold()
    );
    println!("│");

    for (resource_type, type_diffs) in &group_by_type(diffs) {
        println!("│ {}", ui::type_label(resource_type).bold());

        for diff in type_diffs {
            let symbol = match (&diff.current, &diff.desired) {
                (ResourceState::Absent, ResourceState::Present { .. }) => "+".green(),
                (ResourceState::Modified { .. }, _) => "~".yellow(),
                _ => "?".dimmed(),
            };

            let state_desc = match &diff.current {
                ResourceState::Absent => "(not present)",
                ResourceState::Modified { .. } => "(content differs)",
                ResourceState::Unknown => "(probe could not run)",
                ResourceState::Present { .. } => "",
            };

            println!(
                "│   {} {:<30} {}",
                symbol,
                diff.resource_id,
                state_desc.dimmed()
            );
            println!("│       {}", diff.description.dimmed());

            if let Some((current, desired)) = &diff.content {
                ui::text_diff(current, desired);
            }
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} to create, {} to modify, {} unknown)",
        summary.total().to_string().bold(),
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.unknown.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}
