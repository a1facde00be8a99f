use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::config::DEFAULT_SITE;

#[derive(Parser)]
#[command(name = "aptkeeper")]
#[command(version)]
#[command(about = "Converge aptly repositories, mirrors, snapshots and the aptly API", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Site file describing the desired aptly state
    #[arg(long, env = "APTKEEPER_SITE", default_value = DEFAULT_SITE, global = true)]
    pub site: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the guarded command planned for every resource
    Plan(PlanArgs),

    /// Run probes and show what apply would change
    Diff(TargetArgs),

    /// Converge the host to the site description
    Apply(ApplyArgs),

    /// Print the rendered aptly config file
    Config,

    /// Validate the site file and look for required tools
    Check,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct TargetArgs {
    /// Only this resource type or resource (e.g. "mirrors", "mirror.debian")
    pub target: Option<String>,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Only this resource type or resource (e.g. "mirrors", "mirror.debian")
    pub target: Option<String>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Only this resource type or resource (e.g. "mirrors", "mirror.debian")
    pub target: Option<String>,

    /// Probe only; never run apply commands or write files
    #[arg(long)]
    pub dry_run: bool,

    /// Parallel jobs within a dependency wave
    #[arg(short, long, default_value = "4")]
    pub jobs: u8,

    /// Don't ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn apply_flags() {
        let cli = Cli::parse_from(["aptkeeper", "apply", "mirror.debian", "--dry-run", "-j", "2", "-y"]);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.target.as_deref(), Some("mirror.debian"));
        assert!(args.dry_run);
        assert_eq!(args.jobs, 2);
        assert!(args.yes);
    }

    #[test]
    fn site_flag_is_global() {
        let cli = Cli::parse_from(["aptkeeper", "plan", "--site", "/tmp/site.toml", "--json"]);
        assert_eq!(cli.site, "/tmp/site.toml");
        assert!(matches!(cli.command, Command::Plan(PlanArgs { json: true, .. })));
    }
}
