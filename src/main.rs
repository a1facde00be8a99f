mod catalog;
mod cli;
mod commands;
mod config;
mod descriptor;
mod error;
mod planner;
mod render;
mod resource;
mod runner;
mod serializer;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Expanded path of the site file
    pub site: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        site: config::expand(&cli.site),
    };

    match cli.command {
        Command::Plan(args) => commands::plan::run(&ctx, args.target.as_deref(), args.json),
        Command::Diff(args) => commands::diff::run(&ctx, args.target.as_deref()),
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Config => commands::config::run(&ctx),
        Command::Check => commands::check::run(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "aptkeeper", &mut io::stdout());
            Ok(())
        }
    }
}
