//! `plan` - print the guarded commands without running anything

use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::catalog::{Catalog, Entry};
use crate::ui;

pub fn run(ctx: &Context, target: Option<&str>, json: bool) -> Result<()> {
    let catalog = super::load_catalog(ctx, target)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog.entries)?);
        return Ok(());
    }

    print_plan(&catalog)
}

fn print_plan(catalog: &Catalog) -> Result<()> {
    let graph = catalog.graph()?;
    let waves = graph.waves();

    ui::header(&format!(
        "Plan: {} resources in {} waves",
        catalog.len(),
        waves.len()
    ));

    for (index, wave) in waves.iter().enumerate() {
        ui::section(&format!("Wave {}", index + 1));
        for &position in wave {
            print_entry(&catalog.entries[position]);
        }
    }

    Ok(())
}

fn print_entry(entry: &Entry) {
    println!();
    match entry {
        Entry::Command(command) => {
            println!("  {} {}", command.id.bold(), command.description.dimmed());
            let spec = &command.spec;
            ui::kv("probe", &spec.probe);
            ui::kv("apply", &spec.apply);
            if let Some(refresh) = &spec.refresh {
                ui::kv("refresh", refresh);
            }
            ui::kv("user", &spec.run_as_user);
            if !spec.env.is_empty() {
                ui::kv("env", &spec.env.join(" "));
            }
            if !spec.depends_on.is_empty() {
                let deps: Vec<&str> = spec.depends_on.iter().map(String::as_str).collect();
                ui::kv("after", &deps.join(", "));
            }
        }
        Entry::File(file) => {
            println!("  {} {}", file.id.bold(), "(managed file)".dimmed());
            ui::kv("path", &file.path.display().to_string());
            ui::kv("mode", &format!("{:o}", file.mode));
            if !file.dependencies.is_empty() {
                ui::kv("after", &file.dependencies.join(", "));
            }
            for line in file.content.lines() {
                ui::dim(&format!("│ {line}"));
            }
        }
    }
}
