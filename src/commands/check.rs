//! `check` - validate the site and look for the tools its plan calls

use anyhow::Result;
use colored::Colorize;
use std::collections::BTreeSet;

use crate::Context;
use crate::catalog::Catalog;
use crate::config::Site;
use crate::descriptor::ResourceKind;
use crate::planner::SERVICE_NAME;
use crate::runner;
use crate::ui;

struct Issue {
    category: &'static str,
    summary: String,
    fix: Option<String>,
}

pub fn run(ctx: &Context) -> Result<()> {
    ui::header("Site Check");
    ui::kv("site", &ctx.site.display().to_string());

    let mut issues: Vec<Issue> = Vec::new();

    let site = match super::load_site(ctx) {
        Ok(site) => site,
        Err(e) => {
            issues.push(Issue {
                category: "site",
                summary: format!("{e:#}"),
                fix: None,
            });
            print_issue_summary(&issues);
            anyhow::bail!("site check failed");
        }
    };

    match Catalog::build(&site) {
        Ok(catalog) => {
            let waves = catalog.graph()?.waves().len();
            ui::success(&format!(
                "{} resources planned in {} waves",
                catalog.len(),
                waves
            ));
            print_declared(&site);
            check_tools(&site, &catalog, &mut issues);
            print_privileges(&catalog);
        }
        Err(e) => issues.push(Issue {
            category: "plan",
            summary: e.to_string(),
            fix: None,
        }),
    }

    println!();
    if issues.is_empty() {
        ui::success("Site is ready to apply");
        Ok(())
    } else {
        print_issue_summary(&issues);
        anyhow::bail!("site check found {} issue(s)", issues.len())
    }
}

fn print_declared(site: &Site) {
    let descriptors = site.descriptors();
    if descriptors.is_empty() {
        ui::warn("Site declares no repos, mirrors, snapshots or API service");
        return;
    }

    ui::section("Declared");
    for kind in ResourceKind::ALL {
        let count = descriptors.iter().filter(|d| d.kind == kind).count();
        if count > 0 {
            ui::kv(ui::type_label(kind.as_str()), &count.to_string());
        }
    }
}

/// Managed files are written by aptkeeper itself, not through sudo
fn print_privileges(catalog: &Catalog) {
    if runner::is_root() {
        return;
    }
    let files = catalog.files().count();
    if files > 0 {
        println!();
        ui::info(&format!(
            "apply writes {files} managed file(s) directly and must run as root"
        ));
    }
}

/// Tools the planned commands shell out to
fn required_tools(catalog: &Catalog) -> BTreeSet<&'static str> {
    let mut tools = BTreeSet::from(["sh", "dpkg-query", "apt-get"]);

    for command in catalog.commands() {
        let script = format!("{} {}", command.spec.probe, command.spec.apply);
        if script.contains("gpg ") {
            tools.insert("gpg");
        }
        if script.contains("systemctl ") {
            tools.insert("systemctl");
        }
        if script.contains(&format!("status {SERVICE_NAME}")) {
            tools.insert("initctl");
        }
        if command.spec.run_as_user != "root" {
            tools.insert("runuser");
        }
    }
    tools
}

fn check_tools(site: &Site, catalog: &Catalog, issues: &mut Vec<Issue>) {
    ui::section("Tools");
    for tool in required_tools(catalog) {
        if runner::command_exists(tool) {
            println!("  {} {}", "✓".green(), tool);
        } else {
            println!("  {} {}", "✗".red(), tool);
            issues.push(Issue {
                category: "tools",
                summary: format!("{tool} not found in PATH"),
                fix: Some(format!("Install the package providing {tool}")),
            });
        }
    }

    if runner::command_exists(&site.aptly.aptly_bin) {
        println!("  {} {}", "✓".green(), site.aptly.aptly_bin);
    } else {
        println!(
            "  {} {} {}",
            "○".dimmed(),
            site.aptly.aptly_bin,
            "(installed by package.aptly)".dimmed()
        );
    }
}

fn print_issue_summary(issues: &[Issue]) {
    let count = issues.len();
    let label = if count == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{count} {label} Found"));

    for (i, issue) in issues.iter().enumerate() {
        let num = i + 1;
        println!(
            "  {}  {} {}",
            format!("{num}.").bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(fix) = &issue.fix {
            println!("      {} {}", "Fix:".cyan(), fix);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools(src: &str) -> Vec<&'static str> {
        let site: Site = toml::from_str(src).unwrap();
        let catalog = Catalog::build(&site).unwrap();
        required_tools(&catalog).into_iter().collect()
    }

    #[test]
    fn bare_site_needs_package_tools_only() {
        assert_eq!(
            tools("[aptly]\nmanage_repo = false"),
            vec!["apt-get", "dpkg-query", "sh"]
        );
    }

    #[test]
    fn default_apt_source_needs_gpg() {
        assert_eq!(tools(""), vec!["apt-get", "dpkg-query", "gpg", "sh"]);
    }

    #[test]
    fn upstart_service_needs_initctl() {
        for ensure in ["running", "stopped"] {
            let found = tools(&format!(
                "[aptly]\nmanage_repo = false\n[api]\ninit_system = \"upstart\"\nensure = \"{ensure}\"\n"
            ));
            assert!(found.contains(&"initctl"), "{ensure}");
            assert!(!found.contains(&"systemctl"), "{ensure}");
        }
    }

    #[test]
    fn keys_services_and_users_add_tools() {
        let found = tools(
            r#"
[aptly]
user = "aptly"
distribution = "stable"

[mirror.m]
location = "http://deb.debian.org/debian"
key = { id = "ABC123" }

[api]
"#,
        );
        assert!(found.contains(&"gpg"));
        assert!(found.contains(&"systemctl"));
        assert!(found.contains(&"runuser"));
        assert!(!found.contains(&"initctl"));
    }
}
