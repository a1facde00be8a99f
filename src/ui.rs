use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Human name for a resource type
pub fn type_label(resource_type: &str) -> &str {
    match resource_type {
        "source" => "Apt source",
        "package" => "Package",
        "config" => "Config file",
        "key" => "Signing keys",
        "repo" => "Repositories",
        "mirror" => "Mirrors",
        "snapshot" => "Snapshots",
        "unit" => "Service unit",
        "api" => "API service",
        other => other,
    }
}

/// Print a line-level diff between two texts
pub fn text_diff(old: &str, new: &str) {
    let diff = similar::TextDiff::from_lines(old, new);
    let mut has_changes = false;

    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                has_changes = true;
                print!("    {}", format!("- {change}").red());
            }
            similar::ChangeTag::Insert => {
                has_changes = true;
                print!("    {}", format!("+ {change}").green());
            }
            similar::ChangeTag::Equal => {}
        }
        if change.missing_newline() {
            println!();
        }
    }

    if !has_changes {
        println!("    {}", "(files are identical)".dimmed());
    }
}
