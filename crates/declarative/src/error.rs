//! Error types for the declarative crate

use thiserror::Error;

/// An external command returned a non-zero status
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("command `{command}` exited with {}: {}", describe_code(.code), describe_output(.stdout, .stderr))]
    Failed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

/// Errors raised while building the dependency graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two resources share an id
    #[error("duplicate resource id: {0}")]
    DuplicateId(String),

    /// A resource depends on an id nobody declared
    #[error("resource {resource} depends on undeclared resource {dependency}")]
    UnknownDependency { resource: String, dependency: String },

    /// The dependency relation is not acyclic
    #[error("dependency cycle detected involving {0}")]
    Cycle(String),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn describe_output(stdout: &str, stderr: &str) -> String {
    let mut parts = Vec::new();
    if !stdout.trim().is_empty() {
        parts.push(stdout.trim_end().to_string());
    }
    if !stderr.trim().is_empty() {
        parts.push(stderr.trim_end().to_string());
    }
    if parts.is_empty() {
        "(no output)".to_string()
    } else {
        parts.join("\n")
    }
}
