//! Idempotent action planner
//!
//! Turns a [`ResourceDescriptor`] into a [`CommandSpec`]: an `apply` command
//! that creates the object and a read-only `probe` that exits 0 when it
//! already exists. Planning is pure; every path and identity comes from the
//! [`PlannerConfig`] passed in.
//!
//! Each kind is handled by one [`Strategy`], looked up in [`STRATEGIES`].

mod api;
mod keys;
mod mirror;
mod package;
mod repo;
mod snapshot;

use declarative::{CommandSpec, GuardedCommand};
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::descriptor::{ResourceDescriptor, ResourceKind};
use crate::error::{Error, Result};

pub use api::{SERVICE_NAME, unit_file};
pub use keys::{APT_SOURCE_KEY_ID, plan_apt_source_key, plan_key_guard};
pub use package::{PACKAGE_ID, plan_package};
pub use snapshot::{Source as SnapshotSource, source as snapshot_source};

/// Id of the rendered aptly config file resource
pub const CONFIG_FILE_ID: &str = "config.aptly";

/// Names of aptly objects and services
const NAME_PATTERN: &str = r"^[A-Za-z0-9._+~-]+$";

/// Compiled once on first use; a compile failure is reported on every use
type Pattern = LazyLock<std::result::Result<Regex, regex::Error>>;

static NAME: Pattern = LazyLock::new(|| Regex::new(NAME_PATTERN));

fn compiled(pattern: &'static Pattern) -> Result<&'static Regex> {
    pattern.as_ref().map_err(|e| Error::Regex(e.clone()))
}

/// Paths and identities every plan is rendered against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    pub aptly_bin: String,
    pub config_file: PathBuf,
    /// User aptly and gpg commands run as
    pub run_as_user: String,
    pub key_server: String,
    /// Mirror distribution used when a mirror declares none
    pub default_distribution: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            aptly_bin: "/usr/bin/aptly".to_string(),
            config_file: PathBuf::from("/etc/aptly.conf"),
            run_as_user: "root".to_string(),
            key_server: "keyserver.ubuntu.com".to_string(),
            default_distribution: None,
        }
    }
}

impl PlannerConfig {
    /// `<aptly_bin> -config <config_file>`
    pub fn aptly(&self) -> String {
        format!("{} -config {}", self.aptly_bin, self.config_file.display())
    }
}

/// A planned command together with its resource identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCommand {
    pub id: String,
    pub resource_type: &'static str,
    pub description: String,
    pub spec: CommandSpec,
    /// aptly holds a database lock, so its commands never run concurrently
    pub parallel: bool,
}

impl PlannedCommand {
    pub fn into_resource(self) -> GuardedCommand {
        let command = GuardedCommand::new(self.id, self.resource_type, self.description, self.spec);
        if self.parallel {
            command
        } else {
            command.sequential()
        }
    }
}

/// Rendering strategy for one resource kind
pub struct Strategy {
    /// Attributes the kind accepts
    pub accepts: &'static [&'static str],
    pub validate: fn(&ResourceDescriptor, &PlannerConfig) -> Result<()>,
    pub apply: fn(&ResourceDescriptor, &PlannerConfig) -> String,
    pub probe: fn(&ResourceDescriptor, &PlannerConfig) -> String,
    pub refresh: fn(&ResourceDescriptor) -> Option<String>,
    pub run_as: fn(&PlannerConfig) -> String,
    pub dependencies: fn(&ResourceDescriptor) -> Vec<String>,
    pub describe: fn(&ResourceDescriptor) -> String,
    pub parallel: bool,
}

/// One strategy per kind, in [`ResourceKind`] declaration order
pub static STRATEGIES: [(ResourceKind, Strategy); 4] = [
    (ResourceKind::Repository, repo::STRATEGY),
    (ResourceKind::Mirror, mirror::STRATEGY),
    (ResourceKind::Snapshot, snapshot::STRATEGY),
    (ResourceKind::ApiService, api::STRATEGY),
];

pub fn strategy(kind: ResourceKind) -> &'static Strategy {
    let index = match kind {
        ResourceKind::Repository => 0,
        ResourceKind::Mirror => 1,
        ResourceKind::Snapshot => 2,
        ResourceKind::ApiService => 3,
    };
    &STRATEGIES[index].1
}

/// Plan the guarded command for one declared object
pub fn plan(descriptor: &ResourceDescriptor, config: &PlannerConfig) -> Result<CommandSpec> {
    let strategy = strategy(descriptor.kind);

    validate_common(descriptor, strategy.accepts)?;
    (strategy.validate)(descriptor, config)?;

    let mut spec = CommandSpec::new(
        (strategy.probe)(descriptor, config),
        (strategy.apply)(descriptor, config),
        &(strategy.run_as)(config),
    )
    .with_env(descriptor.attributes.environment.clone().unwrap_or_default());

    for dependency in (strategy.dependencies)(descriptor) {
        spec = spec.depends_on(dependency);
    }
    if let Some(refresh) = (strategy.refresh)(descriptor) {
        spec = spec.with_refresh(refresh);
    }

    log::debug!("planned {}: {}", descriptor.id(), spec.apply);
    Ok(spec)
}

/// Plan the key guard (if any) followed by the main command
pub fn plan_all(
    descriptor: &ResourceDescriptor,
    config: &PlannerConfig,
) -> Result<Vec<PlannedCommand>> {
    let strategy = strategy(descriptor.kind);
    let spec = plan(descriptor, config)?;

    let mut planned = Vec::with_capacity(2);
    if let Some(guard) = plan_key_guard(descriptor, config)? {
        planned.push(PlannedCommand {
            id: keys::guard_id(&descriptor.name),
            resource_type: "key",
            description: format!("Import signing keys for mirror {}", descriptor.name),
            spec: guard,
            parallel: true,
        });
    }
    planned.push(PlannedCommand {
        id: descriptor.id(),
        resource_type: descriptor.kind.as_str(),
        description: (strategy.describe)(descriptor),
        spec,
        parallel: strategy.parallel,
    });
    Ok(planned)
}

// ============================================================================
// Validation helpers
// ============================================================================

fn validate_common(descriptor: &ResourceDescriptor, accepts: &[&str]) -> Result<()> {
    check_name(descriptor, "name", &descriptor.name)?;

    for attribute in descriptor.attributes.set_names() {
        if !accepts.contains(&attribute) {
            return Err(Error::validation(
                descriptor.id(),
                attribute,
                format!(
                    "not accepted for {}; accepted attributes: {}",
                    descriptor.kind,
                    accepts.join(", ")
                ),
            ));
        }
    }

    for entry in descriptor.attributes.environment.iter().flatten() {
        match entry.split_once('=') {
            Some((key, _)) if !key.is_empty() => {}
            _ => {
                return Err(Error::validation(
                    descriptor.id(),
                    "environment",
                    format!("expected KEY=VALUE, got '{entry}'"),
                ));
            }
        }
    }

    Ok(())
}

/// Object names are passed to aptly unquoted
fn check_name(descriptor: &ResourceDescriptor, attribute: &str, value: &str) -> Result<()> {
    if compiled(&NAME)?.is_match(value) {
        Ok(())
    } else {
        Err(Error::validation(
            descriptor.id(),
            attribute,
            format!("'{value}' must be a non-empty token of letters, digits and ._+~-"),
        ))
    }
}

/// Positionals like URLs and distributions are passed unquoted too
fn check_token(descriptor: &ResourceDescriptor, attribute: &str, value: &str) -> Result<()> {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._+~-/:@%=,".contains(c));
    if safe {
        Ok(())
    } else {
        Err(Error::validation(
            descriptor.id(),
            attribute,
            format!("'{value}' must be non-empty and free of whitespace and shell characters"),
        ))
    }
}

fn check_one_of(
    descriptor: &ResourceDescriptor,
    attribute: &str,
    value: Option<&str>,
    allowed: &[&str],
) -> Result<()> {
    match value {
        Some(v) if !allowed.contains(&v) => Err(Error::validation(
            descriptor.id(),
            attribute,
            format!("Valid values for {attribute}: {}", allowed.join(", ")),
        )),
        _ => Ok(()),
    }
}

fn check_list(descriptor: &ResourceDescriptor, attribute: &str, values: Option<&[String]>) -> Result<()> {
    for value in values.unwrap_or_default() {
        check_token(descriptor, attribute, value)?;
    }
    Ok(())
}

fn required(descriptor: &ResourceDescriptor, attribute: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(Error::validation(
            descriptor.id(),
            attribute,
            format!("required for {}", descriptor.kind),
        )),
    }
}

fn aptly_dependencies(_descriptor: &ResourceDescriptor) -> Vec<String> {
    vec![PACKAGE_ID.to_string(), CONFIG_FILE_ID.to_string()]
}

fn configured_user(config: &PlannerConfig) -> String {
    config.run_as_user.clone()
}

fn no_refresh(_descriptor: &ResourceDescriptor) -> Option<String> {
    None
}
