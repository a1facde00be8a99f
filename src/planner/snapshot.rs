//! Snapshots: `aptly snapshot create`, empty or from a repo or mirror

use super::{PlannerConfig, Strategy, aptly_dependencies, configured_user, no_refresh};
use crate::descriptor::ResourceDescriptor;
use crate::error::{Error, Result};

pub(super) const STRATEGY: Strategy = Strategy {
    accepts: &["repo", "mirror", "environment"],
    validate,
    apply,
    probe,
    refresh: no_refresh,
    run_as: configured_user,
    dependencies: aptly_dependencies,
    describe,
    parallel: false,
};

/// Where a snapshot takes its packages from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source<'a> {
    Empty,
    Repo(&'a str),
    Mirror(&'a str),
}

pub fn source(descriptor: &ResourceDescriptor) -> Source<'_> {
    let attrs = &descriptor.attributes;
    match (attrs.repo.as_deref(), attrs.mirror.as_deref()) {
        (Some(repo), _) => Source::Repo(repo),
        (None, Some(mirror)) => Source::Mirror(mirror),
        (None, None) => Source::Empty,
    }
}

fn validate(descriptor: &ResourceDescriptor, _config: &PlannerConfig) -> Result<()> {
    let attrs = &descriptor.attributes;
    if attrs.repo.is_some() && attrs.mirror.is_some() {
        return Err(Error::validation(
            descriptor.id(),
            "repo",
            "repo and mirror are mutually exclusive",
        ));
    }

    match source(descriptor) {
        Source::Repo(name) => super::check_name(descriptor, "repo", name),
        Source::Mirror(name) => super::check_name(descriptor, "mirror", name),
        Source::Empty => Ok(()),
    }
}

fn apply(descriptor: &ResourceDescriptor, config: &PlannerConfig) -> String {
    let base = format!("{} snapshot create {}", config.aptly(), descriptor.name);
    match source(descriptor) {
        Source::Empty => format!("{base} empty"),
        Source::Repo(repo) => format!("{base} from repo {repo}"),
        Source::Mirror(mirror) => format!("{base} from mirror {mirror}"),
    }
}

fn probe(descriptor: &ResourceDescriptor, config: &PlannerConfig) -> String {
    format!("{} snapshot show {} >/dev/null", config.aptly(), descriptor.name)
}

fn describe(descriptor: &ResourceDescriptor) -> String {
    match source(descriptor) {
        Source::Empty => format!("Create empty aptly snapshot {}", descriptor.name),
        Source::Repo(repo) => format!("Snapshot repo {repo} as {}", descriptor.name),
        Source::Mirror(mirror) => format!("Snapshot mirror {mirror} as {}", descriptor.name),
    }
}

#[cfg(test)]
mod tests {
    use crate::descriptor::{Attributes, ResourceDescriptor, ResourceKind};
    use crate::error::Error;
    use crate::planner::{PlannerConfig, plan};

    fn snapshot(repo: Option<&str>, mirror: Option<&str>) -> ResourceDescriptor {
        ResourceDescriptor::new(
            ResourceKind::Snapshot,
            "example",
            Attributes {
                repo: repo.map(str::to_string),
                mirror: mirror.map(str::to_string),
                ..Default::default()
            },
        )
    }

    #[test]
    fn three_sources() {
        let config = PlannerConfig::default();
        let base = "/usr/bin/aptly -config /etc/aptly.conf snapshot create example";

        assert_eq!(plan(&snapshot(None, None), &config).unwrap().apply, format!("{base} empty"));
        assert_eq!(
            plan(&snapshot(Some("example_repo"), None), &config).unwrap().apply,
            format!("{base} from repo example_repo")
        );
        assert_eq!(
            plan(&snapshot(None, Some("example_mirror")), &config).unwrap().apply,
            format!("{base} from mirror example_mirror")
        );
        assert_eq!(
            plan(&snapshot(None, None), &config).unwrap().probe,
            "/usr/bin/aptly -config /etc/aptly.conf snapshot show example >/dev/null"
        );
    }

    #[test]
    fn repo_and_mirror_are_mutually_exclusive() {
        let err = plan(&snapshot(Some("r"), Some("m")), &PlannerConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Validation { ref message, .. } if message.contains("mutually exclusive")));
    }
}
