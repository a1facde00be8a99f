//! Site catalog - every resource a site converges
//!
//! Order of declaration: upstream apt source (key, list), the aptly
//! package, the aptly config file, then per declared object its key guard
//! and command, then the API unit file and service. Ordering at run time
//! comes from the explicit `depends_on` edges, not from this order.

use declarative::{BoxedResource, DependencyGraph, ExecutionPlan};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::config::Site;
use crate::descriptor::{ResourceDescriptor, ResourceKind};
use crate::error::Result;
use crate::planner::{
    self, APT_SOURCE_KEY_ID, CONFIG_FILE_ID, PACKAGE_ID, PlannedCommand, SnapshotSource,
};
use crate::resource::ManagedFile;
use crate::serializer;

const APT_SOURCE_LIST_ID: &str = "source.aptly-list";
const APT_SOURCE_LIST_PATH: &str = "/etc/apt/sources.list.d/aptly.list";
const APT_SOURCE_LINE: &str = "deb http://repo.aptly.info/ squeeze main\n";

/// One catalog entry
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    Command(PlannedCommand),
    File(ManagedFile),
}

impl Entry {
    pub fn id(&self) -> &str {
        match self {
            Self::Command(c) => &c.id,
            Self::File(f) => &f.id,
        }
    }

    fn into_resource(self) -> BoxedResource {
        match self {
            Self::Command(c) => Box::new(c.into_resource()),
            Self::File(f) => Box::new(f),
        }
    }
}

/// All planned resources of a site, in declaration order
#[derive(Debug, Clone)]
pub struct Catalog {
    pub entries: Vec<Entry>,
}

impl Catalog {
    /// Plan every resource of the site and check the dependency graph
    pub fn build(site: &Site) -> Result<Self> {
        let config = site.planner_config()?;
        let mut entries = Vec::new();

        if site.aptly.manage_repo {
            entries.push(Entry::Command(PlannedCommand {
                id: APT_SOURCE_KEY_ID.to_string(),
                resource_type: "source",
                description: "Import the aptly apt repository key".to_string(),
                spec: planner::plan_apt_source_key(&config),
                parallel: true,
            }));
            entries.push(Entry::File(
                ManagedFile::new(
                    APT_SOURCE_LIST_ID,
                    "source",
                    APT_SOURCE_LIST_PATH,
                    APT_SOURCE_LINE,
                )
                .depends_on(APT_SOURCE_KEY_ID),
            ));
        }

        let mut package = planner::plan_package(&site.aptly.package_ensure)?;
        if site.aptly.manage_repo {
            package = package.depends_on(APT_SOURCE_LIST_ID);
        }
        entries.push(Entry::Command(PlannedCommand {
            id: PACKAGE_ID.to_string(),
            resource_type: "package",
            description: format!("Install aptly ({})", site.aptly.package_ensure),
            spec: package,
            parallel: true,
        }));

        let content = serializer::serialize(&site.config_document())?;
        entries.push(Entry::File(ManagedFile::new(
            CONFIG_FILE_ID,
            "config",
            &config.config_file,
            content,
        )));

        for descriptor in site.descriptors() {
            if descriptor.kind == ResourceKind::ApiService {
                let commands = planner::plan_all(&descriptor, &config)?;
                let unit = planner::unit_file(&descriptor, &config);
                entries.push(Entry::File(
                    ManagedFile::new(&unit.id, "unit", &unit.path, unit.content)
                        .depends_on(PACKAGE_ID),
                ));
                entries.extend(commands.into_iter().map(Entry::Command));
                continue;
            }

            for mut command in planner::plan_all(&descriptor, &config)? {
                if let Some(upstream) = cross_reference(site, &descriptor) {
                    command.spec = command.spec.depends_on(upstream);
                }
                entries.push(Entry::Command(command));
            }
        }

        let catalog = Self { entries };
        catalog.graph()?;
        log::debug!("catalog: {} resources", catalog.entries.len());
        Ok(catalog)
    }

    /// Dependency graph over the catalog
    pub fn graph(&self) -> Result<DependencyGraph> {
        Ok(self.plan().graph()?)
    }

    /// Executable plan with every entry
    pub fn plan(&self) -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();
        for entry in self.entries.iter().cloned() {
            plan.add_resource(entry.into_resource());
        }
        plan
    }

    /// Keep entries matching `kind` or `kind.name`, plus their dependencies
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        let keep: BTreeSet<String> = self
            .plan()
            .filter_by_target(target)
            .resources
            .iter()
            .map(|r| r.id())
            .collect();

        Self {
            entries: self
                .entries
                .into_iter()
                .filter(|e| keep.contains(e.id()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn commands(&self) -> impl Iterator<Item = &PlannedCommand> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Command(c) => Some(c),
            Entry::File(_) => None,
        })
    }

    pub fn files(&self) -> impl Iterator<Item = &ManagedFile> {
        self.entries.iter().filter_map(|e| match e {
            Entry::File(f) => Some(f),
            Entry::Command(_) => None,
        })
    }
}

/// A snapshot taken from a repo or mirror declared in the same site
fn cross_reference(site: &Site, descriptor: &ResourceDescriptor) -> Option<String> {
    if descriptor.kind != ResourceKind::Snapshot {
        return None;
    }
    let (kind, name) = match planner::snapshot_source(descriptor) {
        SnapshotSource::Repo(name) => (ResourceKind::Repository, name),
        SnapshotSource::Mirror(name) => (ResourceKind::Mirror, name),
        SnapshotSource::Empty => return None,
    };
    site.declares(kind, name)
        .then(|| format!("{kind}.{name}"))
}
