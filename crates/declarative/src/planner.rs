//! Execution planner - collects resources and narrows them to a target

use std::collections::{BTreeSet, HashMap};

use crate::error::GraphError;
use crate::graph::DependencyGraph;
use crate::resource::{BoxedResource, Resource};

/// An execution plan: resources in declaration order
pub struct ExecutionPlan {
    pub resources: Vec<BoxedResource>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
        }
    }

    /// Add a resource to the plan
    pub fn add_resource(&mut self, resource: BoxedResource) {
        self.resources.push(resource);
    }

    /// Build the dependency graph for the current resources
    pub fn graph(&self) -> Result<DependencyGraph, GraphError> {
        DependencyGraph::build(&self.resources)
    }

    /// Keep resources matching a predicate, plus everything they depend on
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Resource) -> bool,
    {
        let deps: HashMap<String, Vec<String>> = self
            .resources
            .iter()
            .map(|r| (r.id(), r.dependencies()))
            .collect();

        let mut keep: BTreeSet<String> = BTreeSet::new();
        let mut stack: Vec<String> = self
            .resources
            .iter()
            .filter(|r| predicate(r.as_ref()))
            .map(|r| r.id())
            .collect();

        while let Some(id) = stack.pop() {
            if !keep.insert(id.clone()) {
                continue;
            }
            if let Some(upstream) = deps.get(&id) {
                stack.extend(upstream.iter().cloned());
            }
        }

        Self {
            resources: self
                .resources
                .into_iter()
                .filter(|r| keep.contains(&r.id()))
                .collect(),
        }
    }

    /// Filter plan to resources matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|r| matches_filter(r, resource_type.as_deref(), name.as_deref()))
            }
        }
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.resources.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl Default for ExecutionPlan {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a target string like "type.name" into (type, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some((kind, name)) => (Some(kind.to_string()), Some(name.to_string())),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(
    resource: &dyn Resource,
    resource_type: Option<&str>,
    name: Option<&str>,
) -> bool {
    if let Some(rt) = resource_type {
        // Allow plural aliases
        let matches_type = match rt {
            "repos" => resource.resource_type() == "repo",
            "mirrors" => resource.resource_type() == "mirror",
            "snapshots" => resource.resource_type() == "snapshot",
            "keys" => resource.resource_type() == "key",
            _ => resource.resource_type() == rt,
        };
        if !matches_type {
            return false;
        }
    }

    if let Some(n) = name
        && resource.id().split_once('.').map(|(_, rest)| rest) != Some(n)
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::GuardedCommand;
    use crate::types::CommandSpec;

    fn node(id: &str, kind: &'static str, deps: &[&str]) -> BoxedResource {
        let mut spec = CommandSpec::new("true", "true", "root");
        for dep in deps {
            spec = spec.depends_on(*dep);
        }
        Box::new(GuardedCommand::new(id, kind, id, spec))
    }

    fn sample() -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();
        plan.add_resource(node("package.aptly", "package", &[]));
        plan.add_resource(node("key.debian", "key", &[]));
        plan.add_resource(node("mirror.debian", "mirror", &["package.aptly", "key.debian"]));
        plan.add_resource(node("repo.local", "repo", &["package.aptly"]));
        plan.add_resource(node("snapshot.nightly", "snapshot", &["mirror.debian"]));
        plan
    }

    fn ids(plan: &ExecutionPlan) -> Vec<String> {
        plan.resources.iter().map(|r| r.id()).collect()
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("mirror"), (Some("mirror".to_string()), None));
        assert_eq!(
            parse_target("mirror.debian"),
            (Some("mirror".to_string()), Some("debian".to_string()))
        );
        assert_eq!(
            parse_target("snapshot.2024.01"),
            (Some("snapshot".to_string()), Some("2024.01".to_string()))
        );
    }

    #[test]
    fn filter_keeps_transitive_dependencies() {
        let plan = sample().filter_by_target(Some("snapshot.nightly"));
        assert_eq!(
            ids(&plan),
            vec!["package.aptly", "key.debian", "mirror.debian", "snapshot.nightly"]
        );
    }

    #[test]
    fn filter_by_plural_alias() {
        let plan = sample().filter_by_target(Some("repos"));
        assert_eq!(ids(&plan), vec!["package.aptly", "repo.local"]);
    }

    #[test]
    fn no_target_keeps_everything() {
        let plan = sample().filter_by_target(None);
        assert_eq!(plan.total_resources(), 5);
        assert!(plan.graph().is_ok());
    }
}
