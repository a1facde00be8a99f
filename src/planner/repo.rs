//! Local repositories: `aptly repo create`

use super::{PlannerConfig, Strategy, aptly_dependencies, configured_user, no_refresh};
use crate::descriptor::ResourceDescriptor;
use crate::error::Result;
use crate::render::{Flag, render};

pub(super) const STRATEGY: Strategy = Strategy {
    accepts: &[
        "component",
        "architectures",
        "comment",
        "distribution",
        "environment",
    ],
    validate,
    apply,
    probe,
    refresh: no_refresh,
    run_as: configured_user,
    dependencies: aptly_dependencies,
    describe,
    parallel: false,
};

fn validate(descriptor: &ResourceDescriptor, _config: &PlannerConfig) -> Result<()> {
    super::check_list(
        descriptor,
        "architectures",
        descriptor.attributes.architectures.as_deref(),
    )
}

fn apply(descriptor: &ResourceDescriptor, config: &PlannerConfig) -> String {
    let attrs = &descriptor.attributes;
    let architectures = attrs.architectures.clone().unwrap_or_default();

    render(
        &format!("{} repo create", config.aptly()),
        &[
            Flag::text("component", attrs.component.as_deref()),
            Flag::list("architectures", &architectures),
            Flag::text("comment", attrs.comment.as_deref()),
            Flag::text("distribution", attrs.distribution.as_deref()),
        ],
        &[&descriptor.name],
    )
}

fn probe(descriptor: &ResourceDescriptor, config: &PlannerConfig) -> String {
    format!("{} repo show {} >/dev/null", config.aptly(), descriptor.name)
}

fn describe(descriptor: &ResourceDescriptor) -> String {
    format!("Create aptly repo {}", descriptor.name)
}
