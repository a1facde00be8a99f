//! Upstream mirrors: `aptly mirror create`

use regex::Regex;
use std::sync::LazyLock;

use super::{Pattern, PlannerConfig, Strategy, configured_user, keys, no_refresh};
use crate::descriptor::ResourceDescriptor;
use crate::error::{Error, Result};
use crate::render::{Flag, render};

pub(super) const STRATEGY: Strategy = Strategy {
    accepts: &[
        "location",
        "distribution",
        "components",
        "architectures",
        "key",
        "with_sources",
        "with_udebs",
        "filter",
        "filter_with_deps",
        "environment",
    ],
    validate,
    apply,
    probe,
    refresh: no_refresh,
    run_as: configured_user,
    dependencies,
    describe,
    parallel: false,
};

/// Key ids and fingerprints go through `xargs`, which re-parses quotes
const KEY_ID_PATTERN: &str = r"^(0x)?[A-Za-z0-9]+$";

static KEY_ID: Pattern = LazyLock::new(|| Regex::new(KEY_ID_PATTERN));

/// Declared distribution, or the site default
fn distribution<'a>(descriptor: &'a ResourceDescriptor, config: &'a PlannerConfig) -> Option<&'a str> {
    descriptor
        .attributes
        .distribution
        .as_deref()
        .or(config.default_distribution.as_deref())
}

fn validate(descriptor: &ResourceDescriptor, config: &PlannerConfig) -> Result<()> {
    let attrs = &descriptor.attributes;

    super::required(descriptor, "location", attrs.location.as_deref())?;
    super::check_token(descriptor, "location", attrs.location.as_deref().unwrap_or_default())?;

    let Some(distribution) = distribution(descriptor, config) else {
        return Err(Error::validation(
            descriptor.id(),
            "distribution",
            "required for mirror (no site default distribution is set)",
        ));
    };
    super::check_token(descriptor, "distribution", distribution)?;

    super::check_list(descriptor, "components", attrs.components.as_deref())?;
    super::check_list(descriptor, "architectures", attrs.architectures.as_deref())?;

    if let Some(key) = &attrs.key {
        let ids = key.id.to_vec();
        if ids.is_empty() {
            return Err(Error::validation(
                descriptor.id(),
                "key",
                "key ids must be a non-empty list of non-empty ids",
            ));
        }
        let pattern = super::compiled(&KEY_ID)?;
        if let Some(bad) = ids.iter().find(|id| !pattern.is_match(id)) {
            return Err(Error::validation(
                descriptor.id(),
                "key",
                format!("'{bad}' is not a key id or fingerprint (letters and digits only)"),
            ));
        }
        if key.server.as_deref() == Some("") {
            return Err(Error::validation(
                descriptor.id(),
                "key",
                "key server must not be empty",
            ));
        }
    }

    Ok(())
}

fn apply(descriptor: &ResourceDescriptor, config: &PlannerConfig) -> String {
    let attrs = &descriptor.attributes;
    let architectures = attrs.architectures.clone().unwrap_or_default();

    let mut positionals = vec![
        descriptor.name.as_str(),
        attrs.location.as_deref().unwrap_or_default(),
        distribution(descriptor, config).unwrap_or_default(),
    ];
    positionals.extend(attrs.components.iter().flatten().map(String::as_str));

    render(
        &format!("{} mirror create", config.aptly()),
        &[
            Flag::list("architectures", &architectures),
            Flag::boolean("with-sources", attrs.with_sources.unwrap_or(false)),
            Flag::boolean("with-udebs", attrs.with_udebs.unwrap_or(false)),
            Flag::switch("filter-with-deps", attrs.filter_with_deps.unwrap_or(false)),
            Flag::text("filter", attrs.filter.as_deref()),
        ],
        &positionals,
    )
}

fn probe(descriptor: &ResourceDescriptor, config: &PlannerConfig) -> String {
    format!("{} mirror show {} >/dev/null", config.aptly(), descriptor.name)
}

fn dependencies(descriptor: &ResourceDescriptor) -> Vec<String> {
    let mut deps = super::aptly_dependencies(descriptor);
    if descriptor.attributes.key.is_some() {
        deps.push(keys::guard_id(&descriptor.name));
    }
    deps
}

fn describe(descriptor: &ResourceDescriptor) -> String {
    format!(
        "Create aptly mirror {} from {}",
        descriptor.name,
        descriptor.attributes.location.as_deref().unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use crate::descriptor::{Attributes, KeyDecl, OneOrMany, ResourceDescriptor, ResourceKind};
    use crate::error::Error;
    use crate::planner::{PlannerConfig, plan};

    const BASE: &str = "/usr/bin/aptly -config /etc/aptly.conf mirror create";

    fn mirror(attributes: Attributes) -> ResourceDescriptor {
        ResourceDescriptor::new(
            ResourceKind::Mirror,
            "example",
            Attributes {
                location: Some("http://repo.example.com".to_string()),
                distribution: Some("precise".to_string()),
                ..attributes
            },
        )
    }

    fn apply(attributes: Attributes) -> String {
        plan(&mirror(attributes), &PlannerConfig::default()).unwrap().apply
    }

    #[test]
    fn components_follow_distribution() {
        let cmd = apply(Attributes {
            components: Some(vec!["main".into(), "contrib".into(), "non-free".into()]),
            ..Default::default()
        });
        assert_eq!(
            cmd,
            format!(
                "{BASE} -with-sources=false -with-udebs=false example \
                 http://repo.example.com precise main contrib non-free"
            )
        );
    }

    #[test]
    fn architectures_lead_the_flags() {
        let cmd = apply(Attributes {
            architectures: Some(vec!["i386".into(), "amd64".into(), "armhf".into()]),
            ..Default::default()
        });
        assert!(cmd.starts_with(&format!(
            "{BASE} -architectures=\"i386,amd64,armhf\" -with-sources=false"
        )));
    }

    #[test]
    fn booleans_and_filters() {
        let cmd = apply(Attributes {
            with_udebs: Some(true),
            filter_with_deps: Some(true),
            filter: Some("this is a string".into()),
            ..Default::default()
        });
        assert_eq!(
            cmd,
            format!(
                "{BASE} -with-sources=false -with-udebs=true -filter-with-deps \
                 -filter=\"this is a string\" example http://repo.example.com precise"
            )
        );
    }

    #[test]
    fn no_key_means_no_key_dependency() {
        let spec = plan(&mirror(Attributes::default()), &PlannerConfig::default()).unwrap();
        assert!(!spec.depends_on.iter().any(|d| d.starts_with("key.")));
    }

    #[test]
    fn distribution_falls_back_to_site_default() {
        let mut d = mirror(Attributes::default());
        d.attributes.distribution = None;

        let config = PlannerConfig {
            default_distribution: Some("lucid".to_string()),
            ..Default::default()
        };
        assert!(plan(&d, &config).unwrap().apply.ends_with("http://repo.example.com lucid"));

        let err = plan(&d, &PlannerConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Validation { ref attribute, .. } if attribute == "distribution"));
    }

    #[test]
    fn location_is_required() {
        let mut d = mirror(Attributes::default());
        d.attributes.location = None;
        let err = plan(&d, &PlannerConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "mirror.example: invalid 'location': required for mirror");
    }

    #[test]
    fn key_ids_must_be_plain_tokens() {
        for id in ["it's", "AB CD", "ABC\\123", "\"ABC\"", ""] {
            let d = mirror(Attributes {
                key: Some(KeyDecl {
                    id: OneOrMany::Many(vec!["ABC123".to_string(), id.to_string()]),
                    server: None,
                }),
                ..Default::default()
            });
            let err = plan(&d, &PlannerConfig::default()).unwrap_err();
            assert!(
                matches!(err, Error::Validation { ref attribute, .. } if attribute == "key"),
                "{id:?} should be rejected"
            );
        }
    }

    #[test]
    fn fingerprints_and_prefixed_ids_are_accepted() {
        let d = mirror(Attributes {
            key: Some(KeyDecl {
                id: OneOrMany::Many(vec![
                    "0x9E3E53F19C7DE460".to_string(),
                    "DF32BC15E2145B3FA151AED19E3E53F19C7DE460".to_string(),
                ]),
                server: None,
            }),
            ..Default::default()
        });
        assert!(plan(&d, &PlannerConfig::default()).is_ok());
    }

    #[test]
    fn location_with_whitespace_is_rejected() {
        let mut d = mirror(Attributes::default());
        d.attributes.location = Some("http://repo.example.com; rm -rf /".to_string());
        assert!(plan(&d, &PlannerConfig::default()).is_err());
    }
}
