//! Declared aptly objects
//!
//! A [`ResourceDescriptor`] is one `[repo.NAME]`, `[mirror.NAME]`,
//! `[snapshot.NAME]` or `[api]` table of the site file. Attributes are kept
//! as declared (every field optional) so the planner can tell "unset" from
//! "set to the default" when checking which attributes a kind accepts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of declared aptly object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Repository,
    Mirror,
    Snapshot,
    ApiService,
}

impl ResourceKind {
    pub const ALL: [Self; 4] = [Self::Repository, Self::Mirror, Self::Snapshot, Self::ApiService];

    /// Resource type used in ids and target filters
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repository => "repo",
            Self::Mirror => "mirror",
            Self::Snapshot => "snapshot",
            Self::ApiService => "api",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One id or a list of ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(id) => vec![id.clone()],
            Self::Many(ids) => ids.clone(),
        }
    }
}

/// Signing key as declared; `server` falls back to the site key server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyDecl {
    pub id: OneOrMany,
    #[serde(default)]
    pub server: Option<String>,
}

/// Signing key with the server resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningKey {
    pub ids: Vec<String>,
    pub server: String,
}

impl KeyDecl {
    pub fn resolve(&self, default_server: &str) -> SigningKey {
        SigningKey {
            ids: self.id.to_vec(),
            server: self
                .server
                .clone()
                .unwrap_or_else(|| default_server.to_string()),
        }
    }
}

/// Declared attributes of an aptly object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Attributes {
    pub component: Option<String>,
    pub architectures: Option<Vec<String>>,
    pub comment: Option<String>,
    pub distribution: Option<String>,
    pub location: Option<String>,
    pub key: Option<KeyDecl>,
    pub repo: Option<String>,
    pub mirror: Option<String>,
    pub with_sources: Option<bool>,
    pub with_udebs: Option<bool>,
    pub filter_with_deps: Option<bool>,
    pub filter: Option<String>,
    /// Mirror components, appended after the distribution
    pub components: Option<Vec<String>>,
    /// `KEY=VALUE` entries for the command environment
    pub environment: Option<Vec<String>>,
    pub ensure: Option<String>,
    pub listen: Option<String>,
    pub log: Option<String>,
    pub user: Option<String>,
    pub group: Option<String>,
    pub enable_cli_and_http: Option<bool>,
    pub init_system: Option<String>,
}

impl Attributes {
    /// Names of the attributes that are set
    pub fn set_names(&self) -> Vec<&'static str> {
        let flags = [
            ("component", self.component.is_some()),
            ("architectures", self.architectures.is_some()),
            ("comment", self.comment.is_some()),
            ("distribution", self.distribution.is_some()),
            ("location", self.location.is_some()),
            ("key", self.key.is_some()),
            ("repo", self.repo.is_some()),
            ("mirror", self.mirror.is_some()),
            ("with_sources", self.with_sources.is_some()),
            ("with_udebs", self.with_udebs.is_some()),
            ("filter_with_deps", self.filter_with_deps.is_some()),
            ("filter", self.filter.is_some()),
            ("components", self.components.is_some()),
            ("environment", self.environment.is_some()),
            ("ensure", self.ensure.is_some()),
            ("listen", self.listen.is_some()),
            ("log", self.log.is_some()),
            ("user", self.user.is_some()),
            ("group", self.group.is_some()),
            ("enable_cli_and_http", self.enable_cli_and_http.is_some()),
            ("init_system", self.init_system.is_some()),
        ];
        flags
            .into_iter()
            .filter_map(|(name, set)| set.then_some(name))
            .collect()
    }
}

/// A declared aptly object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub name: String,
    pub attributes: Attributes,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            kind,
            name: name.into(),
            attributes,
        }
    }

    /// Resource id: `kind.name`
    pub fn id(&self) -> String {
        format!("{}.{}", self.kind, self.name)
    }
}
