//! Site file loading
//!
//! The site file is TOML: an `[aptly]` table for the installation, plus
//! `[repo.NAME]`, `[mirror.NAME]`, `[snapshot.NAME]` and `[api]` tables
//! for the objects to converge.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::descriptor::{Attributes, ResourceDescriptor, ResourceKind};
use crate::error::{Error, Result};
use crate::planner::{PlannerConfig, SERVICE_NAME};
use crate::serializer::ConfigDocument;

/// Default site file location
pub const DEFAULT_SITE: &str = "/etc/aptkeeper/site.toml";

/// Expand `~` and environment variables in a user-supplied path
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(path).into_owned());
    PathBuf::from(expanded)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Site {
    #[serde(default)]
    pub aptly: AptlySettings,
    #[serde(default)]
    pub repo: BTreeMap<String, Attributes>,
    #[serde(default)]
    pub mirror: BTreeMap<String, Attributes>,
    #[serde(default)]
    pub snapshot: BTreeMap<String, Attributes>,
    /// Present (even empty) to manage the API service
    #[serde(default)]
    pub api: Option<Attributes>,
}

/// The `[aptly]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AptlySettings {
    pub user: String,
    pub config_file: String,
    pub aptly_bin: String,
    /// `present`, `installed` or a version
    pub package_ensure: String,
    /// Manage the upstream aptly apt source and its signing key
    pub manage_repo: bool,
    pub key_server: String,
    pub distribution: Option<String>,
    /// Raw config file contents, replacing `config` entirely
    pub config_contents: Option<String>,
    pub config: toml::Table,
}

impl Default for AptlySettings {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            config_file: "/etc/aptly.conf".to_string(),
            aptly_bin: "/usr/bin/aptly".to_string(),
            package_ensure: "present".to_string(),
            manage_repo: true,
            key_server: "keyserver.ubuntu.com".to_string(),
            distribution: None,
            config_contents: None,
            config: toml::Table::new(),
        }
    }
}

impl Site {
    /// Load and parse a site file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::SiteRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| Error::SiteParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Paths and identities for the planner
    pub fn planner_config(&self) -> Result<PlannerConfig> {
        let aptly = &self.aptly;
        let config_file = expand(&aptly.config_file);
        if !config_file.is_absolute() {
            return Err(Error::validation(
                "aptly",
                "config_file",
                format!("expects an absolute path, got '{}'", aptly.config_file),
            ));
        }
        check_path("config_file", &config_file.display().to_string())?;
        check_path("aptly_bin", &aptly.aptly_bin)?;
        if aptly.user.is_empty() {
            return Err(Error::validation("aptly", "user", "must not be empty"));
        }
        if aptly.key_server.is_empty() {
            return Err(Error::validation("aptly", "key_server", "must not be empty"));
        }

        Ok(PlannerConfig {
            aptly_bin: aptly.aptly_bin.clone(),
            config_file,
            run_as_user: aptly.user.clone(),
            key_server: aptly.key_server.clone(),
            default_distribution: aptly.distribution.clone(),
        })
    }

    /// Desired contents of the aptly config file
    pub fn config_document(&self) -> ConfigDocument {
        let doc = ConfigDocument::new(self.aptly.config.clone());
        match &self.aptly.config_contents {
            Some(raw) => doc.with_override(raw.clone()),
            None => doc,
        }
    }

    /// Declared objects: repos, then mirrors, then snapshots, then the API
    pub fn descriptors(&self) -> Vec<ResourceDescriptor> {
        let tables = [
            (ResourceKind::Repository, &self.repo),
            (ResourceKind::Mirror, &self.mirror),
            (ResourceKind::Snapshot, &self.snapshot),
        ];

        let mut descriptors: Vec<ResourceDescriptor> = tables
            .into_iter()
            .flat_map(|(kind, table)| {
                table
                    .iter()
                    .map(move |(name, attrs)| ResourceDescriptor::new(kind, name, attrs.clone()))
            })
            .collect();

        if let Some(api) = &self.api {
            descriptors.push(ResourceDescriptor::new(
                ResourceKind::ApiService,
                SERVICE_NAME,
                api.clone(),
            ));
        }
        descriptors
    }

    /// Whether a repo or mirror of this name is declared
    pub fn declares(&self, kind: ResourceKind, name: &str) -> bool {
        match kind {
            ResourceKind::Repository => self.repo.contains_key(name),
            ResourceKind::Mirror => self.mirror.contains_key(name),
            ResourceKind::Snapshot => self.snapshot.contains_key(name),
            ResourceKind::ApiService => self.api.is_some(),
        }
    }
}

/// Paths are spliced into every aptly command unquoted
fn check_path(attribute: &str, value: &str) -> Result<()> {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._+~/-".contains(c));
    if safe {
        Ok(())
    } else {
        Err(Error::validation(
            "aptly",
            attribute,
            format!("'{value}' may only contain letters, digits and ._+~/-"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SITE: &str = r#"
[aptly]
user = "aptly"
distribution = "precise"
manage_repo = true

[aptly.config]
rootDir = "/srv/aptly"

[repo.local]
component = "main"

[mirror.debian]
location = "http://deb.debian.org/debian"
components = ["main"]
key = { id = ["ABC123", "DEF456"] }

[snapshot.nightly]
mirror = "debian"

[api]
listen = ":9090"
"#;

    fn write_site(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_full_site() {
        let file = write_site(SITE);
        let site = Site::load(file.path()).unwrap();

        assert_eq!(site.aptly.user, "aptly");
        assert!(site.aptly.manage_repo);
        assert_eq!(site.aptly.config_file, "/etc/aptly.conf");

        let ids: Vec<String> = site.descriptors().iter().map(ResourceDescriptor::id).collect();
        assert_eq!(
            ids,
            vec!["repo.local", "mirror.debian", "snapshot.nightly", "api.aptly-api"]
        );

        let config = site.planner_config().unwrap();
        assert_eq!(config.run_as_user, "aptly");
        assert_eq!(config.default_distribution.as_deref(), Some("precise"));
        assert!(site.declares(ResourceKind::Mirror, "debian"));
        assert!(!site.declares(ResourceKind::Repository, "debian"));
    }

    #[test]
    fn empty_site_uses_defaults() {
        let site: Site = toml::from_str("").unwrap();
        assert!(site.descriptors().is_empty());
        assert!(site.aptly.manage_repo);
        assert_eq!(site.planner_config().unwrap(), PlannerConfig::default());
    }

    #[test]
    fn unknown_field_is_reported_with_path() {
        let file = write_site("[mirror.debian]\nrepos = [\"main\"]\n");
        let err = Site::load(file.path()).unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains(&file.path().display().to_string()));
        assert!(msg.contains("repos"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Site::load(Path::new("/nonexistent/site.toml")).unwrap_err();
        assert!(matches!(err, Error::SiteRead { .. }));
    }

    #[test]
    fn relative_config_file_is_rejected() {
        let site: Site = toml::from_str("[aptly]\nconfig_file = \"aptly.conf\"").unwrap();
        let err = site.planner_config().unwrap_err();
        assert!(err.to_string().contains("absolute path"));
    }

    #[test]
    fn paths_with_shell_characters_are_rejected() {
        for src in [
            "[aptly]\nconfig_file = \"/etc/my aptly.conf\"",
            "[aptly]\naptly_bin = \"/usr/bin/aptly;true\"",
        ] {
            let site: Site = toml::from_str(src).unwrap();
            let err = site.planner_config().unwrap_err();
            assert!(err.to_string().contains("may only contain"), "{src}");
        }
    }

    #[test]
    fn empty_key_server_is_rejected() {
        let site: Site = toml::from_str("[aptly]\nkey_server = \"\"").unwrap();
        let err = site.planner_config().unwrap_err();
        assert_eq!(err.to_string(), "aptly: invalid 'key_server': must not be empty");
    }

    #[test]
    fn config_contents_override_structured_config() {
        let site: Site = toml::from_str(
            "[aptly]\nconfig_contents = '{\"rootDir\":\"/srv/aptly\"}'\n[aptly.config]\nrootDir = \"/x\"",
        )
        .unwrap();
        let doc = site.config_document();
        assert_eq!(doc.raw_override.as_deref(), Some(r#"{"rootDir":"/srv/aptly"}"#));
    }
}
