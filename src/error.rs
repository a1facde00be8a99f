//! Error types for planning and site loading
//!
//! Command handlers work in `anyhow`; everything below them (planner,
//! serializer, site loader, catalog) reports through [`Error`].

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A declared resource carries an attribute value the planner rejects.
    ///
    /// `message` names the accepted values where there is a fixed set.
    #[error("{resource}: invalid '{attribute}': {message}")]
    Validation {
        resource: String,
        attribute: String,
        message: String,
    },

    /// A structured config value has no JSON representation.
    #[error("config value '{path}' is not serializable: {reason}")]
    NotSerializable { path: String, reason: String },

    #[error("could not read site file {}: {source}", .path.display())]
    SiteRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid site file {}: {source}", .path.display())]
    SiteParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Graph(#[from] declarative::GraphError),
}

impl Error {
    pub fn validation(
        resource: impl Into<String>,
        attribute: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            resource: resource.into(),
            attribute: attribute.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
