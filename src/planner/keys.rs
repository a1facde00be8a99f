//! Signing-key import guards
//!
//! One guard covers the whole id set: the probe lists every id and fails if
//! any is missing, and the import fetches them all in one gpg call.

use declarative::CommandSpec;

use super::PlannerConfig;
use crate::descriptor::{ResourceDescriptor, ResourceKind, SigningKey};
use crate::error::Result;
use crate::render::quote_each;

/// Keyring aptly verifies mirrors against
const MIRROR_KEYRING: &str = "trustedkeys.gpg";

/// Key signing the upstream aptly apt repository
const APT_SOURCE_KEY: &str = "DF32BC15E2145B3FA151AED19E3E53F19C7DE460";
const APT_SOURCE_KEYRING: &str = "/etc/apt/trusted.gpg.d/aptly.gpg";
pub const APT_SOURCE_KEY_ID: &str = "source.aptly-key";

pub(super) fn guard_id(mirror: &str) -> String {
    format!("key.{mirror}")
}

fn gpg(keyring: &str) -> String {
    format!("gpg --no-default-keyring --keyring {keyring}")
}

fn import_command(keyring: &str, key: &SigningKey) -> String {
    format!(
        "{} --keyserver {} --recv-keys {}",
        gpg(keyring),
        quote_each(&[&key.server]),
        quote_each(&key.ids)
    )
}

fn present_probe(keyring: &str, ids: &[String]) -> String {
    format!("echo {} | xargs -n1 {} --list-keys", quote_each(ids), gpg(keyring))
}

/// Plan the key import guarding a mirror, if it declares a key
///
/// The descriptor is expected to have passed [`super::plan`] validation.
pub fn plan_key_guard(
    descriptor: &ResourceDescriptor,
    config: &PlannerConfig,
) -> Result<Option<CommandSpec>> {
    if descriptor.kind != ResourceKind::Mirror {
        return Ok(None);
    }
    let Some(decl) = &descriptor.attributes.key else {
        return Ok(None);
    };

    let key = decl.resolve(&config.key_server);
    Ok(Some(
        CommandSpec::new(
            present_probe(MIRROR_KEYRING, &key.ids),
            import_command(MIRROR_KEYRING, &key),
            &config.run_as_user,
        )
        .with_env(descriptor.attributes.environment.clone().unwrap_or_default()),
    ))
}

/// Import the key of the upstream aptly apt repository as root
pub fn plan_apt_source_key(config: &PlannerConfig) -> CommandSpec {
    let key = SigningKey {
        ids: vec![APT_SOURCE_KEY.to_string()],
        server: config.key_server.clone(),
    };
    CommandSpec::new(
        present_probe(APT_SOURCE_KEYRING, &key.ids),
        import_command(APT_SOURCE_KEYRING, &key),
        "root",
    )
}
