//! The aptly package itself

use declarative::CommandSpec;

use crate::error::{Error, Result};
use crate::render::single_quote;

pub const PACKAGE_ID: &str = "package.aptly";

/// Plan the aptly package install
///
/// `ensure` is `present`/`installed` or a version to pin.
pub fn plan_package(ensure: &str) -> Result<CommandSpec> {
    let installed = "dpkg-query -W -f='${Status}' aptly 2>/dev/null | grep -q 'install ok installed'";
    let install = "apt-get update && DEBIAN_FRONTEND=noninteractive apt-get install -y";

    match ensure {
        "present" | "installed" => Ok(CommandSpec::new(
            installed,
            format!("{install} aptly"),
            "root",
        )),
        version if is_version(version) => Ok(CommandSpec::new(
            format!(
                "dpkg-query -W -f='${{Version}}' aptly 2>/dev/null | grep -qxF {}",
                single_quote(version)
            ),
            format!("{install} {}", single_quote(&format!("aptly={version}"))),
            "root",
        )),
        other => Err(Error::validation(
            PACKAGE_ID,
            "package_ensure",
            format!("'{other}' is neither present, installed nor a package version"),
        )),
    }
}

/// Debian version strings: epoch, upstream and revision characters only
fn is_version(value: &str) -> bool {
    value.starts_with(|c: char| c.is_ascii_digit())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".+~-:".contains(c))
}
