// Core commands
pub mod apply;
pub mod check;
pub mod config;
pub mod diff;
pub mod plan;

use anyhow::{Context as AnyhowContext, Result};

use crate::Context;
use crate::catalog::Catalog;
use crate::config::Site;

/// Load the site file named on the command line
pub(crate) fn load_site(ctx: &Context) -> Result<Site> {
    log::debug!("loading site from {}", ctx.site.display());
    Ok(Site::load(&ctx.site)?)
}

/// Load the site and plan its catalog, narrowed to `target`
pub(crate) fn load_catalog(ctx: &Context, target: Option<&str>) -> Result<Catalog> {
    let site = load_site(ctx)?;
    let catalog = Catalog::build(&site)
        .with_context(|| format!("Failed to plan {}", ctx.site.display()))?;
    let catalog = catalog.filter_by_target(target);

    if let Some(target) = target
        && catalog.is_empty()
    {
        anyhow::bail!("No resources match '{target}'");
    }
    Ok(catalog)
}
