//! `config` - print the aptly config file the site renders

use anyhow::Result;

use crate::Context;
use crate::serializer;

pub fn run(ctx: &Context) -> Result<()> {
    let site = super::load_site(ctx)?;
    let content = serializer::serialize(&site.config_document())?;
    print!("{content}");
    Ok(())
}
