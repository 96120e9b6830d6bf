pub mod assign;
pub mod competency;
pub mod config;
pub mod facility;
pub mod init;
pub mod org;
pub mod progress;
pub mod serve;
pub mod staff;
pub mod status;

use anyhow::Context;
use carecomp_core::config::Config;
use rusqlite::Connection;
use std::path::Path;

/// Load the instance config and open its store.
pub(crate) fn open_instance(root: &Path) -> anyhow::Result<(Config, Connection)> {
    let config = Config::load(root)
        .with_context(|| format!("no carecomp instance at {}; run `carecomp init`", root.display()))?;
    let conn = carecomp_core::db::open(root).context("failed to open store")?;
    Ok((config, conn))
}
