//! `em init`: create `.ember/` with a config file and an empty store.

use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;
use std::io::Write;

use ember_core::config::{EMBER_DIR, save_project_config};
use ember_core::db::open_store;

use super::Ctx;
use crate::output::{pretty_kv, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite the config file even if `.ember/` already exists.
    #[arg(long)]
    pub force: bool,

    /// Allow `bulk-data` and `nuke` in this project.
    #[arg(long)]
    pub enable_testing: bool,
}

#[derive(Debug, Serialize)]
struct InitReport {
    config_path: String,
    store_path: String,
    enable_testing: bool,
}

/// # Errors
///
/// Fails when `.ember/` exists without `--force`, or on any I/O failure.
pub fn run_init(args: &InitArgs, ctx: &Ctx) -> Result<()> {
    let ember_dir = ctx.project_root.join(EMBER_DIR);
    if ember_dir.exists() && !args.force {
        bail!("{EMBER_DIR}/ already exists. Use `em init --force` to rewrite its config.");
    }

    let mut config = ctx.config.project.clone();
    if args.enable_testing {
        config.testing.enable_testing = true;
    }
    let config_path = save_project_config(&ctx.project_root, &config)?;

    let store_path = config.store.resolve(&ctx.project_root);
    drop(open_store(&store_path)?);
    tracing::info!(store = %store_path.display(), "initialized ember project");

    let report = InitReport {
        config_path: config_path.display().to_string(),
        store_path: store_path.display().to_string(),
        enable_testing: config.testing.enable_testing,
    };
    render(ctx.output, &report, |r, w| {
        writeln!(w, "✓ Initialized ember project")?;
        pretty_kv(w, "config", &r.config_path)?;
        pretty_kv(w, "store", &r.store_path)?;
        pretty_kv(w, "testing", if r.enable_testing { "enabled" } else { "disabled" })
    })
}
