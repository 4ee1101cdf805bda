//! `em nuke`: drop every incident, playbook and timeline row.

use anyhow::{Result, bail};
use clap::Args;

use super::Ctx;
use crate::output::render_success;

#[derive(Args, Debug)]
pub struct NukeArgs {
    /// Confirm the irreversible wipe.
    #[arg(long)]
    pub yes: bool,
}

/// # Errors
///
/// Testing disabled, missing `--yes`, or store failures.
pub fn run_nuke(args: &NukeArgs, ctx: &Ctx) -> Result<()> {
    ctx.require_testing("nuke")?;
    if !args.yes {
        bail!("refusing to wipe the store without --yes");
    }
    let ws = ctx.open()?;
    let dir = ws.directory();
    ws.service(ctx, &dir).nuke_all()?;
    render_success(ctx.output, "Store wiped; users and channels were kept")
}
