//! `em owner`: hand the incident to a new owner.

use anyhow::Result;
use clap::Args;
use std::io::Write;

use super::{Ctx, editor};
use crate::identity::lookup_user;
use crate::output::render;

#[derive(Args, Debug)]
pub struct OwnerArgs {
    pub id: String,

    /// New owner id or username.
    pub new_owner: String,
}

/// # Errors
///
/// Unknown incident or user, or store failures.
pub fn run_owner(args: &OwnerArgs, ctx: &Ctx) -> Result<()> {
    let ws = ctx.open()?;
    let dir = ws.directory();
    let service = ws.service(ctx, &dir);
    let actor_id = editor(ctx, &dir, &service, &args.id)?;
    let owner_id = lookup_user(&dir, &args.new_owner)?;

    let incident = service.change_owner(&args.id, &actor_id, &owner_id)?;
    render(ctx.output, &incident, |i, w| {
        writeln!(w, "✓ {} is now owned by {}", i.name, i.owner_user_id)
    })
}
