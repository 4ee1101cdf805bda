//! `em retro`: draft, publish or cancel the retrospective.

use anyhow::Result;
use clap::Subcommand;
use std::io::Write;

use super::{Ctx, editor};
use crate::output::render;

#[derive(Subcommand, Debug)]
pub enum RetroCommand {
    /// Save draft text.
    Update { id: String, text: String },
    /// Publish with final text.
    Publish { id: String, text: String },
    /// Mark the retrospective as not happening.
    Cancel { id: String },
}

/// # Errors
///
/// Unknown incident, non-members, and store failures.
pub fn run_retro(command: &RetroCommand, ctx: &Ctx) -> Result<()> {
    let ws = ctx.open()?;
    let dir = ws.directory();
    let service = ws.service(ctx, &dir);
    let (RetroCommand::Update { id, .. }
    | RetroCommand::Publish { id, .. }
    | RetroCommand::Cancel { id }) = command;
    let actor_id = editor(ctx, &dir, &service, id)?;

    let incident = match command {
        RetroCommand::Update { id, text } => service.update_retrospective(id, &actor_id, text)?,
        RetroCommand::Publish { id, text } => service.publish_retrospective(id, &actor_id, text)?,
        RetroCommand::Cancel { id } => service.cancel_retrospective(id, &actor_id)?,
    };
    render(ctx.output, &incident.retrospective, |r, w| {
        let state = if r.was_canceled {
            "canceled"
        } else if r.published_at > 0 {
            "published"
        } else {
            "draft"
        };
        writeln!(w, "✓ Retrospective {state}")
    })
}
