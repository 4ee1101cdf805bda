//! `em checklist`: add or rename whole checklists.

use anyhow::Result;
use clap::Subcommand;
use std::io::Write;

use ember_core::model::Checklist;

use super::{Ctx, editor};
use crate::output::render;

#[derive(Subcommand, Debug)]
pub enum ChecklistCommand {
    /// Append an empty checklist.
    Add { id: String, title: String },
    /// Rename the checklist at a position.
    Rename {
        id: String,
        checklist: usize,
        title: String,
    },
}

/// # Errors
///
/// Out-of-range positions, empty titles, and store failures.
pub fn run_checklist(command: &ChecklistCommand, ctx: &Ctx) -> Result<()> {
    let ws = ctx.open()?;
    let dir = ws.directory();
    let service = ws.service(ctx, &dir);
    let (ChecklistCommand::Add { id, .. } | ChecklistCommand::Rename { id, .. }) = command;
    let actor_id = editor(ctx, &dir, &service, id)?;

    let incident = match command {
        ChecklistCommand::Add { id, title } => {
            service.add_checklist(id, &actor_id, Checklist::new(title, Vec::new()))?
        }
        ChecklistCommand::Rename {
            id,
            checklist,
            title,
        } => service.rename_checklist(id, &actor_id, *checklist, title)?,
    };
    render(ctx.output, &incident, |i, w| {
        for (ci, c) in i.checklists.iter().enumerate() {
            writeln!(w, "[{ci}] {} ({} items)", c.title, c.items.len())?;
        }
        Ok(())
    })
}
