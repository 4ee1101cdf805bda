//! `em item`: checklist item edits, state, assignment and commands.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use std::io::Write;

use ember_core::checklist::ItemEdit;
use ember_core::model::{ChecklistItem, Incident, ItemState};

use super::{Ctx, editor};
use crate::identity::lookup_user;
use crate::output::{render, render_success};

/// Incident id plus a checklist position.
#[derive(Args, Debug)]
pub struct ChecklistRef {
    pub id: String,
    pub checklist: usize,
}

/// Incident id plus checklist and item positions.
#[derive(Args, Debug)]
pub struct ItemRef {
    pub id: String,
    pub checklist: usize,
    pub item: usize,
}

#[derive(Subcommand, Debug)]
pub enum ItemCommand {
    /// Append an item to a checklist.
    Add {
        #[command(flatten)]
        at: ChecklistRef,
        title: String,
        /// Slash command the item can run.
        #[arg(long)]
        command: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Remove an item; later items shift up.
    Remove {
        #[command(flatten)]
        at: ItemRef,
    },
    /// Change an item's title, command or description.
    Edit {
        #[command(flatten)]
        at: ItemRef,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        command: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Move an item within its checklist.
    Move {
        #[command(flatten)]
        at: ChecklistRef,
        source: usize,
        dest: usize,
    },
    /// Set an item's state, or toggle it when `--state` is omitted.
    Check {
        #[command(flatten)]
        at: ItemRef,
        /// open, in_progress or closed.
        #[arg(long)]
        state: Option<ItemState>,
    },
    /// Assign an item; pass `-` to clear.
    Assign {
        #[command(flatten)]
        at: ItemRef,
        assignee: String,
    },
    /// Run the item's slash command.
    Run {
        #[command(flatten)]
        at: ItemRef,
    },
}

impl ItemCommand {
    fn incident_id(&self) -> &str {
        match self {
            Self::Add { at, .. } | Self::Move { at, .. } => &at.id,
            Self::Remove { at }
            | Self::Edit { at, .. }
            | Self::Check { at, .. }
            | Self::Assign { at, .. }
            | Self::Run { at } => &at.id,
        }
    }
}

fn write_checklists(i: &Incident, w: &mut dyn Write) -> std::io::Result<()> {
    for (ci, checklist) in i.checklists.iter().enumerate() {
        writeln!(w, "[{ci}] {}", checklist.title)?;
        for (ii, item) in checklist.items.iter().enumerate() {
            writeln!(w, "    {ci}.{ii} ({}) {}", item.state, item.title)?;
        }
    }
    Ok(())
}

fn current_item(incident: &Incident, at: &ItemRef) -> Result<ChecklistItem> {
    ember_core::checklist::item(&incident.checklists, at.checklist, at.item)
        .cloned()
        .with_context(|| format!("item {}.{} of {}", at.checklist, at.item, incident.id))
}

/// # Errors
///
/// Out-of-range positions, unknown users, command failures, and store
/// failures.
pub fn run_item(command: &ItemCommand, ctx: &Ctx) -> Result<()> {
    let ws = ctx.open()?;
    let dir = ws.directory();
    let service = ws.service(ctx, &dir);
    let actor_id = editor(ctx, &dir, &service, command.incident_id())?;

    let incident = match command {
        ItemCommand::Add {
            at,
            title,
            command,
            description,
        } => {
            let mut item = ChecklistItem::new(title);
            item.command = command.clone().unwrap_or_default();
            item.description = description.clone().unwrap_or_default();
            service.add_checklist_item(&at.id, &actor_id, at.checklist, item)?
        }
        ItemCommand::Remove { at } => {
            service.remove_checklist_item(&at.id, &actor_id, at.checklist, at.item)?
        }
        ItemCommand::Edit {
            at,
            title,
            command,
            description,
        } => {
            let existing = current_item(&service.get_incident(&at.id)?, at)?;
            let edit = ItemEdit {
                title: title.clone().unwrap_or(existing.title),
                command: command.clone().unwrap_or(existing.command),
                description: description.clone().unwrap_or(existing.description),
            };
            service.edit_checklist_item(&at.id, &actor_id, at.checklist, at.item, edit)?
        }
        ItemCommand::Move { at, source, dest } => {
            service.move_checklist_item(&at.id, &actor_id, at.checklist, *source, *dest)?
        }
        ItemCommand::Check { at, state } => match state {
            Some(state) => {
                service.modify_checked_state(&at.id, &actor_id, at.checklist, at.item, *state)?
            }
            None => service.toggle_checked_state(&at.id, &actor_id, at.checklist, at.item)?,
        },
        ItemCommand::Assign { at, assignee } => {
            let assignee_id = if assignee == "-" {
                String::new()
            } else {
                lookup_user(&dir, assignee)?
            };
            service.set_assignee(&at.id, &actor_id, at.checklist, at.item, &assignee_id)?
        }
        ItemCommand::Run { at } => {
            let ran = service.run_checklist_item_slash_command(&at.id, &actor_id, at.checklist, at.item)?;
            return render_success(ctx.output, &format!("Ran {ran}"));
        }
    };
    render(ctx.output, &incident, write_checklists)
}
