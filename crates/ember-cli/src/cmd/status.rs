//! `em status`: post a status update and move the incident.

use anyhow::Result;
use clap::Args;
use std::io::Write;

use ember_core::model::{Status, StatusUpdateOptions};

use super::{Ctx, editor};
use crate::output::render;

#[derive(Args, Debug)]
pub struct StatusArgs {
    pub id: String,

    /// Reported, Active, Resolved or Archived.
    pub status: Status,

    /// Update text posted to the incident channel.
    #[arg(short, long)]
    pub message: String,

    /// Replace the incident description.
    #[arg(short, long)]
    pub description: Option<String>,

    /// Seconds until the next update reminder; 0 disables it.
    #[arg(long, default_value_t = 0)]
    pub reminder: i64,
}

/// # Errors
///
/// Archived incidents, empty messages, non-members, and store failures.
pub fn run_status(args: &StatusArgs, ctx: &Ctx) -> Result<()> {
    let ws = ctx.open()?;
    let dir = ws.directory();
    let service = ws.service(ctx, &dir);
    let actor_id = editor(ctx, &dir, &service, &args.id)?;

    let options = StatusUpdateOptions {
        status: args.status,
        description: args.description.clone().unwrap_or_default(),
        message: args.message.clone(),
        reminder_seconds: args.reminder,
    };
    let incident = service.update_status(&args.id, &actor_id, &options)?;
    render(ctx.output, &incident, |i, w| {
        writeln!(w, "✓ {} is now {}", i.name, i.current_status)
    })
}
