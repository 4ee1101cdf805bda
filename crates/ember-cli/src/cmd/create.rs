//! `em create`: open a new incident.

use anyhow::Result;
use clap::Args;
use std::io::Write;

use ember_core::model::Incident;

use super::{Ctx, actor, requester};
use crate::identity::lookup_user;
use crate::output::render;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Incident name.
    pub name: String,

    #[arg(short, long)]
    pub team: String,

    /// Owner (id or username); defaults to the acting user.
    #[arg(short, long)]
    pub owner: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,

    /// Seed checklists and settings from this playbook.
    #[arg(short, long)]
    pub playbook: Option<String>,

    /// Attach to an existing channel instead of provisioning one.
    #[arg(long)]
    pub channel: Option<String>,

    /// Provision a private channel (default: public, or the playbook's choice).
    #[arg(long, conflicts_with = "public")]
    pub private: bool,

    #[arg(long)]
    pub public: bool,
}

/// # Errors
///
/// Engine validation failures, an inaccessible playbook, or a channel that
/// already hosts an incident.
pub fn run_create(args: &CreateArgs, ctx: &Ctx) -> Result<()> {
    let ws = ctx.open()?;
    let dir = ws.directory();
    let service = ws.service(ctx, &dir);
    let reporter = actor(ctx, &dir)?;

    let owner = match args.owner {
        Some(ref name) => lookup_user(&dir, name)?,
        None => reporter.clone(),
    };
    let mut incident = Incident::new(&args.name, owner, &args.team);
    incident.reporter_user_id = reporter;
    if let Some(ref description) = args.description {
        incident.description.clone_from(description);
    }
    if let Some(ref channel) = args.channel {
        incident.channel_id.clone_from(channel);
    }

    let playbook = match args.playbook {
        Some(ref id) => Some(service.get_playbook_for(&requester(ctx, &dir, false)?, id)?),
        None => None,
    };
    let public = if args.private {
        false
    } else {
        args.public || playbook.as_ref().is_none_or(|p| p.create_public_incident)
    };

    let created = service.create_incident(incident, playbook.as_ref(), public)?;
    render(ctx.output, &created, |i, w| {
        writeln!(w, "✓ Created incident {} ({})", i.name, i.id)?;
        writeln!(w, "  channel: {}", i.channel_id)
    })
}
