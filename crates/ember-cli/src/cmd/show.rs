//! `em show`: one incident with checklists, status posts and timeline.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;

use ember_core::model::{Incident, IncidentMetadata, ItemState};
use ember_core::timeline::{TimelineFilter, render_line};

use super::{Ctx, fmt_time, requester};
use crate::output::{pretty_kv, pretty_section, render};

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: String,

    /// Include channel name, member count and post count.
    #[arg(long)]
    pub metadata: bool,

    /// View as an admin.
    #[arg(long)]
    pub admin: bool,
}

#[derive(Serialize)]
struct ShowView {
    incident: Incident,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<IncidentMetadata>,
}

const fn state_mark(state: ItemState) -> &'static str {
    match state {
        ItemState::Open => "[ ]",
        ItemState::InProgress => "[~]",
        ItemState::Closed => "[x]",
    }
}

fn write_incident(view: &ShowView, w: &mut dyn Write) -> std::io::Result<()> {
    let i = &view.incident;
    pretty_section(w, &i.name)?;
    pretty_kv(w, "id", &i.id)?;
    pretty_kv(w, "status", i.current_status.as_str())?;
    pretty_kv(w, "owner", &i.owner_user_id)?;
    pretty_kv(w, "reporter", &i.reporter_user_id)?;
    pretty_kv(w, "team", &i.team_id)?;
    pretty_kv(w, "channel", &i.channel_id)?;
    pretty_kv(w, "created", fmt_time(i.create_at))?;
    pretty_kv(w, "ended", fmt_time(i.end_at))?;
    if !i.playbook_id.is_empty() {
        pretty_kv(w, "playbook", &i.playbook_id)?;
    }
    if !i.description.is_empty() {
        pretty_kv(w, "description", &i.description)?;
    }
    if let Some(ref meta) = view.metadata {
        pretty_kv(w, "channel name", &meta.channel_name)?;
        pretty_kv(w, "members", meta.num_members.to_string())?;
        pretty_kv(w, "posts", meta.total_posts.to_string())?;
    }

    let (total, done) = i.progress();
    writeln!(w)?;
    pretty_section(w, &format!("Checklists ({done}/{total} done)"))?;
    for (ci, checklist) in i.checklists.iter().enumerate() {
        writeln!(w, "[{ci}] {}", checklist.title)?;
        for (ii, item) in checklist.items.iter().enumerate() {
            write!(w, "    {ci}.{ii} {} {}", state_mark(item.state), item.title)?;
            if !item.assignee_id.is_empty() {
                write!(w, " @{}", item.assignee_id)?;
            }
            if !item.command.is_empty() {
                write!(w, " `{}`", item.command)?;
            }
            writeln!(w)?;
        }
    }

    if !i.status_posts.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Status posts")?;
        for post in &i.status_posts {
            writeln!(w, "{}  {:<9} {}", fmt_time(post.create_at), post.status, post.id)?;
        }
    }

    writeln!(w)?;
    pretty_section(w, "Timeline")?;
    for event in TimelineFilter::default().apply(&i.timeline_events) {
        writeln!(w, "{}", render_line(i, event))?;
    }
    Ok(())
}

/// # Errors
///
/// Not found, forbidden, or store failures.
pub fn run_show(args: &ShowArgs, ctx: &Ctx) -> Result<()> {
    let ws = ctx.open()?;
    let dir = ws.directory();
    let service = ws.service(ctx, &dir);
    let who = requester(ctx, &dir, args.admin)?;

    let incident = service.get_incident_for(&who, &args.id)?;
    let metadata = if args.metadata {
        Some(service.get_incident_metadata(&args.id)?)
    } else {
        None
    };
    render(ctx.output, &ShowView { incident, metadata }, write_incident)
}
