//! `em timeline`: read, add to, and prune an incident's timeline.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::Write;

use ember_core::NewTimelineEntry;
use ember_core::model::{TimelineEvent, TimelineEventType};
use ember_core::timeline::{TimelineFilter, render_line};

use super::{Ctx, editor, parse_time, requester};
use crate::output::{render, render_success};

#[derive(Args, Debug)]
#[command(args_conflicts_with_subcommands = true)]
pub struct TimelineArgs {
    #[command(subcommand)]
    pub command: Option<TimelineCommand>,

    #[command(flatten)]
    pub query: TimelineQuery,
}

#[derive(Args, Debug)]
pub struct TimelineQuery {
    pub id: Option<String>,

    /// Event type to include (repeatable).
    #[arg(short = 't', long = "type")]
    pub types: Vec<TimelineEventType>,

    /// Only events at or after this time.
    #[arg(long)]
    pub since: Option<String>,

    /// Only events at or before this time.
    #[arg(long)]
    pub until: Option<String>,

    /// Hide assignee, task-state and slash-command entries.
    #[arg(long)]
    pub hide_task_noise: bool,
}

#[derive(Subcommand, Debug)]
pub enum TimelineCommand {
    /// Record a manual timeline entry.
    Add {
        id: String,
        summary: String,
        #[arg(short, long)]
        details: Option<String>,
        /// When it happened; defaults to now.
        #[arg(long)]
        at: Option<String>,
        /// Post the entry was captured from.
        #[arg(long)]
        post: Option<String>,
    },
    /// Remove an entry (soft delete).
    Remove { id: String, event: String },
}

#[derive(Serialize)]
struct Line<'a> {
    #[serde(flatten)]
    event: &'a TimelineEvent,
    line: String,
}

/// # Errors
///
/// Unknown incident or event, bad time values, and store failures.
pub fn run_timeline(args: &TimelineArgs, ctx: &Ctx) -> Result<()> {
    let ws = ctx.open()?;
    let dir = ws.directory();
    let service = ws.service(ctx, &dir);

    match args.command {
        Some(TimelineCommand::Add {
            ref id,
            ref summary,
            ref details,
            ref at,
            ref post,
        }) => {
            let actor_id = editor(ctx, &dir, &service, id)?;
            let entry = NewTimelineEntry {
                summary: summary.clone(),
                details: details.clone().unwrap_or_default(),
                event_at: at.as_deref().map(parse_time).transpose()?.unwrap_or(0),
                post_id: post.clone().unwrap_or_default(),
            };
            let event = service.add_timeline_event(id, &actor_id, entry)?;
            render(ctx.output, &event, |e, w| writeln!(w, "✓ Added timeline entry {}", e.id))
        }
        Some(TimelineCommand::Remove { ref id, ref event }) => {
            let actor_id = editor(ctx, &dir, &service, id)?;
            service.remove_timeline_event(id, &actor_id, event)?;
            render_success(ctx.output, &format!("Removed timeline entry {event}"))
        }
        None => {
            let query = &args.query;
            let Some(ref id) = query.id else {
                anyhow::bail!("an incident id is required; see `em timeline --help`");
            };
            let incident = service.get_incident_for(&requester(ctx, &dir, false)?, id)?;
            let filter = TimelineFilter {
                types: query.types.clone(),
                since: query.since.as_deref().map(parse_time).transpose()?,
                until: query.until.as_deref().map(parse_time).transpose()?,
                hide_task_noise: query.hide_task_noise,
            };
            let events = service.query_timeline(id, &filter)?;
            let lines: Vec<Line<'_>> = events
                .iter()
                .map(|event| Line {
                    event,
                    line: render_line(&incident, event),
                })
                .collect();
            render(ctx.output, &lines, |lines, w| {
                for l in lines {
                    writeln!(w, "{}", l.line)?;
                }
                Ok(())
            })
        }
    }
}
