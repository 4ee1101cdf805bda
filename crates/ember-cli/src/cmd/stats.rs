//! `em stats`: dashboard counts.

use anyhow::Result;
use clap::Args;
use std::io::Write;

use ember_core::db::stats::StatsFilter;

use super::Ctx;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct StatsArgs {
    #[arg(short, long)]
    pub team: Option<String>,

    #[arg(short, long)]
    pub playbook: Option<String>,
}

/// # Errors
///
/// Store failures.
pub fn run_stats(args: &StatsArgs, ctx: &Ctx) -> Result<()> {
    let ws = ctx.open()?;
    let dir = ws.directory();
    let service = ws.service(ctx, &dir);

    let filter = StatsFilter {
        team_id: args.team.clone(),
        playbook_id: args.playbook.clone(),
    };
    let stats = service.stats(&filter)?;
    render_mode(
        ctx.output,
        &stats,
        |s, w| {
            writeln!(
                w,
                "reported={} active={} in_progress={} participants={}",
                s.total_reported_incidents,
                s.total_active_incidents,
                s.total_in_progress_incidents,
                s.total_active_participants
            )
        },
        |s, w| {
            pretty_section(w, "Incident stats")?;
            pretty_kv(w, "reported", s.total_reported_incidents.to_string())?;
            pretty_kv(w, "active", s.total_active_incidents.to_string())?;
            pretty_kv(w, "in progress", s.total_in_progress_incidents.to_string())?;
            pretty_kv(w, "participants", s.total_active_participants.to_string())
        },
    )
}
