//! `em list`: filtered, paginated incident listing.

use anyhow::Result;
use clap::Args;
use std::io::Write;

use ember_core::db::query::{GetIncidentsResults, IncidentFilter, SortDirection, SortField};
use ember_core::model::Status;

use super::{Ctx, fmt_time, requester};
use crate::identity::lookup_user;
use crate::output::{render, render_mode};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(short, long)]
    pub team: Option<String>,

    /// Status to include (repeatable).
    #[arg(short, long = "status")]
    pub statuses: Vec<Status>,

    /// Owner id or username.
    #[arg(short, long)]
    pub owner: Option<String>,

    /// Only incidents whose channel has this member.
    #[arg(short, long)]
    pub member: Option<String>,

    #[arg(short, long)]
    pub playbook: Option<String>,

    /// Case-insensitive substring of the name.
    #[arg(short = 'q', long)]
    pub search: Option<String>,

    #[arg(long, default_value = "create_at")]
    pub sort: SortField,

    #[arg(long, default_value = "desc")]
    pub direction: SortDirection,

    /// Zero-based page.
    #[arg(long, default_value_t = 0)]
    pub page: u32,

    /// Page size; defaults to `[query] default_per_page`.
    #[arg(short = 'n', long)]
    pub per_page: Option<u32>,

    /// List distinct owners of the matching incidents instead.
    #[arg(long)]
    pub owners: bool,

    /// List as an admin (every incident is visible).
    #[arg(long)]
    pub admin: bool,
}

fn write_pretty(page: &GetIncidentsResults, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "{:<28} {:<9} {:<16} {:<16} NAME", "ID", "STATUS", "OWNER", "CREATED")?;
    for i in &page.items {
        writeln!(
            w,
            "{:<28} {:<9} {:<16} {:<16} {}",
            i.id,
            i.current_status,
            i.owner_user_id,
            fmt_time(i.create_at),
            i.name
        )?;
    }
    writeln!(
        w,
        "{} incident(s), page count {}{}",
        page.total_count,
        page.page_count,
        if page.has_more { ", more available" } else { "" }
    )
}

/// # Errors
///
/// Invalid filter combinations, unknown users, or store failures.
pub fn run_list(args: &ListArgs, ctx: &Ctx) -> Result<()> {
    let ws = ctx.open()?;
    let dir = ws.directory();
    let service = ws.service(ctx, &dir);
    let who = requester(ctx, &dir, args.admin)?;

    let filter = IncidentFilter {
        team_id: args.team.clone(),
        status: None,
        statuses: args.statuses.clone(),
        owner_id: args.owner.as_deref().map(|o| lookup_user(&dir, o)).transpose()?,
        member_id: args.member.as_deref().map(|m| lookup_user(&dir, m)).transpose()?,
        playbook_id: args.playbook.clone(),
        search_term: args.search.clone(),
        sort: args.sort,
        direction: args.direction,
        page: args.page,
        per_page: args
            .per_page
            .unwrap_or(ctx.config.project.query.default_per_page),
    };

    if args.owners {
        let owners = service.get_owners(&who, &filter)?;
        return render(ctx.output, &owners, |owners, w| {
            for o in owners {
                writeln!(w, "{:<28} @{}", o.user_id, o.username)?;
            }
            Ok(())
        });
    }

    let page = service.get_incidents(&who, &filter)?;
    render_mode(
        ctx.output,
        &page,
        |page, w| {
            for i in &page.items {
                writeln!(w, "{}\t{}\t{}\t{}", i.id, i.current_status, i.owner_user_id, i.name)?;
            }
            Ok(())
        },
        write_pretty,
    )
}
