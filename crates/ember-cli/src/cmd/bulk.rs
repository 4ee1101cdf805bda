//! `em bulk-data`: fill the store with generated incidents.

use anyhow::Result;
use clap::Args;
use std::io::Write;

use ember_core::model::now_millis;
use ember_core::permissions::RequesterInfo;
use ember_sim::{BulkOptions, generate};

use super::{Ctx, actor};
use crate::output::render;

#[derive(Args, Debug)]
pub struct BulkArgs {
    /// Incidents left in progress.
    pub ongoing: usize,

    /// Incidents archived after creation.
    pub ended: usize,

    /// Spread creation times over this many past days.
    pub days: u32,

    /// Seed for names, times and playbook picks.
    #[arg(default_value_t = 1)]
    pub seed: u64,

    #[arg(short, long)]
    pub team: String,
}

/// # Errors
///
/// Testing disabled, no usable playbook, or engine failures.
pub fn run_bulk(args: &BulkArgs, ctx: &Ctx) -> Result<()> {
    ctx.require_testing("bulk-data")?;
    let ws = ctx.open()?;
    let dir = ws.directory();
    let service = ws.service(ctx, &dir);
    let who = RequesterInfo::member(actor(ctx, &dir)?);

    let options = BulkOptions {
        ongoing: args.ongoing,
        ended: args.ended,
        days: args.days,
        seed: args.seed,
        now: now_millis(),
    };
    let made = generate(&service, &who, &args.team, &options)?;
    render(ctx.output, &made, |made, w| {
        if made.is_empty() {
            return writeln!(w, "Zero incidents created.");
        }
        writeln!(w, "{:<40} {:<10} STATUS", "INCIDENT", "CREATED")?;
        for g in made {
            writeln!(w, "{:<40} {:<10} {}", g.name, g.created_date(), g.state_label())?;
        }
        writeln!(w, "{} incident(s) created.", made.len())
    })
}
