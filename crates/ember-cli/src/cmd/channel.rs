//! `em channel`: register channels and their members in the directory.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use std::io::Write;

use ember_core::collab::{Channel, ChannelProvisioner, ChannelType, Directory};
use ember_core::id::new_id;

use super::Ctx;
use crate::identity::lookup_user;
use crate::output::{render, render_success};

#[derive(Subcommand, Debug)]
pub enum ChannelCommand {
    /// Register a channel in a team.
    Add(ChannelAddArgs),
    /// Add a user to a channel.
    Join(ChannelJoinArgs),
    /// List a team's channels.
    List {
        #[arg(short, long)]
        team: String,
    },
}

#[derive(Args, Debug)]
pub struct ChannelAddArgs {
    /// Channel handle, unique within the team.
    pub name: String,

    #[arg(short, long)]
    pub team: String,

    #[arg(long)]
    pub display_name: Option<String>,

    /// Only members can see a private channel.
    #[arg(long)]
    pub private: bool,

    /// Explicit channel id; generated when omitted.
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Args, Debug)]
pub struct ChannelJoinArgs {
    /// Channel id.
    pub channel: String,

    /// User id or username.
    pub member: String,
}

/// # Errors
///
/// Fails on an unknown channel or user, or a taken channel name.
pub fn run_channel(command: &ChannelCommand, ctx: &Ctx) -> Result<()> {
    let ws = ctx.open()?;
    let dir = ws.directory();
    match command {
        ChannelCommand::Add(args) => {
            let channel = Channel {
                id: args.id.clone().unwrap_or_else(new_id),
                team_id: args.team.clone(),
                name: args.name.clone(),
                display_name: args.display_name.clone().unwrap_or_else(|| args.name.clone()),
                channel_type: if args.private {
                    ChannelType::Private
                } else {
                    ChannelType::Public
                },
            };
            dir.add_channel(&channel)?;
            render(ctx.output, &channel, |c, w| {
                writeln!(w, "✓ Added {} channel ~{} ({})", c.channel_type, c.name, c.id)
            })
        }
        ChannelCommand::Join(args) => {
            if dir.channel(&args.channel)?.is_none() {
                bail!("unknown channel '{}'", args.channel);
            }
            let user_id = lookup_user(&dir, &args.member)?;
            dir.add_member(&args.channel, &user_id)?;
            render_success(ctx.output, &format!("{user_id} joined {}", args.channel))
        }
        ChannelCommand::List { team } => {
            let channels = dir.channels(team)?;
            render(ctx.output, &channels, |channels, w| {
                for c in channels {
                    writeln!(w, "{:<28} ~{:<24} {}", c.id, c.name, c.channel_type)?;
                }
                Ok(())
            })
        }
    }
}
