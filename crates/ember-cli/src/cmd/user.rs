//! `em user`: register users and team memberships in the directory.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::io::Write;

use super::Ctx;
use crate::output::render;

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Register a user.
    Add(UserAddArgs),
    /// List registered users.
    List,
}

#[derive(Args, Debug)]
pub struct UserAddArgs {
    /// Username (without `@`).
    pub username: String,

    /// Explicit user id; defaults to the username.
    #[arg(long)]
    pub id: Option<String>,

    /// Mark the user as a bot; bots never count as participants.
    #[arg(long)]
    pub bot: bool,

    /// Teams to join (repeatable).
    #[arg(short, long = "team")]
    pub teams: Vec<String>,
}

/// # Errors
///
/// Fails when the store is not initialized or the user already exists.
pub fn run_user(command: &UserCommand, ctx: &Ctx) -> Result<()> {
    let ws = ctx.open()?;
    let dir = ws.directory();
    match command {
        UserCommand::Add(args) => {
            let username = args.username.trim_start_matches('@');
            let id = args.id.as_deref().unwrap_or(username);
            let user = dir.add_user(id, username, args.bot)?;
            for team in &args.teams {
                dir.add_team_member(team, &user.id)?;
            }
            tracing::info!(user_id = %user.id, teams = args.teams.len(), "registered user");
            render(ctx.output, &user, |u, w| {
                writeln!(w, "✓ Added @{} ({})", u.username, u.id)
            })
        }
        UserCommand::List => {
            let users = dir.users()?;
            render(ctx.output, &users, |users, w| {
                for u in users {
                    let kind = if u.is_bot { "bot" } else { "user" };
                    writeln!(w, "{:<28} @{:<20} {kind}", u.id, u.username)?;
                }
                Ok(())
            })
        }
    }
}
