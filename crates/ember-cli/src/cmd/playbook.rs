//! `em playbook`: manage incident templates.

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use ember_core::model::{Checklist, ChecklistItem, Playbook};

use super::{Ctx, actor, requester};
use crate::output::{pretty_kv, pretty_section, render, render_success};

#[derive(Subcommand, Debug)]
pub enum PlaybookCommand {
    /// Create a playbook from flags or a JSON file.
    Create(PlaybookCreateArgs),
    /// List the playbooks of a team visible to you.
    List {
        #[arg(short, long)]
        team: String,
    },
    /// Show one playbook with its checklists.
    Show { id: String },
    /// Soft-delete a playbook.
    Delete { id: String },
}

#[derive(Args, Debug)]
pub struct PlaybookCreateArgs {
    #[arg(long, required_unless_present = "file")]
    pub title: Option<String>,

    #[arg(short, long, required_unless_present = "file")]
    pub team: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,

    /// Checklist as `Title=item one;item two` (repeatable).
    #[arg(short, long = "checklist")]
    pub checklists: Vec<String>,

    /// Users allowed to use the playbook; empty means everyone.
    #[arg(long = "member")]
    pub members: Vec<String>,

    /// Users invited to every incident created from it.
    #[arg(long = "invite")]
    pub invites: Vec<String>,

    #[arg(long)]
    pub default_owner: Option<String>,

    /// Incidents created from this playbook get a public channel.
    #[arg(long)]
    pub public: bool,

    /// Full playbook as JSON; flags above override its fields.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

/// Parse `Title=item one;item two`. Items are optional.
fn parse_checklist(raw: &str) -> Result<Checklist> {
    let (title, items) = raw.split_once('=').unwrap_or((raw, ""));
    let title = title.trim();
    if title.is_empty() {
        bail!("checklist '{raw}' has no title; use `Title=item;item`");
    }
    let items = items
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ChecklistItem::new)
        .collect();
    Ok(Checklist::new(title, items))
}

fn build_playbook(args: &PlaybookCreateArgs) -> Result<Playbook> {
    let mut playbook = match args.file {
        Some(ref path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str::<Playbook>(&raw)
                .with_context(|| format!("parse playbook {}", path.display()))?
        }
        None => Playbook::default(),
    };
    if let Some(ref title) = args.title {
        playbook.title.clone_from(title);
    }
    if let Some(ref team) = args.team {
        playbook.team_id.clone_from(team);
    }
    if let Some(ref description) = args.description {
        playbook.description.clone_from(description);
    }
    for raw in &args.checklists {
        playbook.checklists.push(parse_checklist(raw)?);
    }
    playbook.member_ids.extend(args.members.iter().cloned());
    playbook.config.invited_user_ids.extend(args.invites.iter().cloned());
    if let Some(ref owner) = args.default_owner {
        playbook.config.default_owner_id.clone_from(owner);
    }
    playbook.create_public_incident |= args.public;
    Ok(playbook)
}

fn write_playbook(p: &Playbook, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &p.title)?;
    pretty_kv(w, "id", &p.id)?;
    pretty_kv(w, "team", &p.team_id)?;
    pretty_kv(w, "steps", p.num_steps().to_string())?;
    if !p.description.is_empty() {
        pretty_kv(w, "description", &p.description)?;
    }
    for (ci, checklist) in p.checklists.iter().enumerate() {
        writeln!(w, "[{ci}] {}", checklist.title)?;
        for (ii, item) in checklist.items.iter().enumerate() {
            writeln!(w, "    {ci}.{ii} {}", item.title)?;
        }
    }
    Ok(())
}

/// # Errors
///
/// Engine validation, access and lookup failures.
pub fn run_playbook(command: &PlaybookCommand, ctx: &Ctx) -> Result<()> {
    let ws = ctx.open()?;
    let dir = ws.directory();
    let service = ws.service(ctx, &dir);
    match command {
        PlaybookCommand::Create(args) => {
            let actor_id = actor(ctx, &dir)?;
            let created = service.create_playbook(&actor_id, build_playbook(args)?)?;
            render(ctx.output, &created, |p, w| {
                writeln!(w, "✓ Created playbook {} ({})", p.title, p.id)
            })
        }
        PlaybookCommand::List { team } => {
            let who = requester(ctx, &dir, false)?;
            let playbooks = service.get_playbooks_for_team(&who, team)?;
            render(ctx.output, &playbooks, |playbooks, w| {
                for p in playbooks {
                    writeln!(w, "{:<28} {:<5} {}", p.id, p.num_steps(), p.title)?;
                }
                Ok(())
            })
        }
        PlaybookCommand::Show { id } => {
            let who = requester(ctx, &dir, false)?;
            let playbook = service.get_playbook_for(&who, id)?;
            render(ctx.output, &playbook, |p, w| write_playbook(p, w))
        }
        PlaybookCommand::Delete { id } => {
            let actor_id = actor(ctx, &dir)?;
            service.delete_playbook(&actor_id, id)?;
            render_success(ctx.output, &format!("Deleted playbook {id}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checklist_spec_parses_title_and_items() {
        let list = parse_checklist("Triage= page on-call ;open bridge;;").expect("parse");
        assert_eq!(list.title, "Triage");
        let titles: Vec<&str> = list.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["page on-call", "open bridge"]);
    }

    #[test]
    fn checklist_without_items_is_allowed() {
        assert!(parse_checklist("Comms").expect("parse").items.is_empty());
        assert!(parse_checklist("=item").is_err());
    }
}
