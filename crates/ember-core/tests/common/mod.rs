//! Shared fixtures for the ember-core integration suites.
#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};

use ember_core::collab::{Channel, ChannelType};
use ember_core::db::directory::SqliteDirectory;
use ember_core::db::open_memory_store;
use ember_core::model::{Incident, Status, StatusUpdateOptions};
use ember_core::telemetry::Tracker;
use ember_core::{Collaborators, IncidentService};
use rusqlite::Connection;

pub const TEAM: &str = "team-red";

static CLOCK: AtomicI64 = AtomicI64::new(1_700_000_000_000);

/// Strictly increasing across every call in the process, one second apart.
pub fn ticking_clock() -> i64 {
    CLOCK.fetch_add(1_000, Ordering::SeqCst)
}

pub fn store() -> Connection {
    open_memory_store().expect("open in-memory store")
}

/// Users `alice`, `bob`, `carol` (team members), `mallory` (outside the
/// team) and the bot `pagerbot`. Ids equal usernames.
pub fn seed_people(dir: &SqliteDirectory<'_>) {
    for name in ["alice", "bob", "carol"] {
        dir.add_user(name, name, false).expect("add user");
        dir.add_team_member(TEAM, name).expect("add team member");
    }
    dir.add_user("mallory", "mallory", false).expect("add user");
    dir.add_user("pagerbot", "pagerbot", true).expect("add bot");
    dir.add_team_member(TEAM, "pagerbot").expect("add team member");
}

pub fn service<'a>(
    conn: &'a Connection,
    dir: &'a SqliteDirectory<'_>,
    tracker: Tracker,
) -> IncidentService<'a> {
    IncidentService::new(conn, Collaborators::sqlite(dir), tracker).with_clock(ticking_clock)
}

pub fn open_incident(service: &IncidentService<'_>, name: &str, owner: &str, public: bool) -> Incident {
    service
        .create_incident(Incident::new(name, owner, TEAM), None, public)
        .expect("create incident")
}

pub fn set_status(service: &IncidentService<'_>, incident_id: &str, actor: &str, status: Status) -> Incident {
    service
        .update_status(
            incident_id,
            actor,
            &StatusUpdateOptions {
                status,
                message: format!("moving to {status}"),
                ..StatusUpdateOptions::default()
            },
        )
        .expect("update status")
}

pub fn public_channel(dir: &SqliteDirectory<'_>, id: &str, name: &str) -> Channel {
    let channel = Channel {
        id: id.into(),
        team_id: TEAM.into(),
        name: name.into(),
        display_name: name.into(),
        channel_type: ChannelType::Public,
    };
    dir.add_channel(&channel).expect("add channel");
    channel
}
