//! Playbook management and incident instantiation from templates.

mod common;

use common::{TEAM, public_channel, seed_people, service, store};
use ember_core::db::directory::SqliteDirectory;
use ember_core::model::{Checklist, ChecklistItem, Incident, Playbook};
use ember_core::permissions::RequesterInfo;
use ember_core::telemetry::{MemorySink, TelemetryConfig, Tracker};
use ember_core::Error;
use std::sync::Arc;

fn outage_playbook() -> Playbook {
    let mut playbook = Playbook::new("Outage", TEAM);
    playbook.checklists = vec![Checklist::new(
        "Triage",
        vec![
            ChecklistItem::new("Page on-call").with_command("/page oncall"),
            ChecklistItem::new("Open status page"),
        ],
    )];
    playbook.retrospective_template = "## What happened".into();
    playbook.retrospective_reminder_interval_seconds = 86_400;
    playbook
}

#[test]
fn create_sanitizes_people_and_channels() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    public_channel(&dir, "announce", "announcements");
    let svc = service(&conn, &dir, Tracker::disabled());

    let mut playbook = outage_playbook();
    playbook.config.invited_user_ids = vec!["bob".into(), "mallory".into()];
    playbook.config.default_owner_id = "mallory".into();
    playbook.config.announcement_channel_id = "announce".into();

    let created = svc.create_playbook("alice", playbook).expect("create");
    assert!(!created.id.is_empty());
    assert_eq!(created.config.invited_user_ids, ["bob"]);
    assert!(created.config.default_owner_id.is_empty());
    assert!(created.config.announcement_channel_id.is_empty());
    assert!(created.checklists[0].items.iter().all(|i| !i.id.is_empty()));
}

#[test]
fn create_rejects_preset_id_and_bad_webhooks() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let svc = service(&conn, &dir, Tracker::disabled());

    let mut preset = outage_playbook();
    preset.id = "chosen".into();
    assert!(matches!(
        svc.create_playbook("alice", preset),
        Err(Error::InvalidInput(_))
    ));

    let mut hook = outage_playbook();
    hook.config.webhook_on_creation_url = "ftp://hooks.example".into();
    assert!(matches!(
        svc.create_playbook("alice", hook),
        Err(Error::InvalidInput(_))
    ));

    let mut ok_hook = outage_playbook();
    ok_hook.config.webhook_on_status_update_url = "https://hooks.example/status".into();
    assert!(svc.create_playbook("alice", ok_hook).is_ok());
}

#[test]
fn incidents_get_an_independent_copy() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let svc = service(&conn, &dir, Tracker::disabled());
    let mut template = outage_playbook();
    template.config.default_owner_id = "bob".into();
    let playbook = svc.create_playbook("alice", template).expect("playbook");

    let incident = svc
        .create_incident(Incident::new("Site down", "alice", TEAM), Some(&playbook), false)
        .expect("incident");
    assert_eq!(incident.owner_user_id, "bob");
    assert_eq!(incident.reporter_user_id, "alice");
    assert_eq!(incident.retrospective.text, "## What happened");
    assert_eq!(incident.retrospective.reminder_interval_seconds, 86_400);
    assert_ne!(incident.checklists[0].id, playbook.checklists[0].id);

    svc.remove_checklist_item(&incident.id, "alice", 0, 0)
        .expect("edit incident copy");
    let template = svc.get_playbook(&playbook.id).expect("reload playbook");
    assert_eq!(template.checklists[0].items.len(), 2);
    assert_eq!(template.num_steps(), 2);
}

#[test]
fn deleted_playbooks_cannot_seed_incidents() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let svc = service(&conn, &dir, Tracker::disabled());
    let playbook = svc.create_playbook("alice", outage_playbook()).expect("playbook");
    svc.delete_playbook("alice", &playbook.id).expect("delete");

    let deleted = svc.get_playbook(&playbook.id).expect("still readable");
    assert!(deleted.delete_at > 0);
    let err = svc
        .create_incident(Incident::new("x", "alice", TEAM), Some(&deleted), false)
        .expect_err("deleted template");
    assert!(matches!(err, Error::InvalidInput(_)));

    assert!(matches!(
        svc.delete_playbook("alice", &playbook.id),
        Err(Error::NotFound { what: "playbook", .. })
    ));
    assert!(matches!(
        svc.update_playbook("alice", deleted),
        Err(Error::NotFound { what: "playbook", .. })
    ));
}

#[test]
fn update_keeps_creation_time() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let svc = service(&conn, &dir, Tracker::disabled());
    let playbook = svc.create_playbook("alice", outage_playbook()).expect("playbook");

    let mut edited = playbook.clone();
    edited.title = "Major outage".into();
    edited.create_at = 1;
    let updated = svc.update_playbook("alice", edited).expect("update");
    assert_eq!(updated.title, "Major outage");
    assert_eq!(updated.create_at, playbook.create_at);
}

#[test]
fn team_listing_respects_membership() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let sink = MemorySink::new();
    let svc = service(
        &conn,
        &dir,
        Tracker::new(Arc::new(sink.clone()), TelemetryConfig::default()),
    );

    svc.create_playbook("alice", outage_playbook()).expect("open playbook");
    let mut restricted = Playbook::new("Security incident", TEAM);
    restricted.member_ids = vec!["alice".into()];
    let restricted = svc.create_playbook("alice", restricted).expect("restricted");

    let for_bob: Vec<String> = svc
        .get_playbooks_for_team(&RequesterInfo::member("bob"), TEAM)
        .expect("bob")
        .into_iter()
        .map(|p| p.title)
        .collect();
    assert_eq!(for_bob, ["Outage"]);

    let for_alice = svc
        .get_playbooks_for_team(&RequesterInfo::member("alice"), TEAM)
        .expect("alice");
    assert_eq!(for_alice.len(), 2);

    assert!(matches!(
        svc.get_playbook_for(&RequesterInfo::member("bob"), &restricted.id),
        Err(Error::Forbidden(_))
    ));
    assert!(svc.get_playbook_for(&RequesterInfo::admin("root"), &restricted.id).is_ok());

    assert_eq!(
        sink.names(),
        [("playbook", "create"), ("playbook", "create")]
    );
}
