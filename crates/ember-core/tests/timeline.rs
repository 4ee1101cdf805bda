//! Manual timeline entries, timeline queries and the retrospective.

mod common;

use common::{TEAM, open_incident, seed_people, service, set_status, store};
use ember_core::db::directory::SqliteDirectory;
use ember_core::model::{Checklist, ChecklistItem, Incident, ItemState, Status, TimelineEventType};
use ember_core::telemetry::{MemorySink, TelemetryConfig, Tracker};
use ember_core::timeline::{TimelineFilter, render_line};
use ember_core::{Error, NewTimelineEntry};
use std::sync::Arc;

#[test]
fn manual_entries_can_be_backdated_and_removed() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let sink = MemorySink::new();
    let svc = service(
        &conn,
        &dir,
        Tracker::new(Arc::new(sink.clone()), TelemetryConfig::default()),
    );
    let incident = open_incident(&svc, "Latency spike", "alice", true);

    let entry = svc
        .add_timeline_event(
            &incident.id,
            "bob",
            NewTimelineEntry {
                summary: "First customer report".into(),
                details: "ticket 4411".into(),
                event_at: incident.create_at - 60_000,
                post_id: String::new(),
            },
        )
        .expect("add");
    assert_eq!(entry.event_type, TimelineEventType::EventFromPost);
    assert_eq!(entry.creator_user_id, "bob");

    let reloaded = svc.get_incident(&incident.id).expect("reload");
    assert_eq!(reloaded.timeline_events[0].id, entry.id, "backdated entry sorts first");
    assert_eq!(
        render_line(&reloaded, &reloaded.timeline_events[0]),
        format!("+{:<8} {:<24} First customer report", "0m", "event_from_post")
    );

    svc.remove_timeline_event(&incident.id, "bob", &entry.id)
        .expect("remove");
    let after = svc.get_incident(&incident.id).expect("reload");
    assert!(after.timeline_events.iter().all(|e| e.id != entry.id));
    assert!(svc.get_timeline_event(&incident.id, &entry.id).expect("still stored").delete_at > 0);
    assert!(matches!(
        svc.remove_timeline_event(&incident.id, "bob", &entry.id),
        Err(Error::NotFound { .. })
    ));

    assert_eq!(
        sink.names(),
        [
            ("incident", "create"),
            ("incident", "add_timeline_event_from_post"),
            ("incident", "remove_timeline_event"),
        ]
    );
}

#[test]
fn empty_summary_is_rejected() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let svc = service(&conn, &dir, Tracker::disabled());
    let incident = open_incident(&svc, "x", "alice", true);
    let err = svc
        .add_timeline_event(&incident.id, "alice", NewTimelineEntry::default())
        .expect_err("blank");
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn query_can_hide_task_noise_and_select_types() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let svc = service(&conn, &dir, Tracker::disabled());
    let mut incident = Incident::new("Replica lag", "alice", TEAM);
    incident.checklists = vec![Checklist::new("Fix", vec![ChecklistItem::new("promote replica")])];
    let incident = svc.create_incident(incident, None, true).expect("create");
    svc.modify_checked_state(&incident.id, "alice", 0, 0, ItemState::Closed)
        .expect("check");
    svc.set_assignee(&incident.id, "alice", 0, 0, "bob").expect("assign");
    set_status(&svc, &incident.id, "alice", Status::Active);
    svc.change_owner(&incident.id, "alice", "bob").expect("owner");

    let quiet = svc
        .query_timeline(
            &incident.id,
            &TimelineFilter {
                hide_task_noise: true,
                ..TimelineFilter::default()
            },
        )
        .expect("quiet");
    let kinds: Vec<TimelineEventType> = quiet.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        [
            TimelineEventType::IncidentCreated,
            TimelineEventType::StatusUpdated,
            TimelineEventType::OwnerChanged,
        ]
    );

    let owners_only = svc
        .query_timeline(
            &incident.id,
            &TimelineFilter {
                types: vec![TimelineEventType::OwnerChanged],
                ..TimelineFilter::default()
            },
        )
        .expect("owner events");
    assert_eq!(owners_only.len(), 1);

    let window = svc
        .query_timeline(
            &incident.id,
            &TimelineFilter {
                since: Some(quiet[1].event_at),
                until: Some(quiet[1].event_at),
                ..TimelineFilter::default()
            },
        )
        .expect("window");
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].event_type, TimelineEventType::StatusUpdated);

    assert!(matches!(
        svc.query_timeline("missing", &TimelineFilter::default()),
        Err(Error::NotFound { what: "incident", .. })
    ));
}

#[test]
fn retrospective_publish_and_cancel() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let svc = service(&conn, &dir, Tracker::disabled());
    let incident = open_incident(&svc, "Data loss", "alice", false);
    set_status(&svc, &incident.id, "alice", Status::Resolved);

    let drafted = svc
        .update_retrospective(&incident.id, "alice", "draft notes")
        .expect("draft");
    assert_eq!(drafted.retrospective.text, "draft notes");
    assert_eq!(drafted.retrospective.published_at, 0);

    let published = svc
        .publish_retrospective(&incident.id, "alice", "final notes")
        .expect("publish");
    assert_eq!(published.retrospective.text, "final notes");
    assert!(published.retrospective.published_at > 0);
    assert!(!published.retrospective.was_canceled);

    let canceled = svc.cancel_retrospective(&incident.id, "bob").expect("cancel");
    assert!(canceled.retrospective.was_canceled);
    assert_eq!(canceled.retrospective.text, "final notes");

    let retro_events: Vec<&str> = canceled
        .timeline_events
        .iter()
        .filter(|e| {
            matches!(
                e.event_type,
                TimelineEventType::PublishedRetrospective | TimelineEventType::CanceledRetrospective
            )
        })
        .map(|e| e.summary.as_str())
        .collect();
    assert_eq!(
        retro_events,
        ["@alice published the retrospective", "@bob canceled the retrospective"]
    );
}
