//! Filtered, sorted and paginated incident listings with visibility.

mod common;

use common::{TEAM, open_incident, seed_people, service, set_status, store};
use ember_core::collab::ChannelProvisioner;
use ember_core::db::directory::SqliteDirectory;
use ember_core::db::incidents;
use ember_core::db::query::{IncidentFilter, SortDirection, SortField};
use ember_core::model::{Incident, Status};
use ember_core::permissions::RequesterInfo;
use ember_core::telemetry::Tracker;
use ember_core::Error;
use proptest::prelude::*;
use std::collections::HashSet;

fn names(results: &[Incident]) -> Vec<&str> {
    results.iter().map(|i| i.name.as_str()).collect()
}

fn sorted_by_name() -> IncidentFilter {
    IncidentFilter {
        sort: SortField::Name,
        direction: SortDirection::Asc,
        ..IncidentFilter::default()
    }
}

#[test]
fn private_incidents_are_hidden_from_non_members() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let svc = service(&conn, &dir, Tracker::disabled());
    open_incident(&svc, "Public outage", "alice", true);
    open_incident(&svc, "Private breach", "alice", false);

    let filter = sorted_by_name();
    let as_bob = svc.get_incidents(&RequesterInfo::member("bob"), &filter).expect("bob");
    assert_eq!(names(&as_bob.items), ["Public outage"]);
    assert_eq!(as_bob.total_count, 1);

    let as_alice = svc.get_incidents(&RequesterInfo::member("alice"), &filter).expect("alice");
    assert_eq!(names(&as_alice.items), ["Private breach", "Public outage"]);

    let as_admin = svc.get_incidents(&RequesterInfo::admin("carol"), &filter).expect("admin");
    assert_eq!(as_admin.total_count, 2);

    let as_guest = svc.get_incidents(&RequesterInfo::guest("carol"), &filter).expect("guest");
    assert!(as_guest.items.is_empty());
}

#[test]
fn single_incident_reads_apply_the_same_rule() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let svc = service(&conn, &dir, Tracker::disabled());
    let private = open_incident(&svc, "Private breach", "alice", false);

    let err = svc
        .get_incident_for(&RequesterInfo::member("bob"), &private.id)
        .expect_err("hidden");
    assert!(matches!(err, Error::Forbidden(_)));

    dir.add_member(&private.channel_id, "bob").expect("join");
    assert!(svc.get_incident_for(&RequesterInfo::member("bob"), &private.id).is_ok());
    assert!(svc.check_edit(&RequesterInfo::member("bob"), &private.id).is_ok());
    assert!(matches!(
        svc.check_edit(&RequesterInfo::member("carol"), &private.id),
        Err(Error::Forbidden(_))
    ));
}

#[test]
fn filters_compose_conjunctively() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let svc = service(&conn, &dir, Tracker::disabled());
    let a = open_incident(&svc, "Redis eviction storm", "alice", true);
    let b = open_incident(&svc, "Redis failover", "bob", true);
    open_incident(&svc, "Kafka lag", "alice", true);
    set_status(&svc, &a.id, "alice", Status::Active);
    set_status(&svc, &b.id, "bob", Status::Resolved);
    let admin = RequesterInfo::admin("root");

    let redis = svc
        .get_incidents(
            &admin,
            &IncidentFilter {
                search_term: Some("REDIS".into()),
                ..sorted_by_name()
            },
        )
        .expect("search");
    assert_eq!(names(&redis.items), ["Redis eviction storm", "Redis failover"]);

    let alice_redis = svc
        .get_incidents(
            &admin,
            &IncidentFilter {
                search_term: Some("redis".into()),
                owner_id: Some("alice".into()),
                ..sorted_by_name()
            },
        )
        .expect("owner + search");
    assert_eq!(names(&alice_redis.items), ["Redis eviction storm"]);

    let in_progress = svc
        .get_incidents(
            &admin,
            &IncidentFilter {
                statuses: vec![Status::Reported, Status::Active],
                ..sorted_by_name()
            },
        )
        .expect("statuses");
    assert_eq!(names(&in_progress.items), ["Kafka lag", "Redis eviction storm"]);

    let bobs = svc
        .get_incidents(
            &admin,
            &IncidentFilter {
                member_id: Some("BOB".into()),
                ..sorted_by_name()
            },
        )
        .expect("member");
    assert_eq!(names(&bobs.items), ["Redis failover"]);

    let other_team = svc
        .get_incidents(
            &admin,
            &IncidentFilter {
                team_id: Some("team-blue".into()),
                ..sorted_by_name()
            },
        )
        .expect("team");
    assert_eq!(other_team.total_count, 0);
    assert_eq!(other_team.page_count, 0);
    assert!(!other_team.has_more);
    assert_eq!(
        svc.get_incidents(&admin, &IncidentFilter { team_id: Some(TEAM.into()), ..sorted_by_name() })
            .expect("own team")
            .total_count,
        3
    );
}

#[test]
fn search_wildcards_match_literally() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let svc = service(&conn, &dir, Tracker::disabled());
    open_incident(&svc, "100% CPU", "alice", true);
    open_incident(&svc, "1000 CPUs idle", "alice", true);

    let hits = svc
        .get_incidents(
            &RequesterInfo::admin("root"),
            &IncidentFilter {
                search_term: Some("0%".into()),
                ..sorted_by_name()
            },
        )
        .expect("search");
    assert_eq!(names(&hits.items), ["100% CPU"]);
}

#[test]
fn search_folds_case_beyond_ascii() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let svc = service(&conn, &dir, Tracker::disabled());
    let paiement = open_incident(&svc, "ÉCHEC Paiement", "alice", true);
    open_incident(&svc, "Echec cache", "alice", true);
    let admin = RequesterInfo::admin("root");

    let search = |term: &str| {
        svc.get_incidents(
            &admin,
            &IncidentFilter {
                search_term: Some(term.into()),
                ..sorted_by_name()
            },
        )
        .expect("search")
    };
    let hits = search("échec");
    assert_eq!(hits.total_count, 1);
    assert_eq!(hits.items[0].id, paiement.id);
    assert_eq!(names(&search("ÉCHEC PAIE").items), ["ÉCHEC Paiement"]);

    incidents::update_incident(
        &conn,
        &Incident {
            name: "ÄRGER Paiement".into(),
            ..paiement
        },
    )
    .expect("rename");
    assert!(search("échec").items.is_empty());
    assert_eq!(names(&search("ärger").items), ["ÄRGER Paiement"]);
}

#[test]
fn contradictory_status_filters_are_rejected() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    let svc = service(&conn, &dir, Tracker::disabled());
    let err = svc
        .get_incidents(
            &RequesterInfo::admin("root"),
            &IncidentFilter {
                status: Some(Status::Active),
                statuses: vec![Status::Reported],
                ..IncidentFilter::default()
            },
        )
        .expect_err("both forms");
    assert!(matches!(err, Error::InvalidFilterCombination(_)));
}

#[test]
fn default_sort_is_newest_first() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let svc = service(&conn, &dir, Tracker::disabled());
    for name in ["first", "second", "third"] {
        open_incident(&svc, name, "alice", true);
    }
    let listed = svc
        .get_incidents(&RequesterInfo::admin("root"), &IncidentFilter::default())
        .expect("list");
    assert_eq!(names(&listed.items), ["third", "second", "first"]);
}

#[test]
fn owners_are_distinct_and_named() {
    let conn = store();
    let dir = SqliteDirectory::new(&conn);
    seed_people(&dir);
    let svc = service(&conn, &dir, Tracker::disabled());
    open_incident(&svc, "one", "bob", true);
    open_incident(&svc, "two", "alice", true);
    open_incident(&svc, "three", "bob", true);
    open_incident(&svc, "secret", "carol", false);

    let owners = svc
        .get_owners(&RequesterInfo::member("alice"), &IncidentFilter::default())
        .expect("owners");
    let usernames: Vec<&str> = owners.iter().map(|o| o.username.as_str()).collect();
    assert_eq!(usernames, ["alice", "bob"]);
}

/// Every id, in listing order, read `per_page` at a time until `has_more`
/// clears.
fn paged_ids(
    svc: &ember_core::IncidentService<'_>,
    filter: &IncidentFilter,
    per_page: u32,
    total: usize,
) -> Result<Vec<String>, TestCaseError> {
    let admin = RequesterInfo::admin("root");
    let total_i64 = i64::try_from(total).expect("small");
    let mut seen = Vec::new();
    let mut page = 0;
    loop {
        let results = svc
            .get_incidents(&admin, &IncidentFilter { page, per_page, ..filter.clone() })
            .expect("page");
        prop_assert_eq!(results.total_count, total_i64);
        prop_assert_eq!(
            results.page_count,
            total_i64.div_euclid(i64::from(per_page)) + i64::from(total_i64 % i64::from(per_page) != 0)
        );
        prop_assert!(results.items.len() <= per_page as usize);
        seen.extend(results.items.into_iter().map(|i| i.id));
        if !results.has_more {
            break;
        }
        page += 1;
    }
    Ok(seen)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn pages_concatenate_to_the_sorted_listing(
        picks in prop::collection::vec(0usize..3, 0..20),
        per_page in 1u32..8,
    ) {
        let conn = store();
        let dir = SqliteDirectory::new(&conn);
        seed_people(&dir);
        let svc = service(&conn, &dir, Tracker::disabled());
        let created: Vec<Incident> = picks
            .iter()
            .map(|pick| open_incident(&svc, ["bravo", "alpha", "charlie"][*pick], "alice", true))
            .collect();

        let admin = RequesterInfo::admin("root");
        for sort in [SortField::Name, SortField::CreateAt] {
            for direction in [SortDirection::Asc, SortDirection::Desc] {
                let filter = IncidentFilter { sort, direction, ..IncidentFilter::default() };

                let mut expected: Vec<&Incident> = created.iter().collect();
                expected.sort_by(|a, b| {
                    let by_key = match sort {
                        SortField::Name => a.name.cmp(&b.name),
                        _ => a.create_at.cmp(&b.create_at),
                    };
                    let by_key = if direction == SortDirection::Desc { by_key.reverse() } else { by_key };
                    by_key.then_with(|| a.id.cmp(&b.id))
                });
                let expected: Vec<String> = expected.into_iter().map(|i| i.id.clone()).collect();

                let unpaged: Vec<String> = svc
                    .get_incidents(&admin, &filter)
                    .expect("unpaged")
                    .items
                    .into_iter()
                    .map(|i| i.id)
                    .collect();
                prop_assert_eq!(&unpaged, &expected);

                let paged = paged_ids(&svc, &filter, per_page, created.len())?;
                prop_assert_eq!(&paged, &expected);
                let unique: HashSet<&String> = paged.iter().collect();
                prop_assert_eq!(unique.len(), created.len());
            }
        }
    }
}
