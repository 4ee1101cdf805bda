//! Incident rows, status posts and channel-side counts.

use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter, types::Type};
use std::collections::HashMap;

use super::{fold_name, migrations, placeholders, read_snapshot, schema, timeline, write_tx};
use crate::error::{Error, Result, StoreResultExt};
use crate::model::{
    Checklist, Incident, IncidentConfig, Retrospective, Status, StatusPost, now_millis,
};

/// Column list shared by every incident `SELECT`. Callers alias the table
/// as `i`.
pub(crate) const INCIDENT_COLUMNS: &str = "i.id, i.name, i.description, i.owner_user_id, \
     i.reporter_user_id, i.team_id, i.channel_id, i.create_at, i.end_at, i.delete_at, \
     i.post_id, i.playbook_id, i.current_status, i.last_status_update_at, \
     i.checklists_json, i.config_json, i.retrospective, i.retrospective_published_at, \
     i.retrospective_was_canceled, i.retrospective_reminder_interval_seconds";

/// A row as read from SQLite, before the JSON columns are decoded.
pub(crate) struct IncidentRow {
    incident: Incident,
    checklists_json: String,
    config_json: String,
}

impl IncidentRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status_raw: String = row.get(12)?;
        let current_status = status_raw.parse::<Status>().map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(12, Type::Text, Box::new(err))
        })?;

        let mut incident = Incident::new(
            row.get::<_, String>(1)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(5)?,
        );
        incident.id = row.get(0)?;
        incident.description = row.get(2)?;
        incident.reporter_user_id = row.get(4)?;
        incident.channel_id = row.get(6)?;
        incident.create_at = row.get(7)?;
        incident.end_at = row.get(8)?;
        incident.delete_at = row.get(9)?;
        incident.post_id = row.get(10)?;
        incident.playbook_id = row.get(11)?;
        incident.current_status = current_status;
        incident.last_status_update_at = row.get(13)?;
        incident.retrospective = Retrospective {
            text: row.get(16)?,
            published_at: row.get(17)?,
            was_canceled: row.get(18)?,
            reminder_interval_seconds: row.get(19)?,
        };

        Ok(Self {
            incident,
            checklists_json: row.get(14)?,
            config_json: row.get(15)?,
        })
    }

    pub(crate) fn decode(self) -> Result<Incident> {
        let mut incident = self.incident;
        incident.checklists = serde_json::from_str::<Vec<Checklist>>(&self.checklists_json)
            .map_err(|source| Error::CorruptData {
                what: format!("checklists of incident {}", incident.id),
                source,
            })?;
        incident.config = serde_json::from_str::<IncidentConfig>(&self.config_json).map_err(
            |source| Error::CorruptData {
                what: format!("config of incident {}", incident.id),
                source,
            },
        )?;
        Ok(incident)
    }
}

pub(crate) fn encode_checklists(checklists: &[Checklist]) -> Result<String> {
    serde_json::to_string(checklists).map_err(|source| Error::CorruptData {
        what: "checklists".to_string(),
        source,
    })
}

pub(crate) fn encode_config(config: &IncidentConfig) -> Result<String> {
    serde_json::to_string(config).map_err(|source| Error::CorruptData {
        what: "incident config".to_string(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Insert a new incident row. `incident.id` must already be assigned.
///
/// # Errors
///
/// [`Error::DuplicateEntry`] when the id or the live channel is taken.
pub fn insert_incident(conn: &Connection, incident: &Incident) -> Result<()> {
    if incident.id.is_empty() {
        return Err(Error::InvalidInput("incident id must be set before insert".into()));
    }
    let checklists = encode_checklists(&incident.checklists)?;
    let config = encode_config(&incident.config)?;

    conn.execute(
        "INSERT INTO incidents (
            id, name, description, owner_user_id, reporter_user_id, team_id, channel_id,
            create_at, end_at, delete_at, post_id, playbook_id, current_status,
            last_status_update_at, checklists_json, config_json, retrospective,
            retrospective_published_at, retrospective_was_canceled,
            retrospective_reminder_interval_seconds, name_lower
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
        params![
            incident.id,
            incident.name,
            incident.description,
            incident.owner_user_id,
            incident.reporter_user_id,
            incident.team_id,
            incident.channel_id,
            incident.create_at,
            incident.end_at,
            incident.delete_at,
            incident.post_id,
            incident.playbook_id,
            incident.current_status.as_str(),
            incident.last_status_update_at,
            checklists,
            config,
            incident.retrospective.text,
            incident.retrospective.published_at,
            incident.retrospective.was_canceled,
            incident.retrospective.reminder_interval_seconds,
            fold_name(&incident.name),
        ],
    )
    .with_store(|| format!("incident in channel {}", incident.channel_id))?;
    Ok(())
}

/// Rewrite every mutable column of an existing incident.
///
/// # Errors
///
/// [`Error::NotFound`] when no row has `incident.id`.
pub fn update_incident(conn: &Connection, incident: &Incident) -> Result<()> {
    let checklists = encode_checklists(&incident.checklists)?;
    let config = encode_config(&incident.config)?;

    let changed = conn
        .execute(
            "UPDATE incidents SET
                name = ?2, description = ?3, owner_user_id = ?4, end_at = ?5, delete_at = ?6,
                current_status = ?7, last_status_update_at = ?8, checklists_json = ?9,
                config_json = ?10, retrospective = ?11, retrospective_published_at = ?12,
                retrospective_was_canceled = ?13, retrospective_reminder_interval_seconds = ?14,
                name_lower = ?15
             WHERE id = ?1",
            params![
                incident.id,
                incident.name,
                incident.description,
                incident.owner_user_id,
                incident.end_at,
                incident.delete_at,
                incident.current_status.as_str(),
                incident.last_status_update_at,
                checklists,
                config,
                incident.retrospective.text,
                incident.retrospective.published_at,
                incident.retrospective.was_canceled,
                incident.retrospective.reminder_interval_seconds,
                fold_name(&incident.name),
            ],
        )
        .with_store(|| format!("update incident {}", incident.id))?;

    if changed == 0 {
        return Err(Error::not_found("incident", &incident.id));
    }
    Ok(())
}

/// Persist only the checklist document of an incident.
///
/// # Errors
///
/// [`Error::NotFound`] when the incident does not exist.
pub fn update_checklists(conn: &Connection, incident_id: &str, checklists: &[Checklist]) -> Result<()> {
    let json = encode_checklists(checklists)?;
    let changed = conn
        .execute(
            "UPDATE incidents SET checklists_json = ?2 WHERE id = ?1",
            params![incident_id, json],
        )
        .with_store(|| format!("update checklists of {incident_id}"))?;
    if changed == 0 {
        return Err(Error::not_found("incident", incident_id));
    }
    Ok(())
}

/// Overwrite `create_at`. Test-data tooling only.
///
/// # Errors
///
/// [`Error::NotFound`] when no row was affected.
pub fn change_creation_date(conn: &Connection, incident_id: &str, timestamp: i64) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE incidents SET create_at = ?2 WHERE id = ?1",
            params![incident_id, timestamp],
        )
        .with_store(|| format!("change creation date of {incident_id}"))?;
    if changed == 0 {
        return Err(Error::not_found("incident", incident_id));
    }
    Ok(())
}

/// Link a post to the incident as a status update.
///
/// # Errors
///
/// Store failure, or [`Error::DuplicateEntry`] for a repeated post id.
pub fn insert_status_post(
    conn: &Connection,
    incident_id: &str,
    post_id: &str,
    status: Status,
) -> Result<()> {
    conn.execute(
        "INSERT INTO status_posts (incident_id, post_id, status) VALUES (?1, ?2, ?3)",
        params![incident_id, post_id, status.as_str()],
    )
    .with_store(|| format!("status post {post_id}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// The incident row alone, without status posts or timeline.
///
/// # Errors
///
/// [`Error::NotFound`] when absent; [`Error::CorruptData`] on bad JSON.
pub fn load_incident(conn: &Connection, incident_id: &str) -> Result<Incident> {
    let sql = format!("SELECT {INCIDENT_COLUMNS} FROM incidents i WHERE i.id = ?1");
    conn.query_row(&sql, [incident_id], IncidentRow::from_row)
        .optional()
        .with_store(|| format!("load incident {incident_id}"))?
        .ok_or_else(|| Error::not_found("incident", incident_id))?
        .decode()
}

/// The full aggregate: row, status posts and non-deleted timeline, read in
/// one snapshot.
///
/// # Errors
///
/// [`Error::NotFound`] when absent.
pub fn get_incident(conn: &Connection, incident_id: &str) -> Result<Incident> {
    read_snapshot(conn, |conn| {
        let mut incidents = vec![load_incident(conn, incident_id)?];
        attach_children(conn, &mut incidents)?;
        Ok(incidents.remove(0))
    })
}

/// Fill `status_posts` and `timeline_events` for every incident in the slice.
pub(crate) fn attach_children(conn: &Connection, incidents: &mut [Incident]) -> Result<()> {
    if incidents.is_empty() {
        return Ok(());
    }
    let ids: Vec<String> = incidents.iter().map(|i| i.id.clone()).collect();
    let slot: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(pos, id)| (id.as_str(), pos))
        .collect();

    for (incident_id, post) in status_posts_for(conn, &ids)? {
        if let Some(&pos) = slot.get(incident_id.as_str()) {
            incidents[pos].status_posts.push(post);
        }
    }
    for event in timeline::events_for(conn, &ids)? {
        if let Some(&pos) = slot.get(event.incident_id.as_str()) {
            incidents[pos].timeline_events.push(event);
        }
    }
    Ok(())
}

fn status_posts_for(conn: &Connection, incident_ids: &[String]) -> Result<Vec<(String, StatusPost)>> {
    let sql = format!(
        "SELECT sp.incident_id, sp.post_id, COALESCE(p.create_at, 0), COALESCE(p.delete_at, 0), sp.status
         FROM status_posts sp
         LEFT JOIN posts p ON p.id = sp.post_id
         WHERE sp.incident_id IN ({})
         ORDER BY COALESCE(p.create_at, 0) ASC, sp.rowid ASC",
        placeholders(1, incident_ids.len())
    );
    let mut stmt = conn.prepare(&sql).store("prepare status posts query")?;
    let rows = stmt
        .query_map(params_from_iter(incident_ids.iter()), |row| {
            let status_raw: String = row.get(4)?;
            let status = status_raw.parse::<Status>().map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(err))
            })?;
            Ok((
                row.get::<_, String>(0)?,
                StatusPost {
                    id: row.get(1)?,
                    create_at: row.get(2)?,
                    delete_at: row.get(3)?,
                    status,
                },
            ))
        })
        .store("query status posts")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .store("read status posts")
}

/// Id of the live incident hosted in `channel_id`.
///
/// # Errors
///
/// [`Error::NotFound`] when the channel hosts no incident.
pub fn get_incident_id_for_channel(conn: &Connection, channel_id: &str) -> Result<String> {
    conn.query_row(
        "SELECT id FROM incidents WHERE channel_id = ?1 AND delete_at = 0",
        [channel_id],
        |row| row.get(0),
    )
    .optional()
    .with_store(|| format!("look up incident for channel {channel_id}"))?
    .ok_or_else(|| Error::not_found("incident for channel", channel_id))
}

/// Distinct non-bot members ever added to the incident channel.
///
/// # Errors
///
/// Store failure.
pub fn get_all_members_count(conn: &Connection, channel_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(DISTINCT cm.user_id)
         FROM channel_members cm
         LEFT JOIN users u ON u.id = cm.user_id
         WHERE cm.channel_id = ?1 AND COALESCE(u.is_bot, 0) = 0",
        [channel_id],
        |row| row.get(0),
    )
    .with_store(|| format!("count members of {channel_id}"))
}

/// Non-deleted posts in a channel.
///
/// # Errors
///
/// Store failure.
pub fn count_channel_posts(conn: &Connection, channel_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE channel_id = ?1 AND delete_at = 0",
        [channel_id],
        |row| row.get(0),
    )
    .with_store(|| format!("count posts in {channel_id}"))
}

// ---------------------------------------------------------------------------
// Reset
// ---------------------------------------------------------------------------

/// Drop every engine table and recreate the schema. Directory tables survive.
///
/// # Errors
///
/// Store or migration failure.
pub fn nuke_all(conn: &Connection) -> Result<()> {
    write_tx(conn, |conn| {
        for table in schema::ENGINE_TABLES {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))
                .with_store(|| format!("drop {table}"))?;
        }
        conn.pragma_update(None, "user_version", 0_i64)
            .store("reset schema version")?;
        conn.execute(
            "UPDATE store_meta SET schema_version = 0, nuked_at = ?1 WHERE id = 1",
            [now_millis()],
        )
        .store("stamp store_meta")?;
        Ok(())
    })?;
    let version = migrations::migrate(conn).store("re-run migrations after nuke")?;
    tracing::info!(version, "incident store nuked and recreated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_store;
    use crate::model::ChecklistItem;

    fn sample(id: &str, channel: &str) -> Incident {
        let mut incident = Incident::new("DB down", "owner", "team");
        incident.id = id.into();
        incident.channel_id = channel.into();
        incident.create_at = 1_000;
        incident
            .checklists
            .push(Checklist::new("triage", vec![ChecklistItem::new("page dba")]));
        incident.config.invited_user_ids = vec!["u2".into()];
        incident
    }

    #[test]
    fn insert_then_load_preserves_fields() {
        let conn = open_memory_store().expect("store");
        let incident = sample("i1", "c1");
        insert_incident(&conn, &incident).expect("insert");

        let back = load_incident(&conn, "i1").expect("load");
        assert_eq!(back, incident);
    }

    #[test]
    fn second_live_incident_in_channel_is_duplicate() {
        let conn = open_memory_store().expect("store");
        insert_incident(&conn, &sample("i1", "c1")).expect("first");
        let err = insert_incident(&conn, &sample("i2", "c1")).expect_err("dup channel");
        assert!(matches!(err, Error::DuplicateEntry(_)));
    }

    #[test]
    fn deleted_incident_frees_its_channel() {
        let conn = open_memory_store().expect("store");
        let mut first = sample("i1", "c1");
        first.delete_at = 5;
        insert_incident(&conn, &first).expect("first");
        insert_incident(&conn, &sample("i2", "c1")).expect("second allowed");
        assert_eq!(get_incident_id_for_channel(&conn, "c1").expect("lookup"), "i2");
    }

    #[test]
    fn missing_rows_are_not_found() {
        let conn = open_memory_store().expect("store");
        assert!(matches!(load_incident(&conn, "nope"), Err(Error::NotFound { .. })));
        assert!(matches!(
            change_creation_date(&conn, "nope", 1),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            get_incident_id_for_channel(&conn, "c9"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn corrupt_checklists_surface_as_corrupt_data() {
        let conn = open_memory_store().expect("store");
        insert_incident(&conn, &sample("i1", "c1")).expect("insert");
        conn.execute("UPDATE incidents SET checklists_json = '{oops' WHERE id = 'i1'", [])
            .expect("corrupt");
        assert!(matches!(load_incident(&conn, "i1"), Err(Error::CorruptData { .. })));
    }

    #[test]
    fn status_posts_follow_post_creation_order() {
        let conn = open_memory_store().expect("store");
        insert_incident(&conn, &sample("i1", "c1")).expect("insert");
        conn.execute_batch(
            "INSERT INTO posts (id, channel_id, user_id, message, create_at) VALUES
                ('p2', 'c1', 'owner', 'later', 200),
                ('p1', 'c1', 'owner', 'first', 100);",
        )
        .expect("posts");
        insert_status_post(&conn, "i1", "p2", Status::Active).expect("sp2");
        insert_status_post(&conn, "i1", "p1", Status::Reported).expect("sp1");

        let incident = get_incident(&conn, "i1").expect("get");
        let ids: Vec<&str> = incident.status_posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["p1", "p2"]);
        assert_eq!(incident.status_posts[1].status, Status::Active);
    }

    #[test]
    fn members_count_excludes_bots() {
        let conn = open_memory_store().expect("store");
        conn.execute_batch(
            "INSERT INTO users (id, username, is_bot) VALUES ('u1','a',0),('u2','b',0),('bot','bot',1);
             INSERT INTO channels (id, team_id, name, display_name, channel_type)
                VALUES ('c1','t','c1','C1','O');
             INSERT INTO channel_members (channel_id, user_id) VALUES ('c1','u1'),('c1','u2'),('c1','bot');",
        )
        .expect("seed");
        assert_eq!(get_all_members_count(&conn, "c1").expect("count"), 2);
    }

    #[test]
    fn nuke_empties_engine_tables_but_keeps_directory() {
        let conn = open_memory_store().expect("store");
        conn.execute("INSERT INTO users (id, username) VALUES ('u1', 'alice')", [])
            .expect("user");
        insert_incident(&conn, &sample("i1", "c1")).expect("insert");

        nuke_all(&conn).expect("nuke");

        let incidents: i64 = conn
            .query_row("SELECT COUNT(*) FROM incidents", [], |row| row.get(0))
            .expect("count");
        assert_eq!(incidents, 0);
        let users: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .expect("count");
        assert_eq!(users, 1);
        assert_eq!(
            migrations::current_schema_version(&conn).expect("version"),
            migrations::LATEST_SCHEMA_VERSION
        );
    }
}
