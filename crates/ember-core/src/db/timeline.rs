//! Timeline event persistence.
//!
//! Owner changes are written under the legacy type name `commander_changed`
//! so older readers keep working; every read maps it back to
//! [`TimelineEventType::OwnerChanged`].

use rusqlite::{Connection, OptionalExtension, Row, ToSql, params, params_from_iter, types::Type};

use super::placeholders;
use crate::error::{Error, Result, StoreResultExt};
use crate::id::new_id;
use crate::model::{TimelineEvent, TimelineEventType, now_millis};
use crate::timeline::TimelineFilter;

/// Stored type name for owner changes.
pub const LEGACY_OWNER_CHANGED: &str = "commander_changed";

const EVENT_COLUMNS: &str = "id, incident_id, create_at, delete_at, event_at, \
     CASE event_type WHEN 'commander_changed' THEN 'owner_changed' ELSE event_type END, \
     summary, details, post_id, subject_user_id, creator_user_id";

/// The `event_type` value written for `kind`.
#[must_use]
pub const fn stored_type(kind: TimelineEventType) -> &'static str {
    match kind {
        TimelineEventType::OwnerChanged => LEGACY_OWNER_CHANGED,
        other => other.as_str(),
    }
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<TimelineEvent> {
    let raw: String = row.get(5)?;
    let event_type = raw
        .parse::<TimelineEventType>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(err)))?;
    Ok(TimelineEvent {
        id: row.get(0)?,
        incident_id: row.get(1)?,
        create_at: row.get(2)?,
        delete_at: row.get(3)?,
        event_at: row.get(4)?,
        event_type,
        summary: row.get(6)?,
        details: row.get(7)?,
        post_id: row.get(8)?,
        subject_user_id: row.get(9)?,
        creator_user_id: row.get(10)?,
    })
}

/// Persist a new event. Always assigns a fresh id and stamps `create_at`
/// when it is zero.
///
/// # Errors
///
/// [`Error::InvalidInput`] without an incident id; store failure otherwise.
pub fn create_timeline_event(conn: &Connection, event: &TimelineEvent) -> Result<TimelineEvent> {
    if event.incident_id.is_empty() {
        return Err(Error::InvalidInput("timeline event needs an incident id".into()));
    }

    let mut stored = event.clone();
    stored.id = new_id();
    if stored.create_at == 0 {
        stored.create_at = now_millis();
    }
    if stored.event_at == 0 {
        stored.event_at = stored.create_at;
    }

    conn.execute(
        "INSERT INTO timeline_events (
            id, incident_id, create_at, delete_at, event_at, event_type, summary, details,
            post_id, subject_user_id, creator_user_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            stored.id,
            stored.incident_id,
            stored.create_at,
            stored.delete_at,
            stored.event_at,
            stored_type(stored.event_type),
            stored.summary,
            stored.details,
            stored.post_id,
            stored.subject_user_id,
            stored.creator_user_id,
        ],
    )
    .with_store(|| format!("timeline event for incident {}", stored.incident_id))?;

    Ok(stored)
}

/// Overwrite an existing event row.
///
/// # Errors
///
/// [`Error::InvalidInput`] without an id; [`Error::NotFound`] when absent.
pub fn update_timeline_event(conn: &Connection, event: &TimelineEvent) -> Result<()> {
    if event.id.is_empty() {
        return Err(Error::InvalidInput("timeline event id is required".into()));
    }
    if event.incident_id.is_empty() {
        return Err(Error::InvalidInput("timeline event needs an incident id".into()));
    }

    let changed = conn
        .execute(
            "UPDATE timeline_events SET
                create_at = ?3, delete_at = ?4, event_at = ?5, event_type = ?6, summary = ?7,
                details = ?8, post_id = ?9, subject_user_id = ?10, creator_user_id = ?11
             WHERE id = ?1 AND incident_id = ?2",
            params![
                event.id,
                event.incident_id,
                event.create_at,
                event.delete_at,
                event.event_at,
                stored_type(event.event_type),
                event.summary,
                event.details,
                event.post_id,
                event.subject_user_id,
                event.creator_user_id,
            ],
        )
        .with_store(|| format!("update timeline event {}", event.id))?;
    if changed == 0 {
        return Err(Error::not_found("timeline event", &event.id));
    }
    Ok(())
}

/// One event, including soft-deleted ones.
///
/// # Errors
///
/// [`Error::NotFound`] when no such event belongs to the incident.
pub fn get_timeline_event(conn: &Connection, incident_id: &str, event_id: &str) -> Result<TimelineEvent> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM timeline_events WHERE incident_id = ?1 AND id = ?2"
    );
    conn.query_row(&sql, params![incident_id, event_id], event_from_row)
        .optional()
        .with_store(|| format!("load timeline event {event_id}"))?
        .ok_or_else(|| Error::not_found("timeline event", event_id))
}

/// Non-deleted events for several incidents, ordered by `event_at`.
pub(crate) fn events_for(conn: &Connection, incident_ids: &[String]) -> Result<Vec<TimelineEvent>> {
    if incident_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM timeline_events
         WHERE delete_at = 0 AND incident_id IN ({})
         ORDER BY event_at ASC, create_at ASC",
        placeholders(1, incident_ids.len())
    );
    let mut stmt = conn.prepare(&sql).store("prepare timeline query")?;
    let rows = stmt
        .query_map(params_from_iter(incident_ids.iter()), event_from_row)
        .store("query timeline")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .store("read timeline")
}

/// Events of one incident narrowed by `filter`, pushed down into SQL.
///
/// # Errors
///
/// Store failure.
pub fn query_timeline(
    conn: &Connection,
    incident_id: &str,
    filter: &TimelineFilter,
) -> Result<Vec<TimelineEvent>> {
    let mut clauses = vec!["incident_id = ?1".to_string(), "delete_at = 0".to_string()];
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(incident_id.to_string())];

    if !filter.types.is_empty() {
        let mut stored: Vec<&'static str> = Vec::new();
        for kind in &filter.types {
            stored.push(stored_type(*kind));
            // Rows written before the legacy rename carry the new name.
            if *kind == TimelineEventType::OwnerChanged {
                stored.push(TimelineEventType::OwnerChanged.as_str());
            }
        }
        clauses.push(format!(
            "event_type IN ({})",
            placeholders(values.len() + 1, stored.len())
        ));
        for name in stored {
            values.push(Box::new(name));
        }
    }
    if let Some(since) = filter.since {
        values.push(Box::new(since));
        clauses.push(format!("event_at >= ?{}", values.len()));
    }
    if let Some(until) = filter.until {
        values.push(Box::new(until));
        clauses.push(format!("event_at <= ?{}", values.len()));
    }

    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM timeline_events WHERE {} ORDER BY event_at ASC, create_at ASC",
        clauses.join(" AND ")
    );
    let mut stmt = conn.prepare(&sql).store("prepare timeline filter query")?;
    let rows = stmt
        .query_map(
            params_from_iter(values.iter().map(std::convert::AsRef::as_ref)),
            event_from_row,
        )
        .store("query filtered timeline")?;
    let events = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .store("read filtered timeline")?;

    Ok(events.into_iter().filter(|e| filter.matches(e)).collect())
}
