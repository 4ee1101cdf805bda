//! Playbook rows and member lists.

use rusqlite::{Connection, OptionalExtension, Row, params};

use super::incidents::{encode_checklists, encode_config};
use crate::error::{Error, Result, StoreResultExt};
use crate::model::{Checklist, IncidentConfig, Playbook};

const PLAYBOOK_COLUMNS: &str = "id, title, description, team_id, create_public_incident, \
     create_at, delete_at, checklists_json, config_json, retrospective_template, \
     retrospective_reminder_interval_seconds";

struct PlaybookRow {
    playbook: Playbook,
    checklists_json: String,
    config_json: String,
}

impl PlaybookRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let mut playbook = Playbook::new(row.get::<_, String>(1)?, row.get::<_, String>(3)?);
        playbook.id = row.get(0)?;
        playbook.description = row.get(2)?;
        playbook.create_public_incident = row.get(4)?;
        playbook.create_at = row.get(5)?;
        playbook.delete_at = row.get(6)?;
        playbook.retrospective_template = row.get(9)?;
        playbook.retrospective_reminder_interval_seconds = row.get(10)?;
        Ok(Self {
            playbook,
            checklists_json: row.get(7)?,
            config_json: row.get(8)?,
        })
    }

    fn decode(self, conn: &Connection) -> Result<Playbook> {
        let mut playbook = self.playbook;
        playbook.checklists = serde_json::from_str::<Vec<Checklist>>(&self.checklists_json)
            .map_err(|source| Error::CorruptData {
                what: format!("checklists of playbook {}", playbook.id),
                source,
            })?;
        playbook.config = serde_json::from_str::<IncidentConfig>(&self.config_json).map_err(
            |source| Error::CorruptData {
                what: format!("config of playbook {}", playbook.id),
                source,
            },
        )?;
        playbook.member_ids = members_of(conn, &playbook.id)?;
        Ok(playbook)
    }
}

fn members_of(conn: &Connection, playbook_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT member_id FROM playbook_members WHERE playbook_id = ?1 ORDER BY member_id")
        .store("prepare playbook members query")?;
    let rows = stmt
        .query_map([playbook_id], |row| row.get(0))
        .store("query playbook members")?;
    rows.collect::<rusqlite::Result<Vec<String>>>()
        .store("read playbook members")
}

fn replace_members(conn: &Connection, playbook: &Playbook) -> Result<()> {
    conn.execute(
        "DELETE FROM playbook_members WHERE playbook_id = ?1",
        [&playbook.id],
    )
    .store("clear playbook members")?;
    let mut stmt = conn
        .prepare("INSERT OR IGNORE INTO playbook_members (playbook_id, member_id) VALUES (?1, ?2)")
        .store("prepare playbook member insert")?;
    for member in &playbook.member_ids {
        stmt.execute(params![playbook.id, member])
            .with_store(|| format!("add member {member} to playbook {}", playbook.id))?;
    }
    Ok(())
}

fn num_steps(playbook: &Playbook) -> i64 {
    i64::try_from(playbook.num_steps()).unwrap_or(i64::MAX)
}

/// Insert a playbook and its member list. `playbook.id` must be set.
///
/// # Errors
///
/// [`Error::DuplicateEntry`] for a reused id; store failure otherwise.
pub fn insert_playbook(conn: &Connection, playbook: &Playbook) -> Result<()> {
    conn.execute(
        "INSERT INTO playbooks (
            id, title, description, team_id, create_public_incident, create_at, delete_at,
            num_steps, checklists_json, config_json, retrospective_template,
            retrospective_reminder_interval_seconds
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            playbook.id,
            playbook.title,
            playbook.description,
            playbook.team_id,
            playbook.create_public_incident,
            playbook.create_at,
            playbook.delete_at,
            num_steps(playbook),
            encode_checklists(&playbook.checklists)?,
            encode_config(&playbook.config)?,
            playbook.retrospective_template,
            playbook.retrospective_reminder_interval_seconds,
        ],
    )
    .with_store(|| format!("playbook {}", playbook.id))?;
    replace_members(conn, playbook)
}

/// Rewrite a playbook and its member list.
///
/// # Errors
///
/// [`Error::NotFound`] when absent.
pub fn update_playbook(conn: &Connection, playbook: &Playbook) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE playbooks SET
                title = ?2, description = ?3, team_id = ?4, create_public_incident = ?5,
                delete_at = ?6, num_steps = ?7, checklists_json = ?8, config_json = ?9,
                retrospective_template = ?10, retrospective_reminder_interval_seconds = ?11
             WHERE id = ?1",
            params![
                playbook.id,
                playbook.title,
                playbook.description,
                playbook.team_id,
                playbook.create_public_incident,
                playbook.delete_at,
                num_steps(playbook),
                encode_checklists(&playbook.checklists)?,
                encode_config(&playbook.config)?,
                playbook.retrospective_template,
                playbook.retrospective_reminder_interval_seconds,
            ],
        )
        .with_store(|| format!("update playbook {}", playbook.id))?;
    if changed == 0 {
        return Err(Error::not_found("playbook", &playbook.id));
    }
    replace_members(conn, playbook)
}

/// A playbook by id, including soft-deleted ones.
///
/// # Errors
///
/// [`Error::NotFound`] when absent.
pub fn get_playbook(conn: &Connection, playbook_id: &str) -> Result<Playbook> {
    let sql = format!("SELECT {PLAYBOOK_COLUMNS} FROM playbooks WHERE id = ?1");
    conn.query_row(&sql, [playbook_id], PlaybookRow::from_row)
        .optional()
        .with_store(|| format!("load playbook {playbook_id}"))?
        .ok_or_else(|| Error::not_found("playbook", playbook_id))?
        .decode(conn)
}

/// Soft-delete a playbook.
///
/// # Errors
///
/// [`Error::NotFound`] when absent or already deleted.
pub fn delete_playbook(conn: &Connection, playbook_id: &str, at: i64) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE playbooks SET delete_at = ?2 WHERE id = ?1 AND delete_at = 0",
            params![playbook_id, at],
        )
        .with_store(|| format!("delete playbook {playbook_id}"))?;
    if changed == 0 {
        return Err(Error::not_found("playbook", playbook_id));
    }
    Ok(())
}

/// Live playbooks of a team, ordered by title.
///
/// # Errors
///
/// Store failure.
pub fn list_playbooks(conn: &Connection, team_id: &str) -> Result<Vec<Playbook>> {
    let sql = format!(
        "SELECT {PLAYBOOK_COLUMNS} FROM playbooks
         WHERE team_id = ?1 AND delete_at = 0
         ORDER BY title COLLATE NOCASE ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql).store("prepare playbook listing")?;
    let rows = stmt
        .query_map([team_id], PlaybookRow::from_row)
        .store("list playbooks")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .store("read playbook rows")?;
    rows.into_iter().map(|row| row.decode(conn)).collect()
}
