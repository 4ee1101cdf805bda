//! Aggregate counts for dashboards.
//!
//! "In progress" means `Reported` or `Active`. Deleted incidents never count.

use rusqlite::{Connection, ToSql, params_from_iter};
use serde::Serialize;

use super::read_snapshot;
use crate::error::{Result, StoreResultExt};
use crate::model::Status;

/// Optional team and playbook scope for every statistic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsFilter {
    pub team_id: Option<String>,
    pub playbook_id: Option<String>,
}

impl StatsFilter {
    #[must_use]
    pub fn team(team_id: impl Into<String>) -> Self {
        Self {
            team_id: Some(team_id.into()),
            playbook_id: None,
        }
    }

    fn scope(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut conditions = vec!["i.delete_at = 0".to_string()];
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(ref team_id) = self.team_id {
            values.push(Box::new(team_id.clone()));
            conditions.push(format!("i.team_id = ?{}", values.len()));
        }
        if let Some(ref playbook_id) = self.playbook_id {
            values.push(Box::new(playbook_id.clone()));
            conditions.push(format!("i.playbook_id = ?{}", values.len()));
        }
        (conditions.join(" AND "), values)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Stats {
    pub total_reported_incidents: i64,
    pub total_active_incidents: i64,
    pub total_in_progress_incidents: i64,
    pub total_active_participants: i64,
}

fn count_with_statuses(conn: &Connection, filter: &StatsFilter, statuses: &[Status]) -> Result<i64> {
    let (scope, mut values) = filter.scope();
    let first = values.len() + 1;
    for status in statuses {
        values.push(Box::new(status.as_str()));
    }
    let sql = format!(
        "SELECT COUNT(*) FROM incidents i WHERE {scope} AND i.current_status IN ({})",
        super::placeholders(first, statuses.len())
    );
    conn.query_row(
        &sql,
        params_from_iter(values.iter().map(AsRef::as_ref)),
        |row| row.get(0),
    )
    .store("count incidents by status")
}

/// # Errors
///
/// Store failure.
pub fn total_reported_incidents(conn: &Connection, filter: &StatsFilter) -> Result<i64> {
    count_with_statuses(conn, filter, &[Status::Reported])
}

/// # Errors
///
/// Store failure.
pub fn total_active_incidents(conn: &Connection, filter: &StatsFilter) -> Result<i64> {
    count_with_statuses(conn, filter, &[Status::Active])
}

/// # Errors
///
/// Store failure.
pub fn total_in_progress_incidents(conn: &Connection, filter: &StatsFilter) -> Result<i64> {
    count_with_statuses(conn, filter, &[Status::Reported, Status::Active])
}

/// Distinct non-bot users in the channels of in-progress incidents.
///
/// # Errors
///
/// Store failure.
pub fn total_active_participants(conn: &Connection, filter: &StatsFilter) -> Result<i64> {
    let (scope, values) = filter.scope();
    let sql = format!(
        "SELECT COUNT(DISTINCT cm.user_id)
         FROM channel_members cm
         JOIN incidents i ON i.channel_id = cm.channel_id
         LEFT JOIN users u ON u.id = cm.user_id
         WHERE {scope}
           AND i.current_status IN ('Reported', 'Active')
           AND COALESCE(u.is_bot, 0) = 0"
    );
    conn.query_row(
        &sql,
        params_from_iter(values.iter().map(AsRef::as_ref)),
        |row| row.get(0),
    )
    .store("count active participants")
}

/// All four statistics from one snapshot.
///
/// # Errors
///
/// Store failure.
pub fn compute_stats(conn: &Connection, filter: &StatsFilter) -> Result<Stats> {
    read_snapshot(conn, |conn| {
        Ok(Stats {
            total_reported_incidents: total_reported_incidents(conn, filter)?,
            total_active_incidents: total_active_incidents(conn, filter)?,
            total_in_progress_incidents: total_in_progress_incidents(conn, filter)?,
            total_active_participants: total_active_participants(conn, filter)?,
        })
    })
}
