//! Filtered, sorted, paginated incident listings.
//!
//! Visibility is evaluated inside the `WHERE` clause, so `total_count` and
//! the page contents always agree: admins see everything, guests only
//! incidents whose channel they belong to, and regular members those plus
//! every incident in a public channel.

use rusqlite::{Connection, ToSql, params_from_iter};
use serde::Serialize;
use std::{fmt, str::FromStr};

use super::incidents::{INCIDENT_COLUMNS, IncidentRow, attach_children};
use super::{fold_name, placeholders, read_snapshot};
use crate::error::{Error, Result, StoreResultExt};
use crate::model::{Incident, OwnerInfo, ParseEnumError, Status, normalize};
use crate::permissions::RequesterInfo;

/// Page size used when a filter leaves `per_page` at zero.
pub const DEFAULT_PER_PAGE: u32 = 1000;

// ---------------------------------------------------------------------------
// Sort
// ---------------------------------------------------------------------------

/// Column an incident listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreateAt,
    Id,
    Name,
    OwnerUserId,
    TeamId,
    EndAt,
}

impl SortField {
    const fn column(self) -> &'static str {
        match self {
            Self::CreateAt => "i.create_at",
            Self::Id => "i.id",
            Self::Name => "i.name",
            Self::OwnerUserId => "i.owner_user_id",
            Self::TeamId => "i.team_id",
            Self::EndAt => "i.end_at",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateAt => "create_at",
            Self::Id => "id",
            Self::Name => "name",
            Self::OwnerUserId => "owner_user_id",
            Self::TeamId => "team_id",
            Self::EndAt => "end_at",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "" | "create_at" | "created" | "createat" => Ok(Self::CreateAt),
            "id" => Ok(Self::Id),
            "name" | "title" => Ok(Self::Name),
            "owner_user_id" | "owner" | "commander_user_id" => Ok(Self::OwnerUserId),
            "team_id" | "team" => Ok(Self::TeamId),
            "end_at" | "ended" | "endat" => Ok(Self::EndAt),
            _ => Err(ParseEnumError {
                expected: "sort field",
                got: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

impl FromStr for SortDirection {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "" | "desc" | "descending" => Ok(Self::Desc),
            _ => Err(ParseEnumError {
                expected: "sort direction",
                got: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Criteria for incident listings.
///
/// Unset fields do not constrain the result; set fields combine with AND.
/// `status` and `statuses` are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentFilter {
    pub team_id: Option<String>,
    pub status: Option<Status>,
    pub statuses: Vec<Status>,
    pub owner_id: Option<String>,
    /// Incidents whose channel has this user as a member (case-insensitive).
    pub member_id: Option<String>,
    pub playbook_id: Option<String>,
    /// Case-insensitive substring of the incident name.
    pub search_term: Option<String>,
    pub sort: SortField,
    pub direction: SortDirection,
    /// Zero-based page number.
    pub page: u32,
    /// Zero means [`DEFAULT_PER_PAGE`].
    pub per_page: u32,
}

impl IncidentFilter {
    /// # Errors
    ///
    /// [`Error::InvalidFilterCombination`] when both status forms are set.
    pub fn validate(&self) -> Result<()> {
        if self.status.is_some() && !self.statuses.is_empty() {
            return Err(Error::InvalidFilterCombination(
                "status and statuses cannot both be set".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn effective_per_page(&self) -> u32 {
        if self.per_page == 0 {
            DEFAULT_PER_PAGE
        } else {
            self.per_page
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetIncidentsResults {
    pub total_count: i64,
    pub page_count: i64,
    pub has_more: bool,
    pub items: Vec<Incident>,
}

struct WhereClause {
    sql: String,
    values: Vec<Box<dyn ToSql>>,
}

impl WhereClause {
    fn params(&self) -> impl Iterator<Item = &dyn ToSql> {
        self.values.iter().map(AsRef::as_ref)
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in fold_name(term).chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

fn build_where(requester: &RequesterInfo, filter: &IncidentFilter) -> WhereClause {
    let mut conditions: Vec<String> = vec!["i.delete_at = 0".to_string()];
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(ref team_id) = filter.team_id {
        values.push(Box::new(team_id.clone()));
        conditions.push(format!("i.team_id = ?{}", values.len()));
    }

    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str()));
        conditions.push(format!("i.current_status = ?{}", values.len()));
    } else if !filter.statuses.is_empty() {
        let first = values.len() + 1;
        for status in &filter.statuses {
            values.push(Box::new(status.as_str()));
        }
        conditions.push(format!(
            "i.current_status IN ({})",
            placeholders(first, filter.statuses.len())
        ));
    }

    if let Some(ref owner_id) = filter.owner_id {
        values.push(Box::new(owner_id.clone()));
        conditions.push(format!("i.owner_user_id = ?{}", values.len()));
    }

    if let Some(ref playbook_id) = filter.playbook_id {
        values.push(Box::new(playbook_id.clone()));
        conditions.push(format!("i.playbook_id = ?{}", values.len()));
    }

    if let Some(term) = filter.search_term.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        values.push(Box::new(escape_like(term)));
        conditions.push(format!("i.name_lower LIKE ?{} ESCAPE '\\'", values.len()));
    }

    if let Some(ref member_id) = filter.member_id {
        values.push(Box::new(member_id.to_lowercase()));
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM channel_members cm \
             WHERE cm.channel_id = i.channel_id AND LOWER(cm.user_id) = ?{})",
            values.len()
        ));
    }

    if !requester.is_admin {
        values.push(Box::new(requester.user_id.clone()));
        let is_member = format!(
            "EXISTS (SELECT 1 FROM channel_members pm \
             WHERE pm.channel_id = i.channel_id AND pm.user_id = ?{})",
            values.len()
        );
        if requester.is_guest {
            conditions.push(is_member);
        } else {
            conditions.push(format!(
                "({is_member} OR EXISTS (SELECT 1 FROM channels ch \
                 WHERE ch.id = i.channel_id AND ch.channel_type = 'O'))"
            ));
        }
    }

    WhereClause {
        sql: conditions.join(" AND "),
        values,
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// The requested page of incidents visible to `requester`, with status
/// posts and timeline attached, plus pagination totals. Rows, count and
/// children are read in one snapshot.
///
/// # Errors
///
/// [`Error::InvalidFilterCombination`] for contradictory filters; store
/// failure otherwise.
pub fn get_incidents(
    conn: &Connection,
    requester: &RequesterInfo,
    filter: &IncidentFilter,
) -> Result<GetIncidentsResults> {
    filter.validate()?;
    let per_page = filter.effective_per_page();
    let clause = build_where(requester, filter);

    read_snapshot(conn, |conn| {
        let count_sql = format!("SELECT COUNT(*) FROM incidents i WHERE {}", clause.sql);
        let total_count: i64 = conn
            .query_row(&count_sql, params_from_iter(clause.params()), |row| row.get(0))
            .store("count incidents")?;

        let offset = u64::from(filter.page) * u64::from(per_page);
        let sql = format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents i WHERE {} \
             ORDER BY {} {}, i.id ASC LIMIT {per_page} OFFSET {offset}",
            clause.sql,
            filter.sort.column(),
            filter.direction.keyword(),
        );
        let mut stmt = conn
            .prepare(&sql)
            .with_store(|| format!("prepare incident listing: {sql}"))?;
        let rows = stmt
            .query_map(params_from_iter(clause.params()), IncidentRow::from_row)
            .store("list incidents")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .store("read incident rows")?;
        let mut items = rows
            .into_iter()
            .map(IncidentRow::decode)
            .collect::<Result<Vec<_>>>()?;
        attach_children(conn, &mut items)?;

        let page_count = (total_count + i64::from(per_page) - 1) / i64::from(per_page);
        Ok(GetIncidentsResults {
            total_count,
            page_count,
            has_more: i64::from(filter.page) + 1 < page_count,
            items,
        })
    })
}

/// Distinct owners across the incidents visible to `requester` under
/// `filter`. Sorting and pagination fields are ignored.
///
/// # Errors
///
/// Same as [`get_incidents`].
pub fn get_owners(
    conn: &Connection,
    requester: &RequesterInfo,
    filter: &IncidentFilter,
) -> Result<Vec<OwnerInfo>> {
    filter.validate()?;
    let clause = build_where(requester, filter);
    let sql = format!(
        "SELECT DISTINCT i.owner_user_id, COALESCE(u.username, i.owner_user_id) \
         FROM incidents i LEFT JOIN users u ON u.id = i.owner_user_id \
         WHERE {} ORDER BY 2 ASC, 1 ASC",
        clause.sql
    );
    let mut stmt = conn.prepare(&sql).store("prepare owners query")?;
    let rows = stmt
        .query_map(params_from_iter(clause.params()), |row| {
            Ok(OwnerInfo {
                user_id: row.get(0)?,
                username: row.get(1)?,
            })
        })
        .store("query owners")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .store("read owners")
}
