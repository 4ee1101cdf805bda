use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{Checklist, ParseEnumError, TimelineEvent, normalize};

/// Incident lifecycle status.
///
/// `Reported -> Active -> Resolved -> Archived`; `Archived` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Reported,
    Active,
    Resolved,
    Archived,
}

impl Status {
    pub const ALL: [Self; 4] = [Self::Reported, Self::Active, Self::Resolved, Self::Archived];

    /// Stored and displayed form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reported => "Reported",
            Self::Active => "Active",
            Self::Resolved => "Resolved",
            Self::Archived => "Archived",
        }
    }

    /// Reported or Active.
    #[must_use]
    pub const fn is_in_progress(self) -> bool {
        matches!(self, Self::Reported | Self::Active)
    }

    /// Resolved or Archived; these stamp `end_at`.
    #[must_use]
    pub const fn is_ended(self) -> bool {
        matches!(self, Self::Resolved | Self::Archived)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "reported" => Ok(Self::Reported),
            "active" | "restart" => Ok(Self::Active),
            "resolved" => Ok(Self::Resolved),
            "archived" | "ended" => Ok(Self::Archived),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

/// Settings copied from a playbook at creation time and owned by the
/// incident afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentConfig {
    pub reminder_message_template: String,
    pub reminder_timer_default_seconds: i64,
    pub broadcast_channel_id: String,
    pub invited_user_ids: Vec<String>,
    pub invited_group_ids: Vec<String>,
    pub default_owner_id: String,
    pub announcement_channel_id: String,
    pub webhook_on_creation_url: String,
    pub webhook_on_status_update_url: String,
    pub message_on_join: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Retrospective {
    pub text: String,
    pub published_at: i64,
    pub was_canceled: bool,
    pub reminder_interval_seconds: i64,
}

/// A status announcement attached to an incident. Read-only projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPost {
    pub id: String,
    pub create_at: i64,
    pub delete_at: i64,
    pub status: Status,
}

/// The aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_user_id: String,
    pub reporter_user_id: String,
    pub team_id: String,
    pub channel_id: String,
    pub create_at: i64,
    pub end_at: i64,
    pub delete_at: i64,
    pub post_id: String,
    pub playbook_id: String,
    pub current_status: Status,
    pub last_status_update_at: i64,
    pub checklists: Vec<Checklist>,
    pub config: IncidentConfig,
    pub retrospective: Retrospective,
    pub status_posts: Vec<StatusPost>,
    pub timeline_events: Vec<TimelineEvent>,
}

impl Incident {
    /// A fresh, unsaved incident in `Reported` status.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        owner_user_id: impl Into<String>,
        team_id: impl Into<String>,
    ) -> Self {
        let owner_user_id = owner_user_id.into();
        Self {
            id: String::new(),
            name: name.into(),
            description: String::new(),
            reporter_user_id: owner_user_id.clone(),
            owner_user_id,
            team_id: team_id.into(),
            channel_id: String::new(),
            create_at: 0,
            end_at: 0,
            delete_at: 0,
            post_id: String::new(),
            playbook_id: String::new(),
            current_status: Status::Reported,
            last_status_update_at: 0,
            checklists: Vec::new(),
            config: IncidentConfig::default(),
            retrospective: Retrospective::default(),
            status_posts: Vec::new(),
            timeline_events: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_archived(&self) -> bool {
        matches!(self.current_status, Status::Archived)
    }

    /// Total and closed item counts across all checklists.
    #[must_use]
    pub fn progress(&self) -> (usize, usize) {
        self.checklists
            .iter()
            .flat_map(|c| c.items.iter())
            .fold((0, 0), |(total, closed), item| {
                let done = usize::from(item.state == super::ItemState::Closed);
                (total + 1, closed + done)
            })
    }
}

/// Input to a status transition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusUpdateOptions {
    pub status: Status,
    /// Replaces the incident description when non-empty.
    pub description: String,
    pub message: String,
    /// Seconds until the next status reminder; zero disables it.
    pub reminder_seconds: i64,
}

/// A distinct owner across the visible incident set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerInfo {
    pub user_id: String,
    pub username: String,
}

/// Channel-side facts about an incident, for overview screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentMetadata {
    pub channel_name: String,
    pub channel_display_name: String,
    pub num_members: i64,
    pub total_posts: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChecklistItem, ItemState};

    #[test]
    fn status_parsing_is_case_insensitive() {
        assert_eq!("ACTIVE".parse::<Status>(), Ok(Status::Active));
        assert_eq!("archived".parse::<Status>(), Ok(Status::Archived));
        assert!("closed".parse::<Status>().is_err());
    }

    #[test]
    fn in_progress_and_ended_partition_statuses() {
        for status in Status::ALL {
            assert_ne!(status.is_in_progress(), status.is_ended(), "{status}");
        }
    }

    #[test]
    fn new_incident_defaults_reporter_to_owner() {
        let incident = Incident::new("DB down", "u1", "t1");
        assert_eq!(incident.reporter_user_id, "u1");
        assert_eq!(incident.current_status, Status::Reported);
        assert_eq!(incident.end_at, 0);
    }

    #[test]
    fn progress_counts_closed_items() {
        let mut incident = Incident::new("x", "u", "t");
        let mut done = ChecklistItem::new("b");
        done.state = ItemState::Closed;
        incident.checklists.push(Checklist::new(
            "triage",
            vec![ChecklistItem::new("a"), done],
        ));
        assert_eq!(incident.progress(), (2, 1));
    }
}
