use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{ParseEnumError, normalize};

/// Kinds of audit entries recorded on an incident timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventType {
    IncidentCreated,
    TaskStateModified,
    StatusUpdated,
    OwnerChanged,
    AssigneeChanged,
    RanSlashCommand,
    EventFromPost,
    PublishedRetrospective,
    CanceledRetrospective,
}

impl TimelineEventType {
    pub const ALL: [Self; 9] = [
        Self::IncidentCreated,
        Self::TaskStateModified,
        Self::StatusUpdated,
        Self::OwnerChanged,
        Self::AssigneeChanged,
        Self::RanSlashCommand,
        Self::EventFromPost,
        Self::PublishedRetrospective,
        Self::CanceledRetrospective,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IncidentCreated => "incident_created",
            Self::TaskStateModified => "task_state_modified",
            Self::StatusUpdated => "status_updated",
            Self::OwnerChanged => "owner_changed",
            Self::AssigneeChanged => "assignee_changed",
            Self::RanSlashCommand => "ran_slash_command",
            Self::EventFromPost => "event_from_post",
            Self::PublishedRetrospective => "published_retrospective",
            Self::CanceledRetrospective => "canceled_retrospective",
        }
    }

    /// Task bookkeeping that timeline views hide unless asked for.
    #[must_use]
    pub const fn is_task_noise(self) -> bool {
        matches!(
            self,
            Self::AssigneeChanged | Self::TaskStateModified | Self::RanSlashCommand
        )
    }
}

impl fmt::Display for TimelineEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimelineEventType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                expected: "timeline event type",
                got: s.to_string(),
            })
    }
}

/// An append-only audit entry. Only `delete_at` ever changes after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: String,
    pub incident_id: String,
    pub create_at: i64,
    pub delete_at: i64,
    /// When the event happened; may predate `create_at`.
    pub event_at: i64,
    pub event_type: TimelineEventType,
    pub summary: String,
    pub details: String,
    pub post_id: String,
    pub subject_user_id: String,
    pub creator_user_id: String,
}

impl TimelineEvent {
    /// A new, not-yet-persisted event. The store assigns `id` and fills
    /// `create_at` when zero.
    #[must_use]
    pub fn new(
        incident_id: impl Into<String>,
        event_type: TimelineEventType,
        event_at: i64,
    ) -> Self {
        Self {
            id: String::new(),
            incident_id: incident_id.into(),
            create_at: 0,
            delete_at: 0,
            event_at,
            event_type,
            summary: String::new(),
            details: String::new(),
            post_id: String::new(),
            subject_user_id: String::new(),
            creator_user_id: String::new(),
        }
    }

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    #[must_use]
    pub fn subject(mut self, user_id: impl Into<String>) -> Self {
        self.subject_user_id = user_id.into();
        self
    }

    #[must_use]
    pub fn creator(mut self, user_id: impl Into<String>) -> Self {
        self.creator_user_id = user_id.into();
        self
    }

    #[must_use]
    pub fn post(mut self, post_id: impl Into<String>) -> Self {
        self.post_id = post_id.into();
        self
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.delete_at != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_parses_from_its_name() {
        for kind in TimelineEventType::ALL {
            assert_eq!(kind.as_str().parse::<TimelineEventType>(), Ok(kind));
        }
    }

    #[test]
    fn serde_matches_as_str() {
        for kind in TimelineEventType::ALL {
            let json = serde_json::to_string(&kind).expect("serialize");
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn task_noise_covers_assignee_state_and_commands() {
        let noisy: Vec<_> = TimelineEventType::ALL
            .into_iter()
            .filter(|k| k.is_task_noise())
            .collect();
        assert_eq!(
            noisy,
            vec![
                TimelineEventType::TaskStateModified,
                TimelineEventType::AssigneeChanged,
                TimelineEventType::RanSlashCommand,
            ]
        );
    }

    #[test]
    fn unknown_type_rejected() {
        let err = "commander_changed".parse::<TimelineEventType>().expect_err("legacy");
        assert_eq!(err.expected, "timeline event type");
    }
}
