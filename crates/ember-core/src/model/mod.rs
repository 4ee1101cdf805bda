//! Domain types for incidents, checklists, playbooks and the timeline.
//!
//! Everything here is plain data plus small enum helpers; persistence lives
//! in [`crate::db`] and mutation rules in [`crate::checklist`] and
//! [`crate::lifecycle`].

pub mod checklist;
pub mod incident;
pub mod playbook;
pub mod timeline;

pub use checklist::{Checklist, ChecklistItem, ItemState};
pub use incident::{
    Incident, IncidentConfig, IncidentMetadata, OwnerInfo, Retrospective, Status, StatusPost,
    StatusUpdateOptions,
};
pub use playbook::Playbook;
pub use timeline::{TimelineEvent, TimelineEventType};

use std::fmt;

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Error returned when a string does not name a known enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

pub(crate) fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace('-', "_")
}
