//! Incident status state machine.
//!
//! `Reported -> Active -> Resolved -> Archived`. Any non-archived status may
//! move to any other status (restart is just a move back to `Active`), but
//! nothing leaves `Archived`.

use crate::error::{Error, Result};
use crate::model::{Incident, Status, StatusUpdateOptions};

/// The outcome of a validated status update, before it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous: Status,
    pub next: Status,
    /// `end_at` the incident carries after the update.
    pub end_at: i64,
}

impl Transition {
    /// Moving from an ended status back into progress.
    #[must_use]
    pub const fn is_restart(&self) -> bool {
        self.previous.is_ended() && self.next.is_in_progress()
    }

    /// Entering an ended status from an in-progress one.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.previous.is_in_progress() && self.next.is_ended()
    }
}

/// Validate a status update against `incident` at time `now`.
///
/// # Errors
///
/// [`Error::IncidentNotActive`] when the incident is already archived, which
/// takes precedence over [`Error::InvalidInput`] for an empty message or a
/// negative reminder.
pub fn plan_status_update(
    incident: &Incident,
    options: &StatusUpdateOptions,
    now: i64,
) -> Result<Transition> {
    if incident.is_archived() {
        return Err(Error::IncidentNotActive(incident.id.clone()));
    }
    if options.message.trim().is_empty() {
        return Err(Error::InvalidInput(
            "status update message is required".to_string(),
        ));
    }
    if options.reminder_seconds < 0 {
        return Err(Error::InvalidInput(
            "reminder must not be negative".to_string(),
        ));
    }

    let end_at = if options.status.is_ended() { now } else { 0 };

    Ok(Transition {
        previous: incident.current_status,
        next: options.status,
        end_at,
    })
}

/// Apply a planned transition to the in-memory incident.
pub fn apply_transition(
    incident: &mut Incident,
    transition: Transition,
    options: &StatusUpdateOptions,
    now: i64,
) {
    incident.current_status = transition.next;
    incident.end_at = transition.end_at;
    incident.last_status_update_at = now;
    if !options.description.trim().is_empty() {
        incident.description.clone_from(&options.description);
    }
}

/// Whether an owner change actually changes anything.
#[must_use]
pub fn owner_change_needed(incident: &Incident, new_owner_id: &str) -> bool {
    incident.owner_user_id != new_owner_id
}
