//! Timeline event construction, filtering and display helpers.
//!
//! Events are built here from mutations and handed to the store, which
//! assigns identifiers. Reads always come back sorted by `event_at`.

use crate::model::{Incident, ItemState, Status, TimelineEvent, TimelineEventType};

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Timeline read filter. Empty `types` means all types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineFilter {
    pub types: Vec<TimelineEventType>,
    /// Inclusive lower bound on `event_at`.
    pub since: Option<i64>,
    /// Inclusive upper bound on `event_at`.
    pub until: Option<i64>,
    /// Drop assignee, task-state and slash-command entries.
    pub hide_task_noise: bool,
}

impl TimelineFilter {
    #[must_use]
    pub fn matches(&self, event: &TimelineEvent) -> bool {
        if event.is_deleted() {
            return false;
        }
        if self.hide_task_noise && event.event_type.is_task_noise() {
            return false;
        }
        if !self.types.is_empty() && !self.types.contains(&event.event_type) {
            return false;
        }
        if self.since.is_some_and(|since| event.event_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| event.event_at > until) {
            return false;
        }
        true
    }

    /// Filter already-loaded events, keeping event-time order.
    #[must_use]
    pub fn apply<'a>(&self, events: &'a [TimelineEvent]) -> Vec<&'a TimelineEvent> {
        let mut out: Vec<_> = events.iter().filter(|e| self.matches(e)).collect();
        out.sort_by_key(|e| (e.event_at, e.create_at));
        out
    }
}

/// Sort events by event time, breaking ties by creation time.
pub fn sort_by_event_time(events: &mut [TimelineEvent]) {
    events.sort_by_key(|e| (e.event_at, e.create_at));
}

// ---------------------------------------------------------------------------
// Event builders
// ---------------------------------------------------------------------------

/// Who performed a mutation: `id` is recorded on the event, `name` is
/// shown in its summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor<'a> {
    pub id: &'a str,
    pub name: &'a str,
}

impl<'a> Actor<'a> {
    #[must_use]
    pub const fn new(id: &'a str, name: &'a str) -> Self {
        Self { id, name }
    }
}

#[must_use]
pub fn incident_created(incident: &Incident, reporter: Actor<'_>, at: i64) -> TimelineEvent {
    TimelineEvent::new(&incident.id, TimelineEventType::IncidentCreated, at)
        .summary(format!("Incident reported by @{}", reporter.name))
        .subject(reporter.id)
        .creator(reporter.id)
        .post(&incident.post_id)
}

#[must_use]
pub fn status_updated(
    incident_id: &str,
    actor: Actor<'_>,
    previous: Status,
    next: Status,
    post_id: &str,
    at: i64,
) -> TimelineEvent {
    TimelineEvent::new(incident_id, TimelineEventType::StatusUpdated, at)
        .summary(format!(
            "@{} changed status from {previous} to {next}",
            actor.name
        ))
        .subject(actor.id)
        .creator(actor.id)
        .post(post_id)
}

#[must_use]
pub fn owner_changed(
    incident_id: &str,
    actor: Actor<'_>,
    previous_name: &str,
    next_owner: Actor<'_>,
    at: i64,
) -> TimelineEvent {
    TimelineEvent::new(incident_id, TimelineEventType::OwnerChanged, at)
        .summary(format!(
            "@{} changed owner from @{previous_name} to @{}",
            actor.name, next_owner.name
        ))
        .subject(next_owner.id)
        .creator(actor.id)
}

#[must_use]
pub fn task_state_modified(
    incident_id: &str,
    actor: Actor<'_>,
    item_title: &str,
    state: ItemState,
    at: i64,
) -> TimelineEvent {
    let verb = match state {
        ItemState::Closed => "checked off",
        ItemState::InProgress => "started",
        ItemState::Open => "unchecked",
    };
    TimelineEvent::new(incident_id, TimelineEventType::TaskStateModified, at)
        .summary(format!(
            "@{} {verb} checklist item \"{item_title}\"",
            actor.name
        ))
        .subject(actor.id)
        .creator(actor.id)
}

#[must_use]
pub fn assignee_changed(
    incident_id: &str,
    actor: Actor<'_>,
    item_title: &str,
    previous_name: &str,
    next_assignee: Actor<'_>,
    at: i64,
) -> TimelineEvent {
    let from = if previous_name.is_empty() {
        "unassigned".to_string()
    } else {
        format!("@{previous_name}")
    };
    let to = if next_assignee.name.is_empty() {
        "unassigned".to_string()
    } else {
        format!("@{}", next_assignee.name)
    };
    TimelineEvent::new(incident_id, TimelineEventType::AssigneeChanged, at)
        .summary(format!(
            "@{} changed assignee of \"{item_title}\" from {from} to {to}",
            actor.name
        ))
        .subject(next_assignee.id)
        .creator(actor.id)
}

#[must_use]
pub fn ran_slash_command(
    incident_id: &str,
    actor: Actor<'_>,
    command: &str,
    at: i64,
) -> TimelineEvent {
    TimelineEvent::new(incident_id, TimelineEventType::RanSlashCommand, at)
        .summary(format!("@{} ran the {command} slash command", actor.name))
        .subject(actor.id)
        .creator(actor.id)
}

#[must_use]
pub fn retrospective_published(incident_id: &str, actor: Actor<'_>, at: i64) -> TimelineEvent {
    TimelineEvent::new(incident_id, TimelineEventType::PublishedRetrospective, at)
        .summary(format!("@{} published the retrospective", actor.name))
        .subject(actor.id)
        .creator(actor.id)
}

#[must_use]
pub fn retrospective_canceled(incident_id: &str, actor: Actor<'_>, at: i64) -> TimelineEvent {
    TimelineEvent::new(incident_id, TimelineEventType::CanceledRetrospective, at)
        .summary(format!("@{} canceled the retrospective", actor.name))
        .subject(actor.id)
        .creator(actor.id)
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// Offset of `event_at` from the incident's creation, e.g. `2d 3h`,
/// `45m`, or `0m` for events at or before creation.
#[must_use]
pub fn time_since_reported(reported_at: i64, event_at: i64) -> String {
    const MINUTE: i64 = 60_000;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;

    let delta = (event_at - reported_at).max(0);
    let days = delta / DAY;
    let hours = (delta % DAY) / HOUR;
    let minutes = (delta % HOUR) / MINUTE;

    match (days, hours) {
        (0, 0) => format!("{minutes}m"),
        (0, h) => format!("{h}h {minutes}m"),
        (d, h) => format!("{d}d {h}h"),
    }
}

/// One display line per event: offset, type and summary.
#[must_use]
pub fn render_line(incident: &Incident, event: &TimelineEvent) -> String {
    format!(
        "+{:<8} {:<24} {}",
        time_since_reported(incident.create_at, event.event_at),
        event.event_type.as_str(),
        event.summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: TimelineEventType, at: i64) -> TimelineEvent {
        let mut e = TimelineEvent::new("inc", kind, at);
        e.create_at = 1;
        e
    }

    #[test]
    fn filter_hides_deleted_and_task_noise() {
        let mut deleted = event(TimelineEventType::StatusUpdated, 5);
        deleted.delete_at = 9;
        let events = vec![
            event(TimelineEventType::IncidentCreated, 1),
            event(TimelineEventType::AssigneeChanged, 2),
            event(TimelineEventType::TaskStateModified, 3),
            deleted,
        ];

        let filter = TimelineFilter {
            hide_task_noise: true,
            ..TimelineFilter::default()
        };
        let kept: Vec<_> = filter.apply(&events).iter().map(|e| e.event_type).collect();
        assert_eq!(kept, vec![TimelineEventType::IncidentCreated]);
    }

    #[test]
    fn filter_by_type_and_window() {
        let events = vec![
            event(TimelineEventType::StatusUpdated, 10),
            event(TimelineEventType::StatusUpdated, 20),
            event(TimelineEventType::OwnerChanged, 15),
        ];
        let filter = TimelineFilter {
            types: vec![TimelineEventType::StatusUpdated],
            since: Some(12),
            until: Some(20),
            ..TimelineFilter::default()
        };
        let kept = filter.apply(&events);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].event_at, 20);
    }

    #[test]
    fn apply_orders_by_event_time_not_insert_order() {
        let events = vec![
            event(TimelineEventType::StatusUpdated, 30),
            event(TimelineEventType::IncidentCreated, 10),
        ];
        let kept = TimelineFilter::default().apply(&events);
        assert_eq!(kept[0].event_at, 10);
        assert_eq!(kept[1].event_at, 30);
    }

    #[test]
    fn status_summary_records_prior_status() {
        let alice = Actor::new("u1", "alice");
        let e = status_updated("inc", alice, Status::Reported, Status::Active, "", 1);
        assert_eq!(e.summary, "@alice changed status from Reported to Active");
        assert_eq!(e.creator_user_id, "u1");
        assert_eq!(e.event_type, TimelineEventType::StatusUpdated);
    }

    #[test]
    fn assignee_summary_handles_unassigned() {
        let e = assignee_changed(
            "inc",
            Actor::new("u1", "alice"),
            "page",
            "",
            Actor::new("u2", "bob"),
            1,
        );
        assert_eq!(
            e.summary,
            "@alice changed assignee of \"page\" from unassigned to @bob"
        );
        assert_eq!(e.subject_user_id, "u2");
    }

    #[test]
    fn offsets_format_by_magnitude() {
        assert_eq!(time_since_reported(0, 45 * 60_000), "45m");
        assert_eq!(time_since_reported(0, 2 * 3_600_000 + 5 * 60_000), "2h 5m");
        assert_eq!(time_since_reported(0, 86_400_000 * 3 + 3_600_000), "3d 1h");
        assert_eq!(time_since_reported(100, 50), "0m");
    }
}
