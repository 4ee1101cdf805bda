//! Manual timeline entries and the retrospective.

use super::IncidentService;
use crate::db;
use crate::error::{Error, Result};
use crate::model::{Incident, TimelineEvent, TimelineEventType};
use crate::telemetry::{IncidentAction, TelemetryEvent};
use crate::timeline::{self as events, Actor, TimelineFilter};

/// A user-authored timeline entry, typically lifted from a chat post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTimelineEntry {
    pub summary: String,
    pub details: String,
    /// When the entry happened; zero means now.
    pub event_at: i64,
    pub post_id: String,
}

impl IncidentService<'_> {
    /// Append a manual entry to an incident's timeline.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for an empty summary; [`Error::NotFound`]
    /// for an unknown incident.
    pub fn add_timeline_event(
        &self,
        incident_id: &str,
        actor_id: &str,
        entry: NewTimelineEntry,
    ) -> Result<TimelineEvent> {
        if entry.summary.trim().is_empty() {
            return Err(Error::InvalidInput("timeline entry summary is required".into()));
        }
        let now = self.now();
        let event_at = if entry.event_at == 0 { now } else { entry.event_at };

        let (incident, stored) = db::write_tx(self.conn, |conn| {
            let incident = db::incidents::load_incident(conn, incident_id)?;
            let mut event = TimelineEvent::new(&incident.id, TimelineEventType::EventFromPost, event_at)
                .summary(entry.summary)
                .details(entry.details)
                .post(entry.post_id)
                .subject(actor_id)
                .creator(actor_id);
            event.create_at = now;
            let stored = db::timeline::create_timeline_event(conn, &event)?;
            Ok((incident, stored))
        })?;

        tracing::debug!(incident_id, event_id = %stored.id, "timeline entry added");
        self.track(&TelemetryEvent::incident(
            IncidentAction::AddTimelineEventFromPost,
            &incident,
            actor_id,
        ));
        Ok(stored)
    }

    /// Soft-delete a timeline entry.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the event does not belong to the incident
    /// or is already removed.
    pub fn remove_timeline_event(&self, incident_id: &str, actor_id: &str, event_id: &str) -> Result<()> {
        let now = self.now();
        let incident = db::write_tx(self.conn, |conn| {
            let incident = db::incidents::load_incident(conn, incident_id)?;
            let mut event = db::timeline::get_timeline_event(conn, incident_id, event_id)?;
            if event.is_deleted() {
                return Err(Error::not_found("timeline event", event_id));
            }
            event.delete_at = now;
            db::timeline::update_timeline_event(conn, &event)?;
            Ok(incident)
        })?;

        tracing::debug!(incident_id, event_id, "timeline entry removed");
        self.track(&TelemetryEvent::incident(
            IncidentAction::RemoveTimelineEvent,
            &incident,
            actor_id,
        ));
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::NotFound`] when absent.
    pub fn get_timeline_event(&self, incident_id: &str, event_id: &str) -> Result<TimelineEvent> {
        db::timeline::get_timeline_event(self.conn, incident_id, event_id)
    }

    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown incident.
    pub fn query_timeline(&self, incident_id: &str, filter: &TimelineFilter) -> Result<Vec<TimelineEvent>> {
        db::read_snapshot(self.conn, |conn| {
            db::incidents::load_incident(conn, incident_id)?;
            db::timeline::query_timeline(conn, incident_id, filter)
        })
    }

    /// Replace the retrospective draft.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown incident.
    pub fn update_retrospective(&self, incident_id: &str, actor_id: &str, text: &str) -> Result<Incident> {
        let incident = db::write_tx(self.conn, |conn| {
            let mut incident = db::incidents::load_incident(conn, incident_id)?;
            incident.retrospective.text = text.to_string();
            db::incidents::update_incident(conn, &incident)?;
            db::incidents::get_incident(conn, &incident.id)
        })?;
        self.track(&TelemetryEvent::incident(
            IncidentAction::UpdateRetrospective,
            &incident,
            actor_id,
        ));
        Ok(incident)
    }

    /// Publish the retrospective with its final text.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown incident.
    pub fn publish_retrospective(&self, incident_id: &str, actor_id: &str, text: &str) -> Result<Incident> {
        let now = self.now();
        let actor_name = self.username(actor_id)?;
        let incident = db::write_tx(self.conn, |conn| {
            let mut incident = db::incidents::load_incident(conn, incident_id)?;
            incident.retrospective.text = text.to_string();
            incident.retrospective.published_at = now;
            incident.retrospective.was_canceled = false;
            db::incidents::update_incident(conn, &incident)?;
            db::timeline::create_timeline_event(
                conn,
                &events::retrospective_published(&incident.id, Actor::new(actor_id, &actor_name), now),
            )?;
            db::incidents::get_incident(conn, &incident.id)
        })?;

        tracing::info!(incident_id, "retrospective published");
        self.track(&TelemetryEvent::incident(
            IncidentAction::PublishRetrospective,
            &incident,
            actor_id,
        ));
        Ok(incident)
    }

    /// Mark the retrospective as not happening. The draft text is kept.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown incident.
    pub fn cancel_retrospective(&self, incident_id: &str, actor_id: &str) -> Result<Incident> {
        let now = self.now();
        let actor_name = self.username(actor_id)?;
        let incident = db::write_tx(self.conn, |conn| {
            let mut incident = db::incidents::load_incident(conn, incident_id)?;
            incident.retrospective.published_at = now;
            incident.retrospective.was_canceled = true;
            db::incidents::update_incident(conn, &incident)?;
            db::timeline::create_timeline_event(
                conn,
                &events::retrospective_canceled(&incident.id, Actor::new(actor_id, &actor_name), now),
            )?;
            db::incidents::get_incident(conn, &incident.id)
        })?;
        tracing::info!(incident_id, "retrospective canceled");
        Ok(incident)
    }
}
