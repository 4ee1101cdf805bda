//! The incident service.
//!
//! Each mutation reads the incident, applies a pure engine operation,
//! persists the result and appends its timeline event inside one
//! `BEGIN IMMEDIATE` transaction. Telemetry is sent after commit and never
//! fails the operation. Permission checks belong to the caller; see
//! [`IncidentService::check_edit`] and
//! [`IncidentService::get_incident_for`].

mod checklists;
mod playbooks;
mod timeline;

pub use timeline::NewTimelineEntry;

use rusqlite::Connection;

use crate::collab::{
    ChannelProvisioner, ChannelType, CommandRunner, Directory, NoopRunner, Poster, call,
    channel_name_for, display_name,
};
use crate::db::{self, directory::SqliteDirectory, query, stats};
use crate::error::{Error, Result};
use crate::id::{fresh_copy, new_id, populate_checklist_ids};
use crate::lifecycle;
use crate::model::{
    Incident, IncidentMetadata, OwnerInfo, Playbook, Status, StatusUpdateOptions, now_millis,
};
use crate::permissions::{self, RequesterInfo};
use crate::telemetry::{IncidentAction, TelemetryEvent, Tracker};
use crate::timeline::{self as events, Actor};

/// The chat-platform contracts a service runs against.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub directory: &'a dyn Directory,
    pub provisioner: &'a dyn ChannelProvisioner,
    pub poster: &'a dyn Poster,
    pub runner: &'a dyn CommandRunner,
}

impl<'a> Collaborators<'a> {
    /// Everything backed by the store's own mirror tables; commands are
    /// accepted and not dispatched.
    #[must_use]
    pub fn sqlite(directory: &'a SqliteDirectory<'_>) -> Self {
        Self {
            directory,
            provisioner: directory,
            poster: directory,
            runner: &NoopRunner,
        }
    }

    #[must_use]
    pub fn with_runner(self, runner: &'a dyn CommandRunner) -> Self {
        Self { runner, ..self }
    }
}

pub struct IncidentService<'a> {
    conn: &'a Connection,
    collab: Collaborators<'a>,
    tracker: Tracker,
    clock: fn() -> i64,
}

impl std::fmt::Debug for IncidentService<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentService")
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl<'a> IncidentService<'a> {
    #[must_use]
    pub fn new(conn: &'a Connection, collab: Collaborators<'a>, tracker: Tracker) -> Self {
        Self {
            conn,
            collab,
            tracker,
            clock: now_millis,
        }
    }

    /// Replace the wall clock, e.g. with a fixed time in tests.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    #[must_use]
    pub const fn connection(&self) -> &'a Connection {
        self.conn
    }

    #[must_use]
    pub const fn collaborators(&self) -> Collaborators<'a> {
        self.collab
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    fn track(&self, event: &TelemetryEvent) {
        self.tracker.track(event);
    }

    fn username(&self, user_id: &str) -> Result<String> {
        display_name(self.collab.directory, user_id)
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create an incident, optionally from a playbook, provisioning its
    /// channel when `incident.channel_id` is empty.
    ///
    /// The playbook's checklists are deep-copied with fresh identifiers and
    /// its settings snapshot becomes the incident's own config. The reporter
    /// defaults to the owner.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a missing name, team or owner, or a
    /// deleted or foreign playbook; [`Error::NotFound`] for an unknown
    /// channel; [`Error::DuplicateEntry`] when the channel already hosts a
    /// live incident.
    pub fn create_incident(
        &self,
        mut incident: Incident,
        playbook: Option<&Playbook>,
        public: bool,
    ) -> Result<Incident> {
        if incident.name.trim().is_empty() {
            return Err(Error::InvalidInput("incident name is required".into()));
        }
        if incident.team_id.is_empty() {
            return Err(Error::InvalidInput("incident team is required".into()));
        }
        if incident.reporter_user_id.is_empty() {
            incident.reporter_user_id.clone_from(&incident.owner_user_id);
        }
        if incident.owner_user_id.is_empty() {
            incident.owner_user_id.clone_from(&incident.reporter_user_id);
        }
        if incident.owner_user_id.is_empty() {
            return Err(Error::InvalidInput("incident owner is required".into()));
        }

        if let Some(playbook) = playbook {
            if playbook.delete_at != 0 {
                return Err(Error::InvalidInput(format!(
                    "playbook '{}' is deleted",
                    playbook.id
                )));
            }
            if playbook.team_id != incident.team_id {
                return Err(Error::InvalidInput(format!(
                    "playbook '{}' belongs to another team",
                    playbook.id
                )));
            }
            incident.playbook_id.clone_from(&playbook.id);
            incident.checklists = fresh_copy(&playbook.checklists);
            incident.config = playbook.config.clone();
            if !playbook.config.default_owner_id.is_empty() {
                incident
                    .owner_user_id
                    .clone_from(&playbook.config.default_owner_id);
            }
            incident
                .retrospective
                .text
                .clone_from(&playbook.retrospective_template);
            incident.retrospective.reminder_interval_seconds =
                playbook.retrospective_reminder_interval_seconds;
        } else {
            populate_checklist_ids(&mut incident.checklists);
        }

        let now = self.now();
        incident.id = new_id();
        incident.create_at = now;
        incident.end_at = 0;
        incident.delete_at = 0;
        incident.current_status = Status::Reported;
        incident.status_posts.clear();
        incident.timeline_events.clear();

        let reporter_id = incident.reporter_user_id.clone();
        let created = db::write_tx(self.conn, |conn| {
            if incident.channel_id.is_empty() {
                let channel_type = if public {
                    ChannelType::Public
                } else {
                    ChannelType::Private
                };
                let channel = call(
                    "create incident channel",
                    self.collab.provisioner.create_channel(
                        &incident.team_id,
                        &channel_name_for(&incident.name),
                        &incident.name,
                        channel_type,
                        &reporter_id,
                    ),
                )?;
                incident.channel_id = channel.id;
            } else if call("resolve channel", self.collab.directory.channel(&incident.channel_id))?
                .is_none()
            {
                return Err(Error::not_found("channel", &incident.channel_id));
            }

            db::incidents::insert_incident(conn, &incident)?;

            let mut invitees = vec![incident.owner_user_id.clone(), reporter_id.clone()];
            invitees.extend(incident.config.invited_user_ids.iter().cloned());
            invitees.dedup();
            for user_id in &invitees {
                call(
                    "invite user to incident channel",
                    self.collab.provisioner.add_member(&incident.channel_id, user_id),
                )?;
            }

            let reporter_name = self.username(&reporter_id)?;
            db::timeline::create_timeline_event(
                conn,
                &events::incident_created(&incident, Actor::new(&reporter_id, &reporter_name), now),
            )?;
            db::incidents::get_incident(conn, &incident.id)
        })?;

        tracing::info!(
            incident_id = %created.id,
            channel_id = %created.channel_id,
            playbook_id = %created.playbook_id,
            "incident created"
        );
        self.announce_creation(&created, &reporter_id);
        self.track(&TelemetryEvent::incident(
            IncidentAction::Create { public },
            &created,
            &reporter_id,
        ));
        Ok(created)
    }

    fn announce_creation(&self, incident: &Incident, actor: &str) {
        let config = &incident.config;
        if !config.announcement_channel_id.is_empty() {
            let message = format!("New incident started: {}", incident.name);
            if let Err(err) =
                self.collab
                    .poster
                    .post_message(&config.announcement_channel_id, actor, &message)
            {
                tracing::warn!(incident_id = %incident.id, error = %err, "announcement post failed");
            }
        }
        if !config.message_on_join.is_empty() {
            if let Err(err) =
                self.collab
                    .poster
                    .post_message(&incident.channel_id, actor, &config.message_on_join)
            {
                tracing::warn!(incident_id = %incident.id, error = %err, "welcome post failed");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// [`Error::NotFound`] when absent.
    pub fn get_incident(&self, incident_id: &str) -> Result<Incident> {
        db::incidents::get_incident(self.conn, incident_id)
    }

    /// [`Self::get_incident`] plus the single-incident visibility rule.
    ///
    /// # Errors
    ///
    /// [`Error::Forbidden`] when the requester cannot see it.
    pub fn get_incident_for(&self, requester: &RequesterInfo, incident_id: &str) -> Result<Incident> {
        let incident = self.get_incident(incident_id)?;
        permissions::check_view_incident(self.collab.directory, requester, &incident)?;
        Ok(incident)
    }

    /// Load the incident and require edit rights on it.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] or [`Error::Forbidden`].
    pub fn check_edit(&self, requester: &RequesterInfo, incident_id: &str) -> Result<Incident> {
        let incident = db::incidents::load_incident(self.conn, incident_id)?;
        permissions::check_edit_incident(self.collab.directory, requester, &incident)?;
        Ok(incident)
    }

    /// # Errors
    ///
    /// See [`query::get_incidents`].
    pub fn get_incidents(
        &self,
        requester: &RequesterInfo,
        filter: &query::IncidentFilter,
    ) -> Result<query::GetIncidentsResults> {
        query::get_incidents(self.conn, requester, filter)
    }

    /// # Errors
    ///
    /// See [`query::get_owners`].
    pub fn get_owners(
        &self,
        requester: &RequesterInfo,
        filter: &query::IncidentFilter,
    ) -> Result<Vec<OwnerInfo>> {
        query::get_owners(self.conn, requester, filter)
    }

    /// # Errors
    ///
    /// [`Error::NotFound`] when the channel hosts no live incident.
    pub fn get_incident_id_for_channel(&self, channel_id: &str) -> Result<String> {
        db::incidents::get_incident_id_for_channel(self.conn, channel_id)
    }

    /// Channel name, member and post counts for an incident.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown incident or channel.
    pub fn get_incident_metadata(&self, incident_id: &str) -> Result<IncidentMetadata> {
        let incident = db::incidents::load_incident(self.conn, incident_id)?;
        let channel = call(
            "resolve incident channel",
            self.collab.directory.channel(&incident.channel_id),
        )?
        .ok_or_else(|| Error::not_found("channel", &incident.channel_id))?;
        Ok(IncidentMetadata {
            channel_name: channel.name,
            channel_display_name: channel.display_name,
            num_members: db::incidents::get_all_members_count(self.conn, &incident.channel_id)?,
            total_posts: db::incidents::count_channel_posts(self.conn, &incident.channel_id)?,
        })
    }

    /// # Errors
    ///
    /// Store failure.
    pub fn stats(&self, filter: &stats::StatsFilter) -> Result<stats::Stats> {
        stats::compute_stats(self.conn, filter)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Post a status update and move the incident to `options.status`.
    ///
    /// Creates the status post, records a status-updated timeline event
    /// naming the prior status, stamps `end_at` when entering Resolved or
    /// Archived and clears it on reopen.
    ///
    /// # Errors
    ///
    /// [`Error::IncidentNotActive`] once archived; [`Error::InvalidInput`]
    /// for an empty message or negative reminder.
    pub fn update_status(
        &self,
        incident_id: &str,
        actor_id: &str,
        options: &StatusUpdateOptions,
    ) -> Result<Incident> {
        let now = self.now();

        let (incident, transition) = db::write_tx(self.conn, |conn| {
            let mut incident = db::incidents::load_incident(conn, incident_id)?;
            let transition = lifecycle::plan_status_update(&incident, options, now)?;

            let post_id = call(
                "post status update",
                self.collab
                    .poster
                    .post_message(&incident.channel_id, actor_id, &options.message),
            )?;
            db::incidents::insert_status_post(conn, &incident.id, &post_id, transition.next)?;

            lifecycle::apply_transition(&mut incident, transition, options, now);
            db::incidents::update_incident(conn, &incident)?;

            let actor_name = self.username(actor_id)?;
            db::timeline::create_timeline_event(
                conn,
                &events::status_updated(
                    &incident.id,
                    Actor::new(actor_id, &actor_name),
                    transition.previous,
                    transition.next,
                    &post_id,
                    now,
                ),
            )?;
            Ok((db::incidents::get_incident(conn, &incident.id)?, transition))
        })?;

        tracing::info!(
            incident_id = %incident.id,
            from = %transition.previous,
            to = %transition.next,
            "status updated"
        );
        if !incident.config.broadcast_channel_id.is_empty() {
            if let Err(err) = self.collab.poster.post_message(
                &incident.config.broadcast_channel_id,
                actor_id,
                &options.message,
            ) {
                tracing::warn!(incident_id = %incident.id, error = %err, "broadcast failed");
            }
        }

        self.track(&TelemetryEvent::incident(
            IncidentAction::UpdateStatus {
                reminder_timer_seconds: options.reminder_seconds,
            },
            &incident,
            actor_id,
        ));
        if transition.is_end() {
            self.track(&TelemetryEvent::incident(IncidentAction::End, &incident, actor_id));
        } else if transition.is_restart() {
            self.track(&TelemetryEvent::incident(IncidentAction::Restart, &incident, actor_id));
        }
        Ok(incident)
    }

    /// Reassign ownership. Assigning the current owner succeeds without
    /// writing anything.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown incident or user.
    pub fn change_owner(&self, incident_id: &str, actor_id: &str, new_owner_id: &str) -> Result<Incident> {
        let current = db::incidents::load_incident(self.conn, incident_id)?;
        if !lifecycle::owner_change_needed(&current, new_owner_id) {
            return self.get_incident(incident_id);
        }
        let new_owner = call("resolve new owner", self.collab.directory.user(new_owner_id))?
            .ok_or_else(|| Error::not_found("user", new_owner_id))?;
        let now = self.now();

        let incident = db::write_tx(self.conn, |conn| {
            let mut incident = db::incidents::load_incident(conn, incident_id)?;
            let previous_name = self.username(&incident.owner_user_id)?;
            incident.owner_user_id.clone_from(&new_owner.id);
            db::incidents::update_incident(conn, &incident)?;
            call(
                "add owner to incident channel",
                self.collab.provisioner.add_member(&incident.channel_id, &new_owner.id),
            )?;

            let actor_name = self.username(actor_id)?;
            db::timeline::create_timeline_event(
                conn,
                &events::owner_changed(
                    &incident.id,
                    Actor::new(actor_id, &actor_name),
                    &previous_name,
                    Actor::new(&new_owner.id, &new_owner.username),
                    now,
                ),
            )?;
            db::incidents::get_incident(conn, &incident.id)
        })?;

        tracing::info!(incident_id = %incident.id, owner = %new_owner.id, "owner changed");
        self.track(&TelemetryEvent::incident(
            IncidentAction::ChangeOwner,
            &incident,
            actor_id,
        ));
        Ok(incident)
    }

    /// Backdate an incident. Test-data tooling only.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when absent.
    pub fn change_creation_date(&self, incident_id: &str, timestamp: i64) -> Result<()> {
        db::write_tx(self.conn, |conn| {
            db::incidents::change_creation_date(conn, incident_id, timestamp)
        })
    }

    /// Drop and recreate every engine table.
    ///
    /// # Errors
    ///
    /// Store failure.
    pub fn nuke_all(&self) -> Result<()> {
        tracing::warn!("nuking incident store");
        db::incidents::nuke_all(self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_store;
    use crate::model::{Checklist, ChecklistItem};

    fn fixed_clock() -> i64 {
        1_700_000_000_000
    }

    fn seed(dir: &SqliteDirectory<'_>) {
        dir.add_user("owner", "olive", false).expect("owner");
        dir.add_user("bob", "bob", false).expect("bob");
        dir.add_team_member("team", "owner").expect("team");
    }

    #[test]
    fn create_provisions_channel_and_logs_creation() {
        let conn = open_memory_store().expect("store");
        let dir = SqliteDirectory::new(&conn);
        seed(&dir);
        let service = IncidentService::new(&conn, Collaborators::sqlite(&dir), Tracker::disabled())
            .with_clock(fixed_clock);

        let incident = service
            .create_incident(Incident::new("DB down", "owner", "team"), None, false)
            .expect("create");

        assert_eq!(incident.create_at, fixed_clock());
        assert_eq!(incident.timeline_events.len(), 1);
        assert_eq!(incident.timeline_events[0].summary, "Incident reported by @olive");
        let channel = dir.channel(&incident.channel_id).expect("lookup").expect("channel");
        assert_eq!(channel.channel_type, ChannelType::Private);
        assert!(dir.is_channel_member(&channel.id, "owner").expect("member"));
    }

    #[test]
    fn create_from_playbook_copies_checklists_with_fresh_ids() {
        let conn = open_memory_store().expect("store");
        let dir = SqliteDirectory::new(&conn);
        seed(&dir);
        let service = IncidentService::new(&conn, Collaborators::sqlite(&dir), Tracker::disabled());

        let mut playbook = Playbook::new("Outage", "team");
        playbook.id = "pb".into();
        playbook.checklists = vec![Checklist::new("triage", vec![ChecklistItem::new("page")])];
        populate_checklist_ids(&mut playbook.checklists);
        playbook.config.invited_user_ids = vec!["bob".into()];

        let incident = service
            .create_incident(Incident::new("Outage", "owner", "team"), Some(&playbook), true)
            .expect("create");

        assert_eq!(incident.playbook_id, "pb");
        assert_eq!(incident.checklists[0].items[0].title, "page");
        assert_ne!(incident.checklists[0].id, playbook.checklists[0].id);
        assert_ne!(incident.checklists[0].items[0].id, playbook.checklists[0].items[0].id);
        assert!(dir.is_channel_member(&incident.channel_id, "bob").expect("invited"));
    }

    #[test]
    fn create_rejects_blank_name() {
        let conn = open_memory_store().expect("store");
        let dir = SqliteDirectory::new(&conn);
        let service = IncidentService::new(&conn, Collaborators::sqlite(&dir), Tracker::disabled());
        let err = service
            .create_incident(Incident::new("  ", "owner", "team"), None, false)
            .expect_err("blank");
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn same_owner_is_a_successful_no_op() {
        let conn = open_memory_store().expect("store");
        let dir = SqliteDirectory::new(&conn);
        seed(&dir);
        let service = IncidentService::new(&conn, Collaborators::sqlite(&dir), Tracker::disabled());
        let incident = service
            .create_incident(Incident::new("x", "owner", "team"), None, false)
            .expect("create");

        let after = service
            .change_owner(&incident.id, "owner", "owner")
            .expect("no-op");
        assert_eq!(after.timeline_events.len(), 1);
    }

    #[test]
    fn metadata_counts_members_and_posts() {
        let conn = open_memory_store().expect("store");
        let dir = SqliteDirectory::new(&conn);
        seed(&dir);
        let service = IncidentService::new(&conn, Collaborators::sqlite(&dir), Tracker::disabled());
        let incident = service
            .create_incident(Incident::new("Cache miss storm", "owner", "team"), None, true)
            .expect("create");
        service
            .update_status(
                &incident.id,
                "owner",
                &StatusUpdateOptions {
                    status: Status::Active,
                    message: "investigating".into(),
                    ..StatusUpdateOptions::default()
                },
            )
            .expect("update");

        let meta = service.get_incident_metadata(&incident.id).expect("meta");
        assert_eq!(meta.channel_name, "cache-miss-storm");
        assert_eq!(meta.num_members, 1);
        assert_eq!(meta.total_posts, 1);
    }

    #[test]
    fn unknown_owner_is_not_found() {
        let conn = open_memory_store().expect("store");
        let dir = SqliteDirectory::new(&conn);
        seed(&dir);
        let service = IncidentService::new(&conn, Collaborators::sqlite(&dir), Tracker::disabled());
        let incident = service
            .create_incident(Incident::new("x", "owner", "team"), None, false)
            .expect("create");
        let err = service
            .change_owner(&incident.id, "owner", "ghost")
            .expect_err("ghost");
        assert!(matches!(err, Error::NotFound { what: "user", .. }));
    }
}
