//! Playbook management.

use super::IncidentService;
use crate::collab::call;
use crate::db;
use crate::error::{Error, Result};
use crate::id::{new_id, populate_checklist_ids};
use crate::model::Playbook;
use crate::permissions::{self, RequesterInfo};
use crate::telemetry::{PlaybookAction, TelemetryEvent};

fn check_webhook(field: &str, url: &str) -> Result<()> {
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        return Ok(());
    }
    Err(Error::InvalidInput(format!(
        "{field} must be an http or https URL, got '{url}'"
    )))
}

impl IncidentService<'_> {
    /// Validate a playbook and drop settings that reference people or
    /// channels outside the actor's reach.
    fn sanitize_playbook(&self, actor_id: &str, playbook: &mut Playbook) -> Result<()> {
        if playbook.title.trim().is_empty() {
            return Err(Error::InvalidInput("playbook title is required".into()));
        }
        if playbook.team_id.is_empty() {
            return Err(Error::InvalidInput("playbook team is required".into()));
        }
        check_webhook("webhook on creation", &playbook.config.webhook_on_creation_url)?;
        check_webhook(
            "webhook on status update",
            &playbook.config.webhook_on_status_update_url,
        )?;

        let directory = self.collab.directory;
        let team_id = playbook.team_id.clone();
        let mut invited = Vec::with_capacity(playbook.config.invited_user_ids.len());
        for user_id in playbook.config.invited_user_ids.drain(..) {
            if call("check team membership", directory.is_team_member(&team_id, &user_id))? {
                invited.push(user_id);
            } else {
                tracing::debug!(playbook = %playbook.title, user_id = %user_id, "dropping invitee outside team");
            }
        }
        playbook.config.invited_user_ids = invited;

        let owner = &playbook.config.default_owner_id;
        if !owner.is_empty() && !call("check team membership", directory.is_team_member(&team_id, owner))? {
            playbook.config.default_owner_id.clear();
        }
        for channel in [
            &mut playbook.config.announcement_channel_id,
            &mut playbook.config.broadcast_channel_id,
        ] {
            if !channel.is_empty() && !call("check post permission", directory.can_post(channel.as_str(), actor_id))? {
                channel.clear();
            }
        }

        populate_checklist_ids(&mut playbook.checklists);
        Ok(())
    }

    /// Store a new playbook. The id is generated here.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a preset id, missing title or team, or a
    /// webhook that is not an http(s) URL.
    pub fn create_playbook(&self, actor_id: &str, mut playbook: Playbook) -> Result<Playbook> {
        if !playbook.id.is_empty() {
            return Err(Error::InvalidInput("playbook already has an id".into()));
        }
        self.sanitize_playbook(actor_id, &mut playbook)?;
        playbook.id = new_id();
        playbook.create_at = self.now();
        playbook.delete_at = 0;

        let created = db::write_tx(self.conn, |conn| {
            db::playbooks::insert_playbook(conn, &playbook)?;
            db::playbooks::get_playbook(conn, &playbook.id)
        })?;
        tracing::info!(playbook_id = %created.id, title = %created.title, "playbook created");
        self.track(&TelemetryEvent::playbook(PlaybookAction::Create, &created, actor_id));
        Ok(created)
    }

    /// # Errors
    ///
    /// [`Error::NotFound`] when absent.
    pub fn get_playbook(&self, playbook_id: &str) -> Result<Playbook> {
        db::playbooks::get_playbook(self.conn, playbook_id)
    }

    /// [`Self::get_playbook`] restricted to the playbook's members.
    ///
    /// # Errors
    ///
    /// [`Error::Forbidden`] for non-members.
    pub fn get_playbook_for(&self, requester: &RequesterInfo, playbook_id: &str) -> Result<Playbook> {
        let playbook = self.get_playbook(playbook_id)?;
        permissions::check_playbook_access(requester, &playbook)?;
        Ok(playbook)
    }

    /// Rewrite a live playbook. Creation time is preserved.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when absent or deleted.
    pub fn update_playbook(&self, actor_id: &str, mut playbook: Playbook) -> Result<Playbook> {
        if playbook.id.is_empty() {
            return Err(Error::InvalidInput("playbook id is required".into()));
        }
        self.sanitize_playbook(actor_id, &mut playbook)?;

        let updated = db::write_tx(self.conn, |conn| {
            let existing = db::playbooks::get_playbook(conn, &playbook.id)?;
            if existing.delete_at != 0 {
                return Err(Error::not_found("playbook", &playbook.id));
            }
            playbook.create_at = existing.create_at;
            playbook.delete_at = 0;
            db::playbooks::update_playbook(conn, &playbook)?;
            db::playbooks::get_playbook(conn, &playbook.id)
        })?;
        self.track(&TelemetryEvent::playbook(PlaybookAction::Update, &updated, actor_id));
        Ok(updated)
    }

    /// Soft-delete a playbook. Incidents created from it are unaffected.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when absent or already deleted.
    pub fn delete_playbook(&self, actor_id: &str, playbook_id: &str) -> Result<()> {
        let now = self.now();
        let deleted = db::write_tx(self.conn, |conn| {
            db::playbooks::delete_playbook(conn, playbook_id, now)?;
            db::playbooks::get_playbook(conn, playbook_id)
        })?;
        tracing::info!(playbook_id, "playbook deleted");
        self.track(&TelemetryEvent::playbook(PlaybookAction::Delete, &deleted, actor_id));
        Ok(())
    }

    /// Live playbooks of a team that the requester may use.
    ///
    /// # Errors
    ///
    /// Store failure.
    pub fn get_playbooks_for_team(&self, requester: &RequesterInfo, team_id: &str) -> Result<Vec<Playbook>> {
        Ok(db::playbooks::list_playbooks(self.conn, team_id)?
            .into_iter()
            .filter(|playbook| permissions::check_playbook_access(requester, playbook).is_ok())
            .collect())
    }
}
