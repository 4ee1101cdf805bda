//! Checklist mutations on a persisted incident.
//!
//! Every operation loads the incident inside a `BEGIN IMMEDIATE`
//! transaction, applies one [`crate::checklist`] function to the whole
//! checklist document, and writes the document back, so concurrent
//! index-based edits of the same incident are serialized by SQLite.

use rusqlite::Connection;

use super::IncidentService;
use crate::checklist::{self, ItemEdit};
use crate::collab::call;
use crate::db;
use crate::error::{Error, Result};
use crate::id::populate_checklist_ids;
use crate::model::{Checklist, ChecklistItem, Incident, ItemState, TimelineEvent};
use crate::telemetry::{TaskAction, TelemetryEvent};
use crate::timeline::{self as events, Actor};

impl IncidentService<'_> {
    fn mutate_checklists<T>(
        &self,
        incident_id: &str,
        op: impl FnOnce(&Connection, &mut Incident, i64) -> Result<(T, Option<TimelineEvent>)>,
    ) -> Result<(Incident, T)> {
        let now = self.now();
        db::write_tx(self.conn, |conn| {
            let mut incident = db::incidents::load_incident(conn, incident_id)?;
            let (out, event) = op(conn, &mut incident, now)?;
            populate_checklist_ids(&mut incident.checklists);
            db::incidents::update_checklists(conn, &incident.id, &incident.checklists)?;
            if let Some(event) = event {
                db::timeline::create_timeline_event(conn, &event)?;
            }
            Ok((db::incidents::get_incident(conn, &incident.id)?, out))
        })
    }

    fn track_task(&self, action: TaskAction, incident_id: &str, actor_id: &str, item: &ChecklistItem) {
        self.track(&TelemetryEvent::task(action, incident_id, actor_id, item));
    }

    /// Append a checklist. Returns the updated incident.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown incident.
    pub fn add_checklist(&self, incident_id: &str, actor_id: &str, list: Checklist) -> Result<Incident> {
        let (incident, index) = self.mutate_checklists(incident_id, |_, incident, _| {
            Ok((checklist::add_checklist(&mut incident.checklists, list), None))
        })?;
        tracing::debug!(incident_id, actor_id, index, "checklist added");
        Ok(incident)
    }

    /// # Errors
    ///
    /// [`Error::OutOfRange`] for a bad checklist index.
    pub fn rename_checklist(
        &self,
        incident_id: &str,
        actor_id: &str,
        checklist_index: usize,
        title: &str,
    ) -> Result<Incident> {
        if title.trim().is_empty() {
            return Err(Error::InvalidInput("checklist title is required".into()));
        }
        let (incident, previous) = self.mutate_checklists(incident_id, |_, incident, _| {
            Ok((
                checklist::rename_checklist(&mut incident.checklists, checklist_index, title)?,
                None,
            ))
        })?;
        tracing::debug!(incident_id, actor_id, %previous, title, "checklist renamed");
        Ok(incident)
    }

    /// Append an item to a checklist.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] when `checklist_index` is not below the
    /// checklist count.
    pub fn add_checklist_item(
        &self,
        incident_id: &str,
        actor_id: &str,
        checklist_index: usize,
        item: ChecklistItem,
    ) -> Result<Incident> {
        if item.title.trim().is_empty() {
            return Err(Error::InvalidInput("item title is required".into()));
        }
        let (incident, added) = self.mutate_checklists(incident_id, |_, incident, _| {
            let added = checklist::add_item(&mut incident.checklists, checklist_index, item)?;
            Ok((added.clone(), None))
        })?;
        self.track_task(TaskAction::Add, &incident.id, actor_id, &added);
        Ok(incident)
    }

    /// Remove an item; later items shift down.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] for either bad index.
    pub fn remove_checklist_item(
        &self,
        incident_id: &str,
        actor_id: &str,
        checklist_index: usize,
        item_index: usize,
    ) -> Result<Incident> {
        let (incident, removed) = self.mutate_checklists(incident_id, |_, incident, _| {
            Ok((
                checklist::remove_item(&mut incident.checklists, checklist_index, item_index)?,
                None,
            ))
        })?;
        self.track_task(TaskAction::Remove, &incident.id, actor_id, &removed);
        Ok(incident)
    }

    /// Replace an item's title, command and description.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] for either bad index.
    pub fn edit_checklist_item(
        &self,
        incident_id: &str,
        actor_id: &str,
        checklist_index: usize,
        item_index: usize,
        edit: ItemEdit,
    ) -> Result<Incident> {
        if edit.title.trim().is_empty() {
            return Err(Error::InvalidInput("item title is required".into()));
        }
        let (incident, edited) = self.mutate_checklists(incident_id, |_, incident, _| {
            checklist::edit_item(&mut incident.checklists, checklist_index, item_index, edit)?;
            let item = checklist::item(&incident.checklists, checklist_index, item_index)?;
            Ok((item.clone(), None))
        })?;
        self.track_task(TaskAction::Rename, &incident.id, actor_id, &edited);
        Ok(incident)
    }

    /// Move an item within one checklist.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] for a bad checklist, source or destination.
    pub fn move_checklist_item(
        &self,
        incident_id: &str,
        actor_id: &str,
        checklist_index: usize,
        source: usize,
        dest: usize,
    ) -> Result<Incident> {
        let (incident, moved) = self.mutate_checklists(incident_id, |_, incident, _| {
            checklist::move_item(&mut incident.checklists, checklist_index, source, dest)?;
            let position = dest.min(incident.checklists[checklist_index].items.len() - 1);
            let item = checklist::item(&incident.checklists, checklist_index, position)?;
            Ok((item.clone(), None))
        })?;
        self.track_task(TaskAction::Move, &incident.id, actor_id, &moved);
        Ok(incident)
    }

    /// Set an item's state. The modification time is stamped even when the
    /// state does not change; a timeline entry is written only when it does.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] for either bad index.
    pub fn modify_checked_state(
        &self,
        incident_id: &str,
        actor_id: &str,
        checklist_index: usize,
        item_index: usize,
        state: ItemState,
    ) -> Result<Incident> {
        let actor_name = self.username(actor_id)?;
        let (incident, (item, was_owner)) =
            self.mutate_checklists(incident_id, |_, incident, now| {
                let previous = checklist::modify_state(
                    &mut incident.checklists,
                    checklist_index,
                    item_index,
                    state,
                    now,
                )?;
                let item = checklist::item(&incident.checklists, checklist_index, item_index)?.clone();
                let event = (previous != state).then(|| {
                    events::task_state_modified(
                        &incident.id,
                        Actor::new(actor_id, &actor_name),
                        &item.title,
                        state,
                        now,
                    )
                });
                Ok(((item, incident.owner_user_id == actor_id), event))
            })?;

        self.track_task(
            TaskAction::ModifyState {
                new_state: state,
                was_owner,
                was_assignee: item.assignee_id == actor_id,
            },
            &incident.id,
            actor_id,
            &item,
        );
        Ok(incident)
    }

    /// Flip an item between open and closed.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] for either bad index.
    pub fn toggle_checked_state(
        &self,
        incident_id: &str,
        actor_id: &str,
        checklist_index: usize,
        item_index: usize,
    ) -> Result<Incident> {
        let current = db::incidents::load_incident(self.conn, incident_id)?;
        let state = checklist::item(&current.checklists, checklist_index, item_index)?
            .state
            .toggled();
        self.modify_checked_state(incident_id, actor_id, checklist_index, item_index, state)
    }

    /// Assign an item. An empty `assignee_id` clears the assignment.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown assignee; [`Error::OutOfRange`]
    /// for either bad index.
    pub fn set_assignee(
        &self,
        incident_id: &str,
        actor_id: &str,
        checklist_index: usize,
        item_index: usize,
        assignee_id: &str,
    ) -> Result<Incident> {
        let assignee_name = if assignee_id.is_empty() {
            String::new()
        } else {
            call("resolve assignee", self.collab.directory.user(assignee_id))?
                .ok_or_else(|| Error::not_found("user", assignee_id))?
                .username
        };
        let actor_name = self.username(actor_id)?;

        let (incident, item) = self.mutate_checklists(incident_id, |_, incident, now| {
            let previous = checklist::set_assignee(
                &mut incident.checklists,
                checklist_index,
                item_index,
                assignee_id,
                now,
            )?;
            let item = checklist::item(&incident.checklists, checklist_index, item_index)?.clone();
            let event = if previous == assignee_id {
                None
            } else {
                let previous_name = self.username(&previous)?;
                Some(events::assignee_changed(
                    &incident.id,
                    Actor::new(actor_id, &actor_name),
                    &item.title,
                    &previous_name,
                    Actor::new(assignee_id, &assignee_name),
                    now,
                ))
            };
            Ok((item, event))
        })?;

        if !assignee_id.is_empty() {
            if let Err(err) =
                call(
                    "add assignee to incident channel",
                    self.collab.provisioner.add_member(&incident.channel_id, assignee_id),
                )
            {
                tracing::warn!(incident_id, assignee_id, error = %err, "could not invite assignee");
            }
        }
        self.track_task(TaskAction::SetAssignee, &incident.id, actor_id, &item);
        Ok(incident)
    }

    /// Dispatch an item's command through the [`crate::collab::CommandRunner`]
    /// and record the run. Returns the command that ran.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] when the item has no command;
    /// [`Error::Collaborator`] when dispatch fails, in which case nothing is
    /// recorded.
    pub fn run_checklist_item_slash_command(
        &self,
        incident_id: &str,
        actor_id: &str,
        checklist_index: usize,
        item_index: usize,
    ) -> Result<String> {
        let current = db::incidents::load_incident(self.conn, incident_id)?;
        let command = checklist::item(&current.checklists, checklist_index, item_index)?
            .command
            .clone();
        if command.trim().is_empty() {
            return Err(Error::InvalidInput("checklist item has no command".into()));
        }
        call(
            "run slash command",
            self.collab
                .runner
                .execute(&current.channel_id, actor_id, &command),
        )?;

        let actor_name = self.username(actor_id)?;
        let (incident, item) = self.mutate_checklists(incident_id, |_, incident, now| {
            let ran = checklist::mark_command_run(
                &mut incident.checklists,
                checklist_index,
                item_index,
                now,
            )?;
            let item = checklist::item(&incident.checklists, checklist_index, item_index)?.clone();
            let event =
                events::ran_slash_command(&incident.id, Actor::new(actor_id, &actor_name), &ran, now);
            Ok((item, Some(event)))
        })?;

        self.track_task(TaskAction::RunSlashCommand, &incident.id, actor_id, &item);
        Ok(command)
    }
}
