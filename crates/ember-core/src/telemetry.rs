//! Typed product-analytics events and a fire-and-forget tracker.
//!
//! Every significant mutation produces one [`TelemetryEvent`]. The
//! [`Tracker`] owns an immutable [`TelemetryConfig`] snapshot; to change the
//! enabled flag or version stamps, build a new tracker with
//! [`Tracker::with_config`]. Sink failures are logged and dropped, never
//! returned to the caller.

use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::model::{ChecklistItem, Incident, ItemState, Playbook, Status};

// ---------------------------------------------------------------------------
// Property records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentProperties {
    pub user_actual_id: String,
    pub incident_id: String,
    pub has_description: bool,
    pub owner_user_id: String,
    pub reporter_user_id: String,
    pub team_id: String,
    pub channel_id: String,
    pub create_at: i64,
    pub end_at: i64,
    pub delete_at: i64,
    pub playbook_id: String,
    pub num_checklists: usize,
    pub total_checklist_items: usize,
    pub num_status_posts: usize,
    pub current_status: Status,
    pub num_timeline_events: usize,
}

impl IncidentProperties {
    #[must_use]
    pub fn from_incident(incident: &Incident, user_id: &str) -> Self {
        Self {
            user_actual_id: user_id.to_string(),
            incident_id: incident.id.clone(),
            has_description: !incident.description.is_empty(),
            owner_user_id: incident.owner_user_id.clone(),
            reporter_user_id: incident.reporter_user_id.clone(),
            team_id: incident.team_id.clone(),
            channel_id: incident.channel_id.clone(),
            create_at: incident.create_at,
            end_at: incident.end_at,
            delete_at: incident.delete_at,
            playbook_id: incident.playbook_id.clone(),
            num_checklists: incident.checklists.len(),
            total_checklist_items: incident.checklists.iter().map(|c| c.items.len()).sum(),
            num_status_posts: incident.status_posts.len(),
            current_status: incident.current_status,
            num_timeline_events: incident.timeline_events.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskProperties {
    pub incident_id: String,
    pub user_actual_id: String,
    pub task_id: String,
    pub state: ItemState,
    pub assignee_id: String,
    pub has_command: bool,
    pub command_last_run: i64,
    pub has_description: bool,
}

impl TaskProperties {
    #[must_use]
    pub fn new(incident_id: &str, user_id: &str, task: &ChecklistItem) -> Self {
        Self {
            incident_id: incident_id.to_string(),
            user_actual_id: user_id.to_string(),
            task_id: task.id.clone(),
            state: task.state,
            assignee_id: task.assignee_id.clone(),
            has_command: !task.command.is_empty(),
            command_last_run: task.command_last_run,
            has_description: !task.description.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybookProperties {
    pub user_actual_id: String,
    pub playbook_id: String,
    pub has_description: bool,
    pub team_id: String,
    pub is_public: bool,
    pub create_at: i64,
    pub delete_at: i64,
    pub num_checklists: usize,
    pub total_checklist_items: usize,
    pub num_slash_commands: usize,
    pub num_members: usize,
    pub uses_reminder_message_template: bool,
    pub reminder_timer_default_seconds: i64,
    pub num_invited_user_ids: usize,
    pub num_invited_group_ids: usize,
    pub has_announcement_channel: bool,
    pub has_creation_webhook: bool,
}

impl PlaybookProperties {
    #[must_use]
    pub fn from_playbook(playbook: &Playbook, user_id: &str) -> Self {
        let items = playbook.checklists.iter().flat_map(|c| c.items.iter());
        Self {
            user_actual_id: user_id.to_string(),
            playbook_id: playbook.id.clone(),
            has_description: !playbook.description.is_empty(),
            team_id: playbook.team_id.clone(),
            is_public: playbook.create_public_incident,
            create_at: playbook.create_at,
            delete_at: playbook.delete_at,
            num_checklists: playbook.checklists.len(),
            total_checklist_items: playbook.num_steps(),
            num_slash_commands: items.filter(|i| !i.command.is_empty()).count(),
            num_members: playbook.member_ids.len(),
            uses_reminder_message_template: !playbook.config.reminder_message_template.is_empty(),
            reminder_timer_default_seconds: playbook.config.reminder_timer_default_seconds,
            num_invited_user_ids: playbook.config.invited_user_ids.len(),
            num_invited_group_ids: playbook.config.invited_group_ids.len(),
            has_announcement_channel: !playbook.config.announcement_channel_id.is_empty(),
            has_creation_webhook: !playbook.config.webhook_on_creation_url.is_empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum IncidentAction {
    Create { public: bool },
    End,
    Restart,
    ChangeOwner,
    UpdateStatus { reminder_timer_seconds: i64 },
    AddTimelineEventFromPost,
    RemoveTimelineEvent,
    UpdateRetrospective,
    PublishRetrospective,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TaskAction {
    #[serde(rename = "add_task")]
    Add,
    #[serde(rename = "remove_task")]
    Remove,
    #[serde(rename = "rename_task")]
    Rename,
    #[serde(rename = "modify_task_state")]
    ModifyState {
        new_state: ItemState,
        was_owner: bool,
        was_assignee: bool,
    },
    #[serde(rename = "set_assignee_for_task")]
    SetAssignee,
    #[serde(rename = "move_task")]
    Move,
    #[serde(rename = "run_task_slash_command")]
    RunSlashCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlaybookAction {
    Create,
    Update,
    Delete,
}

/// Upsell prompts shown to users on unlicensed installs.
///
/// The engine never shows these prompts itself. The front end that renders
/// them reports the click with [`TelemetryEvent::start_trial`] or
/// [`TelemetryEvent::notify_admins`] through the same [`Tracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PromptAction {
    ViewTimeline,
    AddMessageToTimeline,
    CreatePlaybook,
    RestrictPlaybookCreation,
    RestrictPlaybookAccess,
}

/// A closed set of analytics events, one family per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Incident {
        #[serde(flatten)]
        action: IncidentAction,
        properties: IncidentProperties,
    },
    Tasks {
        #[serde(flatten)]
        action: TaskAction,
        properties: TaskProperties,
    },
    Playbook {
        #[serde(flatten)]
        action: PlaybookAction,
        properties: PlaybookProperties,
    },
    /// A user asked for a trial from an upsell prompt. Caller-emitted.
    StartTrial {
        #[serde(flatten)]
        action: PromptAction,
        user_actual_id: String,
    },
    /// A user asked their admins to upgrade from an upsell prompt.
    /// Caller-emitted.
    NotifyAdmins {
        #[serde(flatten)]
        action: PromptAction,
        user_actual_id: String,
    },
}

impl TelemetryEvent {
    #[must_use]
    pub fn incident(action: IncidentAction, incident: &Incident, user_id: &str) -> Self {
        Self::Incident {
            action,
            properties: IncidentProperties::from_incident(incident, user_id),
        }
    }

    #[must_use]
    pub fn task(action: TaskAction, incident_id: &str, user_id: &str, task: &ChecklistItem) -> Self {
        Self::Tasks {
            action,
            properties: TaskProperties::new(incident_id, user_id, task),
        }
    }

    #[must_use]
    pub fn playbook(action: PlaybookAction, playbook: &Playbook, user_id: &str) -> Self {
        Self::Playbook {
            action,
            properties: PlaybookProperties::from_playbook(playbook, user_id),
        }
    }

    #[must_use]
    pub fn start_trial(action: PromptAction, user_id: &str) -> Self {
        Self::StartTrial {
            action,
            user_actual_id: user_id.to_string(),
        }
    }

    #[must_use]
    pub fn notify_admins(action: PromptAction, user_id: &str) -> Self {
        Self::NotifyAdmins {
            action,
            user_actual_id: user_id.to_string(),
        }
    }

    /// Event category name as sent to the analytics backend.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Incident { .. } => "incident",
            Self::Tasks { .. } => "tasks",
            Self::Playbook { .. } => "playbook",
            Self::StartTrial { .. } => "start_trial",
            Self::NotifyAdmins { .. } => "notify_admins",
        }
    }

    /// Action name within the category.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Incident { action, .. } => match action {
                IncidentAction::Create { .. } => "create",
                IncidentAction::End => "end",
                IncidentAction::Restart => "restart",
                IncidentAction::ChangeOwner => "change_owner",
                IncidentAction::UpdateStatus { .. } => "update_status",
                IncidentAction::AddTimelineEventFromPost => "add_timeline_event_from_post",
                IncidentAction::RemoveTimelineEvent => "remove_timeline_event",
                IncidentAction::UpdateRetrospective => "update_retrospective",
                IncidentAction::PublishRetrospective => "publish_retrospective",
            },
            Self::Tasks { action, .. } => match action {
                TaskAction::Add => "add_task",
                TaskAction::Remove => "remove_task",
                TaskAction::Rename => "rename_task",
                TaskAction::ModifyState { .. } => "modify_task_state",
                TaskAction::SetAssignee => "set_assignee_for_task",
                TaskAction::Move => "move_task",
                TaskAction::RunSlashCommand => "run_task_slash_command",
            },
            Self::Playbook { action, .. } => match action {
                PlaybookAction::Create => "create",
                PlaybookAction::Update => "update",
                PlaybookAction::Delete => "delete",
            },
            Self::StartTrial { action, .. } | Self::NotifyAdmins { action, .. } => match action {
                PromptAction::ViewTimeline => "view_timeline",
                PromptAction::AddMessageToTimeline => "add_message_to_timeline",
                PromptAction::CreatePlaybook => "create_playbook",
                PromptAction::RestrictPlaybookCreation => "restrict_playbook_creation",
                PromptAction::RestrictPlaybookAccess => "restrict_playbook_access",
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration and delivery
// ---------------------------------------------------------------------------

/// Snapshot of telemetry settings taken at tracker construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub diagnostic_id: String,
    pub plugin_version: String,
    pub server_version: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            diagnostic_id: String::new(),
            plugin_version: env!("CARGO_PKG_VERSION").to_string(),
            server_version: String::new(),
        }
    }
}

/// Delivery backend for telemetry events.
pub trait TelemetrySink: Send + Sync {
    /// Send one event stamped with `config`.
    ///
    /// # Errors
    ///
    /// Any delivery failure. The tracker logs and discards it.
    fn send(&self, event: &TelemetryEvent, config: &TelemetryConfig) -> anyhow::Result<()>;
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn send(&self, _event: &TelemetryEvent, _config: &TelemetryConfig) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Emits each event as JSON through `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn send(&self, event: &TelemetryEvent, config: &TelemetryConfig) -> anyhow::Result<()> {
        let payload = serde_json::to_string(event)?;
        tracing::debug!(
            target: "ember::telemetry",
            event = event.category(),
            action = event.action(),
            plugin_version = %config.plugin_version,
            server_version = %config.server_version,
            %payload,
            "telemetry event"
        );
        Ok(())
    }
}

/// Records events in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// `(category, action)` pairs, in send order.
    #[must_use]
    pub fn names(&self) -> Vec<(&'static str, &'static str)> {
        self.events()
            .iter()
            .map(|e| (e.category(), e.action()))
            .collect()
    }
}

impl TelemetrySink for MemorySink {
    fn send(&self, event: &TelemetryEvent, _config: &TelemetryConfig) -> anyhow::Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("telemetry buffer poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

/// Fire-and-forget event tracker.
pub struct Tracker {
    sink: Arc<dyn TelemetrySink>,
    config: TelemetryConfig,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Tracker {
    #[must_use]
    pub fn new(sink: Arc<dyn TelemetrySink>, config: TelemetryConfig) -> Self {
        Self { sink, config }
    }

    /// A tracker that never sends anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            sink: Arc::new(NoopSink),
            config: TelemetryConfig {
                enabled: false,
                ..TelemetryConfig::default()
            },
        }
    }

    /// Same sink, new settings snapshot.
    #[must_use]
    pub fn with_config(&self, config: TelemetryConfig) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Send `event` if enabled. Never fails.
    pub fn track(&self, event: &TelemetryEvent) {
        if !self.config.enabled {
            return;
        }
        if let Err(err) = self.sink.send(event, &self.config) {
            tracing::warn!(
                event = event.category(),
                action = event.action(),
                error = %err,
                "dropping telemetry event"
            );
        }
    }
}
