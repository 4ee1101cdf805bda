//! Subcommand handlers. Each maps onto one engine operation.

pub mod bulk;
pub mod channel;
pub mod checklist;
pub mod completions;
pub mod create;
pub mod init;
pub mod item;
pub mod list;
pub mod nuke;
pub mod owner;
pub mod playbook;
pub mod retro;
pub mod show;
pub mod stats;
pub mod status;
pub mod timeline;
pub mod user;

use anyhow::{Context as _, Result, anyhow, bail};
use chrono::{DateTime, NaiveDate};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ember_core::config::{EffectiveConfig, resolve_config};
use ember_core::db::directory::SqliteDirectory;
use ember_core::db::try_open_store;
use ember_core::permissions::RequesterInfo;
use ember_core::telemetry::{LogSink, Tracker};
use ember_core::{Collaborators, ErrorCode, IncidentService};

use crate::identity;
use crate::output::OutputMode;

/// Per-invocation settings shared by every handler.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub project_root: PathBuf,
    pub output: OutputMode,
    pub user_flag: Option<String>,
    pub config: EffectiveConfig,
}

impl Ctx {
    /// # Errors
    ///
    /// Fails when a config file is malformed.
    pub fn load(project_root: &Path, json: bool, user_flag: Option<String>) -> Result<Self> {
        let config = resolve_config(project_root, json)?;
        Ok(Self {
            project_root: project_root.to_path_buf(),
            output: OutputMode::from_resolved(&config.resolved_output),
            user_flag,
            config,
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.config.project.store.resolve(&self.project_root)
    }

    /// Open the initialized store.
    ///
    /// # Errors
    ///
    /// Fails when `em init` has not run or the store cannot be opened.
    pub fn open(&self) -> Result<Workspace> {
        let path = self.store_path();
        let conn = try_open_store(&path)?.ok_or_else(|| {
            anyhow!(
                "{} at {} [{}]",
                ErrorCode::NotInitialized.message(),
                path.display(),
                ErrorCode::NotInitialized.code()
            )
        })?;
        Ok(Workspace { conn })
    }

    /// Fails unless `[testing] enable_testing` is set.
    ///
    /// # Errors
    ///
    /// Always, when testing commands are disabled.
    pub fn require_testing(&self, command: &str) -> Result<()> {
        if self.config.project.testing.enable_testing {
            return Ok(());
        }
        bail!("`em {command}` is disabled; set `[testing] enable_testing = true` in .ember/config.toml")
    }

    fn tracker(&self) -> Tracker {
        Tracker::new(Arc::new(LogSink), self.config.project.telemetry.snapshot())
    }

    fn config_user(&self) -> Option<&str> {
        self.config.user.user_id.as_deref()
    }
}

/// An open store. Borrow a directory and a service from it per command.
pub struct Workspace {
    pub conn: Connection,
}

impl Workspace {
    pub const fn directory(&self) -> SqliteDirectory<'_> {
        SqliteDirectory::new(&self.conn)
    }

    pub fn service<'a>(&'a self, ctx: &Ctx, directory: &'a SqliteDirectory<'_>) -> IncidentService<'a> {
        IncidentService::new(&self.conn, Collaborators::sqlite(directory), ctx.tracker())
    }
}

/// The acting user's id.
///
/// # Errors
///
/// Fails when no identity resolves or it names no registered user.
pub fn actor(ctx: &Ctx, directory: &SqliteDirectory<'_>) -> Result<String> {
    identity::require_user(directory, ctx.user_flag.as_deref(), ctx.config_user())
}

/// The acting user's id, once they are allowed to modify `incident_id`.
///
/// # Errors
///
/// Fails when no identity resolves, the incident is unknown, or the user
/// cannot post in its channel.
pub fn editor(
    ctx: &Ctx,
    directory: &SqliteDirectory<'_>,
    service: &IncidentService<'_>,
    incident_id: &str,
) -> Result<String> {
    let actor_id = actor(ctx, directory)?;
    service.check_edit(&RequesterInfo::member(actor_id.as_str()), incident_id)?;
    Ok(actor_id)
}

/// Requester for read paths. Reads work without an identity and then see
/// only what an anonymous team member would.
///
/// # Errors
///
/// Fails when an identity is given but names no registered user.
pub fn requester(ctx: &Ctx, directory: &SqliteDirectory<'_>, admin: bool) -> Result<RequesterInfo> {
    let user_id = match identity::resolve_user(ctx.user_flag.as_deref(), ctx.config_user()) {
        Some(name) => identity::lookup_user(directory, &name)?,
        None => String::new(),
    };
    Ok(if admin {
        RequesterInfo::admin(user_id)
    } else {
        RequesterInfo::member(user_id)
    })
}

/// Parse a point in time: epoch milliseconds, RFC 3339, or `YYYY-MM-DD`
/// (midnight UTC).
///
/// # Errors
///
/// Fails when none of the forms match.
pub fn parse_time(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if let Ok(millis) = raw.parse::<i64>() {
        return Ok(millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid time '{raw}'; use epoch ms, RFC 3339 or YYYY-MM-DD"))?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or_default())
}

/// Format epoch milliseconds as `YYYY-MM-DD HH:MM` UTC; `-` for zero.
pub fn fmt_time(millis: i64) -> String {
    if millis == 0 {
        return "-".to_string();
    }
    DateTime::from_timestamp_millis(millis)
        .map_or_else(|| millis.to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}
