//! The chat-platform mirror tables exposed through the collaborator traits.
//!
//! [`SqliteDirectory`] is what the CLI and the test suites run against: one
//! struct answering directory lookups, creating incident channels and
//! recording posts, all on the same connection as the incident tables so a
//! status update and its post commit together.

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::collab::{Channel, ChannelProvisioner, ChannelType, Directory, Poster, User};
use crate::id::new_id;
use crate::model::now_millis;

/// Suffixes tried when an incident channel name is already taken.
const MAX_NAME_SUFFIX: u32 = 100;

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        is_bot: row.get(2)?,
    })
}

fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<Channel> {
    let code: String = row.get(4)?;
    let channel_type = ChannelType::from_code(&code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown channel type '{code}'").into(),
        )
    })?;
    Ok(Channel {
        id: row.get(0)?,
        team_id: row.get(1)?,
        name: row.get(2)?,
        display_name: row.get(3)?,
        channel_type,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct SqliteDirectory<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteDirectory<'c> {
    #[must_use]
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Register a user. An empty `id` gets a generated one.
    ///
    /// # Errors
    ///
    /// Fails when the id or username is taken.
    pub fn add_user(&self, id: &str, username: &str, is_bot: bool) -> anyhow::Result<User> {
        let user = User {
            id: if id.is_empty() { new_id() } else { id.to_string() },
            username: username.to_string(),
            is_bot,
        };
        self.conn
            .execute(
                "INSERT INTO users (id, username, is_bot, create_at) VALUES (?1, ?2, ?3, ?4)",
                params![user.id, user.username, user.is_bot, now_millis()],
            )
            .with_context(|| format!("add user @{username}"))?;
        Ok(user)
    }

    /// # Errors
    ///
    /// Store failure.
    pub fn add_team_member(&self, team_id: &str, user_id: &str) -> anyhow::Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO team_members (team_id, user_id) VALUES (?1, ?2)",
                params![team_id, user_id],
            )
            .with_context(|| format!("add {user_id} to team {team_id}"))?;
        Ok(())
    }

    /// Register a channel with an explicit id. Used for seeding.
    ///
    /// # Errors
    ///
    /// Fails when the id or `(team, name)` is taken.
    pub fn add_channel(&self, channel: &Channel) -> anyhow::Result<()> {
        self.conn
            .execute(
                "INSERT INTO channels (id, team_id, name, display_name, channel_type, create_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    channel.id,
                    channel.team_id,
                    channel.name,
                    channel.display_name,
                    channel.channel_type.code(),
                    now_millis()
                ],
            )
            .with_context(|| format!("add channel ~{}", channel.name))?;
        Ok(())
    }

    /// Every user, ordered by username.
    ///
    /// # Errors
    ///
    /// Store failure.
    pub fn users(&self) -> anyhow::Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, username, is_bot FROM users ORDER BY username")?;
        let rows = stmt.query_map([], user_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("list users")
    }

    /// Channels of a team, ordered by name.
    ///
    /// # Errors
    ///
    /// Store failure.
    pub fn channels(&self, team_id: &str) -> anyhow::Result<Vec<Channel>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, team_id, name, display_name, channel_type FROM channels
             WHERE team_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map([team_id], channel_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("list channels")
    }

    fn name_taken(&self, team_id: &str, name: &str) -> anyhow::Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM channels WHERE team_id = ?1 AND name = ?2)",
                params![team_id, name],
                |row| row.get(0),
            )
            .context("check channel name")
    }
}

impl Directory for SqliteDirectory<'_> {
    fn user(&self, user_id: &str) -> anyhow::Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT id, username, is_bot FROM users WHERE id = ?1",
                [user_id],
                user_from_row,
            )
            .optional()
            .with_context(|| format!("look up user {user_id}"))
    }

    fn user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let username = username.trim_start_matches('@');
        self.conn
            .query_row(
                "SELECT id, username, is_bot FROM users WHERE username = ?1 COLLATE NOCASE",
                [username],
                user_from_row,
            )
            .optional()
            .with_context(|| format!("look up user @{username}"))
    }

    fn channel(&self, channel_id: &str) -> anyhow::Result<Option<Channel>> {
        self.conn
            .query_row(
                "SELECT id, team_id, name, display_name, channel_type FROM channels WHERE id = ?1",
                [channel_id],
                channel_from_row,
            )
            .optional()
            .with_context(|| format!("look up channel {channel_id}"))
    }

    fn channel_by_name(&self, team_id: &str, name: &str) -> anyhow::Result<Option<Channel>> {
        let name = name.trim_start_matches('~');
        self.conn
            .query_row(
                "SELECT id, team_id, name, display_name, channel_type FROM channels
                 WHERE team_id = ?1 AND name = ?2",
                params![team_id, name],
                channel_from_row,
            )
            .optional()
            .with_context(|| format!("look up channel ~{name}"))
    }

    fn is_channel_member(&self, channel_id: &str, user_id: &str) -> anyhow::Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM channel_members WHERE channel_id = ?1 AND user_id = ?2)",
                params![channel_id, user_id],
                |row| row.get(0),
            )
            .context("check channel membership")
    }

    fn is_team_member(&self, team_id: &str, user_id: &str) -> anyhow::Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM team_members WHERE team_id = ?1 AND user_id = ?2)",
                params![team_id, user_id],
                |row| row.get(0),
            )
            .context("check team membership")
    }

    fn can_post(&self, channel_id: &str, user_id: &str) -> anyhow::Result<bool> {
        self.is_channel_member(channel_id, user_id)
    }
}

impl ChannelProvisioner for SqliteDirectory<'_> {
    fn create_channel(
        &self,
        team_id: &str,
        name: &str,
        display_name: &str,
        channel_type: ChannelType,
        creator_id: &str,
    ) -> anyhow::Result<Channel> {
        let mut candidate = name.to_string();
        let mut suffix = 1;
        while self.name_taken(team_id, &candidate)? {
            suffix += 1;
            anyhow::ensure!(
                suffix <= MAX_NAME_SUFFIX,
                "no free channel name for ~{name} in team {team_id}"
            );
            candidate = format!("{name}-{suffix}");
        }

        let channel = Channel {
            id: new_id(),
            team_id: team_id.to_string(),
            name: candidate,
            display_name: display_name.to_string(),
            channel_type,
        };
        self.add_channel(&channel)?;
        self.add_member(&channel.id, creator_id)?;
        tracing::debug!(channel_id = %channel.id, name = %channel.name, "provisioned channel");
        Ok(channel)
    }

    fn add_member(&self, channel_id: &str, user_id: &str) -> anyhow::Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO channel_members (channel_id, user_id) VALUES (?1, ?2)",
                params![channel_id, user_id],
            )
            .with_context(|| format!("add {user_id} to channel {channel_id}"))?;
        Ok(())
    }
}

impl Poster for SqliteDirectory<'_> {
    fn post_message(&self, channel_id: &str, user_id: &str, message: &str) -> anyhow::Result<String> {
        let post_id = new_id();
        self.conn
            .execute(
                "INSERT INTO posts (id, channel_id, user_id, message, create_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![post_id, channel_id, user_id, message, now_millis()],
            )
            .with_context(|| format!("post in channel {channel_id}"))?;
        Ok(post_id)
    }
}
