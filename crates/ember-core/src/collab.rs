//! Contracts for the chat platform the engine runs against.
//!
//! The core never talks to a chat server directly. It resolves users and
//! channels through [`Directory`], obtains incident channels from a
//! [`ChannelProvisioner`], announces status updates through a [`Poster`], and
//! hands checklist commands to a [`CommandRunner`]. Implementations report
//! failures as `anyhow::Error`; the service wraps them in
//! [`Error::Collaborator`].

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{Error, Result};
use crate::model::ParseEnumError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub is_bot: bool,
}

/// Public channels are visible to every team member; private ones only to
/// their members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    #[default]
    Public,
    Private,
}

impl ChannelType {
    /// Single-letter code stored in the `channels` table.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Public => "O",
            Self::Private => "P",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "O" => Some(Self::Public),
            "P" => Some(Self::Private),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Public => "public",
            Self::Private => "private",
        })
    }
}

impl FromStr for ChannelType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" | "open" | "o" => Ok(Self::Public),
            "private" | "p" => Ok(Self::Private),
            _ => Err(ParseEnumError {
                expected: "channel type",
                got: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub display_name: String,
    pub channel_type: ChannelType,
}

/// User, channel and membership lookups.
pub trait Directory {
    /// # Errors
    /// Backend failure. A missing user is `Ok(None)`.
    fn user(&self, user_id: &str) -> anyhow::Result<Option<User>>;

    /// # Errors
    /// Backend failure. A missing user is `Ok(None)`.
    fn user_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;

    /// # Errors
    /// Backend failure. A missing channel is `Ok(None)`.
    fn channel(&self, channel_id: &str) -> anyhow::Result<Option<Channel>>;

    /// # Errors
    /// Backend failure. A missing channel is `Ok(None)`.
    fn channel_by_name(&self, team_id: &str, name: &str) -> anyhow::Result<Option<Channel>>;

    /// # Errors
    /// Backend failure.
    fn is_channel_member(&self, channel_id: &str, user_id: &str) -> anyhow::Result<bool>;

    /// # Errors
    /// Backend failure.
    fn is_team_member(&self, team_id: &str, user_id: &str) -> anyhow::Result<bool>;

    /// Whether `user_id` may post in `channel_id`.
    ///
    /// # Errors
    /// Backend failure.
    fn can_post(&self, channel_id: &str, user_id: &str) -> anyhow::Result<bool>;
}

/// Creates the dedicated channel for a new incident.
pub trait ChannelProvisioner {
    /// # Errors
    /// Backend failure, including name collisions.
    fn create_channel(
        &self,
        team_id: &str,
        name: &str,
        display_name: &str,
        channel_type: ChannelType,
        creator_id: &str,
    ) -> anyhow::Result<Channel>;

    /// Add `user_id` to the channel. Adding an existing member is a no-op.
    ///
    /// # Errors
    /// Backend failure.
    fn add_member(&self, channel_id: &str, user_id: &str) -> anyhow::Result<()>;
}

/// Posts messages into channels.
pub trait Poster {
    /// Returns the new post id.
    ///
    /// # Errors
    /// Backend failure.
    fn post_message(&self, channel_id: &str, user_id: &str, message: &str) -> anyhow::Result<String>;
}

/// Executes a checklist item's slash command.
pub trait CommandRunner {
    /// # Errors
    /// Command dispatch failure.
    fn execute(&self, channel_id: &str, user_id: &str, command: &str) -> anyhow::Result<()>;
}

/// A runner that accepts every command without doing anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRunner;

impl CommandRunner for NoopRunner {
    fn execute(&self, channel_id: &str, user_id: &str, command: &str) -> anyhow::Result<()> {
        tracing::debug!(channel_id, user_id, command, "command dispatch skipped");
        Ok(())
    }
}

/// Wrap a collaborator result into the engine's error type.
pub(crate) fn call<T>(what: &'static str, result: anyhow::Result<T>) -> Result<T> {
    result.map_err(|source| Error::Collaborator { what, source })
}

/// Username for display, falling back to the raw id.
pub(crate) fn display_name(directory: &dyn Directory, user_id: &str) -> Result<String> {
    if user_id.is_empty() {
        return Ok(String::new());
    }
    Ok(call("resolve user", directory.user(user_id))?
        .map_or_else(|| user_id.to_string(), |u| u.username))
}

/// Channel name derived from an incident name: lowercase, `-` separated,
/// ASCII alphanumerics only, at most 64 chars.
#[must_use]
pub fn channel_name_for(incident_name: &str) -> String {
    let mut out = String::with_capacity(incident_name.len());
    let mut last_dash = true;
    for ch in incident_name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
        if out.len() >= 64 {
            break;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "incident".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_type_codes_round_trip() {
        for kind in [ChannelType::Public, ChannelType::Private] {
            assert_eq!(ChannelType::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ChannelType::from_code("D"), None);
        assert_eq!("Private".parse::<ChannelType>(), Ok(ChannelType::Private));
    }

    #[test]
    fn channel_names_are_slugged() {
        assert_eq!(
            channel_name_for("[Dach Inc] Cluster servers are down!"),
            "dach-inc-cluster-servers-are-down"
        );
        assert_eq!(channel_name_for("???"), "incident");
        assert!(channel_name_for(&"x".repeat(200)).len() <= 64);
    }
}
