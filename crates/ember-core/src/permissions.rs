//! Visibility and edit rules for a single incident or playbook.
//!
//! Collection queries enforce the same visibility rule in SQL (see
//! [`crate::db::query`]); these helpers cover single-entity access.

use serde::{Deserialize, Serialize};

use crate::collab::{ChannelType, Directory, call};
use crate::error::{Error, Result};
use crate::model::{Incident, Playbook};

/// Who is asking, and with which role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterInfo {
    pub user_id: String,
    pub team_id: String,
    pub is_admin: bool,
    pub is_guest: bool,
}

impl RequesterInfo {
    #[must_use]
    pub fn member(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn guest(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_guest: true,
            ..Self::default()
        }
    }
}

/// Admins see everything; guests need channel membership; members need
/// channel membership or a public channel.
///
/// # Errors
///
/// [`Error::Forbidden`] when not visible, or a collaborator failure.
pub fn check_view_incident(
    directory: &dyn Directory,
    requester: &RequesterInfo,
    incident: &Incident,
) -> Result<()> {
    if requester.is_admin {
        return Ok(());
    }
    if call(
        "check channel membership",
        directory.is_channel_member(&incident.channel_id, &requester.user_id),
    )? {
        return Ok(());
    }
    if !requester.is_guest {
        let channel = call("resolve channel", directory.channel(&incident.channel_id))?;
        if channel.is_some_and(|c| c.channel_type == ChannelType::Public) {
            return Ok(());
        }
    }
    Err(Error::Forbidden(format!(
        "user '{}' cannot view incident '{}'",
        requester.user_id, incident.id
    )))
}

/// Editing requires admin or the ability to post in the incident channel.
///
/// # Errors
///
/// [`Error::Forbidden`] when not allowed, or a collaborator failure.
pub fn check_edit_incident(
    directory: &dyn Directory,
    requester: &RequesterInfo,
    incident: &Incident,
) -> Result<()> {
    if requester.is_admin
        || call(
            "check post permission",
            directory.can_post(&incident.channel_id, &requester.user_id),
        )?
    {
        return Ok(());
    }
    Err(Error::Forbidden(format!(
        "user '{}' cannot modify incident '{}'",
        requester.user_id, incident.id
    )))
}

/// Playbooks with an empty member list are open to the whole team.
///
/// # Errors
///
/// [`Error::Forbidden`] when the requester is neither admin nor member.
pub fn check_playbook_access(requester: &RequesterInfo, playbook: &Playbook) -> Result<()> {
    if requester.is_admin
        || playbook.member_ids.is_empty()
        || playbook.member_ids.iter().any(|m| *m == requester.user_id)
    {
        return Ok(());
    }
    Err(Error::Forbidden(format!(
        "user '{}' is not a member of playbook '{}'",
        requester.user_id, playbook.id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{Channel, User};
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeDirectory {
        members: HashSet<(String, String)>,
        private: HashSet<String>,
    }

    impl Directory for FakeDirectory {
        fn user(&self, user_id: &str) -> anyhow::Result<Option<User>> {
            Ok(Some(User {
                id: user_id.into(),
                username: user_id.into(),
                is_bot: false,
            }))
        }
        fn user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
            self.user(username)
        }
        fn channel(&self, channel_id: &str) -> anyhow::Result<Option<Channel>> {
            Ok(Some(Channel {
                id: channel_id.into(),
                team_id: "t".into(),
                name: channel_id.into(),
                display_name: channel_id.into(),
                channel_type: if self.private.contains(channel_id) {
                    ChannelType::Private
                } else {
                    ChannelType::Public
                },
            }))
        }
        fn channel_by_name(&self, _team_id: &str, name: &str) -> anyhow::Result<Option<Channel>> {
            self.channel(name)
        }
        fn is_channel_member(&self, channel_id: &str, user_id: &str) -> anyhow::Result<bool> {
            Ok(self
                .members
                .contains(&(channel_id.to_string(), user_id.to_string())))
        }
        fn is_team_member(&self, _team_id: &str, _user_id: &str) -> anyhow::Result<bool> {
            Ok(true)
        }
        fn can_post(&self, channel_id: &str, user_id: &str) -> anyhow::Result<bool> {
            self.is_channel_member(channel_id, user_id)
        }
    }

    fn incident_in(channel: &str) -> Incident {
        let mut incident = Incident::new("x", "owner", "t");
        incident.id = "inc".into();
        incident.channel_id = channel.into();
        incident
    }

    #[test]
    fn private_channel_hidden_from_non_member() {
        let mut dir = FakeDirectory::default();
        dir.private.insert("secret".into());
        let err = check_view_incident(&dir, &RequesterInfo::member("eve"), &incident_in("secret"))
            .expect_err("hidden");
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[test]
    fn public_channel_visible_to_member_not_guest() {
        let dir = FakeDirectory::default();
        let incident = incident_in("town-square");
        assert!(check_view_incident(&dir, &RequesterInfo::member("eve"), &incident).is_ok());
        assert!(check_view_incident(&dir, &RequesterInfo::guest("gus"), &incident).is_err());
    }

    #[test]
    fn guest_member_and_admin_can_view_private() {
        let mut dir = FakeDirectory::default();
        dir.private.insert("secret".into());
        dir.members.insert(("secret".into(), "gus".into()));
        let incident = incident_in("secret");
        assert!(check_view_incident(&dir, &RequesterInfo::guest("gus"), &incident).is_ok());
        assert!(check_view_incident(&dir, &RequesterInfo::admin("root"), &incident).is_ok());
    }

    #[test]
    fn edit_requires_post_permission() {
        let mut dir = FakeDirectory::default();
        dir.members.insert(("c".into(), "alice".into()));
        let incident = incident_in("c");
        assert!(check_edit_incident(&dir, &RequesterInfo::member("alice"), &incident).is_ok());
        assert!(check_edit_incident(&dir, &RequesterInfo::member("bob"), &incident).is_err());
    }

    #[test]
    fn playbook_membership_rules() {
        let mut playbook = Playbook::new("p", "t");
        assert!(check_playbook_access(&RequesterInfo::member("x"), &playbook).is_ok());
        playbook.member_ids = vec!["alice".into()];
        assert!(check_playbook_access(&RequesterInfo::member("alice"), &playbook).is_ok());
        assert!(check_playbook_access(&RequesterInfo::member("bob"), &playbook).is_err());
        assert!(check_playbook_access(&RequesterInfo::admin("bob"), &playbook).is_ok());
    }
}
