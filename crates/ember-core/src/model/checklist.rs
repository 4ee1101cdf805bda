use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{ParseEnumError, normalize};

/// Progress state of a single checklist item.
///
/// The persisted form keeps the historical wire values: open items are
/// stored as the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ItemState {
    #[default]
    #[serde(rename = "", alias = "open")]
    Open,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "closed")]
    Closed,
}

impl ItemState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
        }
    }

    /// The state a plain check/uncheck toggle moves to.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Closed => Self::Open,
            Self::Open | Self::InProgress => Self::Closed,
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "" | "open" => Ok(Self::Open),
            "in_progress" | "inprogress" | "doing" => Ok(Self::InProgress),
            "closed" | "done" | "checked" => Ok(Self::Closed),
            _ => Err(ParseEnumError {
                expected: "item state",
                got: s.to_string(),
            }),
        }
    }
}

/// One actionable task inside a checklist.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub state: ItemState,
    pub state_modified: i64,
    pub assignee_id: String,
    pub assignee_modified: i64,
    pub command: String,
    pub command_last_run: i64,
}

impl ChecklistItem {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// An ordered list of items. Position is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Checklist {
    pub id: String,
    pub title: String,
    pub items: Vec<ChecklistItem>,
}

impl Checklist {
    #[must_use]
    pub fn new(title: impl Into<String>, items: Vec<ChecklistItem>) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_state_uses_empty_wire_value() {
        let json = serde_json::to_string(&ItemState::Open).expect("serialize");
        assert_eq!(json, "\"\"");
        let back: ItemState = serde_json::from_str("\"open\"").expect("alias");
        assert_eq!(back, ItemState::Open);
    }

    #[test]
    fn missing_fields_default_on_decode() {
        let item: ChecklistItem =
            serde_json::from_str(r#"{"title":"Page on-call"}"#).expect("decode");
        assert_eq!(item.state, ItemState::Open);
        assert!(item.id.is_empty());
        assert_eq!(item.command_last_run, 0);
    }

    #[test]
    fn parse_state_aliases() {
        assert_eq!("done".parse::<ItemState>(), Ok(ItemState::Closed));
        assert_eq!("in-progress".parse::<ItemState>(), Ok(ItemState::InProgress));
        assert!("maybe".parse::<ItemState>().is_err());
    }

    #[test]
    fn toggle_round_trips_closed() {
        assert_eq!(ItemState::Open.toggled(), ItemState::Closed);
        assert_eq!(ItemState::InProgress.toggled(), ItemState::Closed);
        assert_eq!(ItemState::Closed.toggled(), ItemState::Open);
    }
}
