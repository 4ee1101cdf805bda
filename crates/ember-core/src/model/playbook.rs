use serde::{Deserialize, Serialize};

use super::{Checklist, IncidentConfig};

/// A reusable incident template. Checklists are deep-copied into each
/// incident created from it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Playbook {
    pub id: String,
    pub title: String,
    pub description: String,
    pub team_id: String,
    pub create_public_incident: bool,
    pub create_at: i64,
    pub delete_at: i64,
    pub checklists: Vec<Checklist>,
    pub member_ids: Vec<String>,
    pub config: IncidentConfig,
    pub retrospective_template: String,
    pub retrospective_reminder_interval_seconds: i64,
}

impl Playbook {
    #[must_use]
    pub fn new(title: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            team_id: team_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn num_steps(&self) -> usize {
        self.checklists.iter().map(|c| c.items.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChecklistItem;

    #[test]
    fn num_steps_sums_all_checklists() {
        let mut playbook = Playbook::new("Outage", "t1");
        playbook.checklists = vec![
            Checklist::new("a", vec![ChecklistItem::new("1"), ChecklistItem::new("2")]),
            Checklist::new("b", vec![ChecklistItem::new("3")]),
        ];
        assert_eq!(playbook.num_steps(), 3);
    }
}
