//! Identifier assignment for incidents, checklists, items and events.
//!
//! Identifiers are 26 characters of z-base-32. Once assigned they are never
//! rewritten; reads never renumber.

use rand::Rng;

use crate::model::Checklist;

/// Length of every generated identifier.
pub const ID_LEN: usize = 26;

const ALPHABET: &[u8; 32] = b"ybndrfg8ejkmcpqxot1uwisza345h769";

/// Generate a fresh random identifier.
#[must_use]
pub fn new_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

/// Whether `s` looks like an identifier produced by [`new_id`].
#[must_use]
pub fn is_valid_id(s: &str) -> bool {
    s.len() == ID_LEN && s.bytes().all(|b| ALPHABET.contains(&b))
}

/// Assign identifiers to checklists and items that lack one.
///
/// Existing identifiers are left untouched.
pub fn populate_checklist_ids(checklists: &mut [Checklist]) {
    for checklist in checklists {
        if checklist.id.is_empty() {
            checklist.id = new_id();
        }
        for item in &mut checklist.items {
            if item.id.is_empty() {
                item.id = new_id();
            }
        }
    }
}

/// Deep-copy template checklists, giving every checklist and item a new
/// identifier distinct from the template's.
#[must_use]
pub fn fresh_copy(template: &[Checklist]) -> Vec<Checklist> {
    let mut copy = template.to_vec();
    for checklist in &mut copy {
        checklist.id = new_id();
        for item in &mut checklist.items {
            item.id = new_id();
        }
    }
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChecklistItem;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_valid_and_distinct() {
        let ids: HashSet<_> = (0..500).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 500);
        assert!(ids.iter().all(|id| is_valid_id(id)));
    }

    #[test]
    fn populate_keeps_existing_ids() {
        let mut keep = ChecklistItem::new("keep");
        keep.id = "existing".into();
        let mut lists = vec![Checklist::new("a", vec![keep, ChecklistItem::new("new")])];

        populate_checklist_ids(&mut lists);

        assert!(is_valid_id(&lists[0].id));
        assert_eq!(lists[0].items[0].id, "existing");
        assert!(is_valid_id(&lists[0].items[1].id));
    }

    #[test]
    fn populate_is_stable_across_calls() {
        let mut lists = vec![Checklist::new("a", vec![ChecklistItem::new("x")])];
        populate_checklist_ids(&mut lists);
        let before = lists.clone();
        populate_checklist_ids(&mut lists);
        assert_eq!(lists, before);
    }

    #[test]
    fn fresh_copy_replaces_every_id() {
        let mut template = vec![Checklist::new("a", vec![ChecklistItem::new("x")])];
        populate_checklist_ids(&mut template);

        let copy = fresh_copy(&template);

        assert_ne!(copy[0].id, template[0].id);
        assert_ne!(copy[0].items[0].id, template[0].items[0].id);
        assert_eq!(copy[0].items[0].title, "x");
    }
}
