//! Pure structural operations over an incident's ordered checklists.
//!
//! Every function works on an in-memory copy of the checklist slice and
//! either applies the whole change or returns [`Error::OutOfRange`] without
//! touching anything. Persisting the result is the caller's job; the store
//! rewrites the whole structure in one transaction.

use crate::error::{Error, Result};
use crate::id::new_id;
use crate::model::{Checklist, ChecklistItem, ItemState};

/// New field values for [`edit_item`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemEdit {
    pub title: String,
    pub command: String,
    pub description: String,
}

fn checklist_mut(checklists: &mut [Checklist], index: usize) -> Result<&mut Checklist> {
    let len = checklists.len();
    checklists.get_mut(index).ok_or(Error::OutOfRange {
        what: "checklist",
        index,
        len,
    })
}

fn item_mut(
    checklists: &mut [Checklist],
    checklist: usize,
    item: usize,
) -> Result<&mut ChecklistItem> {
    let list = checklist_mut(checklists, checklist)?;
    let len = list.items.len();
    list.items.get_mut(item).ok_or(Error::OutOfRange {
        what: "item",
        index: item,
        len,
    })
}

/// Append a checklist, assigning its identifiers. Returns its index.
pub fn add_checklist(checklists: &mut Vec<Checklist>, mut checklist: Checklist) -> usize {
    if checklist.id.is_empty() {
        checklist.id = new_id();
    }
    for item in &mut checklist.items {
        if item.id.is_empty() {
            item.id = new_id();
        }
    }
    checklists.push(checklist);
    checklists.len() - 1
}

/// Rename a checklist, returning the previous title.
///
/// # Errors
///
/// [`Error::OutOfRange`] if `index` does not name a checklist.
pub fn rename_checklist(checklists: &mut [Checklist], index: usize, title: &str) -> Result<String> {
    let list = checklist_mut(checklists, index)?;
    Ok(std::mem::replace(&mut list.title, title.to_string()))
}

/// Append `item` to checklist `index`, assigning an identifier if absent.
///
/// # Errors
///
/// [`Error::OutOfRange`] if `index` does not name a checklist.
pub fn add_item(
    checklists: &mut [Checklist],
    index: usize,
    mut item: ChecklistItem,
) -> Result<&ChecklistItem> {
    let list = checklist_mut(checklists, index)?;
    if item.id.is_empty() {
        item.id = new_id();
    }
    list.items.push(item);
    Ok(&list.items[list.items.len() - 1])
}

/// Remove and return an item; later items shift down by one.
///
/// # Errors
///
/// [`Error::OutOfRange`] if either index is invalid.
pub fn remove_item(
    checklists: &mut [Checklist],
    checklist: usize,
    item: usize,
) -> Result<ChecklistItem> {
    item_mut(checklists, checklist, item)?;
    Ok(checklists[checklist].items.remove(item))
}

/// Replace title, command and description in place. Identifier and state
/// are untouched. Returns the previous title.
///
/// # Errors
///
/// [`Error::OutOfRange`] if either index is invalid.
pub fn edit_item(
    checklists: &mut [Checklist],
    checklist: usize,
    item: usize,
    edit: ItemEdit,
) -> Result<String> {
    let target = item_mut(checklists, checklist, item)?;
    target.command = edit.command;
    target.description = edit.description;
    Ok(std::mem::replace(&mut target.title, edit.title))
}

/// Move an item from `source` to `dest` within one checklist.
///
/// `dest` is a position in the list with the item already removed; both
/// `len - 1` and `len` append. All other items keep their relative order.
///
/// # Errors
///
/// [`Error::OutOfRange`] if the checklist, `source` or `dest` is invalid.
pub fn move_item(
    checklists: &mut [Checklist],
    checklist: usize,
    source: usize,
    dest: usize,
) -> Result<()> {
    let list = checklist_mut(checklists, checklist)?;
    let len = list.items.len();
    if source >= len {
        return Err(Error::OutOfRange {
            what: "item",
            index: source,
            len,
        });
    }
    if dest > len {
        return Err(Error::OutOfRange {
            what: "destination",
            index: dest,
            len,
        });
    }
    let moved = list.items.remove(source);
    let dest = dest.min(list.items.len());
    list.items.insert(dest, moved);
    Ok(())
}

/// Set an item's state and stamp `state_modified`, even when the state is
/// unchanged. Returns the previous state.
///
/// # Errors
///
/// [`Error::OutOfRange`] if either index is invalid.
pub fn modify_state(
    checklists: &mut [Checklist],
    checklist: usize,
    item: usize,
    state: ItemState,
    now: i64,
) -> Result<ItemState> {
    let target = item_mut(checklists, checklist, item)?;
    let previous = target.state;
    target.state = state;
    target.state_modified = now;
    Ok(previous)
}

/// Assign (or with an empty id, unassign) an item. Returns the previous
/// assignee id.
///
/// # Errors
///
/// [`Error::OutOfRange`] if either index is invalid.
pub fn set_assignee(
    checklists: &mut [Checklist],
    checklist: usize,
    item: usize,
    assignee_id: &str,
    now: i64,
) -> Result<String> {
    let target = item_mut(checklists, checklist, item)?;
    target.assignee_modified = now;
    Ok(std::mem::replace(
        &mut target.assignee_id,
        assignee_id.to_string(),
    ))
}

/// Record that the item's command ran. Returns the command.
///
/// # Errors
///
/// [`Error::OutOfRange`] if either index is invalid, or
/// [`Error::InvalidInput`] if the item has no command.
pub fn mark_command_run(
    checklists: &mut [Checklist],
    checklist: usize,
    item: usize,
    now: i64,
) -> Result<String> {
    let target = item_mut(checklists, checklist, item)?;
    if target.command.trim().is_empty() {
        return Err(Error::InvalidInput(format!(
            "item '{}' has no command to run",
            target.title
        )));
    }
    target.command_last_run = now;
    Ok(target.command.clone())
}

/// Read-only item lookup with the same range errors as the mutators.
///
/// # Errors
///
/// [`Error::OutOfRange`] if either index is invalid.
pub fn item(checklists: &[Checklist], checklist: usize, item: usize) -> Result<&ChecklistItem> {
    let list = checklists.get(checklist).ok_or(Error::OutOfRange {
        what: "checklist",
        index: checklist,
        len: checklists.len(),
    })?;
    list.items.get(item).ok_or(Error::OutOfRange {
        what: "item",
        index: item,
        len: list.items.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::populate_checklist_ids;

    fn three_items() -> Vec<Checklist> {
        let mut lists = vec![Checklist::new(
            "triage",
            vec![
                ChecklistItem::new("page on-call"),
                ChecklistItem::new("open bridge"),
                ChecklistItem::new("notify support").with_command("/echo hi"),
            ],
        )];
        populate_checklist_ids(&mut lists);
        lists
    }

    fn ids(lists: &[Checklist]) -> Vec<String> {
        lists[0].items.iter().map(|i| i.id.clone()).collect()
    }

    #[test]
    fn remove_shifts_later_items_down() {
        let mut lists = three_items();
        let last_id = lists[0].items[2].id.clone();

        let removed = remove_item(&mut lists, 0, 1).expect("remove");

        assert_eq!(removed.title, "open bridge");
        assert_eq!(lists[0].items.len(), 2);
        assert_eq!(lists[0].items[1].id, last_id);
    }

    #[test]
    fn add_rejects_checklist_index_equal_to_count() {
        let mut lists = three_items();
        let err = add_item(&mut lists, 1, ChecklistItem::new("x")).expect_err("oob");
        assert!(matches!(
            err,
            Error::OutOfRange {
                what: "checklist",
                index: 1,
                len: 1
            }
        ));
    }

    #[test]
    fn add_assigns_id_when_missing() {
        let mut lists = three_items();
        let added = add_item(&mut lists, 0, ChecklistItem::new("x")).expect("add");
        assert!(crate::id::is_valid_id(&added.id));
        assert_eq!(lists[0].items.len(), 4);
    }

    #[test]
    fn out_of_range_leaves_structure_untouched() {
        let mut lists = three_items();
        let before = lists.clone();
        assert!(remove_item(&mut lists, 0, 3).is_err());
        assert!(move_item(&mut lists, 0, 0, 4).is_err());
        assert!(move_item(&mut lists, 0, 5, 0).is_err());
        assert!(modify_state(&mut lists, 2, 0, ItemState::Closed, 9).is_err());
        assert_eq!(lists, before);
    }

    #[test]
    fn move_to_last_position_appends() {
        let mut lists = three_items();
        let original = ids(&lists);

        move_item(&mut lists, 0, 0, 2).expect("move");

        assert_eq!(
            ids(&lists),
            vec![original[1].clone(), original[2].clone(), original[0].clone()]
        );
    }

    #[test]
    fn move_to_list_length_also_appends() {
        let mut lists = three_items();
        let original = ids(&lists);

        move_item(&mut lists, 0, 1, 3).expect("move");

        assert_eq!(
            ids(&lists),
            vec![original[0].clone(), original[2].clone(), original[1].clone()]
        );
    }

    #[test]
    fn move_back_restores_order() {
        let mut lists = three_items();
        let original = ids(&lists);

        move_item(&mut lists, 0, 2, 0).expect("move");
        move_item(&mut lists, 0, 0, 2).expect("move back");

        assert_eq!(ids(&lists), original);
    }

    #[test]
    fn modify_state_restamps_even_when_unchanged() {
        let mut lists = three_items();
        modify_state(&mut lists, 0, 0, ItemState::Closed, 100).expect("close");
        let prev = modify_state(&mut lists, 0, 0, ItemState::Closed, 200).expect("close again");

        assert_eq!(prev, ItemState::Closed);
        assert_eq!(lists[0].items[0].state_modified, 200);
    }

    #[test]
    fn edit_keeps_id_and_state() {
        let mut lists = three_items();
        modify_state(&mut lists, 0, 1, ItemState::InProgress, 5).expect("state");
        let id = lists[0].items[1].id.clone();

        let old = edit_item(
            &mut lists,
            0,
            1,
            ItemEdit {
                title: "open war room".into(),
                command: "/zoom start".into(),
                description: "use the big room".into(),
            },
        )
        .expect("edit");

        let item = &lists[0].items[1];
        assert_eq!(old, "open bridge");
        assert_eq!(item.id, id);
        assert_eq!(item.state, ItemState::InProgress);
        assert_eq!(item.title, "open war room");
        assert_eq!(item.command, "/zoom start");
    }

    #[test]
    fn empty_assignee_clears_assignment() {
        let mut lists = three_items();
        set_assignee(&mut lists, 0, 0, "alice", 10).expect("assign");
        let prev = set_assignee(&mut lists, 0, 0, "", 20).expect("clear");

        assert_eq!(prev, "alice");
        assert!(lists[0].items[0].assignee_id.is_empty());
        assert_eq!(lists[0].items[0].assignee_modified, 20);
    }

    #[test]
    fn command_run_bumps_last_run() {
        let mut lists = three_items();
        let cmd = mark_command_run(&mut lists, 0, 2, 77).expect("run");
        assert_eq!(cmd, "/echo hi");
        assert_eq!(lists[0].items[2].command_last_run, 77);

        let err = mark_command_run(&mut lists, 0, 0, 78).expect_err("no command");
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn add_then_remove_restores_structure() {
        let mut lists = three_items();
        let before = lists.clone();
        add_item(&mut lists, 0, ChecklistItem::new("temp")).expect("add");
        remove_item(&mut lists, 0, 3).expect("remove");
        assert_eq!(lists, before);
    }

    #[test]
    fn checklist_add_and_rename() {
        let mut lists = three_items();
        let idx = add_checklist(
            &mut lists,
            Checklist::new("comms", vec![ChecklistItem::new("status page")]),
        );
        assert_eq!(idx, 1);
        assert!(!lists[1].items[0].id.is_empty());

        let old = rename_checklist(&mut lists, 1, "communications").expect("rename");
        assert_eq!(old, "comms");
        assert!(rename_checklist(&mut lists, 2, "x").is_err());
    }
}
