use crate::types::TaskRecord;
/// Task-level diff between two versions of a document.
///
/// Tasks are compared by embedded task ID; lines without an ID comment get
/// a fresh ID on every extraction and cannot be followed, so they are left
/// out. Among tasks present in both versions, those outside the longest
/// common subsequence of the two orders count as reordered.
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub enum TaskChange {
    Added {
        id: String,
        content: String,
        checked: bool,
    },
    Removed {
        id: String,
        content: String,
    },
    Modified {
        id: String,
        old_content: String,
        new_content: String,
        old_checked: bool,
        new_checked: bool,
    },
    Moved {
        id: String,
        old_indent: usize,
        new_indent: usize,
        reordered: bool,
    },
}

fn tracked(records: &[TaskRecord]) -> Vec<&TaskRecord> {
    records.iter().filter(|r| r.has_embedded_id).collect()
}

/// IDs that kept their relative order between `old` and `new`.
fn stable_order<'a>(old: &[&'a str], new: &[&str]) -> HashSet<&'a str> {
    let (n, m) = (old.len(), new.len());
    let mut lcs = vec![vec![0u32; m + 1]; n + 1];
    for i in 0..n {
        for j in 0..m {
            lcs[i + 1][j + 1] = if old[i] == new[j] {
                lcs[i][j] + 1
            } else {
                lcs[i][j + 1].max(lcs[i + 1][j])
            };
        }
    }

    let mut stable = HashSet::new();
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        if old[i - 1] == new[j - 1] {
            stable.insert(old[i - 1]);
            i -= 1;
            j -= 1;
        } else if lcs[i - 1][j] >= lcs[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    stable
}

/// Compute changes between two extraction passes, old tasks first.
pub fn diff_tasks(old: &[TaskRecord], new: &[TaskRecord]) -> Vec<TaskChange> {
    let old = tracked(old);
    let new = tracked(new);
    let old_by_id: HashMap<&str, &TaskRecord> = old.iter().map(|r| (r.id.as_str(), *r)).collect();
    let new_by_id: HashMap<&str, &TaskRecord> = new.iter().map(|r| (r.id.as_str(), *r)).collect();

    let old_common: Vec<&str> = old
        .iter()
        .map(|r| r.id.as_str())
        .filter(|id| new_by_id.contains_key(id))
        .collect();
    let new_common: Vec<&str> = new
        .iter()
        .map(|r| r.id.as_str())
        .filter(|id| old_by_id.contains_key(id))
        .collect();
    let stable = stable_order(&old_common, &new_common);

    let mut changes = Vec::new();

    for old_task in &old {
        let id = old_task.id.as_str();
        let Some(new_task) = new_by_id.get(id) else {
            changes.push(TaskChange::Removed {
                id: id.to_string(),
                content: old_task.raw_content.clone(),
            });
            continue;
        };

        let reordered = !stable.contains(id);
        if reordered || old_task.indent_level != new_task.indent_level {
            changes.push(TaskChange::Moved {
                id: id.to_string(),
                old_indent: old_task.indent_level,
                new_indent: new_task.indent_level,
                reordered,
            });
        }
        if old_task.raw_content != new_task.raw_content || old_task.checked != new_task.checked {
            changes.push(TaskChange::Modified {
                id: id.to_string(),
                old_content: old_task.raw_content.clone(),
                new_content: new_task.raw_content.clone(),
                old_checked: old_task.checked,
                new_checked: new_task.checked,
            });
        }
    }

    for new_task in &new {
        if !old_by_id.contains_key(new_task.id.as_str()) {
            changes.push(TaskChange::Added {
                id: new_task.id.clone(),
                content: new_task.raw_content.clone(),
                checked: new_task.checked,
            });
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::extract;

    #[test]
    fn test_identical_documents() {
        let md = "- [ ] A <!-- task-id: a -->\n  - [x] B <!-- task-id: b -->\n";
        assert!(diff_tasks(&extract(md), &extract(md)).is_empty());
    }

    #[test]
    fn test_checked_change_is_modified() {
        let old = extract("- [ ] A <!-- task-id: a -->\n");
        let new = extract("- [x] A <!-- task-id: a -->\n");
        assert_eq!(
            diff_tasks(&old, &new),
            vec![TaskChange::Modified {
                id: "a".to_string(),
                old_content: "A".to_string(),
                new_content: "A".to_string(),
                old_checked: false,
                new_checked: true,
            }]
        );
    }

    #[test]
    fn test_added_and_removed() {
        let old = extract("- [ ] A <!-- task-id: a -->\n- [ ] B <!-- task-id: b -->\n");
        let new = extract("- [ ] A <!-- task-id: a -->\n- [ ] C <!-- task-id: c -->\n");
        let changes = diff_tasks(&old, &new);
        assert_eq!(changes.len(), 2);
        assert!(matches!(&changes[0], TaskChange::Removed { id, .. } if id == "b"));
        assert!(matches!(&changes[1], TaskChange::Added { id, .. } if id == "c"));
    }

    #[test]
    fn test_reorder_and_indent_are_moves() {
        let old = extract(
            "- [ ] A <!-- task-id: a -->\n  - [ ] B <!-- task-id: b -->\n- [ ] C <!-- task-id: c -->\n",
        );
        let new = extract(
            "- [ ] B <!-- task-id: b -->\n- [ ] A <!-- task-id: a -->\n- [ ] C <!-- task-id: c -->\n",
        );
        assert_eq!(
            diff_tasks(&old, &new),
            vec![TaskChange::Moved {
                id: "b".to_string(),
                old_indent: 1,
                new_indent: 0,
                reordered: true,
            }]
        );
    }

    #[test]
    fn test_indent_only_change() {
        let old = extract("- [ ] A <!-- task-id: a -->\n- [ ] B <!-- task-id: b -->\n");
        let new = extract("- [ ] A <!-- task-id: a -->\n  - [ ] B <!-- task-id: b -->\n");
        let changes = diff_tasks(&old, &new);
        assert_eq!(changes.len(), 1);
        assert!(matches!(
            &changes[0],
            TaskChange::Moved { id, reordered: false, .. } if id == "b"
        ));
    }

    #[test]
    fn test_tasks_without_ids_are_ignored() {
        let old = extract("- [ ] plain\n");
        let new = extract("- [x] plain\n- [ ] another\n");
        assert!(diff_tasks(&old, &new).is_empty());
    }
}
