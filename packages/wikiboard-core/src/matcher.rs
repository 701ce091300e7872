/// Task identity matching.
///
/// Pairs board nodes (rendered text + indent) with extracted task records so
/// each node carries the stable ID of the markdown line it came from.
///
/// Tiers, each skipping IDs already handed out in this pass:
///   1. exact normalized text, same indent
///   2. substring either way, same indent
///   3. exact or substring, any indent; closest indent wins
/// Ties go to the first candidate in document order.
use std::collections::HashSet;

use crate::board::Board;
use crate::extractor::normalize_content;
use crate::identity;
use crate::outline::Outline;
use crate::types::TaskRecord;

struct Candidate<'a> {
    record: &'a TaskRecord,
    normalized: String,
}

/// Candidate pool prepared once per extraction pass.
pub struct Matcher<'a> {
    candidates: Vec<Candidate<'a>>,
}

impl<'a> Matcher<'a> {
    pub fn new(records: &'a [TaskRecord]) -> Self {
        Self {
            candidates: records
                .iter()
                .map(|record| Candidate {
                    record,
                    normalized: normalize_content(&record.raw_content),
                })
                .collect(),
        }
    }

    fn open<'s>(
        &'s self,
        assigned: &'s HashSet<String>,
    ) -> impl Iterator<Item = &'s Candidate<'a>> + 's {
        self.candidates
            .iter()
            .filter(move |c| !assigned.contains(&c.record.id))
    }

    pub fn find(
        &self,
        displayed_text: &str,
        indent_level: usize,
        already_assigned: &HashSet<String>,
    ) -> Option<&'a TaskRecord> {
        let text = normalize_content(displayed_text);
        if text.is_empty() {
            return None;
        }
        let contains = |c: &Candidate<'_>| {
            !c.normalized.is_empty()
                && (c.normalized.contains(&text) || text.contains(&c.normalized))
        };

        if let Some(c) = self
            .open(already_assigned)
            .find(|c| c.normalized == text && c.record.indent_level == indent_level)
        {
            return Some(c.record);
        }
        if let Some(c) = self
            .open(already_assigned)
            .find(|c| c.record.indent_level == indent_level && contains(c))
        {
            return Some(c.record);
        }
        self.open(already_assigned)
            .filter(|c| c.normalized == text || contains(c))
            .min_by_key(|c| c.record.indent_level.abs_diff(indent_level))
            .map(|c| c.record)
    }
}

/// Find the record for one displayed task. `None` means the caller has to
/// mint a new ID.
pub fn match_task<'a>(
    candidates: &'a [TaskRecord],
    displayed_text: &str,
    indent_level: usize,
    already_assigned: &HashSet<String>,
) -> Option<&'a TaskRecord> {
    Matcher::new(candidates).find(displayed_text, indent_level, already_assigned)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Nodes that already carried an ID and kept it.
    pub kept: usize,
    /// Nodes that received the ID of a matched record.
    pub matched: usize,
    /// Nodes with no match that got a brand-new ID.
    pub minted: usize,
}

/// Assign stable IDs to every node of the board from one extraction pass.
///
/// A node that already has an ID keeps it: if the ID is present in the pass
/// the record is claimed directly, otherwise the node still claims its best
/// textual match so that record cannot go to another node. Nodes without an
/// ID adopt the matched record's ID or a freshly minted one.
pub fn reconcile(board: &mut Board, records: &[TaskRecord]) -> ReconcileReport {
    let matcher = Matcher::new(records);
    let record_ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
    let mut assigned: HashSet<String> = HashSet::new();
    let mut report = ReconcileReport::default();
    let mut pending = Vec::new();

    for node in board.nodes_mut() {
        match node.task_id.as_deref() {
            Some(id) if record_ids.contains(id) && !assigned.contains(id) => {
                assigned.insert(id.to_string());
                report.kept += 1;
            }
            Some(id) if assigned.contains(id) => {
                log::warn!(
                    target: "wikiboard.matcher",
                    "Task id {} appears on more than one node, rematching",
                    id
                );
                node.task_id = None;
                pending.push(node.id);
            }
            _ => pending.push(node.id),
        }
    }

    for node in board.nodes_mut() {
        if !pending.contains(&node.id) {
            continue;
        }
        let found = matcher.find(&node.display_text, node.indent_level, &assigned);
        if let Some(record) = found {
            assigned.insert(record.id.clone());
        }
        match (node.task_id.is_some(), found) {
            (true, _) => report.kept += 1,
            (false, Some(record)) => {
                node.task_id = Some(record.id.clone());
                report.matched += 1;
            }
            (false, None) => {
                let id = identity::generate_task_id();
                log::warn!(
                    target: "wikiboard.matcher",
                    "No markdown line matches task \"{}\", minted {}",
                    node.display_text,
                    id
                );
                assigned.insert(id.clone());
                node.task_id = Some(id);
                report.minted += 1;
            }
        }
    }

    log::debug!(
        target: "wikiboard.matcher",
        "Reconciled board: {} kept, {} matched, {} minted",
        report.kept,
        report.matched,
        report.minted
    );
    report
}

/// Reconcile a board against the document it shows. Only tasks under a
/// `## ` heading are candidates; tasks in the preamble never reach the
/// board and must not lend it their IDs.
pub fn reconcile_document(board: &mut Board, markdown: &str) -> ReconcileReport {
    reconcile(board, &Outline::parse(markdown).records())
}
