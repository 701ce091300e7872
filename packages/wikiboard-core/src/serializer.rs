/// Board to markdown.
///
/// The board is merged onto the current markdown rather than rendered from
/// scratch: content before the first `## ` heading, section text around the
/// tasks, lines attached to a task and sections without a column all come
/// from the original. Only task lines and renamed or new headers are
/// generated, and a task whose state did not change is written back as its
/// exact original line.
use std::collections::{HashMap, HashSet};

use crate::board::Board;
use crate::extractor::normalize_content;
use crate::identity;
use crate::outline::{self, Outline, Section};
use crate::types::{Column, ColumnId, NodeId, TaskNode, TaskRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct SerializeOutput {
    pub markdown: String,
    /// The header written for every column, in board order.
    pub column_headers: Vec<(ColumnId, String)>,
}

pub fn serialize(original: &str, board: &Board) -> String {
    serialize_board(original, board).markdown
}

/// A task block of a section that belongs to a column.
struct Slot<'o> {
    record: &'o TaskRecord,
    crlf: bool,
    attached: &'o [String],
    normalized: String,
}

pub fn serialize_board(original: &str, board: &Board) -> SerializeOutput {
    let outline = Outline::parse(original);
    let columns = board.columns();

    let sections = claim_sections(&outline, columns);
    let headers = assign_headers(&outline, columns, &sections);

    let claimed: HashSet<usize> = sections.iter().flatten().copied().collect();
    let slots: Vec<Slot<'_>> = outline
        .sections
        .iter()
        .enumerate()
        .filter(|(i, _)| claimed.contains(i))
        .flat_map(|(_, section)| section.blocks.iter())
        .map(|block| Slot {
            record: &block.record,
            crlf: block.crlf,
            attached: &block.attached,
            normalized: normalize_content(&block.record.raw_content),
        })
        .collect();
    let assignment = assign_slots(board, &slots);

    // Unclaimed sections are kept after the claimed section preceding them.
    let mut passthrough: HashMap<Option<usize>, Vec<&Section>> = HashMap::new();
    for (i, section) in outline.sections.iter().enumerate() {
        if !claimed.contains(&i) {
            let anchor = (0..i).rev().find(|j| claimed.contains(j));
            passthrough.entry(anchor).or_default().push(section);
        }
    }

    // Lines keep their own `\r`; generated ones take the document's ending.
    let generated = |line: String| if outline.crlf { line + "\r" } else { line };
    let mut lines: Vec<String> = outline.preamble.clone();
    emit_passthrough(&mut lines, passthrough.get(&None));

    for ((column, section_index), (_, header_line)) in columns.iter().zip(&sections).zip(&headers) {
        let section = section_index.map(|i| &outline.sections[i]);
        if section.is_none() && lines.last().is_some_and(|l| !l.trim().is_empty()) {
            lines.push(generated(String::new()));
        }
        lines.push(header_line.clone());
        if let Some(section) = section {
            lines.extend(section.intro.iter().cloned());
        }
        for node in &column.nodes {
            match assignment.get(&node.id).map(|&i| &slots[i]) {
                Some(slot) => {
                    let line = render_task(node, Some(slot.record));
                    lines.push(if slot.crlf { line + "\r" } else { line });
                    let delta = node.indent_level as isize - slot.record.indent_level as isize;
                    lines.extend(slot.attached.iter().map(|l| shift_line(l, delta)));
                }
                None => lines.push(generated(render_task(node, None))),
            }
        }
        if let Some(section) = section {
            lines.extend(section.trailer.iter().cloned());
        }
        if let Some(i) = section_index {
            emit_passthrough(&mut lines, passthrough.get(&Some(*i)));
        }
    }

    let mut markdown = lines.join("\n");
    if outline.trailing_newline || (original.is_empty() && !lines.is_empty()) {
        markdown.push('\n');
    } else if markdown.ends_with('\r') && !original.ends_with('\r') {
        markdown.pop();
    }

    log::debug!(
        target: "wikiboard.serializer",
        "Serialized {} columns, {} of {} tasks matched, {} sections passed through",
        columns.len(),
        assignment.len(),
        board.nodes().count(),
        outline.sections.len() - claimed.len()
    );

    SerializeOutput {
        markdown,
        column_headers: columns
            .iter()
            .zip(headers)
            .map(|(column, (header, _))| (column.id, header))
            .collect(),
    }
}

/// The original section each column was loaded from, matched by the stored
/// header. Each section goes to at most one column.
fn claim_sections(outline: &Outline, columns: &[Column]) -> Vec<Option<usize>> {
    let mut taken = vec![false; outline.sections.len()];
    columns
        .iter()
        .map(|column| {
            let source = column.source.as_ref()?;
            let index = (0..outline.sections.len())
                .find(|&i| !taken[i] && outline.sections[i].header == source.header)?;
            taken[index] = true;
            Some(index)
        })
        .collect()
}

/// 1-based position of a column among the columns displaying its title.
fn occurrence(columns: &[Column], index: usize) -> usize {
    let title = &columns[index].title;
    1 + columns[..index].iter().filter(|c| &c.title == title).count()
}

/// A stored header still reads back as `title`: the plain title, or a
/// `title (N)` suffix while an earlier column displays `title`.
fn header_fits(header: &str, title: &str, occurrence: usize) -> bool {
    header == title
        || (occurrence > 1
            && outline::split_duplicate_suffix(header).is_some_and(|(base, _)| base == title))
}

/// Header text and heading line per column. Unrenamed columns keep their
/// original heading while it still reads back as their title; everything
/// else gets `Title` or `Title (N)`, whichever is free first.
fn assign_headers(
    outline: &Outline,
    columns: &[Column],
    sections: &[Option<usize>],
) -> Vec<(String, String)> {
    let mut used: HashSet<String> = HashSet::new();
    let mut kept: Vec<Option<&Section>> = Vec::with_capacity(columns.len());
    for (ci, (column, section)) in columns.iter().zip(sections).enumerate() {
        let keep = section.map(|i| &outline.sections[i]).filter(|s| {
            !column.is_renamed()
                && header_fits(&s.header, &column.title, occurrence(columns, ci))
                && used.insert(s.header.clone())
        });
        kept.push(keep);
    }
    for (i, section) in outline.sections.iter().enumerate() {
        if !sections.contains(&Some(i)) {
            used.insert(section.header.clone());
        }
    }

    columns
        .iter()
        .enumerate()
        .zip(kept)
        .map(|((ci, column), keep)| match keep {
            Some(section) => (section.header.clone(), section.header_line.clone()),
            None => {
                let mut n = occurrence(columns, ci);
                let mut header = outline::stored_header(&column.title, n);
                while used.contains(&header) {
                    n += 1;
                    header = outline::stored_header(&column.title, n);
                }
                used.insert(header.clone());
                let mut line = format!("## {}", header);
                if outline.crlf {
                    line.push('\r');
                }
                (header, line)
            }
        })
        .collect()
}

/// Pair board nodes with original task blocks: by embedded ID first, then by
/// content. Moved nodes only accept an exact content match. New nodes have
/// no original.
fn assign_slots(board: &Board, slots: &[Slot<'_>]) -> HashMap<NodeId, usize> {
    let by_id: HashMap<&str, usize> = slots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.record.has_embedded_id)
        .map(|(i, s)| (s.record.id.as_str(), i))
        .collect();
    let mut consumed = vec![false; slots.len()];
    let mut assignment = HashMap::new();

    for node in board.nodes() {
        let Some(&index) = node.task_id.as_deref().and_then(|id| by_id.get(id)) else {
            continue;
        };
        if !consumed[index] {
            consumed[index] = true;
            assignment.insert(node.id, index);
        }
    }

    for node in board.nodes() {
        if node.is_new || assignment.contains_key(&node.id) {
            continue;
        }
        let text = normalize_content(node.original_markdown.as_deref().unwrap_or(&node.display_text));
        if text.is_empty() {
            continue;
        }
        let exact = (0..slots.len()).find(|&i| !consumed[i] && slots[i].normalized == text);
        let found = exact.or_else(|| {
            if node.was_moved {
                return None;
            }
            (0..slots.len()).find(|&i| {
                let candidate = &slots[i].normalized;
                !consumed[i]
                    && !candidate.is_empty()
                    && (candidate.contains(&text) || text.contains(candidate.as_str()))
            })
        });
        if let Some(index) = found {
            consumed[index] = true;
            assignment.insert(node.id, index);
        }
    }

    assignment
}

fn emit_passthrough(lines: &mut Vec<String>, sections: Option<&Vec<&Section>>) {
    for section in sections.into_iter().flatten() {
        lines.extend(section.lines());
    }
}

/// Render one task line. Unchanged tasks come back verbatim; otherwise the
/// original indent, marker and check character are reused where they still
/// apply.
fn render_task(node: &TaskNode, record: Option<&TaskRecord>) -> String {
    let embedded = record.filter(|r| r.has_embedded_id).map(|r| r.id.as_str());
    let task_id = node.task_id.as_deref().or(embedded);

    if let Some(record) = record {
        let same_content = node
            .original_markdown
            .as_deref()
            .map_or(true, |m| m == record.raw_content);
        if same_content
            && node.checked == record.checked
            && node.indent_level == record.indent_level
            && task_id == embedded
        {
            return record.line.clone();
        }
    }

    let indent = match record {
        Some(r) if r.indent_level == node.indent_level => r.indent.clone(),
        _ => "  ".repeat(node.indent_level),
    };
    let marker = record.map_or('-', |r| r.list_marker.as_char());
    let mark = match record {
        _ if !node.checked => ' ',
        Some(r) if r.checked => r.check_mark,
        _ => 'x',
    };
    let content = node
        .original_markdown
        .as_deref()
        .or(record.map(|r| r.raw_content.as_str()))
        .unwrap_or(&node.display_text);

    let content = match task_id {
        Some(id) => identity::inject_task_id(content, id),
        None => content.to_string(),
    };
    format!("{}{} [{}] {}", indent, marker, mark, content)
}

/// Re-indent an attached line by `delta` levels. Indenting adds two spaces
/// per level; outdenting removes two indent characters (space or tab) per
/// level, as many as the line has.
fn shift_line(line: &str, delta: isize) -> String {
    if delta == 0 || line.trim().is_empty() {
        return line.to_string();
    }
    let width = delta.unsigned_abs() * 2;
    if delta > 0 {
        format!("{}{}", " ".repeat(width), line)
    } else {
        let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
        line[width.min(indent)..].to_string()
    }
}
