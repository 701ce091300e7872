/// Task extraction from raw markdown.
///
/// Recognizes checkbox list items:
///   `<indent><-|*|+> [ |x|X] <content>[ <!-- task-id: ID -->]`
/// Anything else (including lines inside fenced code blocks) is not a task
/// and is skipped without error.
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::identity;
use crate::types::{ListMarker, TaskRecord};

static TASK_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([ \t]*)([-*+])[ \t]+\[([ xX])\][ \t]+(.*)$").unwrap()
});

static BOLD_STAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static BOLD_UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"__(.+?)__").unwrap());
static ITALIC_STAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.+?)\*").unwrap());
static ITALIC_UNDERSCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b_(.+?)_\b").unwrap());
static HIGHLIGHT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"==(.+?)==").unwrap());
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").unwrap());
static CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());
static STRIKE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"~~(.+?)~~").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Split markdown into lines, accepting both `\n` and `\r\n` endings.
/// The result has one entry per `\n`-separated line, so indices line up with
/// `TaskRecord::source_line_index`.
pub fn split_lines(markdown: &str) -> Vec<&str> {
    markdown
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Tracks whether the current line sits inside a fenced code block.
#[derive(Debug, Default)]
pub(crate) struct FenceTracker {
    open: Option<char>,
}

impl FenceTracker {
    /// Feed one line. Returns true when the line is fenced content or a fence
    /// delimiter, i.e. must not be read as markdown structure.
    pub(crate) fn is_fenced(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();
        let fence = if trimmed.starts_with("```") {
            Some('`')
        } else if trimmed.starts_with("~~~") {
            Some('~')
        } else {
            None
        };
        match (self.open, fence) {
            (None, Some(c)) => {
                self.open = Some(c);
                true
            }
            (Some(open), Some(c)) if open == c => {
                self.open = None;
                true
            }
            (Some(_), _) => true,
            (None, None) => false,
        }
    }
}

/// Parse a single line as a task. The returned record carries a freshly
/// generated ID when the line has no identity comment.
pub fn parse_task_line(line: &str, line_index: usize) -> Option<TaskRecord> {
    let caps = TASK_LINE_RE.captures(line)?;
    let indent = caps[1].to_string();
    let list_marker = ListMarker::from_char(caps[2].chars().next()?)?;
    let check_mark = caps[3].chars().next()?;
    let content = &caps[4];

    let embedded = identity::extract_task_id(content);
    let raw_content = identity::strip_task_id(content).trim().to_string();
    if raw_content.is_empty() {
        return None;
    }

    Some(TaskRecord {
        has_embedded_id: embedded.is_some(),
        id: embedded.unwrap_or_else(identity::generate_task_id),
        indent_level: indent.chars().count() / 2,
        checked: check_mark != ' ',
        raw_content,
        list_marker,
        source_line_index: line_index,
        indent,
        check_mark,
        line: line.to_string(),
    })
}

/// Extract every task of a markdown document in document order.
///
/// IDs are unique within the returned list: a repeated embedded ID is
/// replaced by a fresh one on the later occurrence.
pub fn extract(markdown: &str) -> Vec<TaskRecord> {
    let mut fences = FenceTracker::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    for (index, line) in split_lines(markdown).into_iter().enumerate() {
        if fences.is_fenced(line) {
            continue;
        }
        let Some(mut record) = parse_task_line(line, index) else {
            continue;
        };
        if !seen.insert(record.id.clone()) {
            log::warn!(
                target: "wikiboard.extractor",
                "Duplicate task id {} on line {}, assigning a new one",
                record.id,
                index + 1
            );
            record.id = identity::generate_task_id();
            record.has_embedded_id = false;
            seen.insert(record.id.clone());
        }
        records.push(record);
    }

    records
}

/// Reduce task markdown to the plain text a renderer would display.
/// Only used for matching; never written back.
pub fn normalize_content(content: &str) -> String {
    let text = identity::strip_task_id(content);
    let text = BOLD_STAR_RE.replace_all(&text, "${1}");
    let text = BOLD_UNDERSCORE_RE.replace_all(&text, "${1}");
    let text = ITALIC_STAR_RE.replace_all(&text, "${1}");
    let text = ITALIC_UNDERSCORE_RE.replace_all(&text, "${1}");
    let text = HIGHLIGHT_RE.replace_all(&text, "${1}");
    let text = LINK_RE.replace_all(&text, "${1}");
    let text = CODE_RE.replace_all(&text, "${1}");
    let text = STRIKE_RE.replace_all(&text, "${1}");
    let text: String = text.nfc().collect();
    WHITESPACE_RE.replace_all(text.trim(), " ").to_string()
}
