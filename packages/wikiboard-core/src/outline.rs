/// Section outline of a wiki document.
///
/// Splits markdown into:
///   preamble      everything before the first `## ` heading
///   sections      one per `## ` heading, each holding
///     intro       lines before the first task
///     blocks      a task line plus the lines attached to it
///     trailer     lines after the last task block
///
/// Lines attached to a task are every line up to the next task, except for
/// the last task of a section, which only keeps its indented continuation.
/// Text lines keep a trailing `\r` when they had one, and task blocks record
/// it, so mixed line endings survive. Joining all parts back in order with
/// `\n` reproduces the document exactly.
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::extractor::{self, FenceTracker};
use crate::types::TaskRecord;

static DUPLICATE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*\S) \((\d+)\)$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct TaskBlock {
    pub record: TaskRecord,
    /// The task line ended in `\r\n`.
    pub crlf: bool,
    pub attached: Vec<String>,
}

impl TaskBlock {
    /// The task line as written, `\r` included.
    pub fn raw_line(&self) -> String {
        if self.crlf {
            format!("{}\r", self.record.line)
        } else {
            self.record.line.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Header text after `## `, trimmed.
    pub header: String,
    /// The heading line exactly as written.
    pub header_line: String,
    pub line_index: usize,
    pub intro: Vec<String>,
    pub blocks: Vec<TaskBlock>,
    pub trailer: Vec<String>,
}

impl Section {
    /// All lines of the section, heading included, in document order.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(1 + self.intro.len() + self.trailer.len());
        lines.push(self.header_line.clone());
        lines.extend(self.intro.iter().cloned());
        for block in &self.blocks {
            lines.push(block.raw_line());
            lines.extend(block.attached.iter().cloned());
        }
        lines.extend(self.trailer.iter().cloned());
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Outline {
    pub preamble: Vec<String>,
    pub sections: Vec<Section>,
    pub trailing_newline: bool,
    /// Most line breaks are `\r\n`; generated lines follow suit.
    pub crlf: bool,
}

enum BodyLine {
    Text(String),
    Task(TaskRecord, bool),
}

impl Outline {
    pub fn parse(markdown: &str) -> Self {
        let crlf = markdown.matches("\r\n").count() * 2 > markdown.matches('\n').count();
        let trailing_newline = markdown.ends_with('\n');
        let body = markdown.strip_suffix('\n').unwrap_or(markdown);

        let mut records: HashMap<usize, TaskRecord> = extractor::extract(markdown)
            .into_iter()
            .map(|record| (record.source_line_index, record))
            .collect();

        let mut outline = Outline {
            preamble: Vec::new(),
            sections: Vec::new(),
            trailing_newline,
            crlf,
        };
        if body.is_empty() {
            return outline;
        }

        let mut fences = FenceTracker::default();
        let mut current: Option<(String, String, usize, Vec<BodyLine>)> = None;

        for (index, raw) in body.split('\n').enumerate() {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            let fenced = fences.is_fenced(line);
            if !fenced && line.starts_with("## ") {
                if let Some((header, header_line, line_index, body_lines)) = current.take() {
                    outline
                        .sections
                        .push(build_section(header, header_line, line_index, body_lines));
                }
                current = Some((line[3..].trim().to_string(), raw.to_string(), index, Vec::new()));
                continue;
            }

            match current.as_mut() {
                None => outline.preamble.push(raw.to_string()),
                Some((_, _, _, body_lines)) => {
                    let entry = match records.remove(&index) {
                        Some(record) if !fenced => BodyLine::Task(record, raw.ends_with('\r')),
                        _ => BodyLine::Text(raw.to_string()),
                    };
                    body_lines.push(entry);
                }
            }
        }
        if let Some((header, header_line, line_index, body_lines)) = current.take() {
            outline
                .sections
                .push(build_section(header, header_line, line_index, body_lines));
        }

        outline
    }

    /// Task records of every section, in document order.
    pub fn records(&self) -> Vec<TaskRecord> {
        self.sections
            .iter()
            .flat_map(|section| section.blocks.iter().map(|block| block.record.clone()))
            .collect()
    }
}

fn build_section(
    header: String,
    header_line: String,
    line_index: usize,
    body_lines: Vec<BodyLine>,
) -> Section {
    let mut section = Section {
        header,
        header_line,
        line_index,
        intro: Vec::new(),
        blocks: Vec::new(),
        trailer: Vec::new(),
    };

    let task_positions: Vec<usize> = body_lines
        .iter()
        .enumerate()
        .filter(|(_, l)| matches!(l, BodyLine::Task(..)))
        .map(|(i, _)| i)
        .collect();

    if task_positions.is_empty() {
        let mut lines: Vec<String> = body_lines
            .into_iter()
            .map(|l| match l {
                BodyLine::Text(text) => text,
                BodyLine::Task(record, crlf) => TaskBlock {
                    record,
                    crlf,
                    attached: Vec::new(),
                }
                .raw_line(),
            })
            .collect();
        let content_end = lines
            .iter()
            .rposition(|l| !l.trim().is_empty())
            .map_or(0, |i| i + 1);
        section.trailer = lines.split_off(content_end);
        section.intro = lines;
        return section;
    }

    let last_task = task_positions[task_positions.len() - 1];
    let mut in_last_continuation = false;

    for (i, line) in body_lines.into_iter().enumerate() {
        match line {
            BodyLine::Task(record, crlf) => {
                in_last_continuation = i == last_task;
                section.blocks.push(TaskBlock {
                    record,
                    crlf,
                    attached: Vec::new(),
                });
            }
            BodyLine::Text(text) => {
                if section.blocks.is_empty() {
                    section.intro.push(text);
                } else if i < last_task {
                    if let Some(block) = section.blocks.last_mut() {
                        block.attached.push(text);
                    }
                } else if in_last_continuation && is_continuation(&text) {
                    if let Some(block) = section.blocks.last_mut() {
                        block.attached.push(text);
                    }
                } else {
                    in_last_continuation = false;
                    section.trailer.push(text);
                }
            }
        }
    }

    section
}

fn is_continuation(line: &str) -> bool {
    !line.trim().is_empty() && (line.starts_with(' ') || line.starts_with('\t'))
}

/// Split a stored header of the form `Title (N)` into `("Title", N)`.
pub fn split_duplicate_suffix(header: &str) -> Option<(&str, usize)> {
    let caps = DUPLICATE_SUFFIX_RE.captures(header)?;
    let base = caps.get(1)?.as_str();
    let n = caps.get(2)?.as_str().parse().ok()?;
    Some((base, n))
}

/// Stored header for the `occurrence`-th column (1-based) displaying `title`.
pub fn stored_header(title: &str, occurrence: usize) -> String {
    if occurrence <= 1 {
        title.to_string()
    } else {
        format!("{} ({})", title, occurrence)
    }
}

/// Display titles for a sequence of stored headers. A `Title (N)` header is
/// shown as `Title` only when an earlier column already displays `Title`.
pub fn display_titles<'a>(headers: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();
    for header in headers {
        let title = match split_duplicate_suffix(header) {
            Some((base, n)) if n >= 2 && titles.iter().any(|t| t == base) => base.to_string(),
            _ => header.to_string(),
        };
        titles.push(title);
    }
    titles
}
