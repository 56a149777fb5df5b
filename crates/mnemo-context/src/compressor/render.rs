//! Dense, grouped rendering of selected records.
//!
//! Output is a sequence of newline-terminated pieces: one header per
//! non-empty group followed by one line per record.

use std::fmt::Write as _;

use mnemo_core::{MemoryRecord, RecordKind, RecordStatus};

const MAX_LISTED_FILES: usize = 3;

/// Output group of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Group {
    Decisions,
    Avoided,
    Notes,
    Todos,
}

impl Group {
    pub(crate) const COUNT: usize = 4;

    pub(crate) fn of(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Decision => Self::Decisions,
            RecordKind::Rejection => Self::Avoided,
            RecordKind::BugFix => Self::Notes,
            RecordKind::Todo => Self::Todos,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub(crate) fn header(self) -> &'static str {
        match self {
            Self::Decisions => "Decisions:\n",
            Self::Avoided => "Avoided:\n",
            Self::Notes => "Notes by file:\n",
            Self::Todos => "Todos:\n",
        }
    }

    pub(crate) const ALL: [Self; Self::COUNT] = [Self::Decisions, Self::Avoided, Self::Notes, Self::Todos];
}

fn todo_marker(status: RecordStatus) -> &'static str {
    match status {
        RecordStatus::InProgress => "[~]",
        RecordStatus::Completed | RecordStatus::Obsolete => "[x]",
        RecordStatus::Open => "[ ]",
    }
}

fn file_list(record: &MemoryRecord) -> String {
    if record.files.is_empty() {
        return String::new();
    }
    let shown: Vec<&str> = record
        .files
        .iter()
        .take(MAX_LISTED_FILES)
        .map(String::as_str)
        .collect();
    let hidden = record.files.len().saturating_sub(MAX_LISTED_FILES);
    if hidden > 0 {
        format!(" [{} +{hidden}]", shown.join(", "))
    } else {
        format!(" [{}]", shown.join(", "))
    }
}

/// Key a bug fix is filed under.
pub(crate) fn note_key(record: &MemoryRecord) -> &str {
    record.files.iter().next().map_or("general", String::as_str)
}

/// One newline-terminated line for `record`, with `reasoning` in place of
/// the record's own.
pub(crate) fn render_line(record: &MemoryRecord, reasoning: Option<&str>) -> String {
    let content = record.content.trim();
    let mut line = match record.kind {
        RecordKind::Decision | RecordKind::Rejection => format!("- {content}"),
        RecordKind::BugFix => format!("- {}: {content}", note_key(record)),
        RecordKind::Todo => format!("- {} {content}", todo_marker(record.status)),
    };
    if let Some(reasoning) = reasoning.map(str::trim).filter(|r| !r.is_empty()) {
        let label = match record.kind {
            RecordKind::Decision => "why",
            RecordKind::Rejection => "because",
            RecordKind::BugFix => "cause",
            RecordKind::Todo => "note",
        };
        let _ = write!(line, " ({label}: {reasoning})");
    }
    if matches!(record.kind, RecordKind::Decision | RecordKind::Todo) {
        line.push_str(&file_list(record));
    }
    line.push('\n');
    line
}

/// Concatenate lines under their group headers, groups in fixed order and
/// lines in the order given.
pub(crate) fn render_groups(lines: &[(Group, String)]) -> String {
    let mut out = String::new();
    for group in Group::ALL {
        let mut members = lines.iter().filter(|(g, _)| *g == group).peekable();
        if members.peek().is_none() {
            continue;
        }
        out.push_str(group.header());
        for (_, line) in members {
            out.push_str(line);
        }
    }
    out
}
