//! Tier-specific summary text.

use mnemo_core::{
    RecordKind, RecordStatus, SessionRecord, SummaryEntry, SummaryTier, ThreadStatus,
    estimate_tokens,
};

/// Plain line used for size accounting and the verbatim tier.
pub(crate) fn entry_line(entry: &SummaryEntry) -> String {
    let mut line = format!("- {}: {}", entry.kind.as_str(), entry.content.trim());
    if let Some(reasoning) = entry.reasoning.as_deref().filter(|r| !r.is_empty()) {
        line.push_str(" (");
        line.push_str(reasoning);
        line.push(')');
    }
    if entry.kind == RecordKind::Todo {
        line.push_str(" [");
        line.push_str(entry.status.as_str());
        line.push(']');
    }
    if !entry.files.is_empty() {
        line.push_str(" {");
        line.push_str(&entry.files.iter().map(String::as_str).collect::<Vec<_>>().join(", "));
        line.push('}');
    }
    line.push('\n');
    line
}

/// Token size of a set of entries.
pub(crate) fn measure(entries: &[SummaryEntry]) -> usize {
    entries.iter().map(|e| estimate_tokens(&entry_line(e))).sum()
}

pub(crate) fn session_heading(session: &SessionRecord) -> String {
    format!(
        "Session {} on {}",
        session.start_time.format("%Y-%m-%d"),
        session.branch.as_deref().unwrap_or("unknown branch")
    )
}

pub(crate) fn thread_heading(theme: &str, sessions: usize, status: ThreadStatus) -> String {
    let noun = if sessions == 1 { "session" } else { "sessions" };
    format!("Thread '{theme}' ({sessions} {noun}, {})", status.as_str())
}

fn with_reasoning(entry: &SummaryEntry) -> String {
    match entry.reasoning.as_deref().filter(|r| !r.is_empty()) {
        Some(reasoning) => format!("{} ({reasoning})", entry.content.trim()),
        None => entry.content.trim().to_string(),
    }
}

fn section<F>(label: &str, entries: &[SummaryEntry], kind: RecordKind, item: F) -> Option<String>
where
    F: Fn(&SummaryEntry) -> Option<String>,
{
    let items: Vec<String> = entries
        .iter()
        .filter(|e| e.kind == kind)
        .filter_map(item)
        .collect();
    (!items.is_empty()).then(|| format!("{label}: {}", items.join(", ")))
}

fn sentence(heading: &str, sections: &[Option<String>]) -> String {
    let body: Vec<&str> = sections.iter().flatten().map(String::as_str).collect();
    if body.is_empty() {
        format!("{heading}: nothing recorded.")
    } else {
        format!("{heading}: {}.", body.join("; "))
    }
}

fn is_open(status: RecordStatus) -> bool {
    matches!(status, RecordStatus::Open | RecordStatus::InProgress)
}

/// Render entries for `tier` under `heading`.
pub(crate) fn render(tier: SummaryTier, heading: &str, entries: &[SummaryEntry]) -> String {
    match tier {
        SummaryTier::Immediate => {
            let mut text = format!("{heading}\n");
            for entry in entries {
                text.push_str(&entry_line(entry));
            }
            text
        }
        SummaryTier::Recent => sentence(
            heading,
            &[
                section("Decided", entries, RecordKind::Decision, |e| Some(with_reasoning(e))),
                section("Avoided", entries, RecordKind::Rejection, |e| Some(with_reasoning(e))),
                section("Fixed", entries, RecordKind::BugFix, |e| Some(with_reasoning(e))),
                section("Todo", entries, RecordKind::Todo, |e| {
                    Some(format!("{} ({})", e.content.trim(), e.status.as_str()))
                }),
            ],
        ),
        SummaryTier::Historical => sentence(
            heading,
            &[
                section("decisions", entries, RecordKind::Decision, |e| Some(with_reasoning(e))),
                section("avoided", entries, RecordKind::Rejection, |e| Some(e.content.trim().to_string())),
                section("fixes", entries, RecordKind::BugFix, |e| Some(e.content.trim().to_string())),
                section("open todos", entries, RecordKind::Todo, |e| {
                    is_open(e.status).then(|| e.content.trim().to_string())
                }),
            ],
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mnemo_core::MemoryRecord;

    use super::*;

    fn entry(kind: RecordKind, content: &str) -> SummaryEntry {
        SummaryEntry::from_record(&MemoryRecord::new(kind, content, Utc::now()))
    }

    #[test]
    fn recent_paragraph() {
        let mut todo = entry(RecordKind::Todo, "Add refresh tokens");
        todo.status = RecordStatus::InProgress;
        let mut decision = entry(RecordKind::Decision, "Use JWT");
        decision.reasoning = Some("stateless".into());
        let entries = vec![
            decision,
            entry(RecordKind::Rejection, "Session cookies"),
            entry(RecordKind::BugFix, "Token refresh loop"),
            todo,
        ];
        let text = render(SummaryTier::Recent, "Session 2026-03-02 on main", &entries);
        assert_eq!(
            text,
            "Session 2026-03-02 on main: Decided: Use JWT (stateless); Avoided: Session cookies; \
             Fixed: Token refresh loop; Todo: Add refresh tokens (in_progress)."
        );
    }

    #[test]
    fn historical_lists_only_open_todos() {
        let mut done = entry(RecordKind::Todo, "Write docs");
        done.status = RecordStatus::Completed;
        let entries = vec![entry(RecordKind::Decision, "Use JWT"), done, entry(RecordKind::Todo, "Rotate keys")];
        let heading = thread_heading("auth", 3, ThreadStatus::Active);
        assert_eq!(
            render(SummaryTier::Historical, &heading, &entries),
            "Thread 'auth' (3 sessions, active): decisions: Use JWT; open todos: Rotate keys."
        );
    }

    #[test]
    fn empty_summary_says_so() {
        assert_eq!(render(SummaryTier::Recent, "Session x on y", &[]), "Session x on y: nothing recorded.");
    }

    #[test]
    fn heading_falls_back_for_unknown_branch() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap();
        let session = SessionRecord::open(start, None, None, &std::collections::BTreeSet::new());
        assert_eq!(session_heading(&session), "Session 2026-03-02 on unknown branch");
        assert_eq!(thread_heading("x", 1, ThreadStatus::Dormant), "Thread 'x' (1 session, dormant)");
    }

    #[test]
    fn entry_line_shows_status_and_files() {
        let mut todo = entry(RecordKind::Todo, "Add index");
        let _ = todo.files.insert("db.sql".into());
        assert_eq!(entry_line(&todo), "- todo: Add index [open] {db.sql}\n");
    }
}
