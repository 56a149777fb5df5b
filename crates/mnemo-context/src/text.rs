//! Text clipping shared by the compressor and the summarizer.

const ELLIPSIS: &str = "...";

/// Clip `text` to at most `max_chars` characters, ellipsis included,
/// cutting at a word boundary when one exists.
///
/// Text already within the limit is returned unchanged, so clipping is
/// idempotent.
pub fn clip_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    if keep == 0 {
        return ELLIPSIS.chars().take(max_chars).collect();
    }
    let prefix: String = text.chars().take(keep).collect();
    let cut = match prefix.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => prefix[..idx].trim_end(),
        _ => prefix.as_str(),
    };
    format!("{cut}{ELLIPSIS}")
}
