//! Set similarity helpers.

use std::collections::BTreeSet;

/// Jaccard similarity `|a ∩ b| / |a ∪ b|`.
///
/// Returns 0 when either side is empty, so missing data never looks like
/// perfect overlap.
#[allow(clippy::cast_precision_loss)]
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Lower-case every element.
pub fn lowercase_set(set: &BTreeSet<String>) -> BTreeSet<String> {
    set.iter().map(|s| s.to_lowercase()).collect()
}

/// Lower-cased alphanumeric words of `text`.
pub fn word_set(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Word-level Jaccard similarity of two texts.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    jaccard(&word_set(a), &word_set(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn identical_sets_score_one() {
        assert!((jaccard(&set(&["a", "b"]), &set(&["a", "b"])) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_side_scores_zero() {
        assert!(jaccard(&set(&[]), &set(&["a"])).abs() < f64::EPSILON);
        assert!(jaccard::<String>(&set(&[]), &set(&[])).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_overlap() {
        let sim = jaccard(&set(&["a", "b", "c"]), &set(&["b", "c", "d"]));
        assert!((sim - 0.5).abs() < 1e-9);
    }

    #[test]
    fn text_similarity_ignores_case_and_punctuation() {
        let sim = text_similarity("Use SQLite, for storage.", "use sqlite for storage");
        assert!((sim - 1.0).abs() < f64::EPSILON);
    }
}
