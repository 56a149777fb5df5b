//! Deterministic token estimation.
//!
//! No tokenizer is consulted. The estimate is the larger of a word-based
//! and a character-based count:
//!
//! ```text
//! tokens = max(ceil(words * 1.3), ceil(chars / 4))
//! ```
//!
//! The function is monotonic in both counts and subadditive over
//! concatenation of whitespace-terminated pieces, which lets the compressor
//! bound a rendered payload by the sum of its line costs.

/// Characters per token in the character-based estimate.
pub const CHARS_PER_TOKEN: usize = 4;

/// Tokens per ten words in the word-based estimate (1.3 per word).
const TOKENS_PER_TEN_WORDS: usize = 13;

/// Estimate the token cost of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    let chars = text.chars().count();
    let by_words = (words * TOKENS_PER_TEN_WORDS).div_ceil(10);
    let by_chars = chars.div_ceil(CHARS_PER_TOKEN);
    by_words.max(by_chars)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn empty_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn word_heavy_text() {
        // 10 one-letter words, 19 chars: words dominate
        assert_eq!(estimate_tokens("a b c d e f g h i j"), 13);
    }

    #[test]
    fn char_heavy_text() {
        // one 40-char word
        assert_eq!(estimate_tokens(&"x".repeat(40)), 10);
    }

    #[test]
    fn counts_unicode_scalars() {
        assert_eq!(estimate_tokens("日本語日本語日本"), 2);
    }

    proptest! {
        #[test]
        fn subadditive_over_newline_pieces(a in "[a-z ]{0,40}", b in "[a-z ]{0,40}") {
            let pa = format!("{a}\n");
            let pb = format!("{b}\n");
            let joined = format!("{pa}{pb}");
            prop_assert!(estimate_tokens(&joined) <= estimate_tokens(&pa) + estimate_tokens(&pb));
        }

        #[test]
        fn appending_never_decreases(a in "[a-z ]{0,40}", b in "[a-z ]{0,40}") {
            let joined = format!("{a} {b}");
            prop_assert!(estimate_tokens(&joined) >= estimate_tokens(&a));
        }
    }
}
