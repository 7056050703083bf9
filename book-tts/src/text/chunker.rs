//! Token-bounded chunking of raw book text for the LLM cleaning pass.

use super::tokens::TokenCounter;
use once_cell::sync::Lazy;
use regex::Regex;

/// One word and the whitespace that follows it.
static WORD_UNIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+\s*").unwrap());

/// A contiguous run of words that fits the token budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenChunk {
    /// Chunk text with trailing whitespace trimmed.
    pub text: String,
    /// The whitespace trimmed off the end; the gap to the next chunk.
    pub separator: String,
    /// Sum of the per-word token counts.
    pub tokens: usize,
}

impl TokenChunk {
    fn from_span(span: &str, tokens: usize) -> Self {
        let text = span.trim_end();
        Self {
            text: text.to_string(),
            separator: span[text.len()..].to_string(),
            tokens,
        }
    }
}

/// Split `text` into chunks of at most `max_tokens` tokens without breaking words.
///
/// A single word whose own count exceeds the budget gets a chunk to itself.
/// Joining `text + separator` over all chunks reproduces the input, minus any
/// whitespace before the first word.
pub fn chunk_by_tokens(
    text: &str,
    max_tokens: usize,
    counter: &dyn TokenCounter,
) -> Vec<TokenChunk> {
    let max_tokens = max_tokens.max(1);
    let mut chunks = Vec::new();

    // Byte offset where the open chunk starts, and its running token count
    let mut open: Option<(usize, usize)> = None;
    let mut end = 0;

    for unit in WORD_UNIT.find_iter(text) {
        let unit_tokens = counter.count_tokens(unit.as_str());

        open = match open {
            Some((start, tokens)) if tokens + unit_tokens > max_tokens => {
                chunks.push(TokenChunk::from_span(&text[start..unit.start()], tokens));
                Some((unit.start(), unit_tokens))
            }
            Some((start, tokens)) => Some((start, tokens + unit_tokens)),
            None => Some((unit.start(), unit_tokens)),
        };
        end = unit.end();
    }

    if let Some((start, tokens)) = open {
        chunks.push(TokenChunk::from_span(&text[start..end], tokens));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::tokens::EstimateCounter;
    use proptest::prelude::*;

    fn rejoin(chunks: &[TokenChunk]) -> String {
        chunks
            .iter()
            .map(|c| format!("{}{}", c.text, c.separator))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk_by_tokens("", 10, &EstimateCounter).is_empty());
        assert!(chunk_by_tokens("  \n\t ", 10, &EstimateCounter).is_empty());
    }

    #[test]
    fn test_single_unit_ignores_budget() {
        let chunks = chunk_by_tokens("Supercalifragilistic", 1, &EstimateCounter);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Supercalifragilistic");
        assert_eq!(chunks[0].tokens, 5);
    }

    #[test]
    fn test_greedy_packing() {
        // Every "abc " unit is one estimated token
        let chunks = chunk_by_tokens("abc abc abc abc abc", 2, &EstimateCounter);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abc abc", "abc abc", "abc"]);
        assert_eq!(chunks[0].separator, " ");
        assert_eq!(chunks[2].separator, "");
    }

    #[test]
    fn test_oversized_word_sits_alone() {
        let text = "ab averyveryverylongword cd";
        let chunks = chunk_by_tokens(text, 2, &EstimateCounter);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["ab", "averyveryverylongword", "cd"]);
        assert_eq!(rejoin(&chunks), text);
    }

    #[test]
    fn test_preserves_paragraph_whitespace() {
        let text = "First line.\nSecond line.\n\nNew paragraph here.\n";
        let chunks = chunk_by_tokens(text, 4, &EstimateCounter);
        assert!(chunks.len() > 1);
        assert_eq!(rejoin(&chunks), text);
    }

    #[test]
    fn test_nine_thousand_tokens() {
        let text = "abc ".repeat(9000);
        let text = text.trim_end();

        let one = chunk_by_tokens(text, 9500, &EstimateCounter);
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].tokens, 9000);

        let many = chunk_by_tokens(text, 3000, &EstimateCounter);
        assert!(many.len() >= 3);
        assert!(many.iter().all(|c| c.tokens <= 3000));
        assert_eq!(rejoin(&many), text);
    }

    proptest! {
        #[test]
        fn prop_chunks_reconstruct_input(
            words in prop::collection::vec("[a-zA-Zа-я.,]{1,30}", 0..60),
            gaps in prop::collection::vec(prop::sample::select(vec![" ", "  ", "\n", "\n\n", "\t"]), 60),
            budget in 1usize..20,
        ) {
            let mut text = String::new();
            for (word, gap) in words.iter().zip(gaps.iter()) {
                text.push_str(word);
                text.push_str(gap);
            }

            let chunks = chunk_by_tokens(&text, budget, &EstimateCounter);
            prop_assert_eq!(rejoin(&chunks), text.clone());

            let mut seen_words = Vec::new();
            for chunk in &chunks {
                prop_assert!(!chunk.text.is_empty());
                let chunk_words: Vec<&str> = chunk.text.split_whitespace().collect();
                if chunk_words.len() > 1 {
                    prop_assert!(chunk.tokens <= budget);
                }
                seen_words.extend(chunk_words);
            }
            prop_assert_eq!(seen_words, text.split_whitespace().collect::<Vec<_>>());
        }
    }
}
