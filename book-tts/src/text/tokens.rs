//! Token counting for the LLM cleaning budget.

use log::{info, warn};
use std::path::Path;
use tokenizers::Tokenizer;

/// Counts tokens in a text fragment.
///
/// Built once at start-up and shared read-only for the rest of the run.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;

    /// Short label for logs.
    fn describe(&self) -> &'static str;
}

/// Estimate of roughly four characters per token, never less than one.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimateCounter;

impl EstimateCounter {
    /// Characters per estimated token.
    pub const CHARS_PER_TOKEN: usize = 4;
}

impl TokenCounter for EstimateCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars()
            .count()
            .div_ceil(Self::CHARS_PER_TOKEN)
            .max(1)
    }

    fn describe(&self) -> &'static str {
        "estimate (4 chars/token)"
    }
}

/// Exact subword counts from a Hugging Face `tokenizer.json`.
pub struct HfTokenCounter {
    inner: Tokenizer,
}

impl HfTokenCounter {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let inner = Tokenizer::from_file(path).map_err(|e| e.to_string())?;
        Ok(Self { inner })
    }
}

impl TokenCounter for HfTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        match self.inner.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(_) => EstimateCounter.count_tokens(text),
        }
    }

    fn describe(&self) -> &'static str {
        "tokenizer.json"
    }
}

/// Pick the exact tokenizer when one loads from `path`, else the estimate.
pub fn load_counter(path: Option<&Path>) -> Box<dyn TokenCounter> {
    let Some(path) = path else {
        info!("No tokenizer configured, estimating tokens at 4 chars/token");
        return Box::new(EstimateCounter);
    };

    match HfTokenCounter::from_file(path) {
        Ok(counter) => {
            info!("Counting tokens with {}", path.display());
            Box::new(counter)
        }
        Err(e) => {
            warn!(
                "Failed to load tokenizer {}: {}; estimating tokens instead",
                path.display(),
                e
            );
            Box::new(EstimateCounter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_rounds_up() {
        let counter = EstimateCounter;
        assert_eq!(counter.count_tokens("abcd"), 1);
        assert_eq!(counter.count_tokens("abcde"), 2);
        assert_eq!(counter.count_tokens("abcdefgh "), 3);
    }

    #[test]
    fn test_estimate_minimum_one() {
        assert_eq!(EstimateCounter.count_tokens(""), 1);
        assert_eq!(EstimateCounter.count_tokens(" "), 1);
    }

    #[test]
    fn test_estimate_counts_chars_not_bytes() {
        // 8 Cyrillic letters are 16 bytes in UTF-8
        assert_eq!(EstimateCounter.count_tokens("абвгдежз"), 2);
    }

    #[test]
    fn test_missing_tokenizer_falls_back_to_estimate() {
        let counter = load_counter(Some(Path::new("/nonexistent/tokenizer.json")));
        assert_eq!(counter.describe(), EstimateCounter.describe());
        assert_eq!(counter.count_tokens("abcdefgh"), 2);
    }

    #[test]
    fn test_tokenizer_file_gives_exact_counts() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tokenizer.json");
        std::fs::write(
            &path,
            r#"{
  "version": "1.0",
  "truncation": null,
  "padding": null,
  "added_tokens": [],
  "normalizer": null,
  "pre_tokenizer": { "type": "Whitespace" },
  "post_processor": null,
  "decoder": null,
  "model": {
    "type": "WordLevel",
    "vocab": { "[UNK]": 0, "hello": 1, "world": 2, "foo": 3, "bar": 4, "baz": 5 },
    "unk_token": "[UNK]"
  }
}"#,
        )
        .unwrap();

        let counter = load_counter(Some(path.as_path()));
        assert_eq!(counter.describe(), "tokenizer.json");
        // One token per word, where the estimate would say 6
        assert_eq!(counter.count_tokens("hello world foo bar baz"), 5);
        assert_eq!(EstimateCounter.count_tokens("hello world foo bar baz"), 6);
    }

    #[test]
    fn test_no_tokenizer_configured() {
        let counter = load_counter(None);
        assert_eq!(counter.count_tokens("abc"), 1);
    }
}
