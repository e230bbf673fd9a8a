use anyhow::{Context, Result, anyhow};
use moka::sync::Cache;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model, o200k_base};
use xxhash_rust::xxh64::Xxh64;

/// Tokens per whitespace-separated word for the fast estimate
const WORD_TOKEN_RATIO: f64 = 1.3;

/// Fast heuristic used for all budgeting: `round(words * 1.3)`.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words as f64 * WORD_TOKEN_RATIO).round() as usize
}

/// Character-based count (`chars / 4`, at least 1) for final stats
/// when no BPE model is requested.
pub fn count_tokens_precise(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

/// Exact BPE counter backed by tiktoken-rs with token caching
pub struct PreciseCounter {
    /// Byte Pair Encoding (BPE) tokenizer for counting tokens
    bpe: CoreBPE,

    /// Token count cache for repeated renders of the same document
    cache: Cache<u64, usize>,
}

impl PreciseCounter {
    /// Create a counter for a model name (e.g. "gpt-4o") or an encoding name
    /// ("cl100k_base", "o200k_base"), case-insensitive.
    ///
    /// # Errors
    /// Returns an error if the model or encoding is unsupported or cannot be loaded.
    pub fn new(model_or_encoding: &str) -> Result<Self> {
        let lower = model_or_encoding.to_ascii_lowercase();

        let bpe = match get_bpe_from_model(&lower) {
            Ok(b) => b,
            Err(_) => match lower.as_str() {
                "o200k_base" => o200k_base().context("load o200k_base")?,
                "cl100k_base" => cl100k_base().context("load cl100k_base")?,
                _ => return Err(anyhow!("Unsupported model/encoding: {model_or_encoding}")),
            },
        };

        Ok(Self {
            bpe,
            cache: Cache::new(10_000),
        })
    }

    /// Count BPE tokens, keyed in the cache by the xxhash64 digest of the text.
    pub fn count(&self, s: &str) -> usize {
        let mut hasher = Xxh64::new(0);
        hasher.update(s.as_bytes());
        let key = hasher.digest();

        if let Some(t) = self.cache.get(&key) {
            return t;
        }

        let t = self.bpe.encode_ordinary(s).len();
        self.cache.insert(key, t);

        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_rounds_word_ratio() {
        // 3 words * 1.3 = 3.9 -> 4
        assert_eq!(estimate_tokens("alpha beta gamma"), 4);
        // 5 words * 1.3 = 6.5 -> 7 (round half away from zero)
        assert_eq!(estimate_tokens("a b c d e"), 7);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn estimate_splits_on_whitespace_runs() {
        assert_eq!(estimate_tokens("a   b\n\n\tc"), estimate_tokens("a b c"));
    }

    #[test]
    fn precise_heuristic_never_zero() {
        assert_eq!(count_tokens_precise(""), 1);
        assert_eq!(count_tokens_precise("abcdefgh"), 2);
    }

    #[test]
    fn bpe_counter_caches_results() -> Result<()> {
        let counter = PreciseCounter::new("cl100k_base")?;
        let first = counter.count("hello world");
        let second = counter.count("hello world");
        assert_eq!(first, second);
        assert!(first > 0);
        Ok(())
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        assert!(PreciseCounter::new("definitely-not-a-model").is_err());
    }
}
