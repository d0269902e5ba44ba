use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use rapidfuzz::fuzz;
use tracing::debug;

/// Resolves free-text medical-condition phrases to canonical dataset
/// vocabulary values.
///
/// Match precedence is strict and short-circuiting:
/// 1. case-insensitive trimmed equality returns that single value;
/// 2. otherwise every canonical value whose similarity ratio reaches the
///    primary threshold is collected;
/// 3. otherwise a looser pass unions values passing either the partial-overlap
///    ratio or a token-order-insensitive ratio at the fallback threshold.
///
/// An empty result for a non-empty term means "zero matches", which callers
/// surface as an empty result set rather than an error.
pub struct VocabularyMatcher {
    exact_threshold: f64,
    fallback_threshold: f64,
    cache: Mutex<LruCache<String, Vec<String>>>,
}

impl VocabularyMatcher {
    pub fn new(exact_threshold: f64, fallback_threshold: f64, cache_size: NonZeroUsize) -> Self {
        Self {
            exact_threshold,
            fallback_threshold,
            cache: Mutex::new(LruCache::new(cache_size)),
        }
    }

    pub fn resolve(&self, term: &str, canonical_values: &[String]) -> Vec<String> {
        let normalized = term.trim().to_lowercase();
        if normalized.is_empty() {
            return Vec::new();
        }

        if let Some(hit) = self
            .cache
            .lock()
            .expect("vocabulary cache poisoned")
            .get(&normalized)
        {
            return hit.clone();
        }

        let matches = self.resolve_uncached(&normalized, canonical_values);
        self.cache
            .lock()
            .expect("vocabulary cache poisoned")
            .put(normalized, matches.clone());
        matches
    }

    /// Drop all memoized resolutions. Called when the dataset snapshot (and
    /// with it the canonical vocabulary) is replaced.
    pub fn clear(&self) {
        self.cache
            .lock()
            .expect("vocabulary cache poisoned")
            .clear();
    }

    fn resolve_uncached(&self, normalized: &str, canonical_values: &[String]) -> Vec<String> {
        for value in canonical_values {
            if normalized == value.trim().to_lowercase() {
                debug!(term = normalized, value = value.as_str(), "exact vocabulary match");
                return vec![value.clone()];
            }
        }

        let mut matches = Vec::new();
        for value in canonical_values {
            let candidate = value.trim().to_lowercase();
            let score = fuzz::ratio(normalized.chars(), candidate.chars());
            if score >= self.exact_threshold {
                debug!(
                    term = normalized,
                    value = value.as_str(),
                    score,
                    "fuzzy vocabulary match"
                );
                matches.push(value.clone());
            }
        }
        if !matches.is_empty() {
            return matches;
        }

        debug!(
            term = normalized,
            threshold = self.fallback_threshold,
            "no primary matches, trying fallback measures"
        );
        for value in canonical_values {
            let candidate = value.trim().to_lowercase();
            let partial = fuzz::partial_ratio(normalized.chars(), candidate.chars());
            let token_sorted = fuzz::ratio(
                sort_tokens(normalized).chars(),
                sort_tokens(&candidate).chars(),
            );
            if partial >= self.fallback_threshold || token_sorted >= self.fallback_threshold {
                debug!(
                    term = normalized,
                    value = value.as_str(),
                    partial,
                    token_sorted,
                    "fallback vocabulary match"
                );
                matches.push(value.clone());
            }
        }
        matches
    }
}

/// Token-order-insensitive form: whitespace tokens sorted and rejoined.
fn sort_tokens(value: &str) -> String {
    let mut tokens: Vec<&str> = value.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
