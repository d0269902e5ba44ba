use regex::Regex;
use tracing::debug;

use super::domain::{FilterSet, Sex};
use super::vocabulary::VocabularyMatcher;

/// Parses a semi-structured free-text eligibility query into a [`FilterSet`].
///
/// The four extractions (sex, minimum age, target indication, exclusion
/// indication) are independent scans over the same input; any subset may be
/// present. Unmatched patterns leave the corresponding filter unset and are
/// never an error.
pub struct QueryInterpreter {
    sex: Regex,
    age: Regex,
    target: Regex,
    exclusion: Regex,
    demographics: Regex,
}

impl QueryInterpreter {
    pub fn new() -> Self {
        Self {
            sex: Regex::new(r"(?i)(female|male)").expect("literal pattern compiles"),
            age: Regex::new(r"(?i)age\s*>=\s*(\d+)").expect("literal pattern compiles"),
            target: Regex::new(r"(?i)target:\s*([^\n]*)").expect("literal pattern compiles"),
            exclusion: Regex::new(r"(?i)exclusion:\s*([^\n]+)").expect("literal pattern compiles"),
            demographics: Regex::new(r"(?i)\b(male|female|age\s*>=?\s*\d+)\b")
                .expect("literal pattern compiles"),
        }
    }

    /// An empty or absent query yields an empty filter set, meaning "match
    /// everyone" for location-only requests.
    pub fn parse(
        &self,
        query: Option<&str>,
        vocabulary: &VocabularyMatcher,
        canonical_values: &[String],
    ) -> FilterSet {
        let Some(query) = query else {
            return FilterSet::default();
        };
        if query.trim().is_empty() {
            debug!("empty query, matching all patients");
            return FilterSet::default();
        }

        let mut filters = FilterSet::default();

        if let Some(capture) = self.sex.captures(query).and_then(|c| c.get(1)) {
            filters.sex = Sex::parse(capture.as_str());
        }

        if let Some(capture) = self.age.captures(query).and_then(|c| c.get(1)) {
            filters.minimum_age = capture.as_str().parse::<u32>().ok();
        }

        if let Some(capture) = self.target.captures(query).and_then(|c| c.get(1)) {
            let segment = truncate_at_exclusion(capture.as_str());
            let condition = self.demographics.replace_all(segment, "");
            let condition = condition.trim();
            filters.include_indications =
                Some(vocabulary.resolve(condition, canonical_values));
        }

        if let Some(capture) = self.exclusion.captures(query).and_then(|c| c.get(1)) {
            filters.exclude_indications =
                Some(vocabulary.resolve(capture.as_str().trim(), canonical_values));
        }

        debug!(?filters, "query interpreted");
        filters
    }
}

impl Default for QueryInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut the target segment short of a following `EXCLUSION:` label.
fn truncate_at_exclusion(segment: &str) -> &str {
    match segment.to_ascii_lowercase().find("exclusion:") {
        Some(position) => segment[..position].trim_end(),
        None => segment.trim_end(),
    }
}
