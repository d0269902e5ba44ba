use super::domain::{PatientRecord, ScoreBreakdown};

/// A fully scored candidate plus its query-relative normalized forms.
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub patient: PatientRecord,
    pub breakdown: ScoreBreakdown,
    /// Fraction of the query's score range, 4 decimal places.
    pub normalized: f64,
    /// Same value as a percentage, 2 decimal places.
    pub percent: f64,
}

impl ScoredMatch {
    pub fn new(patient: PatientRecord, breakdown: ScoreBreakdown) -> Self {
        Self {
            patient,
            breakdown,
            normalized: 0.0,
            percent: 0.0,
        }
    }
}

/// Sort descending by total score and min-max rescale against the current
/// result set: the best total maps to 100, the worst to 0, everything equal
/// maps to 100. The scale is recomputed per request, so the same patient can
/// legitimately carry different percentages across queries.
pub(crate) fn normalize(results: &mut [ScoredMatch]) {
    results.sort_by(|a, b| b.breakdown.total().cmp(&a.breakdown.total()));

    let (Some(first), Some(last)) = (results.first(), results.last()) else {
        return;
    };
    let max = f64::from(first.breakdown.total());
    let min = f64::from(last.breakdown.total());

    for result in results.iter_mut() {
        let fraction = if max > min {
            (f64::from(result.breakdown.total()) - min) / (max - min)
        } else {
            1.0
        };
        result.normalized = round_to(fraction, 4);
        result.percent = round_to(fraction * 100.0, 2);
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::domain::{Criterion, CriterionScore, PatientId, RecencyBasis};

    fn scored(id: &str, points: u32) -> ScoredMatch {
        let mut breakdown = ScoreBreakdown::default();
        breakdown.push(CriterionScore {
            criterion: Criterion::Recency,
            points,
            reason: "test".to_string(),
        });
        ScoredMatch::new(
            PatientRecord {
                patient_id: PatientId(id.to_string()),
                age: None,
                sex: None,
                indication: None,
                study_id: None,
                latest_milestone: None,
                recency_points: 0,
                recency_basis: RecencyBasis::Unknown,
                business_score: 0,
            },
            breakdown,
        )
    }

    #[test]
    fn rescales_to_percent_range_with_ordering() {
        let mut results = vec![scored("low", 10), scored("high", 90), scored("mid", 50)];
        normalize(&mut results);

        assert_eq!(results[0].patient.patient_id.as_str(), "high");
        assert_eq!(results[0].percent, 100.0);
        assert_eq!(results[0].normalized, 1.0);
        assert_eq!(results[1].percent, 50.0);
        assert_eq!(results[2].percent, 0.0);
        assert_eq!(results[2].normalized, 0.0);
    }

    #[test]
    fn equal_scores_all_map_to_one_hundred() {
        let mut results = vec![scored("a", 42), scored("b", 42)];
        normalize(&mut results);
        assert!(results.iter().all(|r| r.percent == 100.0));
        assert!(results.iter().all(|r| r.normalized == 1.0));
    }

    #[test]
    fn empty_and_singleton_sets_are_stable() {
        let mut empty: Vec<ScoredMatch> = Vec::new();
        normalize(&mut empty);

        let mut single = vec![scored("only", 7)];
        normalize(&mut single);
        assert_eq!(single[0].percent, 100.0);
    }

    #[test]
    fn rounding_holds_two_and_four_places() {
        let mut results = vec![scored("a", 0), scored("b", 1), scored("c", 3)];
        normalize(&mut results);
        // middle value is 1/3 of the range
        assert_eq!(results[1].normalized, 0.3333);
        assert_eq!(results[1].percent, 33.33);
    }
}
