mod criteria;

use std::sync::Arc;

use chrono::NaiveDate;

use super::domain::{ActivityRecord, PatientRecord, ScoreBreakdown};
use super::geo::{GeoResolver, PostalCodeSource, ResolvedDistance};

/// Computes the five-criterion score for one patient.
///
/// Criteria are evaluated in a fixed order so breakdowns render consistently.
/// Only the distance criterion awaits anything: the per-site lookups fan out
/// inside the resolver and a failed site lookup degrades to the unknown
/// sentinel instead of failing the patient.
pub struct ScoreEngine<S> {
    geo: Arc<GeoResolver<S>>,
}

impl<S: PostalCodeSource> ScoreEngine<S> {
    pub fn new(geo: Arc<GeoResolver<S>>) -> Self {
        Self { geo }
    }

    pub async fn score(
        &self,
        patient: &PatientRecord,
        history: &[ActivityRecord],
        patient_postal_code: Option<&str>,
        site_postal_codes: &[String],
        today: NaiveDate,
    ) -> ScoreBreakdown {
        let mut breakdown = ScoreBreakdown::default();
        breakdown.push(criteria::recency(patient, history, today));
        breakdown.push(criteria::screening_stage(history));
        breakdown.push(criteria::similar_studies(history));

        let resolved = match patient_postal_code {
            Some(code) if !site_postal_codes.is_empty() => {
                self.geo.closest_distance(code, site_postal_codes).await
            }
            _ => ResolvedDistance::Unknown,
        };
        breakdown.push(criteria::distance_to_site(
            patient_postal_code,
            !site_postal_codes.is_empty(),
            resolved,
        ));

        breakdown.push(criteria::past_qualification(patient, history, today));
        breakdown
    }
}
