use chrono::{Local, NaiveDate};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::dataset::DatasetHandle;
use super::filter::select_candidates;
use super::geo::{GeoResolver, PostalCodeSource};
use super::query::QueryInterpreter;
use super::rank::{self, ScoredMatch};
use super::score::ScoreEngine;
use super::vocabulary::VocabularyMatcher;
use crate::config::MatchingConfig;
use crate::matching::dataset::MatchDataset;
use std::sync::Arc;

/// A single match request as received from the API layer.
///
/// An absent or empty query matches the whole population so location-only
/// requests rank purely on the scoring criteria. An absent limit returns
/// every match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, rename = "site_zip_codes")]
    pub site_postal_codes: Vec<String>,
    #[serde(default, rename = "top_k")]
    pub limit: Option<usize>,
}

/// Error raised by the matching facade.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("patient datasets are not loaded")]
    DatasetUnavailable,
}

/// Facade composing the interpreter, candidate filter, score engine, and
/// ranking normalizer over the shared dataset snapshot.
pub struct MatchService<S> {
    datasets: DatasetHandle,
    interpreter: QueryInterpreter,
    vocabulary: VocabularyMatcher,
    engine: ScoreEngine<S>,
    config: MatchingConfig,
}

impl<S: PostalCodeSource> MatchService<S> {
    pub fn new(datasets: DatasetHandle, geo: GeoResolver<S>, config: MatchingConfig) -> Self {
        let vocabulary = VocabularyMatcher::new(
            config.fuzzy_exact_threshold,
            config.fuzzy_fallback_threshold,
            config.vocabulary_cache_size,
        );
        Self {
            datasets,
            interpreter: QueryInterpreter::new(),
            vocabulary,
            engine: ScoreEngine::new(Arc::new(geo)),
            config,
        }
    }

    pub fn dataset_handle(&self) -> &DatasetHandle {
        &self.datasets
    }

    /// Swap in a freshly loaded dataset snapshot. Memoized vocabulary
    /// resolutions are dropped because the canonical value set may have
    /// changed with it.
    pub fn install_dataset(&self, dataset: MatchDataset) {
        self.datasets.install(dataset);
        self.vocabulary.clear();
    }

    pub async fn query(&self, request: MatchRequest) -> Result<MatchResponse, MatchError> {
        self.query_at(request, Local::now().date_naive()).await
    }

    /// Run one match request against the current snapshot, with the clock
    /// pinned by the caller.
    pub async fn query_at(
        &self,
        request: MatchRequest,
        today: NaiveDate,
    ) -> Result<MatchResponse, MatchError> {
        let dataset = self.datasets.current().ok_or(MatchError::DatasetUnavailable)?;

        let filters = self.interpreter.parse(
            request.query.as_deref(),
            &self.vocabulary,
            dataset.indications(),
        );

        if filters.inclusion_unresolved() {
            info!("target term resolved to no canonical indication");
            return Ok(MatchResponse::empty_with_message(
                "the requested condition matched no canonical indication",
            ));
        }

        let candidates = select_candidates(dataset.patients(), &filters);
        let total_matching = candidates.len();

        let promotion_cap = self.config.promotion_cap(request.limit);
        let promoted = &candidates[..candidates.len().min(promotion_cap)];

        let dataset_ref = &dataset;
        let engine = &self.engine;
        let sites = request.site_postal_codes.as_slice();
        let mut scored: Vec<ScoredMatch> = stream::iter(promoted.iter().copied())
            .map(|patient| async move {
                let history = dataset_ref.activities_for(&patient.patient_id);
                let postal_code = dataset_ref.patient_postal_code(&patient.patient_id);
                let breakdown = engine
                    .score(patient, history, postal_code, sites, today)
                    .await;
                ScoredMatch::new(patient.clone(), breakdown)
            })
            .buffer_unordered(self.config.scoring_concurrency.max(1))
            .collect()
            .await;

        rank::normalize(&mut scored);
        if let Some(limit) = request.limit {
            scored.truncate(limit);
        }

        info!(
            total_matching,
            promoted = promoted.len(),
            returned = scored.len(),
            "match query complete"
        );

        Ok(MatchResponse::from_scored(scored, total_matching))
    }

    /// Distinct canonical indication vocabulary for client-side autocomplete.
    pub fn conditions(&self) -> Result<ConditionsResponse, MatchError> {
        let dataset = self.datasets.current().ok_or(MatchError::DatasetUnavailable)?;
        let conditions = dataset.indications().to_vec();
        Ok(ConditionsResponse {
            total_count: conditions.len(),
            available_conditions: conditions,
        })
    }
}

/// One per-criterion line of the audit breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct BreakdownEntryView {
    pub criterion: &'static str,
    pub reason: String,
    pub points: u32,
}

/// Score fields for one patient, normalized relative to the current result set.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreDetailsView {
    pub total_business_score: u32,
    pub business_score_normalized: f64,
    pub business_score_percent: f64,
    pub breakdown: Vec<BreakdownEntryView>,
}

/// One ranked patient row of the response.
#[derive(Debug, Clone, Serialize)]
pub struct PatientMatchView {
    pub patient_id: String,
    pub age: Option<u32>,
    pub sex: Option<&'static str>,
    pub study_id: Option<i64>,
    pub indication: Option<String>,
    pub latest_milestone: Option<String>,
    pub score_details: ScoreDetailsView,
    pub match_score_percent: f64,
}

/// Complete response for a match request.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResponse {
    pub patients: Vec<PatientMatchView>,
    pub total_matching_patients: usize,
    pub returned_patients: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MatchResponse {
    fn empty_with_message(message: &str) -> Self {
        Self {
            patients: Vec::new(),
            total_matching_patients: 0,
            returned_patients: 0,
            message: Some(message.to_string()),
        }
    }

    fn from_scored(scored: Vec<ScoredMatch>, total_matching: usize) -> Self {
        let patients: Vec<PatientMatchView> = scored
            .into_iter()
            .map(|result| {
                let breakdown = result
                    .breakdown
                    .entries()
                    .iter()
                    .map(|entry| BreakdownEntryView {
                        criterion: entry.criterion.label(),
                        reason: entry.reason.clone(),
                        points: entry.points,
                    })
                    .collect();
                PatientMatchView {
                    patient_id: result.patient.patient_id.as_str().to_string(),
                    age: result.patient.age,
                    sex: result.patient.sex.map(|sex| sex.code()),
                    study_id: result.patient.study_id,
                    indication: result.patient.indication.clone(),
                    latest_milestone: result.patient.latest_milestone.clone(),
                    score_details: ScoreDetailsView {
                        total_business_score: result.breakdown.total(),
                        business_score_normalized: result.normalized,
                        business_score_percent: result.percent,
                        breakdown,
                    },
                    match_score_percent: result.percent,
                }
            })
            .collect();

        Self {
            returned_patients: patients.len(),
            total_matching_patients: total_matching,
            patients,
            message: None,
        }
    }
}

/// Response for the conditions listing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionsResponse {
    pub available_conditions: Vec<String>,
    pub total_count: usize,
}
