//! The patient matching pipeline.
//!
//! A request flows through the [`query::QueryInterpreter`] (free text to
//! structured filters, with fuzzy vocabulary resolution), the candidate
//! filter (constraint application, deduplication, base-score ordering), the
//! [`score::ScoreEngine`] (five-criterion breakdown per promoted candidate,
//! scored concurrently), and the ranking normalizer (query-relative min-max
//! rescale). [`service::MatchService`] composes the stages;
//! [`router::match_router`] exposes them over HTTP.

pub mod dataset;
pub mod domain;
mod filter;
pub mod geo;
pub mod query;
mod rank;
pub mod router;
pub mod score;
pub mod service;
pub mod vocabulary;

pub use dataset::{DatasetHandle, MatchDataset};
pub use domain::{
    ActivityCategory, ActivityRecord, Criterion, CriterionScore, FilterSet, PatientId,
    PatientRecord, RecencyBasis, ScoreBreakdown, Sex,
};
pub use geo::{
    CountryCode, GeoNamesSource, GeoPoint, GeoResolver, PostalCodeSource, ResolvedDistance,
};
pub use router::match_router;
pub use service::{
    ConditionsResponse, MatchError, MatchRequest, MatchResponse, MatchService, PatientMatchView,
};
pub use vocabulary::VocabularyMatcher;
