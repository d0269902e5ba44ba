//! Matching core for the clinical-trial recruitment service.
//!
//! The `matching` module tree holds the full pipeline: query interpretation,
//! candidate filtering, concurrent score computation with auditable
//! breakdowns, postal-code distance resolution, and per-query ranking.
//! `config`, `error`, and `telemetry` carry the service plumbing shared with
//! the `trial-match-api` binary.

pub mod config;
pub mod error;
pub mod matching;
pub mod telemetry;
