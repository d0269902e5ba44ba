use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use tracing::info;

use super::MatchDataset;
use crate::matching::domain::{
    ActivityCategory, ActivityRecord, PatientId, PatientRecord, RecencyBasis, Sex,
};

/// Error raised while reading the reference datasets.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse dataset row: {0}")]
    Csv(#[from] csv::Error),
}

/// Load both datasets from disk and build a queryable snapshot.
pub fn load_from_paths(patients: &Path, activities: &Path) -> Result<MatchDataset, DatasetError> {
    let patients_file = File::open(patients).map_err(|source| DatasetError::Open {
        path: patients.display().to_string(),
        source,
    })?;
    let activities_file = File::open(activities).map_err(|source| DatasetError::Open {
        path: activities.display().to_string(),
        source,
    })?;

    let patient_rows = read_patients(patients_file)?;
    let activity_rows = read_activities(activities_file)?;
    info!(
        patients = patient_rows.len(),
        activities = activity_rows.len(),
        "reference datasets loaded"
    );

    Ok(MatchDataset::new(patient_rows, activity_rows))
}

pub fn read_patients<R: Read>(reader: R) -> Result<Vec<PatientRecord>, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for row in csv_reader.deserialize::<PatientRow>() {
        records.push(row?.into_record());
    }

    Ok(records)
}

pub fn read_activities<R: Read>(reader: R) -> Result<Vec<ActivityRecord>, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for row in csv_reader.deserialize::<ActivityRow>() {
        if let Some(record) = row?.into_record() {
            records.push(record);
        }
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct PatientRow {
    #[serde(rename = "PATIENT_ID")]
    patient_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    age: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    sex: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    indication: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    study_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    latest_milestone: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    recency_points: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    recency_reason: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    business_score: Option<String>,
}

impl PatientRow {
    fn into_record(self) -> PatientRecord {
        PatientRecord {
            patient_id: PatientId(self.patient_id),
            age: self.age.as_deref().and_then(lenient_u32),
            sex: self.sex.as_deref().and_then(Sex::parse),
            indication: self.indication,
            study_id: self.study_id.as_deref().and_then(lenient_i64),
            latest_milestone: self.latest_milestone,
            recency_points: self
                .recency_points
                .as_deref()
                .and_then(lenient_u32)
                .unwrap_or(0),
            recency_basis: RecencyBasis::parse(self.recency_reason.as_deref()),
            business_score: self
                .business_score
                .as_deref()
                .and_then(lenient_i64)
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ActivityRow {
    #[serde(rename = "PATIENT_ID", default, deserialize_with = "empty_string_as_none")]
    patient_id: Option<String>,
    #[serde(
        rename = "ACTIVITY_CATEGORY",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    category: Option<String>,
    #[serde(
        rename = "ACTIVITY_DATE",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    date: Option<String>,
    #[serde(
        rename = "INDICATION_NAME",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    indication: Option<String>,
    #[serde(
        rename = "POSTAL_CODE",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    postal_code: Option<String>,
}

impl ActivityRow {
    fn into_record(self) -> Option<ActivityRecord> {
        let patient_id = self.patient_id?;
        let category = ActivityCategory::parse(self.category.as_deref().unwrap_or_default());
        Some(ActivityRecord {
            patient_id: PatientId(patient_id),
            category,
            date: self.date,
            indication: self.indication,
            postal_code: self.postal_code,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

// The reference exports write integers with a float shape ("52.0"); junk
// values fall back to None rather than failing the whole load.
fn lenient_i64(raw: &str) -> Option<i64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|value| value as i64)
}

fn lenient_u32(raw: &str) -> Option<u32> {
    lenient_i64(raw).and_then(|value| u32::try_from(value).ok())
}
