mod loader;

pub use loader::{load_from_paths, read_activities, read_patients, DatasetError};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::domain::{ActivityRecord, PatientId, PatientRecord};

/// In-memory snapshot of both reference datasets plus derived indices.
///
/// Snapshots are immutable once built; a refresh builds a new snapshot and
/// swaps it in through [`DatasetHandle`].
#[derive(Debug)]
pub struct MatchDataset {
    patients: Vec<PatientRecord>,
    activities: HashMap<PatientId, Vec<ActivityRecord>>,
    indications: Vec<String>,
}

impl MatchDataset {
    pub fn new(patients: Vec<PatientRecord>, activities: Vec<ActivityRecord>) -> Self {
        let mut index: HashMap<PatientId, Vec<ActivityRecord>> = HashMap::new();
        for activity in activities {
            index
                .entry(activity.patient_id.clone())
                .or_default()
                .push(activity);
        }

        let mut indications: Vec<String> = Vec::new();
        for patient in &patients {
            if let Some(indication) = &patient.indication {
                if !indication.is_empty() && !indications.iter().any(|known| known == indication) {
                    indications.push(indication.clone());
                }
            }
        }
        indications.sort();

        Self {
            patients,
            activities: index,
            indications,
        }
    }

    pub fn patients(&self) -> &[PatientRecord] {
        &self.patients
    }

    /// Activity history for one patient, in dataset encounter order.
    pub fn activities_for(&self, id: &PatientId) -> &[ActivityRecord] {
        self.activities.get(id).map_or(&[], Vec::as_slice)
    }

    /// Distinct canonical indication vocabulary, sorted for stable listings.
    pub fn indications(&self) -> &[String] {
        &self.indications
    }

    /// First non-empty postal code in the patient's activity history.
    pub fn patient_postal_code(&self, id: &PatientId) -> Option<&str> {
        self.activities_for(id)
            .iter()
            .filter_map(|activity| activity.postal_code.as_deref())
            .find(|code| !code.trim().is_empty())
    }
}

/// Shared handle to the current dataset snapshot.
///
/// Holds `None` until the first load completes, which is how the request
/// boundary distinguishes "still starting up" from an empty population.
/// Replacement is a single pointer swap, so in-flight requests keep the
/// snapshot they started with.
#[derive(Debug, Clone, Default)]
pub struct DatasetHandle {
    inner: Arc<RwLock<Option<Arc<MatchDataset>>>>,
}

impl DatasetHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, dataset: MatchDataset) {
        let mut guard = self.inner.write().expect("dataset lock poisoned");
        *guard = Some(Arc::new(dataset));
    }

    pub fn current(&self) -> Option<Arc<MatchDataset>> {
        self.inner
            .read()
            .expect("dataset lock poisoned")
            .as_ref()
            .map(Arc::clone)
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.read().expect("dataset lock poisoned").is_some()
    }
}
