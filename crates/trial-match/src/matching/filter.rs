use std::collections::HashMap;

use tracing::debug;

use super::domain::{FilterSet, PatientRecord};

/// Apply the structured filters to the population, deduplicate, and order by
/// the precomputed aggregate business score.
///
/// Inclusion matches the indication by exact canonical equality. Exclusion
/// matches by substring containment so it also sweeps the dataset's term
/// variants ("Lupus", "Lupus Nephritis"); inclusion must not conflate them.
pub(crate) fn select_candidates<'a>(
    population: &'a [PatientRecord],
    filters: &FilterSet,
) -> Vec<&'a PatientRecord> {
    let mut candidates: Vec<&PatientRecord> = population.iter().collect();
    debug!(count = candidates.len(), "initial population");

    if let Some(sex) = filters.sex {
        candidates.retain(|patient| patient.sex == Some(sex));
        debug!(sex = sex.code(), count = candidates.len(), "after sex filter");
    }

    if let Some(minimum_age) = filters.minimum_age {
        candidates.retain(|patient| patient.age.is_some_and(|age| age >= minimum_age));
        debug!(minimum_age, count = candidates.len(), "after age filter");
    }

    if let Some(included) = &filters.include_indications {
        candidates.retain(|patient| {
            patient
                .indication
                .as_deref()
                .is_some_and(|indication| included.iter().any(|term| term == indication))
        });
        debug!(
            terms = included.len(),
            count = candidates.len(),
            "after indication filter"
        );
    }

    if let Some(excluded) = &filters.exclude_indications {
        if !excluded.is_empty() {
            candidates.retain(|patient| {
                !patient.indication.as_deref().is_some_and(|indication| {
                    let indication = indication.to_lowercase();
                    excluded
                        .iter()
                        .any(|term| indication.contains(&term.to_lowercase()))
                })
            });
            debug!(
                terms = excluded.len(),
                count = candidates.len(),
                "after exclusion filter"
            );
        }
    }

    let deduplicated = deduplicate(candidates);
    debug!(count = deduplicated.len(), "after deduplication");
    deduplicated
}

/// Keep one row per patient identifier: the one with the highest aggregate
/// business score, first-encountered winning ties. The survivors are sorted
/// descending by that score; the sort is stable so equal scores keep
/// encounter order.
fn deduplicate(candidates: Vec<&PatientRecord>) -> Vec<&PatientRecord> {
    let mut best: HashMap<&str, usize> = HashMap::new();
    let mut kept: Vec<&PatientRecord> = Vec::new();

    for patient in candidates {
        match best.get(patient.patient_id.as_str()) {
            Some(&slot) => {
                if patient.business_score > kept[slot].business_score {
                    kept[slot] = patient;
                }
            }
            None => {
                best.insert(patient.patient_id.as_str(), kept.len());
                kept.push(patient);
            }
        }
    }

    kept.sort_by(|a, b| b.business_score.cmp(&a.business_score));
    kept
}
