//! End-to-end specifications for the matching pipeline driven through the
//! public service facade: query interpretation, candidate filtering,
//! concurrent scoring, and query-relative ranking.

mod common {
    use std::collections::HashMap;

    use chrono::NaiveDate;

    use trial_match::config::MatchingConfig;
    use trial_match::matching::{
        ActivityCategory, ActivityRecord, CountryCode, DatasetHandle, GeoPoint, GeoResolver,
        MatchDataset, MatchService, PatientId, PatientRecord, PostalCodeSource, RecencyBasis, Sex,
    };

    /// Fixed-table postal source so distance scoring is deterministic.
    pub(super) struct StaticSource {
        points: HashMap<(CountryCode, String), GeoPoint>,
    }

    impl StaticSource {
        fn standard() -> Self {
            let mut points = HashMap::new();
            points.insert(
                (CountryCode::Us, "10001".to_string()),
                GeoPoint {
                    latitude: 40.7506,
                    longitude: -73.9972,
                },
            );
            points.insert(
                (CountryCode::Us, "07030".to_string()),
                GeoPoint {
                    latitude: 40.7440,
                    longitude: -74.0324,
                },
            );
            points.insert(
                (CountryCode::Us, "90210".to_string()),
                GeoPoint {
                    latitude: 34.0901,
                    longitude: -118.4065,
                },
            );
            Self { points }
        }
    }

    impl PostalCodeSource for StaticSource {
        fn coordinates(&self, country: CountryCode, code: &str) -> Option<GeoPoint> {
            self.points.get(&(country, code.to_string())).copied()
        }
    }

    pub(super) fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date")
    }

    fn patient(
        id: &str,
        sex: Sex,
        age: u32,
        indication: &str,
        business_score: i64,
        recency_points: u32,
        recency_basis: RecencyBasis,
    ) -> PatientRecord {
        PatientRecord {
            patient_id: PatientId(id.to_string()),
            age: Some(age),
            sex: Some(sex),
            indication: Some(indication.to_string()),
            study_id: Some(7),
            latest_milestone: Some("Respondents".to_string()),
            recency_points,
            recency_basis,
            business_score,
        }
    }

    fn activity(
        id: &str,
        category: ActivityCategory,
        date: &str,
        indication: &str,
        postal_code: &str,
    ) -> ActivityRecord {
        ActivityRecord {
            patient_id: PatientId(id.to_string()),
            category,
            date: Some(date.to_string()),
            indication: Some(indication.to_string()),
            postal_code: Some(postal_code.to_string()),
        }
    }

    pub(super) fn population() -> Vec<PatientRecord> {
        vec![
            patient(
                "P-001",
                Sex::Female,
                45,
                "Type 2 Diabetes",
                90,
                40,
                RecencyBasis::Diagnosis,
            ),
            patient(
                "P-002",
                Sex::Female,
                52,
                "Type 2 Diabetes",
                70,
                0,
                RecencyBasis::Unknown,
            ),
            // Duplicate row for P-002 with a higher aggregate score; the
            // dedup pass must keep this one.
            patient(
                "P-002",
                Sex::Female,
                52,
                "Type 2 Diabetes",
                85,
                0,
                RecencyBasis::Unknown,
            ),
            patient(
                "P-003",
                Sex::Male,
                50,
                "Type 2 Diabetes",
                80,
                20,
                RecencyBasis::RecentActivity,
            ),
            patient(
                "P-004",
                Sex::Female,
                38,
                "Type 2 Diabetes",
                95,
                0,
                RecencyBasis::Unknown,
            ),
            patient(
                "P-005",
                Sex::Female,
                61,
                "Asthma",
                60,
                0,
                RecencyBasis::Unknown,
            ),
            patient(
                "P-006",
                Sex::Female,
                44,
                "Lupus Nephritis",
                55,
                0,
                RecencyBasis::Unknown,
            ),
        ]
    }

    pub(super) fn activity_history() -> Vec<ActivityRecord> {
        vec![
            activity(
                "P-001",
                ActivityCategory::QualifiedRespondents,
                "2023-06-01",
                "Type 2 Diabetes",
                "10001",
            ),
            activity(
                "P-001",
                ActivityCategory::Randomization,
                "2022-03-15",
                "Type 2 Diabetes",
                "10001",
            ),
            activity(
                "P-002",
                ActivityCategory::Respondents,
                "2024-01-05",
                "Type 2 Diabetes",
                "90210",
            ),
            activity(
                "P-003",
                ActivityCategory::QualifiedRespondents,
                "2024-02-11",
                "Type 2 Diabetes",
                "07030",
            ),
            activity(
                "P-005",
                ActivityCategory::Respondents,
                "2021-09-30",
                "Asthma",
                "07030",
            ),
        ]
    }

    pub(super) fn service() -> MatchService<StaticSource> {
        let service = empty_service();
        service.install_dataset(MatchDataset::new(population(), activity_history()));
        service
    }

    pub(super) fn empty_service() -> MatchService<StaticSource> {
        let config = MatchingConfig::default();
        let resolver = GeoResolver::new(StaticSource::standard(), config.geo_cache_size);
        MatchService::new(DatasetHandle::new(), resolver, config)
    }
}

use common::{empty_service, service, today};
use trial_match::matching::{MatchError, MatchRequest, MatchResponse};

fn breakdown_sums_hold(response: &MatchResponse) {
    for patient in &response.patients {
        let sum: u32 = patient
            .score_details
            .breakdown
            .iter()
            .map(|entry| entry.points)
            .sum();
        assert_eq!(
            sum, patient.score_details.total_business_score,
            "breakdown must sum to the total for {}",
            patient.patient_id
        );
        assert_eq!(patient.score_details.breakdown.len(), 5);
    }
}

#[tokio::test]
async fn demographic_target_query_filters_and_ranks() {
    let service = service();
    let request = MatchRequest {
        query: Some("Female age >= 40 Target: diabetes".to_string()),
        site_postal_codes: vec!["10001".to_string()],
        limit: Some(10),
    };

    let response = service.query_at(request, today()).await.expect("query runs");

    assert_eq!(response.total_matching_patients, 2);
    assert_eq!(response.returned_patients, 2);
    assert!(response.patients.len() <= 10);

    for patient in &response.patients {
        assert_eq!(patient.sex, Some("F"));
        assert!(patient.age.expect("age present") >= 40);
        assert_eq!(patient.indication.as_deref(), Some("Type 2 Diabetes"));
    }

    // Recomputed totals drive the order; P-001 has the richer history.
    assert_eq!(response.patients[0].patient_id, "P-001");
    assert_eq!(response.patients[0].match_score_percent, 100.0);
    assert_eq!(
        response
            .patients
            .last()
            .expect("non-empty")
            .match_score_percent,
        0.0
    );
    let totals: Vec<u32> = response
        .patients
        .iter()
        .map(|p| p.score_details.total_business_score)
        .collect();
    assert!(totals.windows(2).all(|pair| pair[0] >= pair[1]));

    breakdown_sums_hold(&response);
}

#[tokio::test]
async fn duplicate_patients_survive_once() {
    let service = service();
    let request = MatchRequest {
        query: Some("Female Target: diabetes".to_string()),
        site_postal_codes: Vec::new(),
        limit: None,
    };

    let response = service.query_at(request, today()).await.expect("query runs");
    let p002_rows: Vec<_> = response
        .patients
        .iter()
        .filter(|patient| patient.patient_id == "P-002")
        .collect();
    assert_eq!(p002_rows.len(), 1);
}

#[tokio::test]
async fn empty_query_with_sites_matches_everyone() {
    let service = service();
    let request = MatchRequest {
        query: None,
        site_postal_codes: vec!["10001".to_string(), "90210".to_string()],
        limit: None,
    };

    let response = service.query_at(request, today()).await.expect("query runs");

    // Six distinct patients after deduplication.
    assert_eq!(response.total_matching_patients, 6);
    assert_eq!(response.returned_patients, 6);
    breakdown_sums_hold(&response);

    // P-001 sits on a site code, so its distance entry reports an exact hit.
    let p001 = response
        .patients
        .iter()
        .find(|patient| patient.patient_id == "P-001")
        .expect("P-001 present");
    let distance_entry = &p001.score_details.breakdown[3];
    assert_eq!(distance_entry.criterion, "Distance to Site");
    assert_eq!(distance_entry.points, 20);

    // Patients with no activity history resolve no location and say so.
    let p006 = response
        .patients
        .iter()
        .find(|patient| patient.patient_id == "P-006")
        .expect("P-006 present");
    let distance_entry = &p006.score_details.breakdown[3];
    assert_eq!(distance_entry.points, 0);
    assert!(
        distance_entry.reason.contains("patient location unknown"),
        "{}",
        distance_entry.reason
    );
}

#[tokio::test]
async fn exclusion_only_query_drops_matching_indications() {
    let service = service();
    let request = MatchRequest {
        query: Some("EXCLUSION: lupus".to_string()),
        site_postal_codes: Vec::new(),
        limit: None,
    };

    let response = service.query_at(request, today()).await.expect("query runs");

    assert_eq!(response.total_matching_patients, 5);
    assert!(response
        .patients
        .iter()
        .all(|patient| patient.patient_id != "P-006"));
}

#[tokio::test]
async fn unresolved_target_term_returns_explained_empty_set() {
    let service = service();
    let request = MatchRequest {
        query: Some("Target: velociraptor bites".to_string()),
        site_postal_codes: Vec::new(),
        limit: Some(10),
    };

    let response = service.query_at(request, today()).await.expect("query runs");

    assert_eq!(response.total_matching_patients, 0);
    assert_eq!(response.returned_patients, 0);
    assert!(response.patients.is_empty());
    assert!(response.message.is_some());
}

#[tokio::test]
async fn limit_bounds_returned_but_not_total() {
    let service = service();
    let request = MatchRequest {
        query: None,
        site_postal_codes: Vec::new(),
        limit: Some(2),
    };

    let response = service.query_at(request, today()).await.expect("query runs");
    assert_eq!(response.total_matching_patients, 6);
    assert_eq!(response.returned_patients, 2);
    assert_eq!(response.patients.len(), 2);
}

#[tokio::test]
async fn query_without_dataset_is_rejected() {
    let service = empty_service();
    let result = service.query_at(MatchRequest::default(), today()).await;
    assert!(matches!(result, Err(MatchError::DatasetUnavailable)));
}

#[tokio::test]
async fn conditions_listing_is_distinct_and_sorted() {
    let service = service();
    let conditions = service.conditions().expect("dataset loaded");
    assert_eq!(
        conditions.available_conditions,
        ["Asthma", "Lupus Nephritis", "Type 2 Diabetes"]
    );
    assert_eq!(conditions.total_count, 3);
}

#[tokio::test]
async fn installing_a_new_snapshot_refreshes_queries() {
    use trial_match::matching::{MatchDataset, PatientId, PatientRecord, RecencyBasis, Sex};

    let service = service();
    let replacement = vec![PatientRecord {
        patient_id: PatientId("Q-001".to_string()),
        age: Some(70),
        sex: Some(Sex::Male),
        indication: Some("Asthma".to_string()),
        study_id: None,
        latest_milestone: None,
        recency_points: 0,
        recency_basis: RecencyBasis::Unknown,
        business_score: 10,
    }];
    service.install_dataset(MatchDataset::new(replacement, Vec::new()));

    let response = service
        .query_at(MatchRequest::default(), today())
        .await
        .expect("query runs");
    assert_eq!(response.total_matching_patients, 1);
    assert_eq!(response.patients[0].patient_id, "Q-001");

    let conditions = service.conditions().expect("dataset loaded");
    assert_eq!(conditions.available_conditions, ["Asthma"]);
}
