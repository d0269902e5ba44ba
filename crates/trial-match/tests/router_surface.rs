//! HTTP surface specifications for the match router: payload shapes, the
//! dataset-not-loaded boundary, and the conditions listing.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use trial_match::config::MatchingConfig;
use trial_match::matching::{
    match_router, ActivityCategory, ActivityRecord, CountryCode, DatasetHandle, GeoPoint,
    GeoResolver, MatchDataset, MatchService, PatientId, PatientRecord, PostalCodeSource,
    RecencyBasis, Sex,
};

struct StaticSource {
    points: HashMap<(CountryCode, String), GeoPoint>,
}

impl PostalCodeSource for StaticSource {
    fn coordinates(&self, country: CountryCode, code: &str) -> Option<GeoPoint> {
        self.points.get(&(country, code.to_string())).copied()
    }
}

fn geo_source() -> StaticSource {
    let mut points = HashMap::new();
    points.insert(
        (CountryCode::Us, "10001".to_string()),
        GeoPoint {
            latitude: 40.7506,
            longitude: -73.9972,
        },
    );
    StaticSource { points }
}

fn dataset() -> MatchDataset {
    let patients = vec![
        PatientRecord {
            patient_id: PatientId("P-001".to_string()),
            age: Some(45),
            sex: Some(Sex::Female),
            indication: Some("Type 2 Diabetes".to_string()),
            study_id: Some(11),
            latest_milestone: Some("Qualified Respondents".to_string()),
            recency_points: 40,
            recency_basis: RecencyBasis::Diagnosis,
            business_score: 90,
        },
        PatientRecord {
            patient_id: PatientId("P-002".to_string()),
            age: Some(58),
            sex: Some(Sex::Male),
            indication: Some("Asthma".to_string()),
            study_id: None,
            latest_milestone: Some("Respondents".to_string()),
            recency_points: 0,
            recency_basis: RecencyBasis::Unknown,
            business_score: 40,
        },
    ];
    let activities = vec![ActivityRecord {
        patient_id: PatientId("P-001".to_string()),
        category: ActivityCategory::QualifiedRespondents,
        date: Some("2023-06-01".to_string()),
        indication: Some("Type 2 Diabetes".to_string()),
        postal_code: Some("10001".to_string()),
    }];
    MatchDataset::new(patients, activities)
}

fn service(loaded: bool) -> Arc<MatchService<StaticSource>> {
    let config = MatchingConfig::default();
    let resolver = GeoResolver::new(geo_source(), config.geo_cache_size);
    let service = MatchService::new(DatasetHandle::new(), resolver, config);
    if loaded {
        service.install_dataset(dataset());
    }
    Arc::new(service)
}

async fn read_json_body(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body reads");
    serde_json::from_slice(&body).expect("body is JSON")
}

#[tokio::test]
async fn query_route_returns_ranked_patients() {
    let router = match_router(service(true));

    let payload = json!({
        "query": "Target: diabetes",
        "site_zip_codes": ["10001"],
        "top_k": 5,
    });
    let response = router
        .oneshot(
            Request::post("/api/v1/match/query")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;

    assert_eq!(body["total_matching_patients"], 1);
    assert_eq!(body["returned_patients"], 1);
    let patient = &body["patients"][0];
    assert_eq!(patient["patient_id"], "P-001");
    assert_eq!(patient["match_score_percent"], 100.0);
    assert_eq!(
        patient["score_details"]["breakdown"]
            .as_array()
            .expect("breakdown array")
            .len(),
        5
    );
}

#[tokio::test]
async fn query_route_accepts_minimal_payload() {
    let router = match_router(service(true));

    let response = router
        .oneshot(
            Request::post("/api/v1/match/query")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["total_matching_patients"], 2);
}

#[tokio::test]
async fn query_route_reports_unloaded_datasets() {
    let router = match_router(service(false));

    let response = router
        .oneshot(
            Request::post("/api/v1/match/query")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = read_json_body(response).await;
    assert!(body["error"].as_str().expect("error string").contains("not loaded"));
}

#[tokio::test]
async fn conditions_route_lists_vocabulary() {
    let router = match_router(service(true));

    let response = router
        .oneshot(
            Request::get("/api/v1/match/conditions")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(
        body["available_conditions"],
        json!(["Asthma", "Type 2 Diabetes"])
    );
    assert_eq!(body["total_count"], 2);
}
