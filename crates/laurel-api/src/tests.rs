//! Router tests against an in-memory store and a temp data directory.

use std::path::Path;

use axum::{
  body::Body,
  http::{Request, Response, StatusCode, header},
};
use laurel_store_sqlite::SqliteStore;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt as _;
use uuid::Uuid;

use super::*;

const PHYSICS: &str = r#"[
  {"openalex_id": "P1", "full_name": "Ada Lovelace", "field": "Physics", "affiliation": "Analytical Engine Society",
   "features": {"as_of_year": 2024, "total_citations": 12000, "h_index": 40, "recent_trend": 0.4, "seminal_score": 0.5, "award_count": 2}},
  {"openalex_id": "P2", "full_name": "Bea Brown", "field": "Physics", "affiliation": "Institute, North",
   "features": {"as_of_year": 2024, "total_citations": 30000, "h_index": 75, "recent_trend": 0.1, "seminal_score": 0.6, "award_count": 3}},
  {"openalex_id": "P3", "full_name": "Cy Young", "field": "Physics", "affiliation": "Laureate Lab", "is_laureate": true,
   "features": {"as_of_year": 2024, "total_citations": 55000, "h_index": 120, "recent_trend": 0.2, "seminal_score": 0.95, "award_count": 7}}
]"#;

async fn make_state(dir: &Path) -> AppState<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let config = PipelineConfig {
    data_dir: dir.join("data"),
    model_dir: dir.join("models"),
    prediction_year: Some(2025),
    ..PipelineConfig::default()
  };
  AppState::new(Arc::new(store), config)
}

async fn seed(state: &AppState<SqliteStore>, name: &str, body: &str) {
  let seed_dir = state.pipeline.config().seed_dir();
  tokio::fs::create_dir_all(&seed_dir).await.unwrap();
  tokio::fs::write(seed_dir.join(name), body).await.unwrap();
}

async fn send(state: &AppState<SqliteStore>, method: &str, uri: &str) -> Response<Body> {
  let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
  router(state.clone()).oneshot(req).await.unwrap()
}

async fn body_bytes(resp: Response<Body>) -> Vec<u8> {
  axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn json(resp: Response<Body>) -> Value { serde_json::from_slice(&body_bytes(resp).await).unwrap() }

async fn trained() -> (TempDir, AppState<SqliteStore>) {
  let dir = tempfile::tempdir().unwrap();
  let state = make_state(dir.path()).await;
  seed(&state, "physics_candidates.json", PHYSICS).await;
  assert_eq!(send(&state, "POST", "/etl").await.status(), StatusCode::OK);
  assert_eq!(send(&state, "POST", "/train").await.status(), StatusCode::OK);
  (dir, state)
}

#[tokio::test]
async fn health_is_healthy() {
  let dir = tempfile::tempdir().unwrap();
  let state = make_state(dir.path()).await;
  let resp = send(&state, "GET", "/health").await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json(resp).await["status"], "healthy");
}

#[tokio::test]
async fn etl_reports_run_id_and_ingested_fields() {
  let dir = tempfile::tempdir().unwrap();
  let state = make_state(dir.path()).await;
  seed(&state, "physics_candidates.json", PHYSICS).await;

  let body = json(send(&state, "POST", "/etl").await).await;
  let run_id = body["run_id"].as_str().unwrap();
  assert!(run_id.starts_with("seed-etl-"));
  assert!(run_id.ends_with("::Physics"));
  assert_eq!(body["fields"][0]["summary"]["candidates_created"], 3);
}

#[tokio::test]
async fn train_before_etl_is_service_unavailable() {
  let dir = tempfile::tempdir().unwrap();
  let state = make_state(dir.path()).await;
  let resp = send(&state, "POST", "/train").await;
  assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
  assert!(json(resp).await["error"].is_string());
}

#[tokio::test]
async fn failed_quality_gate_is_unprocessable() {
  let dir = tempfile::tempdir().unwrap();
  let state = make_state(dir.path()).await;
  seed(&state, "physics_candidates.json", &PHYSICS.replace("\"h_index\": 40", "\"h_index\": -40")).await;

  let resp = send(&state, "POST", "/etl").await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  assert!(state.store.list_candidates(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_seed_is_bad_request() {
  let dir = tempfile::tempdir().unwrap();
  let state = make_state(dir.path()).await;
  seed(&state, "physics_candidates.json", "[{\"full_name\": 3}]").await;
  assert_eq!(send(&state, "POST", "/etl").await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn train_returns_paths_and_counts() {
  let dir = tempfile::tempdir().unwrap();
  let state = make_state(dir.path()).await;
  seed(&state, "physics_candidates.json", PHYSICS).await;
  send(&state, "POST", "/etl").await;

  let body = json(send(&state, "POST", "/train").await).await;
  assert!(body["run_id"].as_str().unwrap().starts_with("model-"));
  // Two non-laureates, two horizons.
  assert_eq!(body["prediction_count"], 4);
  let paths = body["model_paths"]["Physics"].as_object().unwrap();
  assert_eq!(paths.len(), 4);
  assert!(paths.contains_key("boosted_wide"));
}

#[tokio::test]
async fn shortlist_excludes_laureates_and_is_ordered() {
  let (_dir, state) = trained().await;

  let resp = send(&state, "GET", "/predictions/shortlist?field=Physics&horizon=three_year").await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json(resp).await;
  let entries = body.as_array().unwrap();
  assert_eq!(entries.len(), 2);
  assert!(entries.iter().all(|e| e["candidate_name"] != "Cy Young"));
  assert!(entries[0]["probability"].as_f64().unwrap() >= entries[1]["probability"].as_f64().unwrap());
  assert!(entries[0]["top_features"].as_array().unwrap().len() <= 5);

  let limited = json(send(&state, "GET", "/predictions/shortlist?field=Physics&horizon=one_year&limit=1").await).await;
  assert_eq!(limited.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn shortlist_rejects_unknown_horizon() {
  let dir = tempfile::tempdir().unwrap();
  let state = make_state(dir.path()).await;
  let resp = send(&state, "GET", "/predictions/shortlist?field=Physics&horizon=decade").await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn shortlist_report_is_csv() {
  let (_dir, state) = trained().await;

  let resp = send(&state, "GET", "/reports/shortlist.csv?field=Physics&horizon=one_year").await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/csv; charset=utf-8");
  let text = String::from_utf8(body_bytes(resp).await).unwrap();
  let mut lines = text.lines();
  assert_eq!(lines.next(), Some("rank,full_name,affiliation,probability,top_features"));
  assert!(lines.next().unwrap().starts_with("1,"));
  assert!(text.contains("\"Institute, North\""));
}

#[tokio::test]
async fn candidate_detail_and_not_found() {
  let (_dir, state) = trained().await;
  let id = state.store.find_candidate("P2".into()).await.unwrap().unwrap().candidate_id;

  let body = json(send(&state, "GET", &format!("/candidates/{id}")).await).await;
  assert_eq!(body["candidate"]["full_name"], "Bea Brown");
  assert_eq!(body["snapshot"]["as_of_year"], 2024);

  let missing = send(&state, "GET", &format!("/candidates/{}", Uuid::new_v4())).await;
  assert_eq!(missing.status(), StatusCode::NOT_FOUND);
  let garbage = send(&state, "GET", "/candidates/not-a-uuid").await;
  assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn provenance_is_read_from_the_seed_directory() {
  let (_dir, state) = trained().await;
  let id = state.store.find_candidate("P1".into()).await.unwrap().unwrap().candidate_id;
  let uri = format!("/candidates/{id}/provenance");

  assert_eq!(send(&state, "GET", &uri).await.status(), StatusCode::SERVICE_UNAVAILABLE);

  seed(
    &state,
    "provenance.json",
    r#"{"P1": [{"feature_name": "h_index", "source": "openalex", "as_of_date": "2024-05-01", "latency_days": 3}]}"#,
  )
  .await;
  let body = json(send(&state, "GET", &uri).await).await;
  assert_eq!(body[0]["source"], "openalex");
  assert_eq!(body[0]["latency_days"], 3);
}

#[tokio::test]
async fn backtests_are_listed_per_field() {
  let (_dir, state) = trained().await;

  let body = json(send(&state, "GET", "/backtests?field=Physics").await).await;
  let mut names: Vec<&str> = body.as_array().unwrap().iter().map(|m| m["metric"].as_str().unwrap()).collect();
  names.sort_unstable();
  assert_eq!(names, ["average_precision", "brier_score", "hit_at_10"]);
  assert_eq!(body[0]["details"]["samples"], 3);

  let none = json(send(&state, "GET", "/backtests?field=Chemistry").await).await;
  assert!(none.as_array().unwrap().is_empty());
}
