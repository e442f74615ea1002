// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /reference/foods, /reference/issues
// - POST /analyze (allergen + classifier strategies)
// - POST /feedback, GET /feedback/stats, GET /feedback/adjustments

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use allergen_inference::classifier::ClassifierConfig;
use allergen_inference::reference::{AllergyRecord, AllergyTable, FoodRecord, FoodTable};
use allergen_inference::{create_router, AppState, Engine, FeedbackStore, ReferenceData, StrategyKind};

const BODY_LIMIT: usize = 1024 * 1024;

fn reference() -> ReferenceData {
    ReferenceData::new(
        FoodTable::from_records([
            FoodRecord::new("Pizza", ["dairy", "gluten"], ["cheese", "flour"]),
            FoodRecord::new("Salad", ["none"], ["lettuce"]),
            FoodRecord::new("Bread", ["gluten"], ["flour"]),
        ]),
        AllergyTable::from_records([
            AllergyRecord::new("dairy", ["bloating"]),
            AllergyRecord::new("gluten", ["fatigue"]),
        ]),
    )
}

fn test_router(dir: &tempfile::TempDir, kind: StrategyKind) -> Router {
    let store = FeedbackStore::open(dir.path().join("fb.json"), dir.path().join("adj.json"))
        .expect("open store");
    let engine = Engine::with_strategy(Arc::new(reference()), kind, &ClassifierConfig::default());
    create_router(AppState::new(engine, store).with_max_alternatives(1))
}

async fn send(app: &Router, method: &str, uri: &str, payload: Option<Json>) -> (StatusCode, Json) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match payload {
        Some(p) => builder
            .header("content-type", "application/json")
            .body(Body::from(p.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Json::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, v)
}

fn pizza_diary() -> Json {
    json!({
        "tracked_issues": ["Bloating"],
        "days": [["Pizza", "Salad", "Pizza"], ["Salad", "Salad", "Salad"]]
    })
}

#[tokio::test]
async fn health_returns_ok() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_router(&tmp, StrategyKind::Allergen);
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Json::String("ok".into()));
}

#[tokio::test]
async fn reference_listings_are_sorted() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_router(&tmp, StrategyKind::Allergen);

    let (_, foods) = send(&app, "GET", "/reference/foods", None).await;
    assert_eq!(foods, json!(["Bread", "Pizza", "Salad"]));

    let (_, issues) = send(&app, "GET", "/reference/issues", None).await;
    assert_eq!(issues, json!(["bloating", "fatigue"]));
}

#[tokio::test]
async fn analyze_returns_culprit_and_choices() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_router(&tmp, StrategyKind::Allergen);

    let (status, v) = send(&app, "POST", "/analyze", Some(pizza_diary())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["strategy"], "allergen");
    assert_eq!(v["finding"], "culprit");
    assert_eq!(v["ingredient_issue_map"]["dairy"], 2);
    assert_eq!(v["probable_ingredients"], json!(["dairy"]));
    assert_eq!(v["culprit_foods"], json!(["Pizza"]));
    assert_eq!(v["alternative_foods"], json!(["Salad", "Bread"]));
    assert_eq!(v["shown_alternatives"], json!(["Salad"]));
    assert_eq!(v["confirmation_choices"], json!(["dairy", "gluten", "none"]));
    assert!(v.get("prediction").is_none());

    // Food-level view: Pizza was eaten twice on a bloating day.
    assert_eq!(v["food_scores"]["scores"], json!([["Pizza", 2], ["Salad", 0]]));
    assert_eq!(v["food_scores"]["probable"], json!(["Pizza"]));
    assert_eq!(v["culprit_swaps"], json!({ "Pizza": "Salad" }));
    assert_eq!(v["patterns"]["food_counts"]["Salad"], 4);
    assert_eq!(v["patterns"]["allergen_counts"]["dairy"], 2);
    assert_eq!(v["patterns"]["issue_counts"]["bloating"], 2);
}

#[tokio::test]
async fn feedback_closes_the_loop() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_router(&tmp, StrategyKind::Allergen);

    let (_, analysis) = send(&app, "POST", "/analyze", Some(pizza_diary())).await;
    let fb = json!({
        "rating": 4,
        "comments": "close",
        "confirmed_culprit": "Gluten",
        "results": analysis,
    });
    for expected_total in 1..=3 {
        let (status, v) = send(&app, "POST", "/feedback", Some(fb.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v["total_count"], expected_total);
        assert_eq!(v["rating_label"], "Somewhat Accurate (4)");
    }

    let (_, adj) = send(&app, "GET", "/feedback/adjustments", None).await;
    assert_eq!(adj, json!({ "gluten": 3 }));

    // 2 (dairy evidence) < 0 + 3 (gluten adjustment)
    let (_, again) = send(&app, "POST", "/analyze", Some(pizza_diary())).await;
    assert_eq!(again["probable_ingredients"], json!(["gluten"]));

    let (_, stats) = send(&app, "GET", "/feedback/stats", None).await;
    assert_eq!(stats["total_count"], 3);
    assert_eq!(stats["recent"].as_array().map(Vec::len), Some(3));
    assert_eq!(stats["recent"][0]["confirmed_culprit"], "gluten");
}

#[tokio::test]
async fn out_of_range_rating_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_router(&tmp, StrategyKind::Allergen);
    let (_, analysis) = send(&app, "POST", "/analyze", Some(pizza_diary())).await;
    let fb = json!({ "rating": 7, "results": analysis });
    let (status, _) = send(&app, "POST", "/feedback", Some(fb)).await;
    assert!(status.is_client_error(), "got {status}");
}

#[tokio::test]
async fn classifier_strategy_reports_prediction() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_router(&tmp, StrategyKind::Classifier);

    let (_, v) = send(&app, "POST", "/analyze", Some(pizza_diary())).await;
    assert_eq!(v["strategy"], "classifier");
    assert_eq!(v["prediction"]["kind"], "fallback");
    assert_eq!(v["prediction"]["food"], "Salad");
}

#[tokio::test]
async fn broken_store_yields_500() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_router(&tmp, StrategyKind::Allergen);
    std::fs::write(tmp.path().join("adj.json"), "not json").unwrap();

    let (status, v) = send(&app, "POST", "/analyze", Some(pizza_diary())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(v["error"].as_str().unwrap_or_default().contains("corrupt"));
}
