//! HTTP boundary for the wizard UI.
//!
//! The UI collects meals and tracked issues, posts the completed diary to
//! `/analyze`, renders the result, and later posts the user's rating and
//! confirmation to `/feedback`.

use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::diary::{Diary, DiaryEntry, DiaryPatterns};
use crate::engine::Engine;
use crate::error::StorageError;
use crate::feedback::{FeedbackRecord, FeedbackStats, FeedbackStore, ModelAdjustments, Rating};
use crate::scoring::{AnalysisResult, DEFAULT_MAX_ALTERNATIVES};

#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    store: Arc<Mutex<FeedbackStore>>,
    max_alternatives: usize,
}

impl AppState {
    pub fn new(engine: Engine, store: FeedbackStore) -> Self {
        Self {
            engine: Arc::new(engine),
            store: Arc::new(Mutex::new(store)),
            max_alternatives: DEFAULT_MAX_ALTERNATIVES,
        }
    }

    pub fn with_max_alternatives(mut self, n: usize) -> Self {
        self.max_alternatives = n;
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/reference/foods", get(reference_foods))
        .route("/reference/issues", get(reference_issues))
        .route("/analyze", post(analyze))
        .route("/feedback", post(submit_feedback))
        .route("/feedback/stats", get(feedback_stats))
        .route("/feedback/adjustments", get(feedback_adjustments))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Store failures become a 500 with a JSON body; the caller keeps its
/// in-memory result and may retry.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("feedback store unavailable: {0}")]
    StoreUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self, "feedback storage failure");
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Run blocking file I/O against the store off the async workers, one
/// caller at a time.
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&FeedbackStore) -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || {
        let guard = store
            .lock()
            .map_err(|_| ApiError::StoreUnavailable("mutex poisoned".into()))?;
        f(&guard).map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::StoreUnavailable(e.to_string()))?
}

async fn reference_foods(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.engine.reference().foods.sorted_names())
}

async fn reference_issues(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.engine.reference().allergies.all_issues().to_vec())
}

#[derive(Debug, Deserialize)]
struct AnalyzeReq {
    /// Declared once, replicated onto every day.
    tracked_issues: Vec<String>,
    /// Foods per day, in meal order.
    days: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct AnalyzeResp {
    #[serde(flatten)]
    result: AnalysisResult,
    /// Alternatives trimmed to the display limit.
    shown_alternatives: Vec<String>,
    /// Allergens the user may confirm as the culprit.
    confirmation_choices: Vec<String>,
    /// How often each food, allergen, and issue showed up.
    patterns: DiaryPatterns,
}

async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeReq>,
) -> Result<Json<AnalyzeResp>, ApiError> {
    let diary = Diary::new(
        body.days
            .into_iter()
            .map(|foods| DiaryEntry::new(foods, &body.tracked_issues))
            .collect(),
    );

    let window = state.engine.training_window();
    let (adjustments, recent) = with_store(&state, move |store| {
        let adjustments = store.adjustments()?;
        let recent = if window > 0 {
            store.recent(window)?
        } else {
            Vec::new()
        };
        Ok((adjustments, recent))
    })
    .await?;

    let result = state.engine.analyze(&diary, &adjustments, &recent);
    Ok(Json(AnalyzeResp {
        shown_alternatives: result.top_alternatives(state.max_alternatives).to_vec(),
        confirmation_choices: diary.eaten_allergens(&state.engine.reference().foods),
        patterns: diary.patterns(&state.engine.reference().foods),
        result,
    }))
}

#[derive(Debug, Deserialize)]
struct FeedbackReq {
    rating: Rating,
    #[serde(default)]
    comments: String,
    #[serde(default)]
    confirmed_culprit: String,
    results: AnalysisResult,
}

#[derive(Debug, Serialize)]
struct FeedbackResp {
    total_count: usize,
    rating_label: &'static str,
}

async fn submit_feedback(
    State(state): State<AppState>,
    Json(body): Json<FeedbackReq>,
) -> Result<(StatusCode, Json<FeedbackResp>), ApiError> {
    let record = FeedbackRecord::new(
        body.rating,
        body.comments,
        &body.confirmed_culprit,
        body.results,
    );
    let rating_label = record.rating.label();
    let total_count = with_store(&state, move |store| {
        store.record_feedback(&record)?;
        Ok(store.stats()?.total_count)
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(FeedbackResp {
            total_count,
            rating_label,
        }),
    ))
}

async fn feedback_stats(State(state): State<AppState>) -> Result<Json<FeedbackStats>, ApiError> {
    with_store(&state, |store| store.stats()).await.map(Json)
}

async fn feedback_adjustments(
    State(state): State<AppState>,
) -> Result<Json<ModelAdjustments>, ApiError> {
    with_store(&state, |store| store.adjustments()).await.map(Json)
}
