//! HTTP API
//!
//! Pill search by text attributes or by image-analysis candidates, plus
//! catalog maintenance routed through the configured backend.

use std::fmt::Display;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backend::Backend;
use crate::catalog::PillDocument;
use crate::config::{ServiceConfig, MAX_TOP_K};
use crate::normalize::{clean_ocr_imprint, ColorClasses, NormalizedFeatures, RawFeatures};
use crate::pipeline::search_pills;
use crate::rank::RankedHit;

/// Result count for image candidates when the caller gives none
pub const DEFAULT_CANDIDATE_TOP_K: usize = 5;

/// Application state shared across handlers
pub struct AppState {
    pub backend: Backend,
    pub config: ServiceConfig,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct TextSearchParams {
    pub imprint: Option<String>,
    pub drug_shape: Option<String>,
    /// Comma separated, primary color first
    pub color_classes: Option<String>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatesRequest {
    pub candidates: Vec<RawFeatures>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PillHit {
    pub score: f32,
    pub item_seq: Option<String>,
    pub data: Value,
}

impl From<RankedHit> for PillHit {
    fn from(hit: RankedHit) -> Self {
        Self {
            score: hit.score,
            item_seq: hit.document["item_seq"].as_str().map(str::to_string),
            data: hit.document,
        }
    }
}

#[derive(Debug, Serialize)]
struct TextSearchResponse {
    status: &'static str,
    analysis: RawFeatures,
    normalized: NormalizedFeatures,
    cutoff: usize,
    total_hits: usize,
    results: Vec<PillHit>,
}

#[derive(Debug, Serialize)]
struct CandidateResult {
    analysis: RawFeatures,
    search_results: Vec<PillHit>,
}

#[derive(Debug, Serialize)]
struct CandidatesResponse {
    status: &'static str,
    results: Vec<CandidateResult>,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    message: String,
    inserted: usize,
    failed_items: Vec<Value>,
}

fn internal(e: impl Display) -> (StatusCode, String) {
    tracing::error!(error = %e, "backend request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn bad_request(e: impl Display) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}

fn check_top_k(top_k: usize) -> Result<usize, (StatusCode, String)> {
    if (1..=MAX_TOP_K).contains(&top_k) {
        Ok(top_k)
    } else {
        Err(bad_request(format!("top_k must be between 1 and {MAX_TOP_K}")))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let backend = state.backend.name();
    match state.backend.doc_count().await {
        Ok(indexed_docs) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "backend": backend,
                "indexed_docs": indexed_docs,
            })),
        ),
        Err(e) => {
            tracing::warn!(backend, error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "backend": backend,
                    "error": e.to_string(),
                })),
            )
        }
    }
}

/// Search by user supplied attributes
async fn search_by_text(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TextSearchParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let top_k = check_top_k(params.top_k.unwrap_or(state.config.default_top_k))?;

    let raw = RawFeatures {
        drug_shape: non_blank(params.drug_shape),
        color_classes: non_blank(params.color_classes).map(ColorClasses::One),
        imprint: non_blank(params.imprint),
    };
    if raw.is_empty() {
        return Err(bad_request(
            "at least one of imprint, drug_shape or color_classes is required",
        ));
    }

    let outcome = search_pills(&state.backend, &raw, top_k, &state.config.search).await;
    tracing::info!(
        total_hits = outcome.total_hits,
        returned = outcome.hits.len(),
        "text search"
    );

    Ok(Json(TextSearchResponse {
        status: "success",
        analysis: raw,
        normalized: outcome.features,
        cutoff: outcome.cutoff,
        total_hits: outcome.total_hits,
        results: outcome.hits.into_iter().map(PillHit::from).collect(),
    }))
}

/// Search once per image-analysis candidate
async fn search_candidates(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CandidatesRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let top_k = check_top_k(req.top_k.unwrap_or(DEFAULT_CANDIDATE_TOP_K))?;
    if req.candidates.is_empty() {
        return Err(bad_request("no candidates supplied"));
    }

    let mut results = Vec::with_capacity(req.candidates.len());
    for mut candidate in req.candidates {
        candidate.imprint = candidate.imprint.as_deref().map(clean_ocr_imprint);
        let outcome = search_pills(&state.backend, &candidate, top_k, &state.config.search).await;
        results.push(CandidateResult {
            analysis: candidate,
            search_results: outcome.hits.into_iter().map(PillHit::from).collect(),
        });
    }

    Ok(Json(CandidatesResponse {
        status: "success",
        results,
    }))
}

/// Add a single catalog entry
async fn add_pill(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let pill = PillDocument::from_value(body).map_err(bad_request)?;
    state.backend.upsert(&pill).await.map_err(internal)?;

    Ok(Json(json!({
        "message": "Pill added successfully",
        "item_seq": pill.item_seq,
    })))
}

async fn get_pill(
    State(state): State<Arc<AppState>>,
    Path(item_seq): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.backend.get(&item_seq).await.map_err(internal)? {
        Some(source) => Ok(Json(source)),
        None => Err((StatusCode::NOT_FOUND, "Pill not found".to_string())),
    }
}

/// Merge the given fields into an existing entry
async fn update_pill(
    State(state): State<Arc<AppState>>,
    Path(item_seq): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let Value::Object(changes) = body else {
        return Err(bad_request("update body must be a JSON object"));
    };

    let mut source = match state.backend.get(&item_seq).await.map_err(internal)? {
        Some(Value::Object(source)) => source,
        _ => return Err((StatusCode::NOT_FOUND, "Pill not found".to_string())),
    };
    source.extend(changes);
    // derived fields are recomputed from the merged entry
    source.remove("shape_group");
    source.remove("color_group");
    source.insert("item_seq".to_string(), Value::String(item_seq.clone()));

    let pill = PillDocument::from_value(Value::Object(source)).map_err(bad_request)?;
    state.backend.upsert(&pill).await.map_err(internal)?;

    Ok(Json(json!({
        "message": "Pill updated successfully",
        "item_seq": item_seq,
    })))
}

async fn delete_pill(
    State(state): State<Arc<AppState>>,
    Path(item_seq): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !state.backend.delete(&item_seq).await.map_err(internal)? {
        return Err((StatusCode::NOT_FOUND, "Pill not found".to_string()));
    }

    Ok(Json(json!({
        "message": "Pill deleted successfully",
        "item_seq": item_seq,
    })))
}

/// Bulk load a JSON array of catalog entries
async fn upload_json(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let Value::Array(items) = body else {
        return Err(bad_request("Invalid JSON format. Expected a list."));
    };

    let mut pills = Vec::with_capacity(items.len());
    let mut failed_items = Vec::new();
    for item in items {
        match PillDocument::from_value(item.clone()) {
            Ok(pill) => pills.push(pill),
            Err(e) => {
                tracing::warn!(error = %e, "skipping invalid catalog entry");
                failed_items.push(item);
            }
        }
    }

    state.backend.upsert_batch(&pills).await.map_err(internal)?;
    tracing::info!(inserted = pills.len(), failed = failed_items.len(), "catalog upload");

    Ok(Json(UploadResponse {
        message: format!("{} pills added successfully", pills.len()),
        inserted: pills.len(),
        failed_items,
    }))
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/medicine/text", get(search_by_text))
        .route("/medicine/candidates", post(search_candidates))
        .route("/pill/add", post(add_pill))
        .route(
            "/pill/{item_seq}",
            get(get_pill).put(update_pill).delete(delete_pill),
        )
        .route("/upload/json", post(upload_json))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_top_k_bounds() {
        assert!(check_top_k(0).is_err());
        assert_eq!(check_top_k(1).unwrap(), 1);
        assert_eq!(check_top_k(MAX_TOP_K).unwrap(), MAX_TOP_K);
        assert_eq!(check_top_k(MAX_TOP_K + 1).unwrap_err().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_pill_hit_extracts_item_seq() {
        let hit = PillHit::from(RankedHit {
            score: 3.5,
            document: json!({ "item_seq": "42", "print_front": "KP" }),
        });
        assert_eq!(hit.item_seq.as_deref(), Some("42"));
        assert_eq!(hit.data["print_front"], "KP");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some("원형".to_string())).as_deref(), Some("원형"));
    }
}
