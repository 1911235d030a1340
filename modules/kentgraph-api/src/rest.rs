use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::warn;

use kentgraph_common::{Event, Location, Scrape};
use kentgraph_graph::GraphError;

use crate::AppState;

// --- Helpers ---

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Not-found → 404, caller mistakes → 400, write conflicts → 409, the rest → 500.
fn graph_error(e: GraphError) -> Response {
    let status = if e.is_not_found() {
        StatusCode::NOT_FOUND
    } else if e.is_invalid_input() {
        StatusCode::BAD_REQUEST
    } else if e.is_aborted() {
        StatusCode::CONFLICT
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    if status.is_server_error() {
        warn!(error = %e, "Record access failed");
    }
    error_body(status, e.to_string())
}

fn lookup<T: Serialize>(result: Result<Option<T>, GraphError>, missing: String) -> Response {
    match result {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => error_body(StatusCode::NOT_FOUND, missing),
        Err(e) => graph_error(e),
    }
}

/// Only the minted uids go back to the caller.
fn upserted(result: Result<kentgraph_graph::Assigned, GraphError>) -> Response {
    match result {
        Ok(assigned) => Json(serde_json::json!({ "uids": assigned.uids })).into_response(),
        Err(e) => graph_error(e),
    }
}

// --- Scrapes ---

pub async fn scrape_by_uid(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> impl IntoResponse {
    let missing = format!("No scrape found with uid {uid}");
    lookup(state.repo.scrape(&Scrape::with_uid(uid)).await, missing)
}

pub async fn scrape_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id: i64 = match id.parse() {
        Ok(n) => n,
        Err(_) => {
            return error_body(StatusCode::BAD_REQUEST, format!("scrape id must be numeric: {id:?}"))
        }
    };
    lookup(
        state.repo.scrape(&Scrape::with_id(id)).await,
        format!("No scrape found with id {id}"),
    )
}

pub async fn upsert_scrape(
    State(state): State<Arc<AppState>>,
    Json(scrape): Json<Scrape>,
) -> impl IntoResponse {
    upserted(state.repo.upsert_scrape(&scrape).await)
}

// --- Events ---

pub async fn event_by_uid(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> impl IntoResponse {
    let missing = format!("No event found with uid {uid}");
    lookup(state.repo.event(&Event::with_uid(uid)).await, missing)
}

pub async fn event_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let missing = format!("No event found with id {id}");
    lookup(state.repo.event(&Event::with_id(id)).await, missing)
}

pub async fn upsert_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<Event>,
) -> impl IntoResponse {
    upserted(state.repo.upsert_event(&event).await)
}

// --- Locations ---

pub async fn location_by_uid(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> impl IntoResponse {
    let missing = format!("No location found with uid {uid}");
    lookup(state.repo.location(&Location::with_uid(uid)).await, missing)
}

pub async fn location_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let result = state.repo.location_by_slug(&slug).await;
    lookup(result, format!("No location found with slug {slug}"))
}

pub async fn upsert_location(
    State(state): State<Arc<AppState>>,
    Json(location): Json<Location>,
) -> impl IntoResponse {
    upserted(state.repo.upsert_location(&location).await)
}

// --- Metrics ---

pub async fn count_by_field(
    State(state): State<Arc<AppState>>,
    Path(field): Path<String>,
) -> impl IntoResponse {
    match state.repo.count_by_field(&field).await {
        Ok(count) => Json(serde_json::json!({ "field": field, "count": count })).into_response(),
        Err(e) => graph_error(e),
    }
}
