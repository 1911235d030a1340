use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::rest;
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Scrapes
        .route("/api/scrapes", post(rest::upsert_scrape))
        .route("/api/scrapes/by-id/{id}", get(rest::scrape_by_id))
        .route("/api/scrapes/{uid}", get(rest::scrape_by_uid))
        // Events
        .route("/api/events", post(rest::upsert_event))
        .route("/api/events/by-id/{id}", get(rest::event_by_id))
        .route("/api/events/{uid}", get(rest::event_by_uid))
        // Locations
        .route("/api/locations", post(rest::upsert_location))
        .route("/api/locations/by-slug/{slug}", get(rest::location_by_slug))
        .route("/api/locations/{uid}", get(rest::location_by_uid))
        // Population metric
        .route("/api/count/{field}", get(rest::count_by_field))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
