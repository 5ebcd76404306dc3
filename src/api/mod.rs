use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;

pub mod handlers;
pub mod responses;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::get_health))
        .route("/api/location-types", get(handlers::get_location_types))
        .route("/api/locations", get(handlers::get_locations))
        .route("/api/locations/{id}", get(handlers::get_location))
        .route(
            "/api/locations/{id}/queue-status",
            get(handlers::get_queue_status),
        )
        .route("/api/locations/{id}/best-time", get(handlers::get_best_times))
        .route("/api/locations/{id}/history", get(handlers::get_history))
        .route(
            "/api/locations/{id}/prediction",
            get(handlers::get_latest_prediction),
        )
        .route("/api/checkin", post(handlers::post_checkin))
        .route(
            "/api/checkins/device/{device_id}",
            get(handlers::get_device_checkins),
        )
        .with_state(state)
}
