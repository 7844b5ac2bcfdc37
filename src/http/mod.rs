//! JSON REST surface under `/api`.

mod appointments;
mod catalog;
mod error;

pub use error::{ApiError, SLOT_TAKEN_MESSAGE};

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, patch};
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::observability::track_requests;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route(
            "/appointments",
            get(appointments::list).post(appointments::book),
        )
        .route(
            "/appointments/available-slots/{date}",
            get(appointments::available_slots),
        )
        .route(
            "/appointments/customer/{email}",
            get(appointments::for_customer),
        )
        .route(
            "/appointments/{id}",
            get(appointments::get)
                .put(appointments::reschedule)
                .delete(appointments::remove),
        )
        .route("/appointments/{id}/status", patch(appointments::set_status))
        .route("/appointments/{id}/cancel", patch(appointments::cancel))
        .route(
            "/services",
            get(catalog::list_services).post(catalog::create_service),
        )
        .route(
            "/services/{id}",
            get(catalog::get_service)
                .put(catalog::update_service)
                .delete(catalog::delete_service),
        )
        .route(
            "/gallery",
            get(catalog::list_gallery).post(catalog::create_gallery_item),
        )
        .route(
            "/gallery/{id}",
            get(catalog::get_gallery_item)
                .put(catalog::update_gallery_item)
                .delete(catalog::delete_gallery_item),
        );

    Router::new()
        .route("/", get(banner))
        .nest("/api", api)
        .fallback(|| async { ApiError::NotFound })
        .layer(middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Any origin when `origins` is empty; otherwise exactly the listed ones.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn banner() -> Json<Value> {
    Json(json!({
        "name": "Glam Tips API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/api/health",
            "services": "/api/services",
            "appointments": "/api/appointments",
            "gallery": "/api/gallery",
        },
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "message": "Glam Tips API is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
