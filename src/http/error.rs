use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::engine::{EngineError, Entity};
use crate::model::{AppointmentStatus, Id};

pub const SLOT_TAKEN_MESSAGE: &str = "This time slot is already booked. Please choose another time.";

/// Everything a handler can fail with, rendered as `{"error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    /// Malformed JSON body or path parameter.
    BadRequest(String),
    NotFound,
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Engine(e) => engine_error_body(e),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "Not found" })),
        };
        (status, Json(body)).into_response()
    }
}

fn engine_error_body(e: EngineError) -> (StatusCode, serde_json::Value) {
    match e {
        EngineError::MissingFields(fields) => (
            StatusCode::BAD_REQUEST,
            json!({ "error": "All required fields must be provided", "fields": fields }),
        ),
        EngineError::Invalid { field, ref reason } => (
            StatusCode::BAD_REQUEST,
            json!({ "error": format!("Invalid {field}: {reason}"), "fields": [field] }),
        ),
        EngineError::SlotConflict { .. } => (StatusCode::CONFLICT, json!({ "error": SLOT_TAKEN_MESSAGE })),
        EngineError::NotFound(entity, _) => {
            let what = match entity {
                Entity::Appointment => "Appointment",
                Entity::Service => "Service",
                Entity::GalleryItem => "Gallery item",
            };
            (StatusCode::NOT_FOUND, json!({ "error": format!("{what} not found") }))
        }
        EngineError::InvalidStatus(_) => {
            let allowed: Vec<&str> = AppointmentStatus::ALL.iter().map(|s| s.as_str()).collect();
            (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid status value", "allowed": allowed }),
            )
        }
        EngineError::LimitExceeded(_) => (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() })),
        EngineError::WalError(_) => {
            tracing::error!(error = %e, "storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error" }),
            )
        }
    }
}

/// `Json<T>` whose rejection uses the API error shape.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ApiError::BadRequest(e.body_text()))?;
        Ok(Self(value))
    }
}

/// Numeric `{id}` path segment.
pub struct IdPath(pub Id);

impl<S: Send + Sync> FromRequestParts<S> for IdPath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Id>::from_request_parts(parts, state)
            .await
            .map_err(|e: PathRejection| ApiError::BadRequest(e.body_text()))?;
        Ok(Self(id))
    }
}
