use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::model::{GalleryDraft, GalleryItem, Service, ServiceDraft};

use super::error::{IdPath, JsonBody};
use super::{ApiError, AppState};

// ── Services ─────────────────────────────────────────────

pub async fn list_services(State(state): State<AppState>) -> Json<Vec<Service>> {
    Json(state.engine.list_services())
}

pub async fn get_service(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<Service>, ApiError> {
    Ok(Json(state.engine.get_service(id)?))
}

pub async fn create_service(
    State(state): State<AppState>,
    JsonBody(draft): JsonBody<ServiceDraft>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let service = state.engine.create_service(draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Service created successfully",
            "serviceId": service.id,
            "service": service,
        })),
    ))
}

pub async fn update_service(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    JsonBody(draft): JsonBody<ServiceDraft>,
) -> Result<Json<Value>, ApiError> {
    let service = state.engine.update_service(id, draft).await?;
    Ok(Json(json!({
        "message": "Service updated successfully",
        "service": service,
    })))
}

pub async fn delete_service(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<Value>, ApiError> {
    state.engine.delete_service(id).await?;
    Ok(Json(json!({ "message": "Service deleted successfully" })))
}

// ── Gallery ──────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct GalleryQuery {
    category: Option<String>,
}

pub async fn list_gallery(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> Json<Vec<GalleryItem>> {
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    Json(state.engine.list_gallery(category))
}

pub async fn get_gallery_item(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<GalleryItem>, ApiError> {
    Ok(Json(state.engine.get_gallery_item(id)?))
}

pub async fn create_gallery_item(
    State(state): State<AppState>,
    JsonBody(draft): JsonBody<GalleryDraft>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let item = state.engine.create_gallery_item(draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Gallery item created successfully",
            "itemId": item.id,
            "item": item,
        })),
    ))
}

pub async fn update_gallery_item(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    JsonBody(draft): JsonBody<GalleryDraft>,
) -> Result<Json<Value>, ApiError> {
    let item = state.engine.update_gallery_item(id, draft).await?;
    Ok(Json(json!({
        "message": "Gallery item updated successfully",
        "item": item,
    })))
}

pub async fn delete_gallery_item(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<Value>, ApiError> {
    state.engine.delete_gallery_item(id).await?;
    Ok(Json(json!({ "message": "Gallery item deleted successfully" })))
}
