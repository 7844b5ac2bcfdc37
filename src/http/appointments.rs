use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::model::{Appointment, AppointmentDraft, ScheduleDraft, SlotAvailability};

use super::error::{IdPath, JsonBody};
use super::{ApiError, AppState};

pub async fn list(State(state): State<AppState>) -> Json<Vec<Appointment>> {
    Json(state.engine.list_appointments().await)
}

pub async fn get(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<Appointment>, ApiError> {
    Ok(Json(state.engine.get_appointment(id).await?))
}

pub async fn available_slots(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<SlotAvailability>, ApiError> {
    Ok(Json(state.engine.available_slots(&date).await?))
}

pub async fn for_customer(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Json<Vec<Appointment>> {
    Json(state.engine.appointments_for_customer(&email).await)
}

pub async fn book(
    State(state): State<AppState>,
    JsonBody(draft): JsonBody<AppointmentDraft>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let appt = state.engine.book(draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Appointment booked successfully",
            "appointmentId": appt.id,
            "appointmentDetails": {
                "name": appt.name,
                "email": appt.email,
                "date": appt.appointment_date,
                "time": appt.appointment_time,
                "service": appt.service,
            },
        })),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusBody {
    status: Option<String>,
}

pub async fn set_status(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    JsonBody(body): JsonBody<StatusBody>,
) -> Result<Json<Value>, ApiError> {
    let status = body.status.unwrap_or_default();
    let appt = state.engine.set_status(id, &status).await?;
    Ok(Json(json!({
        "message": "Appointment status updated successfully",
        "appointment": appt,
    })))
}

pub async fn reschedule(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    JsonBody(draft): JsonBody<ScheduleDraft>,
) -> Result<Json<Value>, ApiError> {
    let appt = state.engine.reschedule(id, draft).await?;
    Ok(Json(json!({
        "message": "Appointment rescheduled successfully",
        "appointment": appt,
    })))
}

pub async fn cancel(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<Value>, ApiError> {
    let appt = state.engine.cancel(id).await?;
    Ok(Json(json!({
        "message": "Appointment cancelled successfully",
        "appointment": appt,
    })))
}

pub async fn remove(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<Value>, ApiError> {
    state.engine.remove(id).await?;
    Ok(Json(json!({ "message": "Appointment deleted successfully" })))
}
