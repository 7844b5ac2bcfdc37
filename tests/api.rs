use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use glamtips::engine::Engine;
use glamtips::http::{self, AppState, SLOT_TAKEN_MESSAGE};
use glamtips::notify::{Notice, Notifier, NotifyError, NotifyHub};
use glamtips::slots::SlotGrid;

// ── Test infrastructure ──────────────────────────────────────

struct Capture(mpsc::UnboundedSender<Notice>);

#[async_trait]
impl Notifier for Capture {
    fn name(&self) -> &'static str {
        "capture"
    }

    async fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        let _ = self.0.send(notice.clone());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    hub: Arc<NotifyHub>,
    notices: mpsc::UnboundedReceiver<Notice>,
}

fn wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("glamtips_int_test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{name}_{}.wal", std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

fn app(name: &str) -> TestApp {
    app_on(wal_path(name))
}

fn app_on(wal: PathBuf) -> TestApp {
    let (tx, notices) = mpsc::unbounded_channel();
    let capture: Arc<dyn Notifier> = Arc::new(Capture(tx));
    let hub = NotifyHub::start(vec![capture], Duration::from_secs(1), 64);
    let engine = Engine::new(wal, SlotGrid::default(), hub.clone()).unwrap();
    let router = http::router(
        AppState { engine: Arc::new(engine) },
        http::cors_layer(&[]),
    );
    TestApp { router, hub, notices }
}

async fn call(app: &TestApp, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn booking(date: &str, time: &str) -> Value {
    json!({
        "name": "Maya Chen",
        "email": "maya@example.com",
        "phone": "555-0101",
        "appointment_date": date,
        "appointment_time": time,
        "service": "Gel Manicure",
    })
}

async fn book(app: &TestApp, date: &str, time: &str) -> u64 {
    let (status, body) = call(app, Method::POST, "/api/appointments", Some(booking(date, time))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["appointmentId"].as_u64().unwrap()
}

// ── Service surface ──────────────────────────────────────────

#[tokio::test]
async fn banner_and_health() {
    let app = app("banner");
    let (status, body) = call(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["appointments"], "/api/appointments");

    let (status, body) = call(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");

    let (status, body) = call(&app, Method::GET, "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

// ── Booking flow ─────────────────────────────────────────────

#[tokio::test]
async fn book_then_fetch() {
    let app = app("book_then_fetch");
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/appointments",
        Some(booking("2025-06-01", "10:00 AM")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Appointment booked successfully");
    assert_eq!(body["appointmentDetails"]["time"], "10:00");
    assert_eq!(body["appointmentDetails"]["date"], "2025-06-01");
    let id = body["appointmentId"].as_u64().unwrap();

    let (status, body) = call(&app, Method::GET, &format!("/api/appointments/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["appointment_time"], "10:00");
    assert_eq!(body["message"], "");
}

#[tokio::test]
async fn second_booking_for_slot_conflicts() {
    let app = app("slot_conflict");
    book(&app, "2025-06-01", "14:00").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/appointments",
        Some(booking("2025-06-01", "14:00")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], SLOT_TAKEN_MESSAGE);

    let (_, list) = call(&app, Method::GET, "/api/appointments", None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_fields_are_listed() {
    let app = app("missing_fields");
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/appointments",
        Some(json!({ "name": "Maya", "appointment_date": "2025-06-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["fields"],
        json!(["email", "phone", "appointment_time", "service"])
    );
}

#[tokio::test]
async fn malformed_input_is_a_bad_request() {
    let app = app("malformed");
    let (status, _) = call(&app, Method::POST, "/api/appointments", Some(json!("not an object"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/appointments",
        Some(booking("2025-06-01", "08:00")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"], json!(["appointment_time"]));

    let (status, _) = call(&app, Method::GET, "/api/appointments/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn storage_failure_is_an_opaque_server_error() {
    // Every write to /dev/full fails with ENOSPC.
    let app = app_on(PathBuf::from("/dev/full"));
    for _ in 0..2 {
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/appointments",
            Some(booking("2025-06-01", "10:00")),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }

    let (status, body) = call(&app, Method::GET, "/api/appointments/available-slots/2025-06-01", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bookedSlots"], json!([]));
    assert_eq!(body["availableSlots"].as_array().unwrap().len(), 18);

    let (_, list) = call(&app, Method::GET, "/api/appointments", None).await;
    assert_eq!(list, json!([]));
}

// ── Availability ─────────────────────────────────────────────

#[tokio::test]
async fn available_slots_endpoint() {
    let app = app("available_slots");
    book(&app, "2025-06-01", "09:00").await;
    let cancelled = book(&app, "2025-06-01", "09:30").await;
    book(&app, "2025-06-01", "17:30").await;
    call(&app, Method::PATCH, &format!("/api/appointments/{cancelled}/cancel"), None).await;

    let (status, body) = call(&app, Method::GET, "/api/appointments/available-slots/2025-06-01", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], "2025-06-01");
    assert_eq!(body["bookedSlots"], json!(["09:00", "17:30"]));
    let available = body["availableSlots"].as_array().unwrap();
    assert_eq!(available.len(), 16);
    assert_eq!(available[0], "09:30");

    let (status, _) = call(&app, Method::GET, "/api/appointments/available-slots/June-1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Lifecycle ────────────────────────────────────────────────

#[tokio::test]
async fn status_endpoint() {
    let app = app("status");
    let id = book(&app, "2025-06-01", "10:00").await;
    let uri = format!("/api/appointments/{id}/status");

    let (status, body) = call(&app, Method::PATCH, &uri, Some(json!({ "status": "confirmed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "confirmed");

    let (status, body) = call(&app, Method::PATCH, &uri, Some(json!({ "status": "done" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["allowed"], json!(["pending", "confirmed", "completed", "cancelled"]));

    for unlisted in [json!({}), json!({ "status": "  " }), json!({ "status": " confirmed " })] {
        let (status, body) = call(&app, Method::PATCH, &uri, Some(unlisted)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid status value");
        assert_eq!(body["allowed"].as_array().unwrap().len(), 4);
    }

    let (status, _) = call(
        &app,
        Method::PATCH,
        "/api/appointments/999/status",
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reschedule_endpoint() {
    let app = app("reschedule");
    let id = book(&app, "2025-06-01", "10:00").await;
    book(&app, "2025-06-02", "11:00").await;
    let uri = format!("/api/appointments/{id}");

    let (status, body) = call(
        &app,
        Method::PUT,
        &uri,
        Some(json!({ "appointment_date": "2025-06-02", "appointment_time": "11:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, body) = call(
        &app,
        Method::PUT,
        &uri,
        Some(json!({ "appointment_date": "2025-06-02", "appointment_time": "12:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Appointment rescheduled successfully");
    assert_eq!(body["appointment"]["appointment_date"], "2025-06-02");

    let (status, body) = call(&app, Method::PUT, &uri, Some(json!({ "appointment_date": "2025-06-03" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"], json!(["appointment_time"]));

    let (_, slots) = call(&app, Method::GET, "/api/appointments/available-slots/2025-06-01", None).await;
    assert_eq!(slots["bookedSlots"], json!([]));
}

#[tokio::test]
async fn cancel_and_delete_endpoints() {
    let app = app("cancel_delete");
    let id = book(&app, "2025-06-01", "10:00").await;

    let (status, body) = call(&app, Method::PATCH, &format!("/api/appointments/{id}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "cancelled");

    let (status, _) = call(&app, Method::DELETE, &format!("/api/appointments/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&app, Method::GET, &format!("/api/appointments/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Appointment not found");

    let (status, _) = call(&app, Method::PATCH, &format!("/api/appointments/{id}/cancel"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn customer_history_newest_first() {
    let app = app("customer_history");
    let older = book(&app, "2025-06-01", "10:00").await;
    let newer = book(&app, "2025-06-08", "10:00").await;

    let (status, body) = call(&app, Method::GET, "/api/appointments/customer/maya@example.com", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<u64> = body.as_array().unwrap().iter().map(|a| a["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![newer, older]);

    let (_, body) = call(&app, Method::GET, "/api/appointments/customer/someone@example.com", None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn notices_follow_the_lifecycle() {
    let mut app = app("notices");
    let id = book(&app, "2025-06-01", "10:00").await;
    call(
        &app,
        Method::PUT,
        &format!("/api/appointments/{id}"),
        Some(json!({ "appointment_date": "2025-06-01", "appointment_time": "15:00" })),
    )
    .await;
    call(
        &app,
        Method::PATCH,
        &format!("/api/appointments/{id}/status"),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    call(&app, Method::PATCH, &format!("/api/appointments/{id}/cancel"), None).await;
    assert!(app.hub.flush(Duration::from_secs(1)).await);

    let mut kinds = Vec::new();
    while let Ok(notice) = app.notices.try_recv() {
        assert_eq!(notice.details().appointment_id, id);
        kinds.push(notice.kind());
    }
    assert_eq!(kinds, vec!["booked", "rescheduled", "cancelled"]);
}

// ── Catalog ──────────────────────────────────────────────────

#[tokio::test]
async fn services_crud() {
    let app = app("services");
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/services",
        Some(json!({
            "name": "Spa Pedicure",
            "price": "$55",
            "duration": "45 min",
            "features": ["Foot soak", "Exfoliation"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["serviceId"].as_u64().unwrap();

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/api/services/{id}"),
        Some(json!({
            "name": "Deluxe Spa Pedicure",
            "price": "$75+",
            "duration": "60 min",
            "features": "Foot soak, Exfoliation, Hot stones",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"]["features"].as_array().unwrap().len(), 3);

    let (_, list) = call(&app, Method::GET, "/api/services", None).await;
    assert_eq!(list[0]["price"], "$75+");

    let (status, _) = call(&app, Method::POST, "/api/services", Some(json!({ "name": "Half" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::DELETE, &format!("/api/services/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&app, Method::GET, &format!("/api/services/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Service not found");
}

#[tokio::test]
async fn gallery_filter_by_category() {
    let app = app("gallery");
    for (title, category) in [("ombre", Some("nail-art")), ("french", None), ("pedi", Some("pedicure"))] {
        let mut body = json!({ "title": title, "image_url": format!("/img/{title}.jpg") });
        if let Some(c) = category {
            body["category"] = json!(c);
        }
        let (status, _) = call(&app, Method::POST, "/api/gallery", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, all) = call(&app, Method::GET, "/api/gallery", None).await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (_, art) = call(&app, Method::GET, "/api/gallery?category=nail-art", None).await;
    let titles: Vec<&str> = art.as_array().unwrap().iter().map(|g| g["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["french", "ombre"]);
}
