//! Smoke tests for the HTTP handler endpoints.
//!
//! Each handler group gets at least one test verifying:
//! - Valid requests return the expected status on fresh (empty) state.
//! - The auth middleware rejects unauthenticated access to protected routes.
//!
//! Endpoints that need the external tracker point at an unroutable address
//! and assert the upstream error mapping instead.
//!
//! Run with: `cargo test --test handler_tests`

use std::sync::{Arc, Once};

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use jornada::{
    auth,
    config::ServerConfig,
    handlers::{build_protected_routes, build_public_routes, AppContext},
};

// ═══════════════════════════════════════════════════════════════════════
// Test infrastructure
// ═══════════════════════════════════════════════════════════════════════

const TEST_SECRET: &str = "handler-smoke-test-secret";
static ENV_INIT: Once = Once::new();

fn init_env() {
    ENV_INIT.call_once(|| {
        std::env::set_var("JORNADA_TOKEN_SECRET", TEST_SECRET);
    });
}

fn make_token(user_id: i64) -> String {
    let claims = json!({ "id": user_id, "exp": 4_102_444_800usize });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Self-contained test harness with a fresh temp directory.
struct Harness {
    ctx: Arc<AppContext>,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        init_env();
        let dir = TempDir::new().expect("create temp dir");
        let cfg = ServerConfig {
            storage_path: dir.path().to_path_buf(),
            // Unroutable: tracker-touching endpoints must map to 502 fast
            tracker_base_url: "http://127.0.0.1:9".to_string(),
            http_timeout_secs: 2,
            ..ServerConfig::default()
        };
        let ctx = Arc::new(AppContext::new(cfg).expect("create AppContext"));
        Self { ctx, _dir: dir }
    }

    fn app(&self) -> Router {
        // Mirror main.rs: auth middleware only wraps protected routes.
        let public = build_public_routes(self.ctx.clone());
        let protected = build_protected_routes(self.ctx.clone())
            .layer(axum::middleware::from_fn(auth::auth_middleware));
        Router::new().merge(public).merge(protected)
    }
}

// ── request helpers ──

fn authed(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let token = make_token(42);
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, format!("token={token}"));

    match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&value).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn authed_get(uri: &str) -> Request<Body> {
    authed(Method::GET, uri, None)
}

fn authed_post(uri: &str, body: Value) -> Request<Body> {
    authed(Method::POST, uri, Some(body))
}

fn authed_delete(uri: &str, body: Value) -> Request<Body> {
    authed(Method::DELETE, uri, Some(body))
}

fn noauth_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════
// Health & metrics (public)
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn health_is_public() {
    let h = Harness::new();
    let response = h
        .app()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["gemini_configured"], false);
}

#[tokio::test]
async fn probes_and_metrics_are_public() {
    let h = Harness::new();

    for uri in ["/health/live", "/health/ready", "/metrics"] {
        let response = h
            .app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Auth middleware
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn protected_routes_reject_missing_token() {
    let h = Harness::new();
    let response = h
        .app()
        .oneshot(noauth_post(
            "/api/assistant/activities",
            json!({"email": "ana@wl.mx"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "NOT_AUTHENTICATED");
}

#[tokio::test]
async fn protected_routes_reject_bad_token() {
    let h = Harness::new();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/assistant/next-task")
        .header(header::COOKIE, "token=no-es-un-jwt")
        .body(Body::empty())
        .unwrap();

    let response = h.app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn bearer_header_works_too() {
    let h = Harness::new();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/assistant/next-task")
        .header(header::AUTHORIZATION, format!("Bearer {}", make_token(42)))
        .body(Body::empty())
        .unwrap();

    let response = h.app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ═══════════════════════════════════════════════════════════════════════
// Assistant endpoints
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn analysis_maps_tracker_failure_to_bad_gateway() {
    let h = Harness::new();
    let response = h
        .app()
        .oneshot(authed_post(
            "/api/assistant/activities-with-reviews",
            json!({"email": "ana@wl.mx"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["code"], "TRACKER_UPSTREAM");
}

#[tokio::test]
async fn analysis_rejects_malformed_email() {
    let h = Harness::new();
    let response = h
        .app()
        .oneshot(authed_post(
            "/api/assistant/activities-with-reviews",
            json!({"email": "sin-arroba"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn next_task_empty_state() {
    let h = Harness::new();
    let response = h
        .app()
        .oneshot(authed_get("/api/assistant/next-task"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["hayPendientes"], false);
    assert_eq!(body["mensaje"], "No hay tareas registradas para hoy");
}

#[tokio::test]
async fn validate_explanation_without_providers_is_unavailable() {
    let h = Harness::new();
    let response = h
        .app()
        .oneshot(authed_post(
            "/api/assistant/validate-explanation",
            json!({
                "taskName": "rutas API",
                "explanation": "hoy la termino",
                "activityTitle": "Migracion Notion"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["code"], "AI_PROVIDER_FAILED");
}

// ═══════════════════════════════════════════════════════════════════════
// Pendiente state endpoints
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn save_and_confirm_pendientes_roundtrip() {
    let h = Harness::new();
    let app = h.app();

    let response = app
        .clone()
        .oneshot(authed_post(
            "/api/assistant/pendientes",
            json!({
                "activityId": "act-1",
                "pendientes": [
                    {"pendienteId": "p-1", "nombre": "rutas API", "duracionMin": 80, "prioridad": "ALTA"},
                    {"pendienteId": "p-2", "nombre": "pruebas", "duracionMin": 20, "prioridad": "BAJA"}
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["totalGuardados"], 2);
    assert!(body["sessionId"].as_str().unwrap().starts_with("Act_42_"));

    // Point-update one pendiente's state
    let response = app
        .clone()
        .oneshot(authed_post(
            "/api/assistant/pendientes/confirm",
            json!({
                "actividadId": "act-1",
                "pendienteId": "p-1",
                "estado": "cancelado",
                "motivoNoCompletado": "bloqueado por QA"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["actualizado"], true);

    // Unknown pendiente reports no match, not an error
    let response = app
        .clone()
        .oneshot(authed_post(
            "/api/assistant/pendientes/confirm",
            json!({
                "actividadId": "act-1",
                "pendienteId": "no-existe",
                "estado": "completado"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["actualizado"], false);
}

#[tokio::test]
async fn save_pendientes_rejects_empty_activity() {
    let h = Harness::new();
    let response = h
        .app()
        .oneshot(authed_post(
            "/api/assistant/pendientes",
            json!({"activityId": "  ", "pendientes": []}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn save_explanations_skips_incomplete_entries() {
    let h = Harness::new();
    let response = h
        .app()
        .oneshot(authed_post(
            "/api/assistant/explanations",
            json!({
                "explanations": [
                    {
                        "taskId": "p-1",
                        "taskName": "rutas API",
                        "explanation": "termino hoy",
                        "confirmed": true,
                        "activityTitle": "Migracion Notion",
                        "duration": 80,
                        "priority": "ALTA"
                    },
                    {"taskId": "p-2"}
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["totalGuardadas"], 1);
}

#[tokio::test]
async fn save_explanations_rejects_empty_list() {
    let h = Harness::new();
    let response = h
        .app()
        .oneshot(authed_post(
            "/api/assistant/explanations",
            json!({"explanations": []}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ═══════════════════════════════════════════════════════════════════════
// History endpoints
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn session_history_404_on_fresh_state() {
    let h = Harness::new();
    let response = h
        .app()
        .oneshot(authed_get("/api/history/session"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], "HISTORY_NOT_FOUND");
}

#[tokio::test]
async fn session_history_after_saving_pendientes() {
    let h = Harness::new();
    let app = h.app();

    // Saving pendientes records two history messages for today's session
    app.clone()
        .oneshot(authed_post(
            "/api/assistant/pendientes",
            json!({
                "activityId": "act-1",
                "pendientes": [{"pendienteId": "p-1", "nombre": "rutas"}]
            }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed_get("/api/history/session"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["mensajes"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["mensajes"][0]["role"], "usuario");
    // The activity cache rides along
    assert_eq!(body["proyectos"]["userId"], "42");
}

#[tokio::test]
async fn list_histories_paginates() {
    let h = Harness::new();
    let app = h.app();

    app.clone()
        .oneshot(authed_post(
            "/api/assistant/pendientes",
            json!({
                "activityId": "act-1",
                "pendientes": [{"pendienteId": "p-1", "nombre": "rutas"}]
            }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed_get("/api/history/user?limit=10&skip=0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["pagination"]["hasMore"], false);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_session_history_roundtrip() {
    let h = Harness::new();
    let app = h.app();

    app.clone()
        .oneshot(authed_post(
            "/api/assistant/pendientes",
            json!({
                "activityId": "act-1",
                "pendientes": [{"pendienteId": "p-1", "nombre": "rutas"}]
            }),
        ))
        .await
        .unwrap();

    // Find today's session id from the listing
    let response = app
        .clone()
        .oneshot(authed_get("/api/history/user"))
        .await
        .unwrap();
    let body = body_json(response).await;
    let session_id = body["data"][0]["sessionId"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(authed_delete(
            "/api/history/session",
            json!({"sessionId": session_id}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Gone now
    let response = app
        .clone()
        .oneshot(authed_delete(
            "/api/history/session",
            json!({"sessionId": "Act_42_2020_01_01"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════
// Reports
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn daily_report_counts_unfinished_with_reason() {
    let h = Harness::new();
    let app = h.app();

    // Empty cache -> empty report
    let response = app
        .clone()
        .oneshot(authed_post("/api/reports/daily", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["totalReportes"], 0);

    // One cancelled pendiente with a reason, one completed
    app.clone()
        .oneshot(authed_post(
            "/api/assistant/pendientes",
            json!({
                "activityId": "act-1",
                "pendientes": [
                    {"pendienteId": "p-1", "nombre": "rutas", "duracionMin": 80},
                    {"pendienteId": "p-2", "nombre": "pruebas", "duracionMin": 30}
                ]
            }),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(authed_post(
            "/api/assistant/pendientes/confirm",
            json!({
                "actividadId": "act-1",
                "pendienteId": "p-1",
                "estado": "cancelado",
                "motivoNoCompletado": "bloqueado por QA"
            }),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(authed_post(
            "/api/assistant/pendientes/confirm",
            json!({
                "actividadId": "act-1",
                "pendienteId": "p-2",
                "estado": "completado",
                "motivoNoCompletado": "se terminó tarde"
            }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed_post("/api/reports/daily", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    // Completed pendientes never reach the report, reasons or not
    assert_eq!(body["totalReportes"], 1);

    // Regeneration is idempotent
    let response = app
        .clone()
        .oneshot(authed_post("/api/reports/daily", json!({})))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["totalReportes"], 1);
}
