use super::*;
use axum::{body, body::Body, http::Request};
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};
use tower::ServiceExt;
use upstream_client::UpstreamConfig;

#[derive(Clone)]
struct UpstreamState {
    generate_tx: Arc<Mutex<Option<oneshot::Sender<serde_json::Value>>>>,
}

async fn upstream_schedules() -> Json<serde_json::Value> {
    Json(serde_json::json!([{ "id": "S1", "assignments": {} }]))
}

async fn upstream_availabilities() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "error": "availabilities offline" })),
    )
}

async fn upstream_parameters() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "version": 2, "schedule": "S1", "availability": "A1" }))
}

async fn upstream_slots() -> Json<serde_json::Value> {
    Json(serde_json::json!([
        { "id": "late", "w2m_id": 200 },
        { "id": "early", "w2m_id": 100 }
    ]))
}

async fn upstream_schedule(Path(id): Path<String>) -> (StatusCode, Json<serde_json::Value>) {
    if id != "S1" {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("schedule {id} does not exist") })),
        );
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": "S1",
            "assignments": {
                "late": [{ "id": "p1", "tag": "T1" }],
                "early": [{ "id": "p2", "tag": "T2", "name": "Alice" }]
            }
        })),
    )
}

async fn upstream_generate(
    State(state): State<UpstreamState>,
    Json(payload): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    if let Some(tx) = state.generate_tx.lock().await.take() {
        let _ = tx.send(payload.clone());
    }
    Json(serde_json::json!({ "id": "S2", "parent": payload["parent"] }))
}

async fn upstream_import(
    Json(payload): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    match payload["source"].as_str() {
        Some("bad") => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "could not read source" })),
        ),
        Some("plain") => (StatusCode::CREATED, Json(serde_json::json!({ "result": "ok" }))),
        _ => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": "A2",
                "entries": 4,
                "subjects_imported": 2,
                "slots_imported": 2
            })),
        ),
    }
}

async fn upstream_echo(
    uri: Uri,
    body: Bytes,
) -> (StatusCode, [(&'static str, &'static str); 1], String) {
    (
        StatusCode::ACCEPTED,
        [("x-upstream", "yes")],
        format!("{}|{}", uri, String::from_utf8_lossy(&body)),
    )
}

async fn spawn_upstream() -> (String, oneshot::Receiver<serde_json::Value>) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (tx, rx) = oneshot::channel();
    let app = Router::new()
        .route("/schedules", get(upstream_schedules))
        .route("/availabilities", get(upstream_availabilities))
        .route("/parameters", get(upstream_parameters))
        .route("/slots", get(upstream_slots))
        .route("/schedule/:id", get(upstream_schedule))
        .route("/schedule/generate", post(upstream_generate))
        .route("/availability/import", post(upstream_import))
        .route("/echo", any(upstream_echo))
        .with_state(UpstreamState {
            generate_tx: Arc::new(Mutex::new(Some(tx))),
        });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), rx)
}

fn app_for(api_base: &str) -> Router {
    app_with_limit(api_base, 64 * 1024)
}

fn app_with_limit(api_base: &str, max_body_bytes: usize) -> Router {
    let upstream = UpstreamClient::new(&UpstreamConfig {
        api_base: api_base.to_string(),
        timeout: Some(std::time::Duration::from_secs(2)),
    })
    .expect("upstream client");
    build_router(Arc::new(AppState::new(upstream, max_body_bytes)))
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = app_for("http://127.0.0.1:9");
    let request = Request::get("/healthz").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn home_renders_schedules_when_availabilities_fail() {
    let (base, _rx) = spawn_upstream().await;
    let request = Request::get("/").body(Body::empty()).expect("request");
    let response = app_for(&base).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let page = json_body(response).await;
    assert_eq!(page["schedules"][0]["id"], "S1");
    assert_eq!(page["availabilities"], serde_json::json!([]));
    assert_eq!(page["current_schedule"], "S1");
    assert_eq!(page["current_availability"], "A1");
    assert!(page["error"].is_null());
}

#[tokio::test]
async fn schedule_page_is_slot_ordered() {
    let (base, _rx) = spawn_upstream().await;
    let request = Request::get("/schedule/S1").body(Body::empty()).expect("request");
    let response = app_for(&base).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let page = json_body(response).await;
    assert_eq!(page["schedule_id"], "S1");
    assert_eq!(page["assignments"][0]["key"], "early");
    assert_eq!(page["assignments"][0]["items"], serde_json::json!(["Alice"]));
    assert_eq!(page["assignments"][1]["key"], "late");
    assert_eq!(page["assignments"][1]["items"], serde_json::json!(["T1"]));
}

#[tokio::test]
async fn missing_schedule_renders_error_model() {
    let (base, _rx) = spawn_upstream().await;
    let request = Request::get("/schedule/S404").body(Body::empty()).expect("request");
    let response = app_for(&base).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let error = json_body(response).await;
    assert_eq!(error["message"], "Schedule not found");
    assert_eq!(error["error"], "schedule S404 does not exist");
}

#[tokio::test]
async fn unreachable_upstream_renders_slot_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let request = Request::get("/availability/A1").body(Body::empty()).expect("request");
    let response = app_for(&format!("http://{addr}"))
        .oneshot(request)
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["message"], "Slots not found");
}

#[tokio::test]
async fn generate_redirects_to_new_schedule() {
    let (base, rx) = spawn_upstream().await;
    let request = Request::post("/schedule/generate")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("parent=S1"))
        .expect("request");
    let response = app_for(&base).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get("location").expect("location"),
        "/schedule/S2"
    );

    let payload = rx.await.expect("payload");
    assert_eq!(payload, serde_json::json!({ "parent": "S1", "name": null }));
}

#[tokio::test]
async fn generate_form_prefills_from_query_or_parameters() {
    let (base, _rx) = spawn_upstream().await;
    let app = app_for(&base);

    let explicit = Request::get("/generate?parent=S7").body(Body::empty()).expect("request");
    let page = json_body(app.clone().oneshot(explicit).await.expect("response")).await;
    assert_eq!(page["prefill"], "S7");

    let defaulted = Request::get("/generate").body(Body::empty()).expect("request");
    let page = json_body(app.oneshot(defaulted).await.expect("response")).await;
    assert_eq!(page["prefill"], "S1");
}

#[tokio::test]
async fn import_redirects_home_or_renders_error() {
    let (base, _rx) = spawn_upstream().await;
    let app = app_for(&base);

    let ok = Request::post("/availability/import")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("url=https%3A%2F%2Fwww.when2meet.com%2F%3F1"))
        .expect("request");
    let response = app.clone().oneshot(ok).await.expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get("location").expect("location"), "/");

    let bad = Request::post("/availability/import")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("url=bad"))
        .expect("request");
    let response = app.oneshot(bad).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let error = json_body(response).await;
    assert_eq!(error["message"], "Failed to import availability");
    assert_eq!(error["error"], "could not read source");
}

#[tokio::test]
async fn import_without_counts_in_reply_redirects_home() {
    let (base, _rx) = spawn_upstream().await;
    let request = Request::post("/availability/import")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("url=plain"))
        .expect("request");
    let response = app_for(&base).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get("location").expect("location"), "/");
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let (base, _rx) = spawn_upstream().await;
    let app = app_with_limit(&base, 16);
    let form = format!("url={}", "x".repeat(64));

    let import = Request::post("/availability/import")
        .header("content-type", "application/x-www-form-urlencoded")
        .header("content-length", form.len())
        .body(Body::from(form.clone()))
        .expect("request");
    let response = app.clone().oneshot(import).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let proxied = Request::post("/api/echo")
        .header("content-length", form.len())
        .body(Body::from(form))
        .expect("request");
    let response = app.clone().oneshot(proxied).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let small = Request::post("/api/echo").body(Body::from("tiny")).expect("request");
    let response = app.oneshot(small).await.expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn import_form_describes_format() {
    let request = Request::get("/import").body(Body::empty()).expect("request");
    let response = app_for("http://127.0.0.1:9")
        .oneshot(request)
        .await
        .expect("response");
    assert_eq!(json_body(response).await, serde_json::json!({ "format": "w2m" }));
}

#[tokio::test]
async fn api_prefix_is_proxied_to_upstream() {
    let (base, _rx) = spawn_upstream().await;
    let request = Request::post("/api/echo?page=2")
        .body(Body::from("payload"))
        .expect("request");
    let response = app_for(&base).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(
        response.headers().get("x-upstream").expect("header"),
        "yes"
    );

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"/echo?page=2|payload");
}

#[tokio::test]
async fn proxy_reports_bad_gateway_when_upstream_is_down() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let request = Request::get("/api/slots").body(Body::empty()).expect("request");
    let response = app_for(&format!("http://{addr}"))
        .oneshot(request)
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn proxy_refuses_dot_segments() {
    let (base, _rx) = spawn_upstream().await;
    let app = app_for(&format!("{base}/v1/"));

    for path in ["/api/../slots", "/api/%2e%2e/slots"] {
        let request = Request::get(path).body(Body::empty()).expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
    }
}
