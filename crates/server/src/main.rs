use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::{any, get, post},
    Form, Json, Router,
};
use bff_api::{
    availability_page, generate_page, generate_schedule, home_page, import_availability,
    import_page, schedule_page, AvailabilityPage, GeneratePage, HomePage, ImportPage,
    SchedulePage,
};
use serde::Deserialize;
use shared::error::PageError;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use upstream_client::UpstreamClient;

mod app_state;
mod config;
mod proxy;

use app_state::AppState;
use config::load_settings;

type PageResult<T> = Result<T, (StatusCode, Json<PageError>)>;

#[derive(Debug, Deserialize)]
struct GenerateForm {
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImportForm {
    #[serde(default)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let upstream = UpstreamClient::new(&settings.upstream_config()).map_err(|error| {
        error!(
            api_base = %settings.api_base,
            %error,
            "failed to configure upstream client; check API_BASE"
        );
        error
    })?;

    let state = AppState::new(upstream, settings.max_body_bytes);
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, api_base = %settings.api_base, "web server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(home))
        .route("/schedule/:id", get(schedule))
        .route("/availability/:id", get(availability))
        .route("/generate", get(generate_form))
        .route("/schedule/generate", post(generate))
        .route("/import", get(import_form))
        .route("/availability/import", post(import))
        .route("/api", any(proxy_api))
        .route("/api/*path", any(proxy_api))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn page_error(err: PageError) -> (StatusCode, Json<PageError>) {
    (StatusCode::BAD_GATEWAY, Json(err))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn home(State(state): State<Arc<AppState>>) -> Json<HomePage> {
    Json(home_page(&state.bff).await)
}

async fn schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> PageResult<Json<SchedulePage>> {
    schedule_page(&state.bff, &id)
        .await
        .map(Json)
        .map_err(page_error)
}

async fn availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> PageResult<Json<AvailabilityPage>> {
    availability_page(&state.bff, &id)
        .await
        .map(Json)
        .map_err(page_error)
}

async fn generate_form(
    State(state): State<Arc<AppState>>,
    Query(mut query): Query<HashMap<String, String>>,
) -> Json<GeneratePage> {
    Json(generate_page(&state.bff, query.remove("parent")).await)
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Form(form): Form<GenerateForm>,
) -> PageResult<Redirect> {
    let target = generate_schedule(&state.bff, form.parent.as_deref(), form.name.as_deref())
        .await
        .map_err(page_error)?;
    Ok(Redirect::to(&target.location))
}

async fn import_form() -> Json<ImportPage> {
    Json(import_page())
}

async fn import(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ImportForm>,
) -> PageResult<Redirect> {
    let source = form.url.unwrap_or_default();
    let target = import_availability(&state.bff, &source)
        .await
        .map_err(page_error)?;
    Ok(Redirect::to(&target.location))
}

async fn proxy_api(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let rest = uri.path().strip_prefix("/api").unwrap_or_default();
    match state
        .proxy
        .forward(method.clone(), rest, uri.query(), headers, body)
        .await
    {
        Ok(response) => response,
        Err(error) => {
            let detail = format!("{error:#}");
            error!(%method, path = %uri.path(), error = %detail, "api passthrough failed");
            (error.status(), detail).into_response()
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
