mod amazon;
mod export;
mod fields;
mod http;
mod idempotency;
mod jobs;
mod magalu;
mod meli;
mod metrics;
mod models;
mod paginate;
mod pipeline;
mod quality;
mod security;
mod store;
mod tokens;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use models::{ApiError, CollectRequest, CollectResponse, Platform};
use pipeline::{Pipelines, SyncError};
use security::{AuthContext, AuthState, require_api_auth};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use store::SyncStore;
use tokio::sync::Mutex;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "mercurio.api", "server crashed: {err}");
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let database_url = std::env::var("DATABASE_URL")?;
    let store = SyncStore::connect(&database_url).await?;
    store.migrate_if_enabled().await?;

    let auth_state = AuthState::from_env();
    let pipelines = Arc::new(Pipelines::from_env(store.clone()));
    let (queue, _worker) = jobs::JobQueue::spawn(pipelines.clone());
    let openapi_raw = include_str!("../docs/openapi.yaml");
    let openapi: serde_json::Value =
        serde_yaml::from_str(openapi_raw).unwrap_or(serde_json::json!({"openapi":"3.0.3"}));
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("prom recorder");
    let redis = std::env::var("REDIS_URL")
        .ok()
        .and_then(|u| redis::Client::open(u).ok());
    let state = AppState {
        pipelines,
        store,
        queue,
        openapi: Arc::new(openapi),
        idempotency: Arc::new(Mutex::new(HashMap::new())),
        prometheus_handle,
        redis,
    };

    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let protected = Router::new()
        .route("/collect", post(collect))
        .route("/sellers/{platform}", get(list_sellers))
        .route("/download", get(download_reports))
        .nest(
            "/jobs",
            Router::new()
                .route("/collect", post(enqueue_collect_job))
                .route("/{id}", get(get_job_status)),
        )
        .route_layer(middleware::from_fn_with_state(auth_state, require_api_auth));

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "mercurio.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    pipelines: Arc<Pipelines>,
    store: SyncStore,
    queue: jobs::JobQueue,
    openapi: Arc<serde_json::Value>,
    idempotency: Arc<Mutex<HashMap<String, CollectResponse>>>,
    prometheus_handle: PrometheusHandle,
    redis: Option<redis::Client>,
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
/// - Auth: none
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "mercurio-api-rs",
    }))
}

async fn openapi_json(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json((*state.openapi).clone())
}

async fn swagger_ui() -> axum::http::Response<String> {
    let html = r#"<!doctype html>
<html>
<head>
  <meta charset='utf-8'/>
  <title>Mercurio API Docs</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: '/openapi.json', dom_id: '#swagger-ui' });
    };
  </script>
</body>
</html>"#;
    axum::http::Response::builder()
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html.to_string())
        .unwrap()
}

async fn metrics_endpoint(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> axum::http::Response<String> {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return axum::http::Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .body("unauthorized".into())
                .unwrap();
        }
    }
    let body = state.prometheus_handle.render();
    axum::http::Response::builder()
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .unwrap()
}

/// Run one seller sync for one platform and return the aggregated
/// per-entity messages.
///
/// - Method: `POST`
/// - Path: `/collect`
/// - Auth: `Authorization: Bearer <key>` or `X-Mercurio-Key: <key>`
/// - Body: `CollectRequest`
async fn collect(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<CollectRequest>,
) -> Result<Json<CollectResponse>, AppError> {
    crate::metrics::inc_requests("/collect");
    info!(
        target = "mercurio.api",
        org_id = %context.org_id,
        api_key = %context.api_key_id,
        platform = payload.platform.as_str(),
        seller = %payload.seller,
        "collect invoked",
    );

    if let Some(key) = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    {
        if let Some(client) = &state.redis {
            if let Some(existing) = idempotency::redis_get(client, &key).await {
                return Ok(Json(existing));
            }
            let response = state.pipelines.collect(&payload).await?;
            let ttl = std::env::var("IDEMPOTENCY_TTL_SECS")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(3600);
            idempotency::redis_set(client, &key, &response, ttl).await;
            return Ok(Json(response));
        }
        if let Some(existing) = state.idempotency.lock().await.get(&key).cloned() {
            return Ok(Json(existing));
        }
        let response = state.pipelines.collect(&payload).await?;
        state.idempotency.lock().await.insert(key, response.clone());
        return Ok(Json(response));
    }

    let response = state.pipelines.collect(&payload).await?;
    Ok(Json(response))
}

/// List the sellers configured for a platform.
///
/// - Method: `GET`
/// - Path: `/sellers/{platform}`
async fn list_sellers(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    crate::metrics::inc_requests("/sellers");
    let Some(platform) = Platform::from_str(&platform) else {
        return Err(AppError::invalid("unsupported_platform", platform));
    };
    Ok(Json(state.pipelines.sellers(platform)))
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    platform: String,
    seller: String,
}

/// Download the seller's same-day rows as a ZIP of CSV files.
///
/// - Method: `GET`
/// - Path: `/download?platform=...&seller=...`
async fn download_reports(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    crate::metrics::inc_requests("/download");
    let Some(platform) = Platform::from_str(&query.platform) else {
        return Err(AppError::invalid("unsupported_platform", query.platform));
    };
    let bytes = export::build_archive(&state.store, platform, &query.seller).await?;
    let name = export::archive_name(platform, &query.seller);
    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/x-zip-compressed".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={name}"),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
struct EnqueueResponse {
    job_id: String,
}

async fn enqueue_collect_job(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<CollectRequest>,
) -> Result<Json<EnqueueResponse>, AppError> {
    crate::metrics::inc_requests("/jobs/collect");
    info!(
        target = "mercurio.api",
        org_id = %context.org_id,
        platform = payload.platform.as_str(),
        seller = %payload.seller,
        "collect job enqueued",
    );
    let id = state
        .queue
        .enqueue(payload)
        .await
        .map_err(|err| AppError::invalid("enqueue_failed", err.error))?;
    Ok(Json(EnqueueResponse {
        job_id: id.to_string(),
    }))
}

async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<jobs::JobInfo>, AppError> {
    let Ok(uuid) = uuid::Uuid::parse_str(&id) else {
        return Err(AppError::invalid("invalid_job_id", id));
    };
    if let Some(info) = state.queue.get(uuid).await {
        Ok(Json(info))
    } else {
        Err(AppError::invalid("job_not_found", id))
    }
}

#[derive(Debug)]
enum AppError {
    Sync(SyncError),
    Export(export::ExportError),
    Invalid { code: &'static str, detail: String },
}

impl AppError {
    fn invalid(code: &'static str, detail: impl Into<String>) -> Self {
        Self::Invalid {
            code,
            detail: detail.into(),
        }
    }
}

impl From<SyncError> for AppError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

impl From<export::ExportError> for AppError {
    fn from(value: export::ExportError) -> Self {
        Self::Export(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, detail) = match self {
            AppError::Sync(err) => {
                let status = match &err {
                    SyncError::SellerNotFound(_) => StatusCode::NOT_FOUND,
                    SyncError::Auth(_) => StatusCode::BAD_GATEWAY,
                    SyncError::Purge(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, "sync_failed", err.to_string())
            }
            AppError::Export(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "export_failed",
                err.to_string(),
            ),
            AppError::Invalid { code, detail } => (StatusCode::BAD_REQUEST, code, detail),
        };
        let payload = ApiError {
            error: code.to_string(),
            detail: Some(detail),
        };
        (status, Json(payload)).into_response()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
