use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cutplan_core::{CutPlanData, CutPlanError, CutPlanRequest, CutPlanner, MaterialSummary};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: &str = "3000";
const DEFAULT_TIME_LIMIT_MS: u64 = 30_000;

const OPENAPI_SPEC: &str = include_str!("../../../openapi.yaml");
const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Cutplan API Docs</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
        window.onload = () => {
            SwaggerUIBundle({
                url: '/openapi.yaml',
                dom_id: '#swagger-ui',
                presets: [SwaggerUIBundle.presets.apis],
                layout: 'BaseLayout',
            });
        };
    </script>
</body>
</html>"#;

#[derive(Clone)]
struct AppState {
    time_limit: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
    let time_limit_ms = match std::env::var("CUTPLAN_TIME_LIMIT_MS") {
        Ok(value) => value.parse()?,
        Err(_) => DEFAULT_TIME_LIMIT_MS,
    };

    info!("Starting cut plan API");

    let state = AppState {
        time_limit: Duration::from_millis(time_limit_ms),
    };

    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/pack", post(pack))
        .route("/api/materials", post(materials))
        .route("/openapi.yaml", get(serve_openapi_spec))
        .route("/docs", get(serve_swagger_ui))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("API server listening on http://{}", addr);
    info!("Try: curl http://localhost:{}/api/health", port);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "cutplan-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Packs the request on a blocking worker; the time limit trips the planner's cancel flag.
async fn pack(
    State(state): State<AppState>,
    Json(request): Json<CutPlanRequest>,
) -> Result<Json<CutPlanData>, AppError> {
    info!(
        "Received pack request with {} demands on {}x{} mm sheets",
        request.demands.len(),
        request.settings.sheet_width,
        request.settings.sheet_height
    );

    let planner = CutPlanner::new(request.settings)?;
    let cancel = planner.cancel_handle();
    let job = tokio::task::spawn_blocking(move || planner.plan(&request.demands));

    let plan = match tokio::time::timeout(state.time_limit, job).await {
        Ok(joined) => joined.map_err(anyhow::Error::from)??,
        Err(_) => {
            warn!("Pack request exceeded {:?}, cancelling", state.time_limit);
            cancel.store(true, Ordering::Relaxed);
            return Err(CutPlanError::Cancelled.into());
        }
    };

    info!(
        "Packing complete: {} sheets, {:.2}% average utilization",
        plan.total_sheets, plan.average_utilization
    );

    Ok(Json(plan))
}

/// Re-aggregates a cut plan per material
async fn materials(Json(plan): Json<CutPlanData>) -> Json<Vec<MaterialSummary>> {
    info!("Summarizing {} sheets by material", plan.sheets.len());
    Json(plan.material_summaries())
}

/// Application error type
struct AppError(anyhow::Error);

impl From<CutPlanError> for AppError {
    fn from(err: CutPlanError) -> Self {
        AppError(err.into())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request error: {}", self.0);

        let status = match self.0.downcast_ref::<CutPlanError>() {
            Some(CutPlanError::InvalidDemand { .. })
            | Some(CutPlanError::PieceTooLarge { .. })
            | Some(CutPlanError::InvalidSettings(_)) => StatusCode::BAD_REQUEST,
            Some(CutPlanError::Cancelled) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(json!({
                "error": self.0.to_string(),
            })),
        )
            .into_response()
    }
}

async fn serve_openapi_spec() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "application/yaml")],
        OPENAPI_SPEC,
    )
}

async fn serve_swagger_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
