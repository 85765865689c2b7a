//! HTTP 入口：`POST /api/get-data`
//!
//! 驗證座標後執行整個流程，成功回傳 `{fetchedData, prediction}`，
//! 失敗回傳 `{error, input?}` 與對應的狀態碼。

use crate::adapters::observe::TracingObserver;
use crate::config::AppConfig;
use crate::core::etl::EtlEngine;
use crate::core::pipeline::HttpNutrientPipeline;
use crate::domain::model::{Coordinate, ErrorResponse};
use crate::domain::ports::Pipeline;
use crate::utils::error::{PipelineError, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub type SharedEngine = Arc<EtlEngine<Arc<dyn Pipeline>>>;

#[derive(Clone)]
pub struct AppState {
    pub engine: SharedEngine,
}

impl AppState {
    pub fn new(engine: EtlEngine<Arc<dyn Pipeline>>) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/get-data", post(get_data))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// 依配置建立流程並啟動伺服器
pub async fn serve(config: AppConfig) -> Result<()> {
    let pipeline: Arc<dyn Pipeline> = Arc::new(HttpNutrientPipeline::from_config(
        &config,
        Arc::new(TracingObserver),
    ));
    let engine = EtlEngine::with_deadline(pipeline, config.request_deadline());
    let app = create_router(AppState::new(engine));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("🚀 Server running on {}", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn get_data(State(state): State<AppState>, body: Bytes) -> Response {
    let coordinate = match parse_coordinate(&body) {
        Ok(coordinate) => coordinate,
        Err(e) => return error_response(&e),
    };

    match state.engine.run(coordinate).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            tracing::error!("❌ Error in /api/get-data: {}", e);
            error_response(&e)
        }
    }
}

fn parse_coordinate(body: &[u8]) -> Result<Coordinate> {
    let json: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| PipelineError::InvalidCoordinate {
            message: format!("request body is not JSON: {}", e),
        })?;
    Coordinate::from_json(&json)
}

fn error_response(err: &PipelineError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(err))).into_response()
}
