use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{parse_instant, require_device_id, AppState};
use crate::{ApiError, HistoryResponse, LatestReading, ProcessedReading};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/telemetry", post(ingest))
        .route("/api/latest", get(latest))
        .route("/api/history", get(history))
}

/// `POST /api/telemetry` – push one raw reading through the pipeline.
///
/// Malformed JSON is rejected by the extractor before we see it.
async fn ingest(
    State(telemetry): State<AppState>,
    Json(raw): Json<Value>,
) -> Result<Json<ProcessedReading>, ApiError> {
    // ---
    match telemetry.ingest(&raw).await {
        Ok(out) => {
            debug!(
                "POST /api/telemetry - {} delivered to {} observers",
                out.reading.device_id, out.delivered
            );
            Ok(Json(out.reading))
        }
        Err(rejection) => {
            warn!("Dropping reading: {}", rejection);
            Err(rejection.into())
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestQuery {
    device_id: Option<String>,
}

async fn latest(
    State(telemetry): State<AppState>,
    Query(params): Query<LatestQuery>,
) -> Result<Json<LatestReading>, ApiError> {
    // ---
    let device_id = require_device_id(params.device_id.as_deref())?;
    Ok(Json(telemetry.get_latest(&device_id).await))
}

/// Query parameters for history; `from`/`to` are required.
#[derive(Debug, Deserialize)]
struct HistoryQuery {
    device_id: Option<String>,
    from: Option<String>,
    to: Option<String>,
    /// Bucket size such as `10s`, `1m`, `5m`; defaults to one minute.
    interval: Option<String>,
}

async fn history(
    State(telemetry): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    // ---
    let device_id = require_device_id(params.device_id.as_deref())?;
    let (Some(from), Some(to)) = (params.from.as_deref(), params.to.as_deref()) else {
        return Err(ApiError::BadRequest("from/to are required".to_string()));
    };
    let (Some(from), Some(to)) = (parse_instant(from), parse_instant(to)) else {
        return Err(ApiError::BadRequest("from/to must be ISO datetime".to_string()));
    };

    let points = telemetry
        .get_history(&device_id, from, to, params.interval.as_deref())
        .await;
    debug!("GET /api/history - {} points for {}", points.len(), device_id);
    Ok(Json(HistoryResponse { points }))
}
