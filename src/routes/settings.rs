use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{require_device_id, AppState};
use crate::{ApiError, SettingsPatch, ThresholdSettings};

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/api/settings", get(fetch).post(update))
}

#[derive(Debug, Deserialize)]
struct SettingsQuery {
    device_id: Option<String>,
}

async fn fetch(
    State(telemetry): State<AppState>,
    Query(params): Query<SettingsQuery>,
) -> Result<Json<ThresholdSettings>, ApiError> {
    // ---
    let device_id = require_device_id(params.device_id.as_deref())?;
    Ok(Json(telemetry.get_settings(&device_id).await))
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    device_id: Option<String>,
    #[serde(flatten)]
    patch: SettingsPatch,
}

#[derive(Serialize)]
struct UpdateResponse {
    ok: bool,
    settings: ThresholdSettings,
}

async fn update(
    State(telemetry): State<AppState>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<UpdateResponse>, ApiError> {
    // ---
    let device_id = require_device_id(body.device_id.as_deref())?;
    let settings = telemetry.update_settings(&device_id, &body.patch).await;
    Ok(Json(UpdateResponse { ok: true, settings }))
}
