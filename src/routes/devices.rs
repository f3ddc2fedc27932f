use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{require_device_id, AppState};
use crate::{ApiError, Device};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/devices", get(list).post(register))
        .route("/api/devices/{device_id}", patch(rename).delete(remove))
}

async fn list(State(telemetry): State<AppState>) -> Json<Vec<Device>> {
    Json(telemetry.get_devices().await)
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    device_id: Option<String>,
    name: Option<String>,
}

/// `POST /api/devices` – create or update a device's display name.
async fn register(
    State(telemetry): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<Json<Device>, ApiError> {
    // ---
    let device_id = require_device_id(body.device_id.as_deref())?;
    let device = telemetry
        .register_device(&device_id, body.name.as_deref())
        .await;
    info!("Registered device {}", device_id);
    Ok(Json(device))
}

#[derive(Debug, Deserialize)]
struct RenameBody {
    name: Option<String>,
}

async fn rename(
    State(telemetry): State<AppState>,
    Path(device_id): Path<String>,
    Json(body): Json<RenameBody>,
) -> Result<Json<Device>, ApiError> {
    // ---
    let device_id = require_device_id(Some(device_id.as_str()))?;
    let updated = match body.name.as_deref() {
        Some(name) => telemetry.rename_device(&device_id, name).await,
        None => telemetry.get_device(&device_id).await,
    };
    updated
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Device not found".to_string()))
}

#[derive(Serialize)]
struct Ack {
    ok: bool,
}

/// `DELETE /api/devices/{device_id}` – idempotent; always acknowledges.
async fn remove(
    State(telemetry): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    // ---
    let device_id = require_device_id(Some(device_id.as_str()))?;
    telemetry.remove_device(&device_id).await;
    Ok(Json(Ack { ok: true }))
}
