use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::{parse_optional_instant, require_device_id, AppState};
use crate::{AlertItem, ApiError};

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/api/alerts", get(alerts))
}

#[derive(Debug, Deserialize)]
struct AlertsQuery {
    device_id: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

/// `GET /api/alerts` – newest first, bounds optional and inclusive.
async fn alerts(
    State(telemetry): State<AppState>,
    Query(params): Query<AlertsQuery>,
) -> Result<Json<Vec<AlertItem>>, ApiError> {
    // ---
    let device_id = require_device_id(params.device_id.as_deref())?;
    let from = parse_optional_instant(params.from.as_deref(), "from")?;
    let to = parse_optional_instant(params.to.as_deref(), "to")?;

    Ok(Json(telemetry.get_alerts(&device_id, from, to).await))
}
