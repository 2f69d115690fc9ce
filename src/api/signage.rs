//! Second-screen signage coordination endpoints: POS pushes a display,
//! the screen polls it, and acks once it has shown the confirmation.

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::signage::SignageDisplay;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct SetDisplayRequest {
    pub store_id: i64,
    pub qr_image: String,
    pub amount: f64,
}

/// POST /signage/set-display
pub async fn set_display(State(state): State<AppState>, Json(req): Json<SetDisplayRequest>) -> Json<Value> {
    state.signage.set_display(req.store_id, req.qr_image, req.amount);
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
pub struct StoreIdQuery {
    pub store_id: i64,
}

/// GET /signage/display?store_id=...
pub async fn display(
    State(state): State<AppState>,
    Query(query): Query<StoreIdQuery>,
) -> ApiResult<Json<SignageDisplay>> {
    state
        .signage
        .display(query.store_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no display active for store {}", query.store_id)))
}

/// POST /signage/ack-paid?store_id=...
pub async fn ack_paid(State(state): State<AppState>, Query(query): Query<StoreIdQuery>) -> Json<Value> {
    state.signage.ack_paid(query.store_id);
    Json(json!({"status": "ok"}))
}
