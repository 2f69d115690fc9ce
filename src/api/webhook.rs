//! Inbound payment-rail webhooks: each rail's callback is normalized into
//! a [`crate::back_transaction::NormalizedPayment`] and handed to
//! [`crate::webhook::ingest`], which records it and flips signage to paid.

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::webhook::rails::{BackTransactionPayload, KBankQrPaymentPayload, OmiseChargeEvent, StripeEvent};
use crate::webhook::{ingest, normalize_back_transaction, normalize_kbank, normalize_omise, normalize_stripe};
use axum::{extract::State, Json};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

/// Deserializes a typed rail payload out of the raw JSON body while keeping
/// the body itself around -- spec requires every accepted event to be
/// persisted with its full original JSON, not just the fields we parsed.
fn parse_with_raw<T: DeserializeOwned>(body: Value) -> ApiResult<(T, String)> {
    let raw = body.to_string();
    let typed = serde_json::from_value(body)
        .map_err(|e| ApiError::Validation(format!("malformed webhook payload: {e}")))?;
    Ok((typed, raw))
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub id: i64,
    pub store_id: Option<i64>,
    pub duplicate: bool,
}

/// POST /payment-callback/webhook -- generic rail-agnostic payload,
/// carrying its own `rail` field so the caller doesn't need a dedicated
/// endpoint for every integration.
pub async fn generic(
    State(state): State<AppState>,
    Json(payload): Json<BackTransactionPayload>,
) -> ApiResult<Json<IngestResponse>> {
    let normalized = normalize_back_transaction(payload, "generic");
    let (back, inserted) = ingest(&state.db, &state.signage, &normalized).await?;
    Ok(Json(IngestResponse {
        id: back.id,
        store_id: back.store_id,
        duplicate: !inserted,
    }))
}

pub async fn generic_health() -> Json<Value> {
    Json(json!({"status": "ok", "provider": "generic"}))
}

/// POST /payment-callback/webhook/kbank
pub async fn kbank(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<IngestResponse>> {
    let (payload, raw): (KBankQrPaymentPayload, String) = parse_with_raw(body)?;
    let normalized = normalize_kbank(payload, Some(raw))?;
    let (back, inserted) = ingest(&state.db, &state.signage, &normalized).await?;
    Ok(Json(IngestResponse {
        id: back.id,
        store_id: back.store_id,
        duplicate: !inserted,
    }))
}

pub async fn kbank_health() -> Json<Value> {
    Json(json!({"status": "ok", "provider": "kbank"}))
}

/// POST /payment-callback/webhook/omise
pub async fn omise(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let (event, raw): (OmiseChargeEvent, String) = parse_with_raw(body)?;
    match normalize_omise(event, Some(raw))? {
        Some(normalized) => {
            let (back, inserted) = ingest(&state.db, &state.signage, &normalized).await?;
            Ok(Json(json!({
                "id": back.id,
                "store_id": back.store_id,
                "duplicate": !inserted,
            })))
        }
        None => Ok(Json(json!({"status": "ignored"}))),
    }
}

pub async fn omise_health() -> Json<Value> {
    Json(json!({"status": "ok", "provider": "omise"}))
}

/// POST /payment-callback/webhook/stripe
pub async fn stripe(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let (event, raw): (StripeEvent, String) = parse_with_raw(body)?;
    match normalize_stripe(event, Some(raw))? {
        Some(normalized) => {
            let (back, inserted) = ingest(&state.db, &state.signage, &normalized).await?;
            Ok(Json(json!({
                "id": back.id,
                "store_id": back.store_id,
                "duplicate": !inserted,
            })))
        }
        None => Ok(Json(json!({"status": "ignored"}))),
    }
}

pub async fn stripe_health() -> Json<Value> {
    Json(json!({"status": "ok", "provider": "stripe"}))
}

/// GET /payment-callback/webhook/links -- the callback URLs each rail's
/// dashboard needs registered, built off the service's public base URL.
pub async fn links(State(state): State<AppState>) -> Json<Value> {
    let base = &state.config.public_base_url;
    Json(json!({
        "generic": format!("{base}/payment-callback/webhook"),
        "kbank": format!("{base}/payment-callback/webhook/kbank"),
        "omise": format!("{base}/payment-callback/webhook/omise"),
        "stripe": format!("{base}/payment-callback/webhook/stripe"),
    }))
}
