//! Store-side spend against an FCID, and gateway-direct QR/checkout
//! creation for rails that don't go through the local EMV-QR builder.

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::gateway::CreateQrRequest;
use crate::identity::DebitOutcome;
use crate::money::Money;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct UseFcidRequest {
    pub fcid: String,
    pub store_id: i64,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct UseFcidResponse {
    pub fcid: String,
    pub remaining_balance: f64,
    pub payment_transaction_id: Option<i64>,
}

impl From<DebitOutcome> for UseFcidResponse {
    fn from(o: DebitOutcome) -> Self {
        Self {
            fcid: o.fcid,
            remaining_balance: o.remaining_balance.to_baht(),
            payment_transaction_id: o.payment_transaction_id,
        }
    }
}

/// POST /payment-hub/use -- a store's point of sale spends down a
/// customer's FCID for an order.
pub async fn use_fcid(
    State(state): State<AppState>,
    Json(req): Json<UseFcidRequest>,
) -> ApiResult<Json<UseFcidResponse>> {
    let outcome = state
        .db
        .debit_fcid(&req.fcid, req.store_id, Money::from_baht(req.amount))
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct CreateGatewayQrRequest {
    pub rail: String,
    pub amount: f64,
    pub ref2: Option<String>,
    pub ref3: Option<String>,
    pub callback_url: Option<String>,
    pub merchant_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateGatewayQrResponse {
    pub provider_reference: String,
    pub qr_payload: Option<String>,
    pub qr_image_uri: Option<String>,
    pub raw: Value,
}

/// POST /payment-hub/stores/:store_id/create-gateway-qr -- resolves the
/// store's banking profile for the requested rail and asks that rail's
/// gateway to mint a QR/checkout, instead of building one locally. Used
/// for rails (Omise, Stripe, K Bank) that want to own the payment page.
pub async fn create_gateway_qr(
    State(state): State<AppState>,
    Path(store_id): Path<i64>,
    Json(req): Json<CreateGatewayQrRequest>,
) -> ApiResult<Json<CreateGatewayQrResponse>> {
    let profile = state.db.resolve_banking_profile(store_id, &req.rail).await?;
    let client = state
        .gateways
        .get(req.rail.as_str())
        .ok_or_else(|| ApiError::Validation(format!("no gateway client configured for rail '{}'", req.rail)))?;

    let ref1 = state.db.store_token(store_id).await?;
    let qr_request = CreateQrRequest {
        amount: Money::from_baht(req.amount),
        ref1,
        ref2: req.ref2,
        ref3: req.ref3,
        callback_url: req.callback_url,
        merchant_name: req.merchant_name,
    };
    let response = client.create_qr(&profile.credentials, &qr_request).await?;

    Ok(Json(CreateGatewayQrResponse {
        provider_reference: response.provider_reference,
        qr_payload: response.qr_payload,
        qr_image_uri: response.qr_image_uri,
        raw: response.raw,
    }))
}
