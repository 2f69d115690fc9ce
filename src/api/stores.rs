//! Local EMV-QR generation for a store's own PromptPay Bill Payment
//! biller ID -- no gateway round trip, just TLV assembly.

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::money::Money;
use crate::qr;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct GeneratePromptPayQrRequest {
    pub amount: Option<f64>,
    pub ref2: Option<String>,
    pub ref3: Option<String>,
    pub merchant_name: String,
    pub merchant_city: String,
}

#[derive(Debug, Serialize)]
pub struct GeneratePromptPayQrResponse {
    pub qr_payload: String,
    pub biller_id: String,
}

/// POST /stores/:store_id/generate-promptpay-qr
pub async fn generate_promptpay_qr(
    State(state): State<AppState>,
    Path(store_id): Path<i64>,
    Json(req): Json<GeneratePromptPayQrRequest>,
) -> ApiResult<Json<GeneratePromptPayQrResponse>> {
    let profile = state.db.resolve_banking_profile(store_id, "promptpay").await?;
    let biller_id = profile.biller_id.ok_or_else(|| {
        ApiError::Validation(format!("promptpay banking profile for store {store_id} has no biller_id"))
    })?;
    let ref1 = state.db.store_token(store_id).await?;

    let qr_payload = qr::build_bill_payment_qr(
        &biller_id,
        &ref1,
        req.ref2.as_deref(),
        req.ref3.as_deref(),
        req.amount.map(Money::from_baht),
        &req.merchant_name,
        &req.merchant_city,
    )?;

    Ok(Json(GeneratePromptPayQrResponse { qr_payload, biller_id }))
}
