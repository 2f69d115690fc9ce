//! Counter-staff operations on an FCID: mint (exchange cash for stored
//! value), check balance, top up, refund.

use super::AppState;
use crate::error::ApiResult;
use crate::identity::{Fcid, PaymentMethod, RefundOutcome, TopUpOutcome};
use crate::money::Money;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ExchangeRequest {
    pub amount: f64,
    pub payment_method: String,
    pub customer_id: Option<String>,
    pub counter_id: Option<i64>,
    pub counter_user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct FcidResponse {
    pub fcid: String,
    pub balance: f64,
    pub payment_method: String,
    pub status: String,
}

impl From<Fcid> for FcidResponse {
    fn from(f: Fcid) -> Self {
        Self {
            fcid: f.id,
            balance: f.balance.to_baht(),
            payment_method: f.payment_method.as_str().to_string(),
            status: f.status.as_str().to_string(),
        }
    }
}

fn parse_method(raw: &str) -> ApiResult<PaymentMethod> {
    PaymentMethod::from_str(raw)
        .ok_or_else(|| crate::error::ApiError::Validation(format!("unknown payment_method '{raw}'")))
}

/// POST /counter/exchange -- cash (or any non-gateway tender) in, a fresh
/// FCID with that balance out.
pub async fn exchange(
    State(state): State<AppState>,
    Json(req): Json<ExchangeRequest>,
) -> ApiResult<Json<FcidResponse>> {
    let method = parse_method(&req.payment_method)?;
    let fcid = state
        .db
        .mint_fcid(
            Money::from_baht(req.amount),
            method,
            req.customer_id.as_deref(),
            req.counter_id,
            req.counter_user_id,
        )
        .await?;
    Ok(Json(fcid.into()))
}

/// GET /counter/balance/:code
pub async fn balance(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<FcidResponse>> {
    let fcid = state.db.fcid_balance(&code).await?;
    Ok(Json(fcid.into()))
}

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub fcid: String,
    pub amount: f64,
    pub payment_method: String,
    pub counter_id: Option<i64>,
    pub counter_user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TopUpResponse {
    pub fcid: String,
    pub old_balance: f64,
    pub new_balance: f64,
}

impl From<TopUpOutcome> for TopUpResponse {
    fn from(o: TopUpOutcome) -> Self {
        Self {
            fcid: o.fcid,
            old_balance: o.old_balance.to_baht(),
            new_balance: o.new_balance.to_baht(),
        }
    }
}

/// POST /counter/topup
pub async fn topup(
    State(state): State<AppState>,
    Json(req): Json<TopUpRequest>,
) -> ApiResult<Json<TopUpResponse>> {
    let method = parse_method(&req.payment_method)?;
    let outcome = state
        .db
        .top_up_fcid(
            &req.fcid,
            Money::from_baht(req.amount),
            method,
            req.counter_id,
            req.counter_user_id,
        )
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub fcid: String,
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub fcid: String,
    pub refund_amount: f64,
    pub original_payment_method: String,
}

impl From<RefundOutcome> for RefundResponse {
    fn from(o: RefundOutcome) -> Self {
        Self {
            fcid: o.fcid,
            refund_amount: o.refund_amount.to_baht(),
            original_payment_method: o.original_payment_method.as_str().to_string(),
        }
    }
}

/// POST /counter/refund
pub async fn refund(
    State(state): State<AppState>,
    Json(req): Json<RefundRequest>,
) -> ApiResult<Json<RefundResponse>> {
    let outcome = state.db.refund_fcid(&req.fcid).await?;
    Ok(Json(outcome.into()))
}
