//! Settlement batch creation and listing. The `pending -> transferred ->
//! notified` transitions themselves are driven by the scheduler, not by
//! these handlers -- operators only trigger batch creation and inspect
//! state here.

use super::AppState;
use crate::error::ApiResult;
use crate::settlement::{Settlement, SettlementStatus};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateDailyRequest {
    pub settlement_date: Option<NaiveDate>,
}

/// POST /payment-callback/settlements/create-daily
pub async fn create_daily(
    State(state): State<AppState>,
    Json(req): Json<CreateDailyRequest>,
) -> ApiResult<Json<Vec<Settlement>>> {
    let date = req.settlement_date.unwrap_or_else(|| Utc::now().date_naive());
    let created = state.db.create_daily_settlements(date).await?;
    Ok(Json(created))
}

#[derive(Debug, Deserialize)]
pub struct ListSettlementsQuery {
    pub settlement_date: Option<NaiveDate>,
    pub status: Option<String>,
}

fn parse_status(raw: &str) -> Option<SettlementStatus> {
    match raw {
        "pending" => Some(SettlementStatus::Pending),
        "transferred" => Some(SettlementStatus::Transferred),
        "notified" => Some(SettlementStatus::Notified),
        _ => None,
    }
}

/// GET /payment-callback/settlements
pub async fn list_settlements(
    State(state): State<AppState>,
    Query(query): Query<ListSettlementsQuery>,
) -> ApiResult<Json<Vec<Settlement>>> {
    let status = query.status.as_deref().and_then(parse_status);
    let settlements = state.db.settlement_list(query.settlement_date, status).await?;
    Ok(Json(settlements))
}

/// GET /payment-callback/settlements/custody-risk
///
/// Pending settlements past their one-day custody window -- a compliance
/// red flag surfaced for an operator, never auto-resolved.
pub async fn custody_risk(State(state): State<AppState>) -> ApiResult<Json<Vec<Settlement>>> {
    let overdue = state.db.custody_risk_report().await?;
    Ok(Json(overdue))
}

/// POST /payment-callback/settlements/:id/mark-transferred
pub async fn mark_transferred(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Settlement>> {
    let settlement = state.db.mark_settlement_transferred(id).await?;
    Ok(Json(settlement))
}

/// POST /payment-callback/settlements/:id/notify-store
pub async fn notify_store(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Settlement>> {
    let settlement = state.db.notify_settlement(id).await?;
    Ok(Json(settlement))
}

#[derive(Debug, Deserialize)]
pub struct ForReceiptQuery {
    pub notified_only: Option<bool>,
}

/// GET /payment-callback/stores/:store_id/settlements-for-receipt
pub async fn settlements_for_receipt(
    State(state): State<AppState>,
    Path(store_id): Path<i64>,
    Query(query): Query<ForReceiptQuery>,
) -> ApiResult<Json<Vec<Settlement>>> {
    let items = state
        .db
        .settlements_for_receipt(store_id, query.notified_only.unwrap_or(true))
        .await?;
    Ok(Json(items))
}
