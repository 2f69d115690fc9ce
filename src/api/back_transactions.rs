//! Reads over the back-transaction ledger: per-store recent-paid polling
//! for POS/signage, and an operator-facing report across stores.

use super::AppState;
use crate::back_transaction::BackTransaction;
use crate::error::ApiResult;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SinceQuery {
    pub since: Option<DateTime<Utc>>,
}

/// GET /payment-callback/stores/:store_id/recent-paid?since=...
pub async fn recent_paid(
    State(state): State<AppState>,
    Path(store_id): Path<i64>,
    Query(query): Query<SinceQuery>,
) -> ApiResult<Json<Vec<BackTransaction>>> {
    let rows = state.db.recent_paid(store_id, query.since).await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// GET /payment-callback/stores/:store_id/back-transactions?since=...&limit=...
pub async fn report(
    State(state): State<AppState>,
    Path(store_id): Path<i64>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Vec<BackTransaction>>> {
    let rows = state
        .db
        .back_transactions_report(Some(store_id), query.since, query.limit.unwrap_or(100))
        .await?;
    Ok(Json(rows))
}
