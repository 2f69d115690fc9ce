//! Minimal JSON admin CRUD over the merchant hierarchy and banking
//! profiles, gated by the Admin role. There's no UI behind this; it's the
//! same shape an operator dashboard would call.

use crate::api::AppState;
use crate::auth::models::{Claims, UserRole};
use crate::banking_profile::{BankingProfile, Scope};
use crate::error::{ApiError, ApiResult};
use crate::merchant::Merchant;
use axum::extract::{Extension, Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

/// The merchant hierarchy and banking-profile credentials are created and
/// mutated by admins only; operators/viewers get a typed `Forbidden`.
fn require_admin(claims: &Claims) -> ApiResult<()> {
    if claims.role != UserRole::Admin {
        return Err(ApiError::Forbidden("admin role required".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

/// POST /admin/groups
pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<Json<Value>> {
    require_admin(&claims)?;
    let id = state.db.create_group(&req.name).await?;
    Ok(Json(serde_json::json!({"id": id})))
}

#[derive(Debug, Deserialize)]
pub struct CreateSiteRequest {
    pub group_id: i64,
    pub name: String,
}

/// POST /admin/sites
pub async fn create_site(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateSiteRequest>,
) -> ApiResult<Json<Value>> {
    require_admin(&claims)?;
    let id = state.db.create_site(req.group_id, &req.name).await?;
    Ok(Json(serde_json::json!({"id": id})))
}

#[derive(Debug, Deserialize)]
pub struct CreateMerchantRequest {
    pub group_id: u32,
    pub site_id: u32,
    pub store_id: u32,
    pub menu_id: u32,
    pub name: String,
    pub tax_id: Option<String>,
    pub biller_id_override: Option<String>,
}

/// POST /admin/merchants
pub async fn create_merchant(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateMerchantRequest>,
) -> ApiResult<Json<Merchant>> {
    require_admin(&claims)?;
    let merchant = state
        .db
        .create_merchant(
            req.group_id,
            req.site_id,
            req.store_id,
            req.menu_id,
            &req.name,
            req.tax_id.as_deref(),
            req.biller_id_override.as_deref(),
        )
        .await?;
    Ok(Json(merchant))
}

/// GET /admin/merchants
pub async fn list_merchants(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Merchant>>> {
    require_admin(&claims)?;
    let merchants = state.db.list_merchants().await?;
    Ok(Json(merchants))
}

#[derive(Debug, Deserialize)]
pub struct UpsertBankingProfileRequest {
    pub scope: Scope,
    pub scope_id: i64,
    pub rail: String,
    pub biller_id: Option<String>,
    pub credentials: Value,
}

/// POST /admin/banking-profiles
pub async fn upsert_banking_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpsertBankingProfileRequest>,
) -> ApiResult<Json<Value>> {
    require_admin(&claims)?;
    state
        .db
        .upsert_banking_profile(
            req.scope,
            req.scope_id,
            &req.rail,
            req.biller_id.as_deref(),
            &req.credentials,
        )
        .await?;
    Ok(Json(serde_json::json!({"status": "ok"})))
}

/// GET /admin/banking-profiles?store_id=...&rail=...
#[derive(Debug, Deserialize)]
pub struct ResolveBankingProfileQuery {
    pub store_id: i64,
    pub rail: String,
}

pub async fn resolve_banking_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    axum::extract::Query(query): axum::extract::Query<ResolveBankingProfileQuery>,
) -> ApiResult<Json<BankingProfile>> {
    require_admin(&claims)?;
    let profile = state.db.resolve_banking_profile(query.store_id, &query.rail).await?;
    Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
pub struct SetBankingProfileActiveRequest {
    pub active: bool,
}

/// POST /admin/banking-profiles/:id/active
pub async fn set_banking_profile_active(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<SetBankingProfileActiveRequest>,
) -> ApiResult<Json<Value>> {
    require_admin(&claims)?;
    state.db.set_banking_profile_active(id, req.active).await?;
    Ok(Json(serde_json::json!({"status": "ok"})))
}
