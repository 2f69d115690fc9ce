//! HTTP surface: axum handlers grouped by domain. Router assembly itself
//! lives in `main.rs`, which merges these alongside the auth router the
//! same way it merges everything else.

pub mod admin;
pub mod back_transactions;
pub mod counter;
pub mod payment_hub;
pub mod settlement;
pub mod signage;
pub mod stores;
pub mod webhook;

use crate::config::Config;
use crate::db::Db;
use crate::gateway::GatewayClient;
use crate::signage::SignageCoordinator;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub signage: Arc<SignageCoordinator>,
    pub config: Arc<Config>,
    /// Gateway clients keyed by the rail string a banking profile carries,
    /// e.g. `"scb"`, `"kbank"`, `"omise"`, `"promptpay"`, `"apple_pay"`.
    pub gateways: Arc<HashMap<&'static str, Arc<dyn GatewayClient>>>,
}

pub async fn health() -> &'static str {
    "ok"
}
