//! Payment-rail gateway clients.
//!
//! Each rail (SCB, K Bank, Omise, Stripe) has its own auth dance and QR
//! creation shape, but callers only need a uniform "create a QR for this
//! amount, give me back a reference I can reconcile against a webhook"
//! contract. No built-in retries here -- a gateway timeout is surfaced to
//! the caller as `ApiError::Gateway` and it's up to the POS layer to retry.

pub mod kbank;
pub mod omise;
pub mod scb;
pub mod stripe;

use crate::error::ApiError;
use crate::money::Money;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CreateQrRequest {
    pub amount: Money,
    pub ref1: String,
    pub ref2: Option<String>,
    pub ref3: Option<String>,
    pub callback_url: Option<String>,
    pub merchant_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateQrResponse {
    /// The rail's own id for this charge/transaction, used to reconcile
    /// against the eventual webhook.
    pub provider_reference: String,
    /// EMV payload string, when the rail hands back raw PromptPay text.
    pub qr_payload: Option<String>,
    /// A hosted image/deeplink URI, when the rail renders the QR itself.
    pub qr_image_uri: Option<String>,
    pub raw: Value,
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
    fn rail(&self) -> &'static str;

    async fn create_qr(
        &self,
        credentials: &Value,
        request: &CreateQrRequest,
    ) -> Result<CreateQrResponse, ApiError>;
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .user_agent("foodcourt-hub/0.1")
        .build()
        .expect("failed to build reqwest client")
}

pub(crate) fn credential_str(credentials: &Value, field: &str) -> Result<String, ApiError> {
    credentials
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::Validation(format!("banking profile missing '{field}'")))
}

/// First 20 characters of `ref1` -- the slice every gateway client logs
/// instead of the full value, per the call/receipt logging contract below.
fn ref1_prefix(ref1: &str) -> &str {
    let end = ref1.char_indices().nth(20).map(|(i, _)| i).unwrap_or(ref1.len());
    &ref1[..end]
}

/// Every outbound gateway call is logged at call time (key/path/ref1
/// prefix) and again at receipt time (path/status/ref1 prefix) -- never
/// the full request or response body, which may carry secrets or PII.
pub(crate) fn log_request(key: &str, path: &str, ref1: &str) {
    debug!(key, path, ref1 = ref1_prefix(ref1), "gateway request");
}

pub(crate) fn log_response(path: &str, status: u16, ref1: &str) {
    debug!(path, status, ref1 = ref1_prefix(ref1), "gateway response");
}
