//! K Bank (K API Portal) OAuth 2.0 client_credentials + QR creation.
//!
//! Reference: K API Portal "Inward Remittance / QR Payment" OAuth docs.
//! `Authorization: Basic base64(customer_id:consumer_secret)`,
//! `grant_type=client_credentials`. The token is cached in-process and
//! refreshed a minute before its stated `expires_in`.

use super::{credential_str, http_client, log_request, log_response, CreateQrRequest, CreateQrResponse, GatewayClient};
use crate::error::ApiError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use parking_lot::Mutex;
use serde_json::Value;
use std::time::{Duration, Instant};

struct CachedToken {
    token: String,
    expires_at: Instant,
}

pub struct KbankClient {
    client: reqwest::Client,
    cache: Mutex<Option<CachedToken>>,
}

impl KbankClient {
    pub fn new() -> Self {
        Self {
            client: http_client(),
            cache: Mutex::new(None),
        }
    }

    async fn access_token(&self, credentials: &Value) -> Result<String, ApiError> {
        if let Some(cached) = self.cache.lock().as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let customer_id = credential_str(credentials, "customer_id")?;
        let consumer_secret = credential_str(credentials, "consumer_secret")?;
        let token_url = credential_str(credentials, "token_url")?;

        let basic = STANDARD.encode(format!("{customer_id}:{consumer_secret}"));
        log_request(&customer_id, &token_url, &customer_id);
        let resp = self
            .client
            .post(&token_url)
            .header("Authorization", format!("Basic {basic}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ApiError::Gateway(format!("kbank oauth request failed: {e}")))?;

        let status = resp.status();
        log_response(&token_url, status.as_u16(), &customer_id);
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ApiError::Gateway(format!("kbank oauth response not JSON: {e}")))?;

        if !status.is_success() {
            return Err(ApiError::Gateway(format!("kbank oauth failed: {status}")));
        }

        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Gateway("kbank oauth response missing access_token".into()))?
            .to_string();
        let expires_in = body
            .get("expires_in")
            .and_then(Value::as_u64)
            .unwrap_or(1799);

        *self.cache.lock() = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(expires_in.saturating_sub(60)),
        });

        Ok(token)
    }
}

impl Default for KbankClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayClient for KbankClient {
    fn rail(&self) -> &'static str {
        "kbank"
    }

    async fn create_qr(
        &self,
        credentials: &Value,
        request: &CreateQrRequest,
    ) -> Result<CreateQrResponse, ApiError> {
        let token = self.access_token(credentials).await?;
        let qr_create_url = credential_str(credentials, "qr_create_url")?;

        let body = serde_json::json!({
            "reference1": request.ref1,
            "reference2": request.ref2,
            "reference3": request.ref3,
            "totalAmount": request.amount.to_baht(),
        });

        log_request(&qr_create_url, &qr_create_url, &request.ref1);
        let resp = self
            .client
            .post(&qr_create_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Gateway(format!("kbank qr request failed: {e}")))?;

        let status = resp.status();
        log_response(&qr_create_url, status.as_u16(), &request.ref1);
        let out: Value = resp
            .json()
            .await
            .map_err(|e| ApiError::Gateway(format!("kbank qr response not JSON: {e}")))?;

        if !status.is_success() {
            return Err(ApiError::Gateway(format!("kbank qr creation failed: {status}")));
        }

        let provider_reference = out
            .get("transactionId")
            .or_else(|| out.get("transRef"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let qr_payload = out
            .get("qrRawData")
            .and_then(Value::as_str)
            .map(str::to_string);
        let qr_image_uri = out
            .get("qrImage")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(CreateQrResponse {
            provider_reference,
            qr_payload,
            qr_image_uri,
            raw: out,
        })
    }
}
