//! Omise PromptPay charge client.
//!
//! Reference: <https://docs.omise.co/promptpay>. A charge with
//! `source[type]=promptpay` returns a scannable QR image URI under
//! `source.scannable_code.image.download_uri`.

use super::{credential_str, http_client, log_request, log_response, CreateQrRequest, CreateQrResponse, GatewayClient};
use crate::error::ApiError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;

const OMISE_API: &str = "https://api.omise.co";

pub struct OmiseClient {
    client: reqwest::Client,
}

impl OmiseClient {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }
}

impl Default for OmiseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayClient for OmiseClient {
    fn rail(&self) -> &'static str {
        "omise"
    }

    async fn create_qr(
        &self,
        credentials: &Value,
        request: &CreateQrRequest,
    ) -> Result<CreateQrResponse, ApiError> {
        let secret_key = credential_str(credentials, "secret_key")?;
        let auth = STANDARD.encode(format!("{secret_key}:"));

        let mut form = vec![
            ("amount".to_string(), request.amount.satang().to_string()),
            ("currency".to_string(), "thb".to_string()),
            ("source[type]".to_string(), "promptpay".to_string()),
            ("metadata[ref1]".to_string(), request.ref1.clone()),
        ];
        if let Some(ref2) = &request.ref2 {
            form.push(("metadata[ref2]".to_string(), ref2.clone()));
        }

        let url = format!("{OMISE_API}/charges");
        log_request(&secret_key, &url, &request.ref1);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Basic {auth}"))
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::Gateway(format!("omise charge request failed: {e}")))?;

        let status = resp.status();
        log_response(&url, status.as_u16(), &request.ref1);
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ApiError::Gateway(format!("omise response not JSON: {e}")))?;

        if !status.is_success() {
            return Err(ApiError::Gateway(format!("omise charge failed: {status}")));
        }

        let qr_image_uri = body
            .get("source")
            .and_then(|s| s.get("scannable_code"))
            .and_then(|s| s.get("image"))
            .and_then(|i| i.get("download_uri"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let provider_reference = body
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(CreateQrResponse {
            provider_reference,
            qr_payload: None,
            qr_image_uri,
            raw: body,
        })
    }
}
