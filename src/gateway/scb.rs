//! SCB Partners API deeplink transaction client.
//!
//! Two calls per QR: `POST /v1/oauth/token` (resourceOwnerId/requestUId
//! headers, applicationKey/applicationSecret body), then
//! `POST /v3/deeplink/transactions` with the bearer token. The callback
//! URL in `merchantMetaData` is SCB's own webhook registration, separate
//! from K Bank's.

use super::{credential_str, http_client, log_request, log_response, CreateQrRequest, CreateQrResponse, GatewayClient};
use crate::error::ApiError;
use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

pub struct ScbClient {
    client: reqwest::Client,
}

impl ScbClient {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }

    async fn oauth_token(
        &self,
        base_url: &str,
        api_key: &str,
        api_secret: &str,
    ) -> Result<String, ApiError> {
        let url = format!("{base_url}/partners/sandbox/v1/oauth/token");
        log_request(api_key, &url, api_key);
        let resp = self
            .client
            .post(&url)
            .header("resourceOwnerId", api_key)
            .header("requestUId", Uuid::new_v4().to_string())
            .header("accept-language", "EN")
            .json(&json!({
                "applicationKey": api_key,
                "applicationSecret": api_secret,
            }))
            .send()
            .await
            .map_err(|e| ApiError::Gateway(format!("scb oauth request failed: {e}")))?;

        let status = resp.status();
        log_response(&url, status.as_u16(), api_key);
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ApiError::Gateway(format!("scb oauth response not JSON: {e}")))?;

        if !status.is_success() {
            return Err(ApiError::Gateway(format!("scb oauth failed: {status}")));
        }

        body.get("data")
            .and_then(|d| d.get("accessToken"))
            .or_else(|| body.get("accessToken"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::Gateway("scb oauth response missing accessToken".into()))
    }
}

impl Default for ScbClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayClient for ScbClient {
    fn rail(&self) -> &'static str {
        "scb"
    }

    async fn create_qr(
        &self,
        credentials: &Value,
        request: &CreateQrRequest,
    ) -> Result<CreateQrResponse, ApiError> {
        let api_key = credential_str(credentials, "api_key")?;
        let api_secret = credential_str(credentials, "api_secret")?;
        let base_url = credential_str(credentials, "base_url")?;

        let token = self.oauth_token(&base_url, &api_key, &api_secret).await?;

        let url = format!("{base_url}/partners/sandbox/v3/deeplink/transactions");
        let body = json!({
            "transactionType": "PURCHASE",
            "transactionSubType": ["BP"],
            "sessionValidityPeriod": 60,
            "billPayment": {
                "paymentAmount": request.amount.to_baht(),
                "ref1": request.ref1,
                "ref2": request.ref2.clone().unwrap_or_else(|| request.ref1.clone()),
                "ref3": request.ref3.clone().unwrap_or_default(),
            },
            "merchantMetaData": {
                "callbackUrl": request.callback_url.clone().unwrap_or_default(),
                "merchantInfo": {
                    "name": request.merchant_name.clone().unwrap_or_else(|| "MERCHANT".to_string()),
                },
            },
        });

        log_request(&api_key, &url, &request.ref1);
        let resp = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {token}"))
            .header("resourceOwnerId", &api_key)
            .header("requestUId", Uuid::new_v4().to_string())
            .header("channel", "scbeasy")
            .header("accept-language", "EN")
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Gateway(format!("scb deeplink request failed: {e}")))?;

        let status = resp.status();
        log_response(&url, status.as_u16(), &request.ref1);
        let out: Value = resp
            .json()
            .await
            .map_err(|e| ApiError::Gateway(format!("scb deeplink response not JSON: {e}")))?;

        if !status.is_success() {
            return Err(ApiError::Gateway(format!("scb deeplink failed: {status}")));
        }

        let provider_reference = out
            .get("transactionId")
            .or_else(|| out.get("data").and_then(|d| d.get("transactionId")))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let qr_image_uri = out
            .get("deeplinkUrl")
            .or_else(|| out.get("data").and_then(|d| d.get("deeplinkUrl")))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(CreateQrResponse {
            provider_reference,
            qr_payload: None,
            qr_image_uri,
            raw: out,
        })
    }
}
