//! Stripe PromptPay / Apple Pay PaymentIntent client.
//!
//! Reference: <https://docs.stripe.com/payments/promptpay>,
//! <https://docs.stripe.com/payments/apple-pay>. The client secret returned
//! is handed to the frontend (Stripe.js / Payment Element); there is no
//! server-rendered QR image for this rail.

use super::{credential_str, http_client, log_request, log_response, CreateQrRequest, CreateQrResponse, GatewayClient};
use crate::error::ApiError;
use async_trait::async_trait;
use serde_json::Value;

const STRIPE_API: &str = "https://api.stripe.com/v1";

pub struct StripeClient {
    client: reqwest::Client,
    /// `promptpay` or `apple_pay` -- both go through the same PaymentIntent
    /// endpoint, just with a different `payment_method_types` entry.
    payment_method_type: &'static str,
}

impl StripeClient {
    pub fn promptpay() -> Self {
        Self {
            client: http_client(),
            payment_method_type: "promptpay",
        }
    }

    pub fn apple_pay() -> Self {
        Self {
            client: http_client(),
            payment_method_type: "apple_pay",
        }
    }
}

#[async_trait]
impl GatewayClient for StripeClient {
    fn rail(&self) -> &'static str {
        self.payment_method_type
    }

    async fn create_qr(
        &self,
        credentials: &Value,
        request: &CreateQrRequest,
    ) -> Result<CreateQrResponse, ApiError> {
        let secret_key = credential_str(credentials, "secret_key")?;

        let mut form = vec![
            ("amount".to_string(), request.amount.satang().to_string()),
            ("currency".to_string(), "thb".to_string()),
            (
                "payment_method_types[0]".to_string(),
                self.payment_method_type.to_string(),
            ),
            ("metadata[ref1]".to_string(), request.ref1.clone()),
        ];
        if let Some(ref2) = &request.ref2 {
            form.push(("metadata[ref2]".to_string(), ref2.clone()));
        }

        let url = format!("{STRIPE_API}/payment_intents");
        log_request(&secret_key, &url, &request.ref1);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::Gateway(format!("stripe request failed: {e}")))?;

        let status = resp.status();
        log_response(&url, status.as_u16(), &request.ref1);
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ApiError::Gateway(format!("stripe response not JSON: {e}")))?;

        if !status.is_success() {
            return Err(ApiError::Gateway(format!(
                "stripe payment_intent failed: {status}"
            )));
        }

        let provider_reference = body
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(CreateQrResponse {
            provider_reference,
            qr_payload: None,
            qr_image_uri: None,
            raw: body,
        })
    }
}
