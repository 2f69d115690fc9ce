//! Per-rail webhook payload shapes.

use serde::Deserialize;
use serde_json::Value;

/// Shared shape posted by SCB (and accepted as the generic back-transaction
/// intake format).
#[derive(Debug, Clone, Deserialize)]
pub struct BackTransactionPayload {
    pub ref1: String,
    pub amount: f64,
    pub paid_at: Option<String>,
    pub ref2: Option<String>,
    pub ref3: Option<String>,
    pub slip_reference: Option<String>,
    pub bank_account: Option<String>,
    #[serde(default)]
    pub raw_payload: Option<Value>,
}

/// K Bank / generic Thai QR Payment webhook shape. Field names vary by
/// integration generation (`reference1` vs `ref1`, `totalAmount` vs
/// `amount`), so every alias is accepted and normalized downstream.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct KBankQrPaymentPayload {
    pub reference1: Option<String>,
    pub ref1: Option<String>,
    pub reference2: Option<String>,
    pub ref2: Option<String>,
    pub reference3: Option<String>,
    pub ref3: Option<String>,
    #[serde(rename = "totalAmount")]
    pub total_amount: Option<f64>,
    pub amount: Option<f64>,
    #[serde(rename = "transactionId")]
    pub transaction_id: Option<String>,
    pub trans_ref: Option<String>,
    pub slip_reference: Option<String>,
    #[serde(rename = "transactionDate")]
    pub transaction_date: Option<String>,
    pub paid_at: Option<String>,
    #[serde(rename = "dateTime")]
    pub date_time: Option<String>,
    pub bank_account: Option<String>,
}

/// Omise charge event envelope. Only `key = "charge.complete"` with
/// `data.status = "successful"` represents a confirmed payment; anything
/// else (authorized-but-pending, failed) is not a back-transaction yet.
#[derive(Debug, Clone, Deserialize)]
pub struct OmiseChargeEvent {
    pub key: String,
    pub data: OmiseChargeData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OmiseChargeData {
    pub id: String,
    pub status: String,
    /// Satang, matching Omise's own amount convention.
    pub amount: i64,
    pub created_at: Option<String>,
    #[serde(default)]
    pub metadata: OmiseMetadata,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct OmiseMetadata {
    pub ref1: Option<String>,
    pub ref2: Option<String>,
    pub ref3: Option<String>,
}

/// Stripe event envelope. Only `type = "payment_intent.succeeded"` is
/// treated as a confirmed payment.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: StripePaymentIntent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    /// Smallest currency unit, same convention as satang for THB.
    pub amount: i64,
    #[serde(default)]
    pub metadata: StripeMetadata,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StripeMetadata {
    pub ref1: Option<String>,
    pub ref2: Option<String>,
    pub ref3: Option<String>,
}
