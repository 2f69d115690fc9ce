//! Webhook normalization: turn a rail-specific payload into the
//! rail-agnostic shape the back-transaction ledger understands.

pub mod rails;

use crate::back_transaction::{BackTransaction, NormalizedPayment};
use crate::db::Db;
use crate::error::ApiError;
use crate::money::Money;
use crate::signage::SignageCoordinator;
use chrono::{DateTime, Utc};
use rails::{BackTransactionPayload, KBankQrPaymentPayload, OmiseChargeEvent, StripeEvent};

fn parse_paid_at(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

pub fn normalize_back_transaction(
    payload: BackTransactionPayload,
    rail: &str,
) -> NormalizedPayment {
    NormalizedPayment {
        ref1: payload.ref1.trim().to_string(),
        ref2: payload.ref2.map(|s| s.trim().to_string()),
        ref3: payload.ref3.map(|s| s.trim().to_string()),
        amount: Money::from_baht(payload.amount),
        paid_at: parse_paid_at(payload.paid_at.as_deref()),
        slip_reference: payload.slip_reference,
        bank_account: payload.bank_account,
        rail: rail.to_string(),
        raw_payload: payload.raw_payload.map(|v| v.to_string()),
    }
}

/// K Bank (and Thai QR Payment generic) webhooks use a different field
/// naming generation per integration; every alias is tried before giving
/// up.
pub fn normalize_kbank(
    payload: KBankQrPaymentPayload,
    raw_payload: Option<String>,
) -> Result<NormalizedPayment, ApiError> {
    let ref1 = payload
        .reference1
        .or(payload.ref1)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("reference1 or ref1 is required".to_string()))?;

    let amount = payload
        .total_amount
        .or(payload.amount)
        .ok_or_else(|| ApiError::Validation("totalAmount or amount is required".to_string()))?;

    let ref2 = payload.reference2.or(payload.ref2).map(|s| s.trim().to_string());
    let ref3 = payload.reference3.or(payload.ref3).map(|s| s.trim().to_string());
    let slip_reference = payload
        .transaction_id
        .or(payload.trans_ref)
        .or(payload.slip_reference);
    let paid_at_raw = payload
        .transaction_date
        .or(payload.paid_at)
        .or(payload.date_time);

    Ok(NormalizedPayment {
        ref1,
        ref2,
        ref3,
        amount: Money::from_baht(amount),
        paid_at: parse_paid_at(paid_at_raw.as_deref()),
        slip_reference,
        bank_account: payload.bank_account,
        rail: "kbank".to_string(),
        raw_payload,
    })
}

/// Omise delivers every charge lifecycle transition through the same
/// webhook; only a completed, successful charge is a back-transaction.
/// Amount arrives in satang already, so no baht rounding is involved.
pub fn normalize_omise(
    event: OmiseChargeEvent,
    raw_payload: Option<String>,
) -> Result<Option<NormalizedPayment>, ApiError> {
    if event.key != "charge.complete" || event.data.status != "successful" {
        return Ok(None);
    }
    let ref1 = event
        .data
        .metadata
        .ref1
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("metadata.ref1 is required".to_string()))?;

    Ok(Some(NormalizedPayment {
        ref1,
        ref2: event.data.metadata.ref2,
        ref3: event.data.metadata.ref3,
        amount: Money::from_satang(event.data.amount),
        paid_at: parse_paid_at(event.data.created_at.as_deref()),
        slip_reference: Some(event.data.id),
        bank_account: None,
        rail: "omise".to_string(),
        raw_payload,
    }))
}

/// Stripe fires many event types per object; only `payment_intent.succeeded`
/// represents money actually captured.
pub fn normalize_stripe(
    event: StripeEvent,
    raw_payload: Option<String>,
) -> Result<Option<NormalizedPayment>, ApiError> {
    if event.event_type != "payment_intent.succeeded" {
        return Ok(None);
    }
    let intent = event.data.object;
    let ref1 = intent
        .metadata
        .ref1
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("metadata.ref1 is required".to_string()))?;

    Ok(Some(NormalizedPayment {
        ref1,
        ref2: intent.metadata.ref2,
        ref3: intent.metadata.ref3,
        amount: Money::from_satang(intent.amount),
        paid_at: Utc::now(),
        slip_reference: Some(intent.id),
        bank_account: None,
        rail: "stripe".to_string(),
        raw_payload,
    }))
}

/// Records a normalized payment and, if it resolved to a known store,
/// flips that store's signage display to paid. Mirrors the callback
/// handler's `if back.store_id: set_signage_paid(back.store_id)` --
/// an orphaned ref1 means there's no display to update.
pub async fn ingest(
    db: &Db,
    signage: &SignageCoordinator,
    payment: &NormalizedPayment,
) -> Result<(BackTransaction, bool), ApiError> {
    let (back, inserted) = db.receive_back_transaction(payment).await?;
    if inserted {
        if let Some(store_id) = back.store_id {
            signage.set_paid(store_id);
        }
    }
    Ok((back, inserted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kbank_prefers_reference1_over_ref1() {
        let payload = KBankQrPaymentPayload {
            reference1: Some("primary".to_string()),
            ref1: Some("fallback".to_string()),
            total_amount: Some(100.0),
            ..Default::default()
        };
        let normalized = normalize_kbank(payload, None).unwrap();
        assert_eq!(normalized.ref1, "primary");
    }

    #[test]
    fn kbank_falls_back_to_ref1_when_reference1_absent() {
        let payload = KBankQrPaymentPayload {
            ref1: Some("fallback".to_string()),
            amount: Some(50.0),
            ..Default::default()
        };
        let normalized = normalize_kbank(payload, None).unwrap();
        assert_eq!(normalized.ref1, "fallback");
        assert_eq!(normalized.amount, Money::from_baht(50.0));
    }

    #[test]
    fn kbank_threads_raw_payload_through() {
        let payload = KBankQrPaymentPayload {
            ref1: Some("tok".to_string()),
            amount: Some(10.0),
            ..Default::default()
        };
        let raw = serde_json::json!({"ref1": "tok", "amount": 10.0}).to_string();
        let normalized = normalize_kbank(payload, Some(raw.clone())).unwrap();
        assert_eq!(normalized.raw_payload, Some(raw));
    }

    #[test]
    fn kbank_missing_ref_is_rejected() {
        let payload = KBankQrPaymentPayload {
            amount: Some(10.0),
            ..Default::default()
        };
        assert!(normalize_kbank(payload, None).is_err());
    }

    #[tokio::test]
    async fn ingest_flips_signage_to_paid_for_matched_store() {
        let db = Db::open_in_memory().unwrap();
        {
            let conn = db.conn.lock().await;
            conn.execute("INSERT INTO groups (id, name) VALUES (1, 'G')", [])
                .unwrap();
            conn.execute("INSERT INTO sites (id, group_id, name) VALUES (1, 1, 'S')", [])
                .unwrap();
            conn.execute(
                "INSERT INTO stores (id, site_id, group_id, name, token) VALUES (1, 1, 1, 'Store', 'TOK')",
                [],
            )
            .unwrap();
        }
        let signage = SignageCoordinator::new();
        signage.set_display(1, "qr".to_string(), 100.0);

        let payload = BackTransactionPayload {
            ref1: "TOK".to_string(),
            amount: 100.0,
            paid_at: None,
            ref2: None,
            ref3: None,
            slip_reference: Some("SLIP-X".to_string()),
            bank_account: None,
            raw_payload: None,
        };
        let normalized = normalize_back_transaction(payload, "scb");
        ingest(&db, &signage, &normalized).await.unwrap();

        assert_eq!(
            signage.display(1).unwrap().status,
            crate::signage::SignageStatus::Paid
        );
    }

    #[test]
    fn omise_ignores_non_successful_charges() {
        let event: OmiseChargeEvent = serde_json::from_value(serde_json::json!({
            "key": "charge.create",
            "data": { "id": "chrg_1", "status": "pending", "amount": 10000, "metadata": { "ref1": "TOK" } }
        }))
        .unwrap();
        assert!(normalize_omise(event, None).unwrap().is_none());
    }

    #[test]
    fn omise_normalizes_completed_successful_charge() {
        let event: OmiseChargeEvent = serde_json::from_value(serde_json::json!({
            "key": "charge.complete",
            "data": { "id": "chrg_1", "status": "successful", "amount": 10000, "metadata": { "ref1": "TOK" } }
        }))
        .unwrap();
        let normalized = normalize_omise(event, None).unwrap().unwrap();
        assert_eq!(normalized.ref1, "TOK");
        assert_eq!(normalized.amount, Money::from_baht(100.0));
        assert_eq!(normalized.rail, "omise");
    }

    #[test]
    fn omise_missing_ref1_is_rejected() {
        let event: OmiseChargeEvent = serde_json::from_value(serde_json::json!({
            "key": "charge.complete",
            "data": { "id": "chrg_1", "status": "successful", "amount": 10000, "metadata": {} }
        }))
        .unwrap();
        assert!(normalize_omise(event, None).is_err());
    }

    #[test]
    fn stripe_ignores_non_succeeded_events() {
        let event: StripeEvent = serde_json::from_value(serde_json::json!({
            "type": "payment_intent.created",
            "data": { "object": { "id": "pi_1", "amount": 5000, "metadata": { "ref1": "TOK" } } }
        }))
        .unwrap();
        assert!(normalize_stripe(event, None).unwrap().is_none());
    }

    #[test]
    fn stripe_normalizes_succeeded_payment_intent() {
        let event: StripeEvent = serde_json::from_value(serde_json::json!({
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_1", "amount": 5000, "metadata": { "ref1": "TOK" } } }
        }))
        .unwrap();
        let normalized = normalize_stripe(event, None).unwrap().unwrap();
        assert_eq!(normalized.ref1, "TOK");
        assert_eq!(normalized.amount, Money::from_baht(50.0));
        assert_eq!(normalized.rail, "stripe");
    }

    #[test]
    fn missing_paid_at_defaults_to_now() {
        let payload = BackTransactionPayload {
            ref1: "tok".to_string(),
            amount: 10.0,
            paid_at: None,
            ref2: None,
            ref3: None,
            slip_reference: None,
            bank_account: None,
            raw_payload: None,
        };
        let normalized = normalize_back_transaction(payload, "scb");
        assert!((Utc::now() - normalized.paid_at).num_seconds() < 5);
    }
}
