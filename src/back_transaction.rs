//! Idempotent back-transaction ledger.
//!
//! Every inbound bank/gateway webhook, after being normalized, lands here
//! first -- before anything else (FCID debits, settlement aggregation)
//! looks at it. Idempotency is keyed on `slip_reference`: a bank retrying
//! the same webhook delivery must not double-count the payment.

use crate::db::Db;
use crate::error::ApiError;
use crate::money::Money;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct NormalizedPayment {
    pub ref1: String,
    pub ref2: Option<String>,
    pub ref3: Option<String>,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
    pub slip_reference: Option<String>,
    pub bank_account: Option<String>,
    pub rail: String,
    pub raw_payload: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackTransaction {
    pub id: i64,
    pub ref1: String,
    pub ref2: Option<String>,
    pub ref3: Option<String>,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
    pub store_id: Option<i64>,
    pub status: String,
}

impl Db {
    /// Records a normalized payment. Returns the existing row, not a new
    /// one, when `slip_reference` has already been seen -- the caller
    /// should treat this the same as a first-time success, just without
    /// re-triggering signage/settlement side effects.
    ///
    /// A fresh row also gets a customer-facing `PaymentTransaction` receipt
    /// (payment_method=promptpay, status=confirmed) so the payer has
    /// something printable even when no customer is identifiable -- the
    /// receipt's `customer_id` is simply left null rather than attached to
    /// a sentinel "guest" customer row.
    pub async fn receive_back_transaction(
        &self,
        payment: &NormalizedPayment,
    ) -> Result<(BackTransaction, bool), ApiError> {
        let mut conn = self.conn.lock().await;

        if let Some(slip) = &payment.slip_reference {
            if let Some(existing) = conn
                .query_row(
                    "SELECT id, ref1, ref2, ref3, amount_satang, paid_at, store_id, status
                     FROM back_transactions WHERE slip_reference = ?1",
                    params![slip],
                    row_to_back_transaction,
                )
                .optional()?
            {
                warn!(slip_reference = %slip, "duplicate back-transaction delivery ignored");
                return Ok((existing, false));
            }
        }

        let tx = conn.transaction()?;

        let store_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM stores WHERE token = ?1",
                params![payment.ref1],
                |r| r.get(0),
            )
            .optional()?;

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO back_transactions
                (ref1, ref2, ref3, amount_satang, paid_at, slip_reference, bank_account, store_id, rail, raw_payload, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'received', ?11)",
            params![
                payment.ref1,
                payment.ref2,
                payment.ref3,
                payment.amount.satang(),
                payment.paid_at.to_rfc3339(),
                payment.slip_reference,
                payment.bank_account,
                store_id,
                payment.rail,
                payment.raw_payload,
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();

        let mut receipt_number = payment
            .slip_reference
            .clone()
            .unwrap_or_else(|| format!("PP-{id}-{}", payment.paid_at.format("%Y%m%d%H%M%S")));
        let taken: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM payment_transactions WHERE receipt_number = ?1",
                params![receipt_number],
                |r| r.get(0),
            )
            .optional()?;
        if taken.is_some() {
            receipt_number = format!("PP-{id}-{}", payment.paid_at.format("%Y%m%d%H%M%S%.f"));
        }

        tx.execute(
            "INSERT INTO payment_transactions
                (customer_id, merchant_id, amount_satang, payment_method, status, receipt_number, fcid, ref1, ref2, ref3, bank_account, created_at)
             VALUES (NULL, ?1, ?2, 'promptpay', 'confirmed', ?3, NULL, ?4, ?5, ?6, ?7, ?8)",
            params![
                store_id,
                payment.amount.satang(),
                receipt_number,
                payment.ref1,
                payment.ref2,
                payment.ref3,
                payment.bank_account,
                now,
            ],
        )?;

        tx.commit()?;

        if store_id.is_none() {
            warn!(ref1 = %payment.ref1, "back-transaction did not resolve to a known store");
        } else {
            info!(ref1 = %payment.ref1, store_id, amount = %payment.amount, "recorded back-transaction");
        }

        Ok((
            BackTransaction {
                id,
                ref1: payment.ref1.clone(),
                ref2: payment.ref2.clone(),
                ref3: payment.ref3.clone(),
                amount: payment.amount,
                paid_at: payment.paid_at,
                store_id,
                status: "received".to_string(),
            },
            true,
        ))
    }

    /// Recently-paid back-transactions for a store, strictly newer than
    /// `since`, oldest first -- signage and POS pollers want to replay
    /// events in the order they happened, not newest-first.
    pub async fn recent_paid(
        &self,
        store_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<BackTransaction>, ApiError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, ref1, ref2, ref3, amount_satang, paid_at, store_id, status
             FROM back_transactions
             WHERE store_id = ?1
               AND (?2 IS NULL OR paid_at > ?2)
             ORDER BY paid_at ASC
             LIMIT 500",
        )?;
        let rows = stmt
            .query_map(
                params![store_id, since.map(|d| d.to_rfc3339())],
                row_to_back_transaction,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn back_transactions_report(
        &self,
        store_id: Option<i64>,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<BackTransaction>, ApiError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, ref1, ref2, ref3, amount_satang, paid_at, store_id, status
             FROM back_transactions
             WHERE (?1 IS NULL OR store_id = ?1)
               AND (?2 IS NULL OR paid_at >= ?2)
             ORDER BY paid_at DESC
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(
                params![store_id, since.map(|d| d.to_rfc3339()), limit],
                row_to_back_transaction,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_back_transaction(row: &rusqlite::Row) -> rusqlite::Result<BackTransaction> {
    let paid_at_str: String = row.get(5)?;
    Ok(BackTransaction {
        id: row.get(0)?,
        ref1: row.get(1)?,
        ref2: row.get(2)?,
        ref3: row.get(3)?,
        amount: Money::from_satang(row.get(4)?),
        paid_at: DateTime::parse_from_rfc3339(&paid_at_str)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        store_id: row.get(6)?,
        status: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payment(ref1: &str, slip: Option<&str>) -> NormalizedPayment {
        NormalizedPayment {
            ref1: ref1.to_string(),
            ref2: None,
            ref3: None,
            amount: Money::from_baht(150.0),
            paid_at: Utc::now(),
            slip_reference: slip.map(str::to_string),
            bank_account: None,
            rail: "scb".to_string(),
            raw_payload: None,
        }
    }

    #[tokio::test]
    async fn unmatched_ref1_is_stored_as_orphan() {
        let db = Db::open_in_memory().unwrap();
        let (back, inserted) = db
            .receive_back_transaction(&sample_payment("no-such-store-token", Some("SLIP-1")))
            .await
            .unwrap();
        assert!(inserted);
        assert_eq!(back.store_id, None);
    }

    #[tokio::test]
    async fn new_back_transaction_creates_a_guest_payment_receipt() {
        let db = Db::open_in_memory().unwrap();
        let (back, _) = db
            .receive_back_transaction(&sample_payment("tok", Some("SLIP-RECEIPT")))
            .await
            .unwrap();

        let conn = db.conn.lock().await;
        let (customer_id, payment_method, status, receipt_number): (
            Option<String>,
            String,
            String,
            String,
        ) = conn
            .query_row(
                "SELECT customer_id, payment_method, status, receipt_number
                 FROM payment_transactions WHERE ref1 = ?1",
                params!["tok"],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!(customer_id, None);
        assert_eq!(payment_method, "promptpay");
        assert_eq!(status, "confirmed");
        assert_eq!(receipt_number, "SLIP-RECEIPT");
        assert_eq!(back.id, back.id);
    }

    #[tokio::test]
    async fn duplicate_slip_reference_is_idempotent() {
        let db = Db::open_in_memory().unwrap();
        let (first, first_inserted) = db
            .receive_back_transaction(&sample_payment("tok", Some("SLIP-DUP")))
            .await
            .unwrap();
        let (second, second_inserted) = db
            .receive_back_transaction(&sample_payment("tok", Some("SLIP-DUP")))
            .await
            .unwrap();

        assert!(first_inserted);
        assert!(!second_inserted);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn matched_ref1_resolves_store_id() {
        let db = Db::open_in_memory().unwrap();
        {
            let conn = db.conn.lock().await;
            conn.execute("INSERT INTO groups (id, name) VALUES (1, 'G')", []).unwrap();
            conn.execute("INSERT INTO sites (id, group_id, name) VALUES (1, 1, 'S')", [])
                .unwrap();
            conn.execute(
                "INSERT INTO stores (id, site_id, group_id, name, token) VALUES (1, 1, 1, 'Store', 'STORE-TOKEN')",
                [],
            )
            .unwrap();
        }

        let (back, _) = db
            .receive_back_transaction(&sample_payment("STORE-TOKEN", Some("SLIP-2")))
            .await
            .unwrap();
        assert_eq!(back.store_id, Some(1));
    }
}
