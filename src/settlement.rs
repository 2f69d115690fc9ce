//! Daily per-merchant settlement.
//!
//! Thai custody rules cap how long a payment hub may hold customer funds
//! before handing them to the merchant: one day. So every store's
//! back-transactions for a given calendar day get batched into a single
//! settlement row, which then moves through a strict lifecycle:
//! `pending -> transferred -> notified`. Skipping straight from `pending`
//! to `notified` would mean telling a merchant their money arrived before
//! it actually moved, so it's rejected rather than allowed.

use crate::db::Db;
use crate::error::ApiError;
use crate::money::Money;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Transferred,
    Notified,
}

impl SettlementStatus {
    fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Pending => "pending",
            SettlementStatus::Transferred => "transferred",
            SettlementStatus::Notified => "notified",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "transferred" => SettlementStatus::Transferred,
            "notified" => SettlementStatus::Notified,
            _ => SettlementStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub id: i64,
    pub store_id: i64,
    pub settlement_date: NaiveDate,
    pub amount: Money,
    pub status: SettlementStatus,
    pub transferred_at: Option<DateTime<Utc>>,
    pub notified_at: Option<DateTime<Utc>>,
}

fn row_to_settlement(row: &rusqlite::Row) -> rusqlite::Result<Settlement> {
    let date_str: String = row.get(2)?;
    let status_str: String = row.get(4)?;
    Ok(Settlement {
        id: row.get(0)?,
        store_id: row.get(1)?,
        settlement_date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| Utc::now().date_naive()),
        amount: Money::from_satang(row.get(3)?),
        status: SettlementStatus::from_str(&status_str),
        transferred_at: row
            .get::<_, Option<String>>(5)?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
        notified_at: row
            .get::<_, Option<String>>(6)?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
    })
}

impl Db {
    /// Aggregates the day's received back-transactions per store into
    /// pending settlement rows. Stores with no attributed back-transaction
    /// (orphaned `ref1`) are excluded -- there is nowhere to send the money.
    /// Idempotent: re-running for a date that already has a row for a
    /// store is a no-op for that store.
    pub async fn create_daily_settlements(
        &self,
        settlement_date: NaiveDate,
    ) -> Result<Vec<Settlement>, ApiError> {
        let conn = self.conn.lock().await;
        let date_str = settlement_date.format("%Y-%m-%d").to_string();

        let mut stmt = conn.prepare(
            "SELECT store_id, SUM(amount_satang) FROM back_transactions
             WHERE store_id IS NOT NULL AND date(paid_at) = ?1
             GROUP BY store_id",
        )?;
        let totals: Vec<(i64, i64)> = stmt
            .query_map(params![date_str], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut created = Vec::new();
        for (store_id, total_satang) in totals {
            if total_satang <= 0 {
                continue;
            }
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM settlements WHERE store_id = ?1 AND settlement_date = ?2",
                    params![store_id, date_str],
                    |r| r.get(0),
                )
                .optional()?;
            if existing.is_some() {
                continue;
            }

            conn.execute(
                "INSERT INTO settlements (store_id, settlement_date, amount_satang, status)
                 VALUES (?1, ?2, ?3, 'pending')",
                params![store_id, date_str, total_satang],
            )?;
            created.push(Settlement {
                id: conn.last_insert_rowid(),
                store_id,
                settlement_date,
                amount: Money::from_satang(total_satang),
                status: SettlementStatus::Pending,
                transferred_at: None,
                notified_at: None,
            });
        }

        if !created.is_empty() {
            info!(date = %date_str, count = created.len(), "created daily settlements");
        }
        Ok(created)
    }

    pub async fn settlement_list(
        &self,
        settlement_date: Option<NaiveDate>,
        status: Option<SettlementStatus>,
    ) -> Result<Vec<Settlement>, ApiError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, store_id, settlement_date, amount_satang, status, transferred_at, notified_at
             FROM settlements
             WHERE (?1 IS NULL OR settlement_date = ?1)
               AND (?2 IS NULL OR status = ?2)
             ORDER BY store_id",
        )?;
        let rows = stmt
            .query_map(
                params![
                    settlement_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    status.map(|s| s.as_str().to_string()),
                ],
                row_to_settlement,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn load_settlement(conn: &rusqlite::Connection, id: i64) -> Result<Settlement, ApiError> {
        conn.query_row(
            "SELECT id, store_id, settlement_date, amount_satang, status, transferred_at, notified_at
             FROM settlements WHERE id = ?1",
            params![id],
            row_to_settlement,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                ApiError::NotFound(format!("settlement {id} not found"))
            }
            other => ApiError::Database(other),
        })
    }

    pub async fn mark_settlement_transferred(&self, id: i64) -> Result<Settlement, ApiError> {
        let conn = self.conn.lock().await;
        let settlement = Self::load_settlement(&conn, id)?;
        if settlement.status != SettlementStatus::Pending {
            return Err(ApiError::Conflict(format!(
                "settlement {id} is {} not pending",
                settlement.status.as_str()
            )));
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE settlements SET status = 'transferred', transferred_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        info!(settlement_id = id, "marked settlement transferred");
        Self::load_settlement(&conn, id)
    }

    /// Notifies the merchant that funds have landed so they can print a
    /// receipt. Requires `transferred` as the predecessor state -- a
    /// direct `pending -> notified` jump would tell the merchant money
    /// moved before it did.
    pub async fn notify_settlement(&self, id: i64) -> Result<Settlement, ApiError> {
        let conn = self.conn.lock().await;
        let settlement = Self::load_settlement(&conn, id)?;
        if settlement.status != SettlementStatus::Transferred {
            return Err(ApiError::Conflict(format!(
                "settlement {id} is {}, must be transferred before it can be notified",
                settlement.status.as_str()
            )));
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE settlements SET status = 'notified', notified_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        info!(settlement_id = id, "notified merchant of settlement");
        Self::load_settlement(&conn, id)
    }

    /// Pending settlements whose `settlement_date` is more than one
    /// calendar day in the past -- a custody-period compliance red flag.
    /// Never auto-escalated or dropped; this is purely a surfaced report
    /// for an operator to act on.
    pub async fn custody_risk_report(&self) -> Result<Vec<Settlement>, ApiError> {
        let conn = self.conn.lock().await;
        let cutoff = (Utc::now().date_naive() - chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        let mut stmt = conn.prepare(
            "SELECT id, store_id, settlement_date, amount_satang, status, transferred_at, notified_at
             FROM settlements
             WHERE status = 'pending' AND settlement_date < ?1
             ORDER BY settlement_date ASC",
        )?;
        let rows = stmt
            .query_map(params![cutoff], row_to_settlement)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn settlements_for_receipt(
        &self,
        store_id: i64,
        notified_only: bool,
    ) -> Result<Vec<Settlement>, ApiError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, store_id, settlement_date, amount_satang, status, transferred_at, notified_at
             FROM settlements
             WHERE store_id = ?1 AND (?2 = 0 OR status = 'notified')
             ORDER BY settlement_date DESC
             LIMIT 100",
        )?;
        let rows = stmt
            .query_map(params![store_id, notified_only as i64], row_to_settlement)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::back_transaction::NormalizedPayment;
    use crate::money::Money;

    async fn seeded_db() -> Db {
        let db = Db::open_in_memory().unwrap();
        let conn = db.conn.lock().await;
        conn.execute("INSERT INTO groups (id, name) VALUES (1, 'G')", []).unwrap();
        conn.execute("INSERT INTO sites (id, group_id, name) VALUES (1, 1, 'S')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO stores (id, site_id, group_id, name, token) VALUES (1, 1, 1, 'Store', 'TOK')",
            [],
        )
        .unwrap();
        drop(conn);
        db
    }

    #[tokio::test]
    async fn aggregates_same_day_back_transactions_per_store() {
        let db = seeded_db().await;
        let today = Utc::now().date_naive();
        for _ in 0..2 {
            db.receive_back_transaction(&NormalizedPayment {
                ref1: "TOK".to_string(),
                ref2: None,
                ref3: None,
                amount: Money::from_baht(100.0),
                paid_at: Utc::now(),
                slip_reference: Some(uuid::Uuid::new_v4().to_string()),
                bank_account: None,
                rail: "scb".to_string(),
                raw_payload: None,
            })
            .await
            .unwrap();
        }

        let created = db.create_daily_settlements(today).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].amount, Money::from_baht(200.0));
    }

    #[tokio::test]
    async fn rerunning_settlement_batch_is_idempotent() {
        let db = seeded_db().await;
        let today = Utc::now().date_naive();
        db.receive_back_transaction(&NormalizedPayment {
            ref1: "TOK".to_string(),
            ref2: None,
            ref3: None,
            amount: Money::from_baht(50.0),
            paid_at: Utc::now(),
            slip_reference: Some("S1".to_string()),
            bank_account: None,
            rail: "scb".to_string(),
            raw_payload: None,
        })
        .await
        .unwrap();

        let first = db.create_daily_settlements(today).await.unwrap();
        let second = db.create_daily_settlements(today).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 0);
    }

    #[tokio::test]
    async fn custody_risk_report_surfaces_overdue_pending_settlements() {
        let db = seeded_db().await;
        {
            let conn = db.conn.lock().await;
            conn.execute(
                "INSERT INTO settlements (store_id, settlement_date, amount_satang, status) VALUES (1, '2020-01-01', 10000, 'pending')",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO settlements (store_id, settlement_date, amount_satang, status) VALUES (1, date('now'), 5000, 'pending')",
                [],
            )
            .unwrap();
        }

        let overdue = db.custody_risk_report().await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].settlement_date.to_string(), "2020-01-01");
    }

    #[tokio::test]
    async fn notify_requires_transferred_first() {
        let db = seeded_db().await;
        let conn = db.conn.lock().await;
        conn.execute(
            "INSERT INTO settlements (store_id, settlement_date, amount_satang, status) VALUES (1, '2026-01-01', 10000, 'pending')",
            [],
        )
        .unwrap();
        let id = conn.last_insert_rowid();
        drop(conn);

        let err = db.notify_settlement(id).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        db.mark_settlement_transferred(id).await.unwrap();
        let notified = db.notify_settlement(id).await.unwrap();
        assert_eq!(notified.status, SettlementStatus::Notified);
    }
}
