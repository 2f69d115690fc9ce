//! FCID (Food Court ID) stored-value escrow engine.
//!
//! A customer exchanges cash/card/wallet value at a counter for an FCID --
//! a short-lived token good for stored-value purchases across any store in
//! the food court. Stores debit it at the point of sale; any remainder can
//! be refunded back at the counter. Mirrors the deposit/withdraw/state
//! pattern of a pooled-balance vault, but the "shares" here are a single
//! opaque token rather than a wallet address.

use crate::db::Db;
use crate::error::ApiError;
use crate::money::Money;
use chrono::Utc;
use rand::Rng;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FcidStatus {
    Active,
    Used,
    Refunded,
    /// Past its mint day without being used or refunded. Counted by the
    /// balance-sweep job; transitioning into this state is a scheduler
    /// concern (see `expire_stale_fcids`), not something debit/refund
    /// flip on their own.
    Expired,
}

impl FcidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FcidStatus::Active => "active",
            FcidStatus::Used => "used",
            FcidStatus::Refunded => "refunded",
            FcidStatus::Expired => "expired",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "used" => FcidStatus::Used,
            "refunded" => FcidStatus::Refunded,
            "expired" => FcidStatus::Expired,
            _ => FcidStatus::Active,
        }
    }
}

/// Status carried on a customer-facing receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentTransactionStatus {
    Confirmed,
    Pending,
    Failed,
}

impl PaymentTransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentTransactionStatus::Confirmed => "confirmed",
            PaymentTransactionStatus::Pending => "pending",
            PaymentTransactionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => PaymentTransactionStatus::Pending,
            "failed" => PaymentTransactionStatus::Failed,
            _ => PaymentTransactionStatus::Confirmed,
        }
    }
}

/// Customer-facing receipt. Created whenever a debit or a rail payment can
/// be tied to an identifiable customer; `receipt_number` is globally unique
/// and printable.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentTransaction {
    pub id: i64,
    pub customer_id: Option<String>,
    pub merchant_id: Option<i64>,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub status: PaymentTransactionStatus,
    pub receipt_number: String,
    pub fcid: Option<String>,
    pub ref1: Option<String>,
    pub ref2: Option<String>,
    pub ref3: Option<String>,
    pub bank_account: Option<String>,
}

impl PaymentTransaction {
    /// A rail payment (e.g. a PromptPay bill-payment webhook) that never
    /// resolved to an identifiable customer is still a valid receipt --
    /// this just flags it instead of attaching it to a sentinel customer row.
    pub fn is_guest(&self) -> bool {
        self.customer_id.is_none()
    }
}

/// `RCP-YYYYMMDD-NNNNN` with a daily counter rather than a random suffix --
/// receipts are meant to be legible and sequential within a business day.
fn generate_receipt_number(tx: &rusqlite::Transaction) -> Result<String, ApiError> {
    let date = Utc::now().format("%Y%m%d").to_string();
    let prefix = format!("RCP-{date}-");
    loop {
        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM payment_transactions WHERE receipt_number LIKE ?1",
            params![format!("{prefix}%")],
            |r| r.get(0),
        )?;
        let candidate = format!("{prefix}{:05}", count + 1);
        let exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM payment_transactions WHERE receipt_number = ?1",
                params![candidate],
                |r| r.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(candidate);
        }
    }
}

/// Funding / spend instrument catalog. Cash, vouchers, gift cards and
/// coupons never touch a gateway; everything else is rail-mediated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCardVisa,
    CreditCardMastercard,
    CreditCardAmex,
    CreditCardJcb,
    CreditCardUnionpay,
    TrueWallet,
    PromptPay,
    LinePay,
    RabbitLinePay,
    ShopeePay,
    GrabPay,
    ApplePay,
    GooglePay,
    SamsungPay,
    Alipay,
    WechatPay,
    Paypal,
    AmazonPay,
    Venmo,
    Zelle,
    CashApp,
    BankTransfer,
    WireTransfer,
    CryptoBtc,
    CryptoEth,
    CryptoXrp,
    CryptoBitkub,
    CryptoBinance,
    CryptoSolana,
    CryptoUsdt,
    CryptoUsdc,
    CryptoCustom,
    PointsThe1,
    PointsBluecard,
    PointsCreditCard,
    PointsAirline,
    PointsHotel,
    PointsCustom,
    Voucher,
    GiftCard,
    Coupon,
    BnplAtome,
    BnplSplit,
    BnplGrabPaylater,
    BnplAffirm,
    BnplKlarna,
    BnplAfterpay,
    Custom,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::CreditCardVisa => "credit_card_visa",
            PaymentMethod::CreditCardMastercard => "credit_card_mastercard",
            PaymentMethod::CreditCardAmex => "credit_card_amex",
            PaymentMethod::CreditCardJcb => "credit_card_jcb",
            PaymentMethod::CreditCardUnionpay => "credit_card_unionpay",
            PaymentMethod::TrueWallet => "true_wallet",
            PaymentMethod::PromptPay => "promptpay",
            PaymentMethod::LinePay => "line_pay",
            PaymentMethod::RabbitLinePay => "rabbit_line_pay",
            PaymentMethod::ShopeePay => "shopee_pay",
            PaymentMethod::GrabPay => "grab_pay",
            PaymentMethod::ApplePay => "apple_pay",
            PaymentMethod::GooglePay => "google_pay",
            PaymentMethod::SamsungPay => "samsung_pay",
            PaymentMethod::Alipay => "alipay",
            PaymentMethod::WechatPay => "wechat_pay",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::AmazonPay => "amazon_pay",
            PaymentMethod::Venmo => "venmo",
            PaymentMethod::Zelle => "zelle",
            PaymentMethod::CashApp => "cash_app",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::WireTransfer => "wire_transfer",
            PaymentMethod::CryptoBtc => "crypto_btc",
            PaymentMethod::CryptoEth => "crypto_eth",
            PaymentMethod::CryptoXrp => "crypto_xrp",
            PaymentMethod::CryptoBitkub => "crypto_bitkub",
            PaymentMethod::CryptoBinance => "crypto_binance",
            PaymentMethod::CryptoSolana => "crypto_solana",
            PaymentMethod::CryptoUsdt => "crypto_usdt",
            PaymentMethod::CryptoUsdc => "crypto_usdc",
            PaymentMethod::CryptoCustom => "crypto_custom",
            PaymentMethod::PointsThe1 => "points_the1",
            PaymentMethod::PointsBluecard => "points_bluecard",
            PaymentMethod::PointsCreditCard => "points_credit_card",
            PaymentMethod::PointsAirline => "points_airline",
            PaymentMethod::PointsHotel => "points_hotel",
            PaymentMethod::PointsCustom => "points_custom",
            PaymentMethod::Voucher => "voucher",
            PaymentMethod::GiftCard => "gift_card",
            PaymentMethod::Coupon => "coupon",
            PaymentMethod::BnplAtome => "bnpl_atome",
            PaymentMethod::BnplSplit => "bnpl_split",
            PaymentMethod::BnplGrabPaylater => "bnpl_grab_paylater",
            PaymentMethod::BnplAffirm => "bnpl_affirm",
            PaymentMethod::BnplKlarna => "bnpl_klarna",
            PaymentMethod::BnplAfterpay => "bnpl_afterpay",
            PaymentMethod::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        use PaymentMethod::*;
        Some(match s {
            "cash" => Cash,
            "credit_card_visa" => CreditCardVisa,
            "credit_card_mastercard" => CreditCardMastercard,
            "credit_card_amex" => CreditCardAmex,
            "credit_card_jcb" => CreditCardJcb,
            "credit_card_unionpay" => CreditCardUnionpay,
            "true_wallet" => TrueWallet,
            "promptpay" => PromptPay,
            "line_pay" => LinePay,
            "rabbit_line_pay" => RabbitLinePay,
            "shopee_pay" => ShopeePay,
            "grab_pay" => GrabPay,
            "apple_pay" => ApplePay,
            "google_pay" => GooglePay,
            "samsung_pay" => SamsungPay,
            "alipay" => Alipay,
            "wechat_pay" => WechatPay,
            "paypal" => Paypal,
            "amazon_pay" => AmazonPay,
            "venmo" => Venmo,
            "zelle" => Zelle,
            "cash_app" => CashApp,
            "bank_transfer" => BankTransfer,
            "wire_transfer" => WireTransfer,
            "crypto_btc" => CryptoBtc,
            "crypto_eth" => CryptoEth,
            "crypto_xrp" => CryptoXrp,
            "crypto_bitkub" => CryptoBitkub,
            "crypto_binance" => CryptoBinance,
            "crypto_solana" => CryptoSolana,
            "crypto_usdt" => CryptoUsdt,
            "crypto_usdc" => CryptoUsdc,
            "crypto_custom" => CryptoCustom,
            "points_the1" => PointsThe1,
            "points_bluecard" => PointsBluecard,
            "points_credit_card" => PointsCreditCard,
            "points_airline" => PointsAirline,
            "points_hotel" => PointsHotel,
            "points_custom" => PointsCustom,
            "voucher" => Voucher,
            "gift_card" => GiftCard,
            "coupon" => Coupon,
            "bnpl_atome" => BnplAtome,
            "bnpl_split" => BnplSplit,
            "bnpl_grab_paylater" => BnplGrabPaylater,
            "bnpl_affirm" => BnplAffirm,
            "bnpl_klarna" => BnplKlarna,
            "bnpl_afterpay" => BnplAfterpay,
            "custom" => Custom,
            _ => return None,
        })
    }

    /// Cash-equivalent instruments settle immediately at the counter and
    /// never need a payment-rail round trip.
    pub fn requires_gateway(&self) -> bool {
        !matches!(
            self,
            PaymentMethod::Cash | PaymentMethod::Voucher | PaymentMethod::GiftCard | PaymentMethod::Coupon
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fcid {
    pub id: String,
    pub customer_id: Option<String>,
    pub initial: Money,
    pub balance: Money,
    pub payment_method: PaymentMethod,
    pub status: FcidStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebitOutcome {
    pub fcid: String,
    pub remaining_balance: Money,
    pub payment_transaction_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopUpOutcome {
    pub fcid: String,
    pub old_balance: Money,
    pub new_balance: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundOutcome {
    pub fcid: String,
    pub refund_amount: Money,
    pub original_payment_method: PaymentMethod,
}

fn generate_fcid() -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix: u32 = rand::thread_rng().gen_range(0..100_000);
    format!("FC-{date}-{suffix:05}")
}

fn row_to_fcid(row: &rusqlite::Row) -> rusqlite::Result<Fcid> {
    let payment_method_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    Ok(Fcid {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        initial: Money::from_satang(row.get(2)?),
        balance: Money::from_satang(row.get(3)?),
        payment_method: PaymentMethod::from_str(&payment_method_str).unwrap_or(PaymentMethod::Custom),
        status: FcidStatus::from_str(&status_str),
    })
}

impl Db {
    /// Exchanges value at the counter for a fresh, active FCID.
    pub async fn mint_fcid(
        &self,
        amount: Money,
        payment_method: PaymentMethod,
        customer_id: Option<&str>,
        counter_id: Option<i64>,
        counter_user_id: Option<i64>,
    ) -> Result<Fcid, ApiError> {
        if !amount.is_positive() {
            return Err(ApiError::Validation("amount must be positive".to_string()));
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let mut id = generate_fcid();
        loop {
            let exists: Option<i64> = tx
                .query_row("SELECT 1 FROM fcids WHERE id = ?1", params![id], |r| r.get(0))
                .optional()?;
            if exists.is_none() {
                break;
            }
            id = generate_fcid();
        }

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO fcids (id, customer_id, initial_satang, balance_satang, payment_method, status,
                                 counter_id, counter_user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3, ?4, 'active', ?5, ?6, ?7, ?7)",
            params![
                id,
                customer_id,
                amount.satang(),
                payment_method.as_str(),
                counter_id,
                counter_user_id,
                now,
            ],
        )?;
        tx.execute(
            "INSERT INTO counter_transactions (fcid, counter_id, counter_user_id, amount_satang, payment_method, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, counter_id, counter_user_id, amount.satang(), payment_method.as_str(), now],
        )?;
        tx.commit()?;

        info!(fcid = %id, amount = %amount, method = payment_method.as_str(), "minted fcid");
        Ok(Fcid {
            id,
            customer_id: customer_id.map(str::to_string),
            initial: amount,
            balance: amount,
            payment_method,
            status: FcidStatus::Active,
        })
    }

    pub async fn fcid_balance(&self, id: &str) -> Result<Fcid, ApiError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT id, customer_id, initial_satang, balance_satang, payment_method, status
             FROM fcids WHERE id = ?1",
            params![id],
            row_to_fcid,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => ApiError::NotFound(format!("fcid {id} not found")),
            other => ApiError::Database(other),
        })
    }

    /// Debits an active FCID at a store's point of sale. Flips to `used`
    /// once the balance hits zero; never goes negative.
    pub async fn debit_fcid(
        &self,
        id: &str,
        store_id: i64,
        amount: Money,
    ) -> Result<DebitOutcome, ApiError> {
        if !amount.is_positive() {
            return Err(ApiError::Validation("amount must be positive".to_string()));
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let (balance_satang, status, customer_id, payment_method_str): (i64, String, Option<String>, String) = tx
            .query_row(
                "SELECT balance_satang, status, customer_id, payment_method FROM fcids WHERE id = ?1",
                params![id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    ApiError::NotFound(format!("fcid {id} not found"))
                }
                other => ApiError::Database(other),
            })?;

        if status != "active" {
            return Err(ApiError::Conflict(format!(
                "fcid {id} is not active (status: {status})"
            )));
        }

        let balance = Money::from_satang(balance_satang);
        let remaining = balance.checked_sub(amount).ok_or_else(|| ApiError::InsufficientBalance {
            have: balance.to_string(),
            need: amount.to_string(),
        })?;

        let new_status = if remaining.is_zero() { "used" } else { "active" };
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE fcids SET balance_satang = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
            params![remaining.satang(), new_status, now, id],
        )?;
        tx.execute(
            "INSERT INTO store_transactions (fcid, store_id, amount_satang, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, store_id, amount.satang(), now],
        )?;

        let payment_transaction_id = if let Some(customer) = customer_id.as_deref() {
            let receipt_number = generate_receipt_number(&tx)?;
            tx.execute(
                "INSERT INTO payment_transactions
                    (customer_id, merchant_id, amount_satang, payment_method, status, receipt_number, fcid, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    customer,
                    store_id,
                    amount.satang(),
                    payment_method_str,
                    PaymentTransactionStatus::Confirmed.as_str(),
                    receipt_number,
                    id,
                    now,
                ],
            )?;
            Some(tx.last_insert_rowid())
        } else {
            None
        };

        tx.commit()?;

        info!(fcid = %id, store_id, amount = %amount, remaining = %remaining, "debited fcid");
        Ok(DebitOutcome {
            fcid: id.to_string(),
            remaining_balance: remaining,
            payment_transaction_id,
        })
    }

    /// Adds value to an active FCID -- the "mixed-method top-up" case
    /// where a customer funds the same token with cash then a card.
    pub async fn top_up_fcid(
        &self,
        id: &str,
        amount: Money,
        payment_method: PaymentMethod,
        counter_id: Option<i64>,
        counter_user_id: Option<i64>,
    ) -> Result<TopUpOutcome, ApiError> {
        if !amount.is_positive() {
            return Err(ApiError::Validation("amount must be positive".to_string()));
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let (balance_satang, status): (i64, String) = tx
            .query_row(
                "SELECT balance_satang, status FROM fcids WHERE id = ?1",
                params![id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    ApiError::NotFound(format!("fcid {id} not found"))
                }
                other => ApiError::Database(other),
            })?;

        if status != "active" {
            return Err(ApiError::Conflict(format!(
                "fcid {id} is not active (status: {status})"
            )));
        }

        let old_balance = Money::from_satang(balance_satang);
        let new_balance = old_balance + amount;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "UPDATE fcids SET initial_satang = initial_satang + ?1, balance_satang = ?2, updated_at = ?3 WHERE id = ?4",
            params![amount.satang(), new_balance.satang(), now, id],
        )?;
        tx.execute(
            "INSERT INTO counter_transactions (fcid, counter_id, counter_user_id, amount_satang, payment_method, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, counter_id, counter_user_id, amount.satang(), payment_method.as_str(), now],
        )?;
        tx.commit()?;

        info!(fcid = %id, old_balance = %old_balance, new_balance = %new_balance, "topped up fcid");
        Ok(TopUpOutcome {
            fcid: id.to_string(),
            old_balance,
            new_balance,
        })
    }

    /// Refunds whatever balance remains at the counter. An FCID can only
    /// be refunded once, and only while it still carries a balance.
    pub async fn refund_fcid(&self, id: &str) -> Result<RefundOutcome, ApiError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let (balance_satang, status, payment_method_str): (i64, String, String) = tx
            .query_row(
                "SELECT balance_satang, status, payment_method FROM fcids WHERE id = ?1",
                params![id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    ApiError::NotFound(format!("fcid {id} not found"))
                }
                other => ApiError::Database(other),
            })?;

        if status == "refunded" {
            return Err(ApiError::Conflict(format!("fcid {id} already refunded")));
        }
        let balance = Money::from_satang(balance_satang);
        if !balance.is_positive() {
            return Err(ApiError::Conflict(format!("fcid {id} has no balance to refund")));
        }

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE fcids SET balance_satang = 0, status = 'refunded', updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        tx.commit()?;

        info!(fcid = %id, refund_amount = %balance, "refunded fcid");
        Ok(RefundOutcome {
            fcid: id.to_string(),
            refund_amount: balance,
            original_payment_method: PaymentMethod::from_str(&payment_method_str)
                .unwrap_or(PaymentMethod::Custom),
        })
    }

    /// Counts FCIDs still active past the end of the business day they
    /// were minted on. Without its own e-Money license, a hub can't sit
    /// on unresolved customer value past a single day, so these are
    /// surfaced to the balance-sweep job for manual refund review
    /// rather than auto-refunded.
    pub async fn stale_active_fcid_count(&self) -> Result<i64, ApiError> {
        let conn = self.conn.lock().await;
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM fcids WHERE status = 'active' AND date(created_at) < ?1",
            params![today],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    /// Zeros and expires every FCID still active from a prior business day.
    /// Returns the codes swept, so the caller can fire a refund-notification
    /// attempt per customer before the balance disappears -- the sweep
    /// itself only performs the destructive half of that sequence.
    pub async fn expire_stale_fcids(&self) -> Result<Vec<Fcid>, ApiError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let today = Utc::now().format("%Y-%m-%d").to_string();

        let mut stmt = tx.prepare(
            "SELECT id, customer_id, initial_satang, balance_satang, payment_method, status
             FROM fcids WHERE status = 'active' AND date(created_at) < ?1",
        )?;
        let stale: Vec<Fcid> = stmt
            .query_map(params![today], row_to_fcid)?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);

        let now = Utc::now().to_rfc3339();
        for fcid in &stale {
            tx.execute(
                "UPDATE fcids SET balance_satang = 0, status = 'expired', updated_at = ?1 WHERE id = ?2",
                params![now, fcid.id],
            )?;
        }
        tx.commit()?;
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mint_then_debit_reduces_balance() {
        let db = Db::open_in_memory().unwrap();
        let fcid = db
            .mint_fcid(Money::from_baht(200.0), PaymentMethod::Cash, None, Some(1), Some(1))
            .await
            .unwrap();

        let outcome = db.debit_fcid(&fcid.id, 1, Money::from_baht(75.0)).await.unwrap();
        assert_eq!(outcome.remaining_balance, Money::from_baht(125.0));

        let balance = db.fcid_balance(&fcid.id).await.unwrap();
        assert_eq!(balance.status, FcidStatus::Active);
    }

    #[tokio::test]
    async fn debit_to_zero_marks_used() {
        let db = Db::open_in_memory().unwrap();
        let fcid = db
            .mint_fcid(Money::from_baht(100.0), PaymentMethod::Cash, None, None, None)
            .await
            .unwrap();

        db.debit_fcid(&fcid.id, 1, Money::from_baht(100.0)).await.unwrap();
        let balance = db.fcid_balance(&fcid.id).await.unwrap();
        assert_eq!(balance.status, FcidStatus::Used);
    }

    #[tokio::test]
    async fn debit_beyond_balance_is_rejected() {
        let db = Db::open_in_memory().unwrap();
        let fcid = db
            .mint_fcid(Money::from_baht(50.0), PaymentMethod::Cash, None, None, None)
            .await
            .unwrap();

        let err = db.debit_fcid(&fcid.id, 1, Money::from_baht(51.0)).await.unwrap_err();
        assert!(matches!(err, ApiError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn debit_on_used_fcid_is_a_conflict() {
        let db = Db::open_in_memory().unwrap();
        let fcid = db
            .mint_fcid(Money::from_baht(20.0), PaymentMethod::Cash, None, None, None)
            .await
            .unwrap();
        db.debit_fcid(&fcid.id, 1, Money::from_baht(20.0)).await.unwrap();

        let err = db.debit_fcid(&fcid.id, 1, Money::from_baht(1.0)).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn refund_returns_remaining_balance_once() {
        let db = Db::open_in_memory().unwrap();
        let fcid = db
            .mint_fcid(Money::from_baht(300.0), PaymentMethod::PromptPay, None, None, None)
            .await
            .unwrap();
        db.debit_fcid(&fcid.id, 1, Money::from_baht(100.0)).await.unwrap();

        let refund = db.refund_fcid(&fcid.id).await.unwrap();
        assert_eq!(refund.refund_amount, Money::from_baht(200.0));

        let err = db.refund_fcid(&fcid.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn stale_active_fcid_is_counted_by_sweep() {
        let db = Db::open_in_memory().unwrap();
        {
            let conn = db.conn.lock().await;
            conn.execute(
                "INSERT INTO fcids (id, initial_satang, balance_satang, payment_method, status, created_at, updated_at)
                 VALUES ('FC-OLD', 10000, 10000, 'cash', 'active', '2020-01-01T00:00:00Z', '2020-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        }
        assert_eq!(db.stale_active_fcid_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn balance_lookup_on_unknown_fcid_is_not_found() {
        let db = Db::open_in_memory().unwrap();
        let err = db.fcid_balance("FC-00000000-00000").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn top_up_increases_balance_and_initial() {
        let db = Db::open_in_memory().unwrap();
        let fcid = db
            .mint_fcid(Money::from_baht(100.0), PaymentMethod::Cash, None, None, None)
            .await
            .unwrap();

        let outcome = db
            .top_up_fcid(&fcid.id, Money::from_baht(50.0), PaymentMethod::CreditCardVisa, None, None)
            .await
            .unwrap();
        assert_eq!(outcome.old_balance, Money::from_baht(100.0));
        assert_eq!(outcome.new_balance, Money::from_baht(150.0));

        let balance = db.fcid_balance(&fcid.id).await.unwrap();
        assert_eq!(balance.balance, Money::from_baht(150.0));
    }

    #[tokio::test]
    async fn top_up_on_used_fcid_is_a_conflict() {
        let db = Db::open_in_memory().unwrap();
        let fcid = db
            .mint_fcid(Money::from_baht(20.0), PaymentMethod::Cash, None, None, None)
            .await
            .unwrap();
        db.debit_fcid(&fcid.id, 1, Money::from_baht(20.0)).await.unwrap();

        let err = db
            .top_up_fcid(&fcid.id, Money::from_baht(10.0), PaymentMethod::Cash, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn debit_bound_to_customer_creates_a_receipt() {
        let db = Db::open_in_memory().unwrap();
        let fcid = db
            .mint_fcid(Money::from_baht(100.0), PaymentMethod::Cash, Some("cust-1"), None, None)
            .await
            .unwrap();

        let outcome = db.debit_fcid(&fcid.id, 1, Money::from_baht(40.0)).await.unwrap();
        assert!(outcome.payment_transaction_id.is_some());

        let conn = db.conn.lock().await;
        let receipt: String = conn
            .query_row(
                "SELECT receipt_number FROM payment_transactions WHERE id = ?1",
                params![outcome.payment_transaction_id.unwrap()],
                |r| r.get(0),
            )
            .unwrap();
        assert!(receipt.starts_with("RCP-"));
    }

    #[tokio::test]
    async fn debit_without_customer_creates_no_receipt() {
        let db = Db::open_in_memory().unwrap();
        let fcid = db
            .mint_fcid(Money::from_baht(100.0), PaymentMethod::Cash, None, None, None)
            .await
            .unwrap();

        let outcome = db.debit_fcid(&fcid.id, 1, Money::from_baht(40.0)).await.unwrap();
        assert!(outcome.payment_transaction_id.is_none());
    }

    #[tokio::test]
    async fn expire_stale_fcids_zeros_balance_and_flips_status() {
        let db = Db::open_in_memory().unwrap();
        {
            let conn = db.conn.lock().await;
            conn.execute(
                "INSERT INTO fcids (id, initial_satang, balance_satang, payment_method, status, created_at, updated_at)
                 VALUES ('FC-OLD', 20000, 20000, 'cash', 'active', '2020-01-01T00:00:00Z', '2020-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        }
        let swept = db.expire_stale_fcids().await.unwrap();
        assert_eq!(swept.len(), 1);

        let balance = db.fcid_balance("FC-OLD").await.unwrap();
        assert_eq!(balance.status, FcidStatus::Expired);
        assert_eq!(balance.balance, Money::from_baht(0.0));
    }
}
