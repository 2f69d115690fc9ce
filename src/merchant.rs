//! Merchant hierarchy administration: groups, sites, stores.
//!
//! Everything else in the system only reads this tree (banking profile
//! resolution walks it, back-transaction matching looks up a store by
//! its token); this module is the only place it gets written.

use crate::db::Db;
use crate::error::ApiError;
use crate::store_token::{derive_biller_id, generate as generate_token};
use rusqlite::params;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Merchant {
    pub id: i64,
    pub site_id: i64,
    pub group_id: i64,
    pub name: String,
    pub token: String,
    pub tax_id: Option<String>,
    pub biller_id: Option<String>,
}

fn row_to_merchant(row: &rusqlite::Row) -> rusqlite::Result<Merchant> {
    Ok(Merchant {
        id: row.get(0)?,
        site_id: row.get(1)?,
        group_id: row.get(2)?,
        name: row.get(3)?,
        token: row.get(4)?,
        tax_id: row.get(5)?,
        biller_id: row.get(6)?,
    })
}

impl Db {
    pub async fn create_group(&self, name: &str) -> Result<i64, ApiError> {
        let conn = self.conn.lock().await;
        conn.execute("INSERT INTO groups (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    pub async fn create_site(&self, group_id: i64, name: &str) -> Result<i64, ApiError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO sites (group_id, name) VALUES (?1, ?2)",
            params![group_id, name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Registers a store under an existing group/site. `store_id`/`menu_id`
    /// are the numeric slot the operator assigns it -- they, not an
    /// autoincrement, determine what the 20-digit token encodes, so the row
    /// is inserted with an explicit id rather than letting SQLite pick one.
    pub async fn create_merchant(
        &self,
        group_id: u32,
        site_id: u32,
        store_id: u32,
        menu_id: u32,
        name: &str,
        tax_id: Option<&str>,
        biller_id_override: Option<&str>,
    ) -> Result<Merchant, ApiError> {
        let token = generate_token(group_id, site_id, store_id, menu_id)?;
        let biller_id = match (tax_id, biller_id_override) {
            (None, None) => None,
            (tax_id, override_id) => Some(derive_biller_id(tax_id.unwrap_or(""), override_id)?),
        };

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO stores (id, site_id, group_id, name, token, tax_id, biller_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![store_id, site_id, group_id, name, token, tax_id, biller_id],
        )?;

        Ok(Merchant {
            id: store_id as i64,
            site_id: site_id as i64,
            group_id: group_id as i64,
            name: name.to_string(),
            token,
            tax_id: tax_id.map(str::to_string),
            biller_id,
        })
    }

    pub async fn list_merchants(&self) -> Result<Vec<Merchant>, ApiError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, site_id, group_id, name, token, tax_id, biller_id FROM stores ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], row_to_merchant)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_merchant_derives_token_and_biller_id() {
        let db = Db::open_in_memory().unwrap();
        db.create_group("G").await.unwrap();
        db.create_site(1, "S").await.unwrap();

        let merchant = db
            .create_merchant(1, 1, 7, 0, "Noodle Stall", Some("0-1055-61000-87-5"), None)
            .await
            .unwrap();

        assert_eq!(merchant.token, "00100010000070000000");
        assert_eq!(merchant.biller_id.unwrap(), "010556100087599");
    }

    #[tokio::test]
    async fn create_merchant_without_tax_id_or_override_has_no_biller_id() {
        let db = Db::open_in_memory().unwrap();
        db.create_group("G").await.unwrap();
        db.create_site(1, "S").await.unwrap();

        let merchant = db
            .create_merchant(1, 1, 1, 0, "Drinks", None, None)
            .await
            .unwrap();
        assert!(merchant.biller_id.is_none());
    }

    #[tokio::test]
    async fn list_merchants_returns_created_stores() {
        let db = Db::open_in_memory().unwrap();
        db.create_group("G").await.unwrap();
        db.create_site(1, "S").await.unwrap();
        db.create_merchant(1, 1, 1, 0, "A", None, None).await.unwrap();
        db.create_merchant(1, 1, 2, 0, "B", None, None).await.unwrap();

        let merchants = db.list_merchants().await.unwrap();
        assert_eq!(merchants.len(), 2);
    }
}
