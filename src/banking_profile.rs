//! Banking profile resolution: store -> site -> group.
//!
//! A store inherits its payment-rail credentials from its site, and a site
//! from its group, unless a more specific scope overrides them. Resolution
//! always prefers the narrowest scope that has a profile for the
//! requested rail.

use crate::db::Db;
use crate::error::ApiError;
use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankingProfile {
    pub id: i64,
    pub scope: Scope,
    pub scope_id: i64,
    pub rail: String,
    pub biller_id: Option<String>,
    pub credentials: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Store,
    Site,
    Group,
}

impl Scope {
    fn as_str(&self) -> &'static str {
        match self {
            Scope::Store => "store",
            Scope::Site => "site",
            Scope::Group => "group",
        }
    }
}

struct StoreLineage {
    store_id: i64,
    site_id: i64,
    group_id: i64,
}

fn lineage_of(conn: &rusqlite::Connection, store_id: i64) -> Result<StoreLineage, ApiError> {
    conn.query_row(
        "SELECT id, site_id, group_id FROM stores WHERE id = ?1",
        params![store_id],
        |row| {
            Ok(StoreLineage {
                store_id: row.get(0)?,
                site_id: row.get(1)?,
                group_id: row.get(2)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            ApiError::NotFound(format!("store {store_id} not found"))
        }
        other => ApiError::Database(other),
    })
}

fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<BankingProfile> {
    let scope_str: String = row.get(1)?;
    let scope = match scope_str.as_str() {
        "store" => Scope::Store,
        "site" => Scope::Site,
        _ => Scope::Group,
    };
    let credentials_json: String = row.get(4)?;
    Ok(BankingProfile {
        id: row.get(0)?,
        scope,
        scope_id: row.get(2)?,
        rail: row.get(3)?,
        credentials: serde_json::from_str(&credentials_json).unwrap_or(Value::Null),
        biller_id: row.get(5)?,
    })
}

impl Db {
    /// Resolves the banking profile for a rail starting at the store and
    /// walking up to site, then group. Returns `NotFound` if none of the
    /// three scopes has a profile for the rail.
    pub async fn resolve_banking_profile(
        &self,
        store_id: i64,
        rail: &str,
    ) -> Result<BankingProfile, ApiError> {
        let conn = self.conn.lock().await;
        let lineage = lineage_of(&conn, store_id)?;

        for (scope, scope_id) in [
            (Scope::Store, lineage.store_id),
            (Scope::Site, lineage.site_id),
            (Scope::Group, lineage.group_id),
        ] {
            let mut stmt = conn.prepare(
                "SELECT id, scope, scope_id, rail, credentials_json, biller_id
                 FROM banking_profiles
                 WHERE scope = ?1 AND scope_id = ?2 AND rail = ?3 AND is_active = 1",
            )?;
            let found = stmt
                .query_row(params![scope.as_str(), scope_id, rail], row_to_profile)
                .ok();
            if let Some(profile) = found {
                return Ok(profile);
            }
        }

        Err(ApiError::NotFound(format!(
            "no banking profile for rail {rail} on store {store_id} (checked store/site/group)"
        )))
    }

    /// Looks up a store's 20-digit token, the value banks echo back as
    /// `ref1` on a bill-payment webhook.
    pub async fn store_token(&self, store_id: i64) -> Result<String, ApiError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT token FROM stores WHERE id = ?1",
            params![store_id],
            |r| r.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                ApiError::NotFound(format!("store {store_id} not found"))
            }
            other => ApiError::Database(other),
        })
    }

    /// New profiles are active by default; re-upserting an existing
    /// (scope, scope_id, rail) leaves its `is_active` flag untouched so a
    /// credential rotation doesn't accidentally reactivate a profile an
    /// admin had deliberately disabled.
    pub async fn upsert_banking_profile(
        &self,
        scope: Scope,
        scope_id: i64,
        rail: &str,
        biller_id: Option<&str>,
        credentials: &Value,
    ) -> Result<(), ApiError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO banking_profiles (scope, scope_id, rail, biller_id, credentials_json, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
             ON CONFLICT(scope, scope_id, rail) DO UPDATE SET
                biller_id = excluded.biller_id,
                credentials_json = excluded.credentials_json",
            params![
                scope.as_str(),
                scope_id,
                rail,
                biller_id,
                credentials.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Resolution only ever considers `is_active = 1` rows, per the
    /// resolver contract; this is how an admin retires a profile without
    /// deleting its credential history.
    pub async fn set_banking_profile_active(&self, id: i64, active: bool) -> Result<(), ApiError> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE banking_profiles SET is_active = ?1 WHERE id = ?2",
            params![active as i64, id],
        )?;
        if changed == 0 {
            return Err(ApiError::NotFound(format!("banking profile {id} not found")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params as p;
    use serde_json::json;

    async fn seeded_db() -> Db {
        let db = Db::open_in_memory().unwrap();
        {
            let conn = db.conn.lock().await;
            conn.execute("INSERT INTO groups (id, name) VALUES (1, 'G')", []).unwrap();
            conn.execute(
                "INSERT INTO sites (id, group_id, name) VALUES (1, 1, 'S')",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO stores (id, site_id, group_id, name, token) VALUES (1, 1, 1, 'Store', ?1)",
                p!["00100010000010000000"],
            )
            .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn falls_back_from_store_to_group() {
        let db = seeded_db().await;
        db.upsert_banking_profile(Scope::Group, 1, "scb", None, &json!({"key": "group-key"}))
            .await
            .unwrap();

        let profile = db.resolve_banking_profile(1, "scb").await.unwrap();
        assert_eq!(profile.scope, Scope::Group);
    }

    #[tokio::test]
    async fn store_scope_overrides_group_scope() {
        let db = seeded_db().await;
        db.upsert_banking_profile(Scope::Group, 1, "scb", None, &json!({"key": "group-key"}))
            .await
            .unwrap();
        db.upsert_banking_profile(Scope::Store, 1, "scb", None, &json!({"key": "store-key"}))
            .await
            .unwrap();

        let profile = db.resolve_banking_profile(1, "scb").await.unwrap();
        assert_eq!(profile.scope, Scope::Store);
        assert_eq!(profile.credentials["key"], "store-key");
    }

    #[tokio::test]
    async fn not_found_when_no_scope_has_the_rail() {
        let db = seeded_db().await;
        let err = db.resolve_banking_profile(1, "scb").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn deactivated_profile_is_excluded_from_resolution() {
        let db = seeded_db().await;
        db.upsert_banking_profile(Scope::Store, 1, "scb", None, &json!({"key": "store-key"}))
            .await
            .unwrap();
        let profile = db.resolve_banking_profile(1, "scb").await.unwrap();

        db.set_banking_profile_active(profile.id, false).await.unwrap();
        let err = db.resolve_banking_profile(1, "scb").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn deactivating_unknown_profile_is_not_found() {
        let db = seeded_db().await;
        let err = db.set_banking_profile_active(999, false).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
