use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::SessionId;

/// Top-level fields of one stored document.
pub type DocumentFields = Map<String, Value>;

macro_rules! account_select {
    () => {
        "SELECT uid, email, password_digest, password_salt, display_name, \
         photo_ref, is_anonymous, disabled, created_at FROM accounts"
    };
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAccount {
    pub uid: SessionId,
    pub email: Option<String>,
    pub password_digest: Option<String>,
    pub password_salt: Option<String>,
    pub display_name: Option<String>,
    pub photo_ref: Option<String>,
    pub is_anonymous: bool,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Session remembered across restarts; at most one row exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSession {
    pub uid: SessionId,
    pub refresh_token: Option<String>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub uid: SessionId,
    pub email: Option<String>,
    pub password_digest: Option<String>,
    pub password_salt: Option<String>,
    pub is_anonymous: bool,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens its own database.
        let max_connections = if database_url.starts_with("sqlite::memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database '{database_url}'"))?;
        let storage = Self { pool };
        storage.ensure_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection  TEXT NOT NULL,
                doc_id      TEXT NOT NULL,
                fields_json TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (collection, doc_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create documents table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                uid             TEXT PRIMARY KEY,
                email           TEXT UNIQUE,
                password_digest TEXT,
                password_salt   TEXT,
                display_name    TEXT,
                photo_ref       TEXT,
                is_anonymous    INTEGER NOT NULL DEFAULT 0,
                disabled        INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create accounts table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS current_session (
                slot          INTEGER PRIMARY KEY CHECK (slot = 1),
                uid           TEXT NOT NULL,
                refresh_token TEXT,
                saved_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create current_session table")?;
        Ok(())
    }

    pub async fn get_doc(&self, collection: &str, doc_id: &str) -> Result<Option<DocumentFields>> {
        let row = sqlx::query("SELECT fields_json FROM documents WHERE collection = ? AND doc_id = ?")
            .bind(collection)
            .bind(doc_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode_fields(&r.get::<String, _>(0)))
            .transpose()
            .with_context(|| format!("corrupt document {collection}/{doc_id}"))
    }

    /// Creates or fully replaces a document.
    pub async fn set_doc(&self, collection: &str, doc_id: &str, fields: &DocumentFields) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO documents (collection, doc_id, fields_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(collection, doc_id)
             DO UPDATE SET fields_json = excluded.fields_json, updated_at = excluded.updated_at",
        )
        .bind(collection)
        .bind(doc_id)
        .bind(serde_json::to_string(fields)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        debug!(collection, doc_id, "document set");
        Ok(())
    }

    /// Merges `partial` into an existing document; fails when the document is absent.
    pub async fn update_doc(
        &self,
        collection: &str,
        doc_id: &str,
        partial: &DocumentFields,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT fields_json FROM documents WHERE collection = ? AND doc_id = ?")
            .bind(collection)
            .bind(doc_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Err(anyhow!("document {collection}/{doc_id} does not exist"));
        };

        let mut fields = decode_fields(&row.get::<String, _>(0))
            .with_context(|| format!("corrupt document {collection}/{doc_id}"))?;
        for (key, value) in partial {
            fields.insert(key.clone(), value.clone());
        }

        sqlx::query(
            "UPDATE documents SET fields_json = ?, updated_at = ? WHERE collection = ? AND doc_id = ?",
        )
        .bind(serde_json::to_string(&fields)?)
        .bind(Utc::now())
        .bind(collection)
        .bind(doc_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        debug!(collection, doc_id, keys = partial.len(), "document updated");
        Ok(())
    }

    pub async fn insert_account(&self, account: &NewAccount) -> Result<StoredAccount> {
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO accounts (uid, email, password_digest, password_salt, is_anonymous, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(account.uid.as_str())
        .bind(account.email.as_deref())
        .bind(account.password_digest.as_deref())
        .bind(account.password_salt.as_deref())
        .bind(account.is_anonymous)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert account {}", account.uid))?;

        Ok(StoredAccount {
            uid: account.uid.clone(),
            email: account.email.clone(),
            password_digest: account.password_digest.clone(),
            password_salt: account.password_salt.clone(),
            display_name: None,
            photo_ref: None,
            is_anonymous: account.is_anonymous,
            disabled: false,
            created_at,
        })
    }

    pub async fn account_by_uid(&self, uid: &SessionId) -> Result<Option<StoredAccount>> {
        let row = sqlx::query(concat!(account_select!(), " WHERE uid = ?"))
            .bind(uid.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| account_from_row(&r)))
    }

    pub async fn account_by_email(&self, email: &str) -> Result<Option<StoredAccount>> {
        let row = sqlx::query(concat!(account_select!(), " WHERE email = ? COLLATE NOCASE"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| account_from_row(&r)))
    }

    /// Applies the present attributes; `None` leaves the stored value untouched.
    pub async fn update_account_profile(
        &self,
        uid: &SessionId,
        display_name: Option<&str>,
        photo_ref: Option<&str>,
    ) -> Result<StoredAccount> {
        let result = sqlx::query(
            "UPDATE accounts
             SET display_name = COALESCE(?, display_name),
                 photo_ref = COALESCE(?, photo_ref)
             WHERE uid = ?",
        )
        .bind(display_name)
        .bind(photo_ref)
        .bind(uid.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("account {uid} does not exist"));
        }
        self.account_by_uid(uid)
            .await?
            .ok_or_else(|| anyhow!("account {uid} disappeared during update"))
    }

    pub async fn save_current_session(
        &self,
        uid: &SessionId,
        refresh_token: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO current_session (slot, uid, refresh_token, saved_at)
             VALUES (1, ?, ?, ?)
             ON CONFLICT(slot) DO UPDATE SET
                 uid = excluded.uid,
                 refresh_token = excluded.refresh_token,
                 saved_at = excluded.saved_at",
        )
        .bind(uid.as_str())
        .bind(refresh_token)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to remember session {uid}"))?;
        debug!(session_id = %uid, "current session saved");
        Ok(())
    }

    pub async fn load_current_session(&self) -> Result<Option<SavedSession>> {
        let row = sqlx::query("SELECT uid, refresh_token, saved_at FROM current_session WHERE slot = 1")
            .fetch_optional(&self.pool)
            .await
            .context("failed to read current session")?;
        Ok(row.map(|r| SavedSession {
            uid: SessionId(r.get::<String, _>(0)),
            refresh_token: r.get::<Option<String>, _>(1),
            saved_at: r.get::<DateTime<Utc>, _>(2),
        }))
    }

    pub async fn clear_current_session(&self) -> Result<()> {
        sqlx::query("DELETE FROM current_session")
            .execute(&self.pool)
            .await
            .context("failed to forget current session")?;
        Ok(())
    }

    pub async fn set_account_disabled(&self, uid: &SessionId, disabled: bool) -> Result<()> {
        sqlx::query("UPDATE accounts SET disabled = ? WHERE uid = ?")
            .bind(disabled)
            .bind(uid.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}


fn account_from_row(row: &sqlx::sqlite::SqliteRow) -> StoredAccount {
    StoredAccount {
        uid: SessionId(row.get::<String, _>(0)),
        email: row.get::<Option<String>, _>(1),
        password_digest: row.get::<Option<String>, _>(2),
        password_salt: row.get::<Option<String>, _>(3),
        display_name: row.get::<Option<String>, _>(4),
        photo_ref: row.get::<Option<String>, _>(5),
        is_anonymous: row.get::<bool, _>(6),
        disabled: row.get::<bool, _>(7),
        created_at: row.get::<DateTime<Utc>, _>(8),
    }
}

fn decode_fields(raw: &str) -> Result<DocumentFields> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("expected a json object, found {other}")),
    }
}

/// Normalizes a sqlite URL or plain path and creates its parent directory.
pub fn prepare_database_url(raw_database_url: &str) -> Result<String> {
    let database_url = normalize_database_url(raw_database_url)?;
    ensure_sqlite_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

pub fn normalize_database_url(raw_database_url: &str) -> Result<String> {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Err(anyhow!("database url must not be empty"));
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return Ok(raw_database_url.to_string());
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return Ok(format!("sqlite://{path}"));
    }

    Ok(format!("sqlite://{}", raw_database_url.replace('\\', "/")))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
