//! Sqlite-backed persistence for the client.
//!
//! The session credential is the only durable artifact: a single-row slot
//! holding at most one opaque token. Nothing here inspects token contents.

use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_credential_table().await?;
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

    async fn ensure_credential_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_credential (
                slot       INTEGER PRIMARY KEY CHECK (slot = 0),
                token      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure session_credential table exists")?;
        Ok(())
    }

    pub async fn set_session_token(&self, token: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO session_credential (slot, token, updated_at) VALUES (0, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(slot) DO UPDATE SET token = excluded.token, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(token)
        .execute(&self.pool)
        .await
        .context("failed to store session token")?;
        Ok(())
    }

    pub async fn session_token(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT token FROM session_credential WHERE slot = 0")
            .fetch_optional(&self.pool)
            .await
            .context("failed to read session token")?;
        Ok(match row {
            Some(row) => Some(row.try_get::<String, _>(0)?),
            None => None,
        })
    }

    pub async fn clear_session_token(&self) -> Result<()> {
        sqlx::query("DELETE FROM session_credential WHERE slot = 0")
            .execute(&self.pool)
            .await
            .context("failed to clear session token")?;
        Ok(())
    }

    pub fn sqlite_url_for_data_dir(base_dir: &Path) -> String {
        sqlite_url_from_path(&base_dir.join("client_state.sqlite3"))
    }
}

fn sqlite_url_from_path(path: &Path) -> String {
    format!("sqlite://{}", path.display())
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
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
