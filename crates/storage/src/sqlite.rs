use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::{AuditLog, AuditStatus, Role, User};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use tracing::info;

use crate::admin::{new_user, seed_audit_logs, seed_users, AdminStore, NewAuditLog};

/// Admin directory and audit trail persisted in SQLite.
#[derive(Clone)]
pub struct SqliteAdminStore {
    pool: Pool<Sqlite>,
}

impl SqliteAdminStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let in_memory = database_url.contains(":memory:");
        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // every in-memory connection is its own database, so keep exactly one alive
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open admin database '{database_url}'"))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        store.seed_if_empty().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                name        TEXT NOT NULL,
                role        TEXT NOT NULL,
                designation TEXT NOT NULL,
                avatar      TEXT,
                created_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure users table exists")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_logs (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                id          TEXT NOT NULL UNIQUE,
                timestamp   TEXT NOT NULL,
                actor_email TEXT NOT NULL,
                actor_name  TEXT NOT NULL,
                action      TEXT NOT NULL,
                details     TEXT NOT NULL,
                status      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure audit_logs table exists")?;

        Ok(())
    }

    async fn seed_if_empty(&self) -> Result<()> {
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        if users > 0 {
            return Ok(());
        }

        for user in seed_users() {
            self.insert_user(&user).await?;
        }
        let mut logs = seed_audit_logs(Utc::now());
        // oldest first so that insertion order matches time order
        logs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        for log in logs {
            self.insert_log(&log).await?;
        }
        info!("seeded admin database with default users");
        Ok(())
    }

    /// Returns `false` when the email is already taken.
    async fn insert_user(&self, user: &User) -> Result<bool> {
        let inserted = sqlx::query(
            "INSERT INTO users (id, email, name, role, designation, avatar) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(email) DO NOTHING",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&user.designation)
        .bind(user.avatar.as_deref())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert user '{}'", user.email))?
        .rows_affected();
        Ok(inserted > 0)
    }

    async fn insert_log(&self, log: &AuditLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_logs (id, timestamp, actor_email, actor_name, action, details, status)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&log.id)
        .bind(log.timestamp)
        .bind(&log.actor_email)
        .bind(&log.actor_name)
        .bind(&log.action)
        .bind(&log.details)
        .bind(log.status.as_str())
        .execute(&self.pool)
        .await
        .context("failed to append audit log")?;
        Ok(())
    }
}

const USER_COLUMNS: &str = "id, email, name, role, designation, avatar";

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        role: Role::from_str(&role)?,
        designation: row.try_get("designation")?,
        avatar: row.try_get("avatar")?,
    })
}

fn log_from_row(row: &SqliteRow) -> Result<AuditLog> {
    let status: String = row.try_get("status")?;
    let timestamp: DateTime<Utc> = row.try_get("timestamp")?;
    Ok(AuditLog {
        id: row.try_get("id")?,
        timestamp,
        actor_email: row.try_get("actor_email")?,
        actor_name: row.try_get("actor_name")?,
        action: row.try_get("action")?,
        details: row.try_get("details")?,
        status: AuditStatus::from_str(&status)?,
    })
}

#[async_trait]
impl AdminStore for SqliteAdminStore {
    async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, rowid"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn add_user(&self, email: &str, role: Role) -> Result<Option<User>> {
        let user = new_user(email, role);
        if !self.insert_user(&user).await? {
            return Ok(None);
        }
        Ok(Some(user))
    }

    async fn update_user_role(&self, id: &str, role: Role) -> Result<Option<User>> {
        let updated = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Ok(None);
        }
        self.find_user(id).await
    }

    async fn remove_user(&self, id: &str) -> Result<bool> {
        let removed = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(removed > 0)
    }

    async fn sync_profile(&self, email: &str, name: &str) -> Result<Option<User>> {
        let updated = sqlx::query("UPDATE users SET name = ? WHERE email = ? COLLATE NOCASE")
            .bind(name)
            .bind(email)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Ok(None);
        }
        self.find_user_by_email(email).await
    }

    async fn list_audit_logs(&self) -> Result<Vec<AuditLog>> {
        let rows = sqlx::query(
            "SELECT id, timestamp, actor_email, actor_name, action, details, status
             FROM audit_logs ORDER BY timestamp DESC, seq DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(log_from_row).collect()
    }

    async fn append_audit_log(&self, entry: NewAuditLog) -> Result<AuditLog> {
        let log = entry.into_entry(Utc::now());
        self.insert_log(&log).await?;
        Ok(log)
    }
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
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
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
#[path = "tests/sqlite_tests.rs"]
mod tests;
