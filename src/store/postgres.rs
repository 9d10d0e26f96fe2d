//! PostgreSQL stores. Schema lives in `sql/schema.sql`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{EmailTaken, NewUser, RefreshTokenRecord, RefreshTokenStore, User, UserRepository};
use crate::auth::VerifyStatus;

const USER_COLUMNS: &str = "id, name, email, password_hash, date_of_birth, username, bio, \
     location, website, avatar, cover_photo, email_verify_token, forgot_password_token, \
     verify, created_at, updated_at";

/// Unique index on `users.email` in `sql/schema.sql`.
const EMAIL_CONSTRAINT: &str = "users_email_key";

fn db_span(operation: &'static str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let verify: String = row.try_get("verify").context("failed to read verify")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        date_of_birth: row.try_get("date_of_birth")?,
        username: row.try_get("username")?,
        bio: row.try_get("bio")?,
        location: row.try_get("location")?,
        website: row.try_get("website")?,
        avatar: row.try_get("avatar")?,
        cover_photo: row.try_get("cover_photo")?,
        email_verify_token: row.try_get("email_verify_token")?,
        forgot_password_token: row.try_get("forgot_password_token")?,
        verify: verify.parse().map_err(|err: String| anyhow!(err))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, query: &str, value: &str) -> Result<Option<User>> {
        let row = sqlx::query(query)
            .bind(value)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to fetch user")?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Run an UPDATE bound to `id` plus one text value; true when a row changed.
    async fn update_text(&self, query: &str, id: Uuid, value: &str, what: &str) -> Result<bool> {
        let result = sqlx::query(query)
            .bind(id)
            .bind(value)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .with_context(|| format!("failed to update {what}"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let query = format!(
            r"
            INSERT INTO users
                (id, name, email, password_hash, date_of_birth, username, email_verify_token, verify)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "
        );
        let row = sqlx::query(&query)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.date_of_birth)
            .bind(&user.username)
            .bind(&user.email_verify_token)
            .bind(user.verify.as_str())
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", &query))
            .await
            .map_err(|err| {
                let taken = err.as_database_error().is_some_and(|db| {
                    db.is_unique_violation() && db.constraint() == Some(EMAIL_CONSTRAINT)
                });
                if taken {
                    anyhow::Error::new(EmailTaken(user.email.clone()))
                } else {
                    anyhow::Error::new(err).context("failed to insert user")
                }
            })?;
        user_from_row(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to fetch user by id")?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        self.find_one(&query, email).await
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        let query = "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)";
        let exists: bool = sqlx::query_scalar(query)
            .bind(email)
            .fetch_one(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to check email")?;
        Ok(exists)
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<bool> {
        self.update_text(
            r"
            UPDATE users
            SET email_verify_token = '', verify = $2, updated_at = NOW()
            WHERE id = $1 AND verify = 'unverified'
            ",
            id,
            VerifyStatus::Verified.as_str(),
            "verify status",
        )
        .await
    }

    async fn set_email_verify_token(&self, id: Uuid, token: &str) -> Result<bool> {
        self.update_text(
            "UPDATE users SET email_verify_token = $2, updated_at = NOW() WHERE id = $1",
            id,
            token,
            "email verify token",
        )
        .await
    }

    async fn set_forgot_password_token(&self, id: Uuid, token: &str) -> Result<bool> {
        self.update_text(
            "UPDATE users SET forgot_password_token = $2, updated_at = NOW() WHERE id = $1",
            id,
            token,
            "forgot password token",
        )
        .await
    }

    async fn reset_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        self.update_text(
            r"
            UPDATE users
            SET forgot_password_token = '', password_hash = $2, updated_at = NOW()
            WHERE id = $1
            ",
            id,
            password_hash,
            "password",
        )
        .await
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        self.update_text(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
            id,
            password_hash,
            "password",
        )
        .await
    }

    async fn set_verify_status(&self, id: Uuid, verify: VerifyStatus) -> Result<bool> {
        self.update_text(
            "UPDATE users SET verify = $2, updated_at = NOW() WHERE id = $1",
            id,
            verify.as_str(),
            "verify status",
        )
        .await
    }
}

#[derive(Clone, Debug)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<()> {
        let query = r"
            INSERT INTO refresh_tokens (token, user_id, issued_at, expires_at)
            VALUES ($1, $2, $3, $4)
        ";
        sqlx::query(query)
            .bind(&record.token)
            .bind(record.user_id)
            .bind(record.issued_at)
            .bind(record.expires_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to insert refresh token")?;
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>> {
        let query =
            "SELECT token, user_id, issued_at, expires_at FROM refresh_tokens WHERE token = $1";
        let row = sqlx::query(query)
            .bind(token)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup refresh token")?;

        row.map(|row| -> Result<RefreshTokenRecord> {
            Ok(RefreshTokenRecord {
                token: row.try_get("token")?,
                user_id: row.try_get("user_id")?,
                issued_at: row.try_get("issued_at")?,
                expires_at: row.try_get("expires_at")?,
            })
        })
        .transpose()
    }

    async fn delete_by_token(&self, token: &str) -> Result<bool> {
        let query = "DELETE FROM refresh_tokens WHERE token = $1";
        let result = sqlx::query(query)
            .bind(token)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete refresh token")?;
        Ok(result.rows_affected() > 0)
    }
}
