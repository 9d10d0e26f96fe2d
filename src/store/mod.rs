//! Persistence for users and the refresh-token ledger.
//!
//! Each method is one atomic write or read; nothing spans two calls, so
//! callers composing several writes accept that a crash may land between them.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::VerifyStatus;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryRefreshTokenStore, MemoryUserRepository};
pub use postgres::{PgRefreshTokenStore, PgUserRepository};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub date_of_birth: DateTime<Utc>,
    pub username: String,
    pub bio: String,
    pub location: String,
    pub website: String,
    pub avatar: String,
    pub cover_photo: String,
    /// Empty once the email is verified.
    pub email_verify_token: String,
    /// Empty unless a reset is outstanding.
    pub forgot_password_token: String,
    pub verify: VerifyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a user; the rest start empty.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub date_of_birth: DateTime<Utc>,
    pub username: String,
    pub email_verify_token: String,
    pub verify: VerifyStatus,
}

impl NewUser {
    pub(crate) fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            date_of_birth: self.date_of_birth,
            username: self.username,
            bio: String::new(),
            location: String::new(),
            website: String::new(),
            avatar: String::new(),
            cover_photo: String::new(),
            email_verify_token: self.email_verify_token,
            forgot_password_token: String::new(),
            verify: self.verify,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Returned by [`UserRepository::insert`] when another account holds the email.
/// Callers find it with `anyhow::Error::is`.
#[derive(Debug, thiserror::Error)]
#[error("email already exists: {0}")]
pub struct EmailTaken(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token: String,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Default username for a fresh account.
#[must_use]
pub fn default_username(id: Uuid) -> String {
    format!("user{}", id.simple())
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; fails with [`EmailTaken`] if the email is taken.
    async fn insert(&self, user: NewUser) -> Result<User>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn email_exists(&self, email: &str) -> Result<bool>;

    /// Clear `email_verify_token` and set `verify = Verified`, only while the
    /// user is `Unverified`. Returns `false` when nothing was promoted.
    async fn mark_email_verified(&self, id: Uuid) -> Result<bool>;

    async fn set_email_verify_token(&self, id: Uuid, token: &str) -> Result<bool>;

    /// Overwrite the outstanding forgot-password token.
    async fn set_forgot_password_token(&self, id: Uuid, token: &str) -> Result<bool>;

    /// Store a new hash and clear `forgot_password_token`.
    async fn reset_password(&self, id: Uuid, password_hash: &str) -> Result<bool>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool>;

    /// Administrative status change, e.g. banning an account.
    async fn set_verify_status(&self, id: Uuid, verify: VerifyStatus) -> Result<bool>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<()>;

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>>;

    /// Returns `true` when a record was removed.
    async fn delete_by_token(&self, token: &str) -> Result<bool>;
}
