//! In-process stores for local runs and tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EmailTaken, NewUser, RefreshTokenRecord, RefreshTokenStore, User, UserRepository};
use crate::auth::VerifyStatus;

#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    async fn update<F>(&self, id: Uuid, apply: F) -> bool
    where
        F: FnOnce(&mut User) + Send,
    {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                apply(user);
                user.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.email == user.email) {
            return Err(EmailTaken(user.email).into());
        }
        if users.contains_key(&user.id) {
            return Err(anyhow!("user id already exists: {}", user.id));
        }
        let user = user.into_user(Utc::now());
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .any(|user| user.email == email))
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) if user.verify == VerifyStatus::Unverified => {
                user.email_verify_token.clear();
                user.verify = VerifyStatus::Verified;
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_email_verify_token(&self, id: Uuid, token: &str) -> Result<bool> {
        let token = token.to_string();
        Ok(self
            .update(id, |user| user.email_verify_token = token)
            .await)
    }

    async fn set_forgot_password_token(&self, id: Uuid, token: &str) -> Result<bool> {
        let token = token.to_string();
        Ok(self
            .update(id, |user| user.forgot_password_token = token)
            .await)
    }

    async fn reset_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let password_hash = password_hash.to_string();
        Ok(self
            .update(id, |user| {
                user.forgot_password_token.clear();
                user.password_hash = password_hash;
            })
            .await)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let password_hash = password_hash.to_string();
        Ok(self
            .update(id, |user| user.password_hash = password_hash)
            .await)
    }

    async fn set_verify_status(&self, id: Uuid, verify: VerifyStatus) -> Result<bool> {
        Ok(self.update(id, |user| user.verify = verify).await)
    }
}

#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStore {
    records: RwLock<HashMap<String, RefreshTokenRecord>>,
}

impl MemoryRefreshTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Records currently held by `user_id`.
    pub async fn records_for(&self, user_id: Uuid) -> Vec<RefreshTokenRecord> {
        self.records
            .read()
            .await
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.token) {
            return Err(anyhow!("refresh token already recorded"));
        }
        records.insert(record.token.clone(), record);
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>> {
        Ok(self.records.read().await.get(token).cloned())
    }

    async fn delete_by_token(&self, token: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(token).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::default_username;
    use chrono::Duration;

    fn new_user(email: &str) -> NewUser {
        let id = Uuid::new_v4();
        NewUser {
            id,
            name: "a".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            date_of_birth: Utc::now(),
            username: default_username(id),
            email_verify_token: "verify".to_string(),
            verify: VerifyStatus::Unverified,
        }
    }

    #[tokio::test]
    async fn users_are_unique_by_email() -> Result<()> {
        let repo = MemoryUserRepository::new();
        let user = repo.insert(new_user("a@x.com")).await?;
        let taken = repo.insert(new_user("a@x.com")).await;
        assert!(taken.is_err_and(|err| err.is::<EmailTaken>()));
        assert!(repo.email_exists("a@x.com").await?);
        assert_eq!(repo.find_by_email("a@x.com").await?.map(|u| u.id), Some(user.id));
        assert_eq!(repo.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn writes_bump_updated_at() -> Result<()> {
        let repo = MemoryUserRepository::new();
        let user = repo.insert(new_user("a@x.com")).await?;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        assert!(repo.mark_email_verified(user.id).await?);
        let updated = repo.find_by_id(user.id).await?.ok_or_else(|| anyhow!("missing"))?;
        assert!(updated.email_verify_token.is_empty());
        assert_eq!(updated.verify, VerifyStatus::Verified);
        assert!(updated.updated_at > user.updated_at);

        assert!(repo.set_forgot_password_token(user.id, "reset").await?);
        assert!(repo.reset_password(user.id, "new-hash").await?);
        let updated = repo.find_by_id(user.id).await?.ok_or_else(|| anyhow!("missing"))?;
        assert!(updated.forgot_password_token.is_empty());
        assert_eq!(updated.password_hash, "new-hash");

        assert!(!repo.mark_email_verified(Uuid::new_v4()).await?);
        Ok(())
    }

    #[tokio::test]
    async fn email_verification_only_promotes_unverified() -> Result<()> {
        let repo = MemoryUserRepository::new();
        let user = repo.insert(new_user("a@x.com")).await?;
        assert!(repo.mark_email_verified(user.id).await?);
        assert!(!repo.mark_email_verified(user.id).await?);

        let banned = repo.insert(new_user("b@x.com")).await?;
        assert!(repo.set_verify_status(banned.id, VerifyStatus::Banned).await?);
        assert!(!repo.mark_email_verified(banned.id).await?);
        let stored = repo
            .find_by_id(banned.id)
            .await?
            .ok_or_else(|| anyhow!("missing"))?;
        assert_eq!(stored.verify, VerifyStatus::Banned);
        assert_eq!(stored.email_verify_token, "verify");
        Ok(())
    }

    #[tokio::test]
    async fn ledger_delete_reports_presence() -> Result<()> {
        let store = MemoryRefreshTokenStore::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        for token in ["one", "two"] {
            store
                .insert(RefreshTokenRecord {
                    token: token.to_string(),
                    user_id,
                    issued_at: now,
                    expires_at: now + Duration::days(1),
                })
                .await?;
        }
        assert_eq!(store.records_for(user_id).await.len(), 2);
        assert!(store.find_by_token("one").await?.is_some());
        assert!(store.delete_by_token("one").await?);
        assert!(!store.delete_by_token("one").await?);
        assert!(store.find_by_token("one").await?.is_none());
        assert_eq!(store.len().await, 1);
        Ok(())
    }
}
