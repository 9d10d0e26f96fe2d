//! Credential lifecycle operations.
//!
//! `AuthService` owns the signer and the store handles and exposes one method
//! per lifecycle step. Credential checks happen earlier in the
//! [`CredentialPipeline`]; methods taking a `user_id` trust that it came from a
//! checked token.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::config::AuthConfig;
use super::error::AuthError;
use super::messages;
use super::notify::{EmailMessage, LogNotifier, Notifier};
use super::oauth::IdentityProvider;
use super::password::{generate_throwaway_password, hash_password, verify_password};
use super::pipeline::CredentialPipeline;
use super::token::{TokenClass, TokenSigner};
use super::types::{
    ChangePasswordRequest, LoginRequest, MessageResponse, OAuthOutcome, RegisterRequest,
    ResendOutcome, TokenPair, VerifyEmailOutcome,
};
use super::validation::{
    check_change_password, check_login, check_registration, normalize_email, valid_email,
    Registration,
};
use super::verify_status::{Banned, EmailTransition, VerifyStatus};
use crate::store::{
    default_username, EmailTaken, NewUser, RefreshTokenRecord, RefreshTokenStore, User, UserRepository,
};

/// A signed access/refresh pair plus the ledger row for the refresh half.
struct IssuedPair {
    tokens: TokenPair,
    record: RefreshTokenRecord,
}

#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    signer: Arc<TokenSigner>,
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    notifier: Arc<dyn Notifier>,
    identity_provider: Option<Arc<dyn IdentityProvider>>,
}

impl AuthService {
    /// Notifications go to [`LogNotifier`] until another notifier is set.
    #[must_use]
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
    ) -> Self {
        let signer = Arc::new(TokenSigner::new(&config));
        Self {
            config,
            signer,
            users,
            refresh_tokens,
            notifier: Arc::new(LogNotifier),
            identity_provider: None,
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity_provider = Some(provider);
        self
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn signer(&self) -> &Arc<TokenSigner> {
        &self.signer
    }

    /// Pipeline sharing this service's signer and stores.
    #[must_use]
    pub fn pipeline(&self) -> CredentialPipeline {
        CredentialPipeline::new(
            self.signer.clone(),
            self.users.clone(),
            self.refresh_tokens.clone(),
        )
    }

    fn sign_pair(&self, user_id: Uuid, verify: VerifyStatus) -> Result<IssuedPair, AuthError> {
        let access_token = self.signer.sign(TokenClass::Access, user_id, verify)?;
        let refresh = self.signer.issue(TokenClass::Refresh, user_id, verify)?;
        Ok(IssuedPair {
            record: RefreshTokenRecord {
                token: refresh.token.clone(),
                user_id,
                issued_at: refresh.payload.issued_at(),
                expires_at: refresh.payload.expires_at(),
            },
            tokens: TokenPair {
                access_token,
                refresh_token: refresh.token,
            },
        })
    }

    async fn persist_pair(&self, pair: IssuedPair) -> Result<TokenPair, AuthError> {
        self.refresh_tokens.insert(pair.record).await?;
        Ok(pair.tokens)
    }

    /// Hand a message to the notifier. Delivery problems are logged, never
    /// surfaced: the lifecycle step already happened.
    fn dispatch(&self, message: &EmailMessage) {
        if let Err(err) = self.notifier.send(message) {
            warn!(
                to_email = %message.to_email,
                template = %message.template,
                "failed to dispatch notification: {err:#}"
            );
        }
    }

    async fn find_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::not_found(messages::USER_NOT_FOUND))
    }

    /// Validate a registration and create the account.
    ///
    /// # Errors
    /// `Validation` with every failing field, including a taken email.
    #[instrument(skip_all)]
    pub async fn register(&self, request: &RegisterRequest) -> Result<TokenPair, AuthError> {
        let checked = check_registration(request);
        let email = normalize_email(&request.email);
        // Storage failures here are not field errors; `?` returns them as is.
        let taken = valid_email(&email) && self.users.email_exists(&email).await?;

        let registration = match checked {
            Ok(registration) if !taken => registration,
            Ok(_) => {
                return Err(AuthError::invalid_field(
                    "email",
                    messages::EMAIL_ALREADY_EXISTS,
                ))
            }
            Err(mut errors) => {
                if taken {
                    errors.push("email", messages::EMAIL_ALREADY_EXISTS);
                }
                return Err(AuthError::Validation(errors));
            }
        };

        self.create_account(registration).await
    }

    /// Persist a new unverified user and issue its first session.
    async fn create_account(&self, registration: Registration) -> Result<TokenPair, AuthError> {
        let user_id = Uuid::new_v4();
        let email_verify_token =
            self.signer
                .sign(TokenClass::EmailVerify, user_id, VerifyStatus::Unverified)?;
        let password_hash = hash_password(&registration.password).await?;

        let new_user = NewUser {
            id: user_id,
            name: registration.name,
            email: registration.email,
            password_hash,
            date_of_birth: registration.date_of_birth,
            username: default_username(user_id),
            email_verify_token: email_verify_token.clone(),
            verify: VerifyStatus::Unverified,
        };

        let (user, pair) = tokio::try_join!(
            async { self.users.insert(new_user).await.map_err(insert_error) },
            async { self.sign_pair(user_id, VerifyStatus::Unverified) },
        )?;
        let tokens = self.persist_pair(pair).await?;

        self.dispatch(&EmailMessage::verify_email(
            &user.email,
            self.config.frontend_base_url(),
            &email_verify_token,
        ));
        info!(user_id = %user.id, "user registered");

        Ok(tokens)
    }

    /// Resolve login credentials to a user.
    ///
    /// # Errors
    /// `Validation` for missing fields, `Unauthorized` for an unknown email or
    /// a wrong password.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, request: &LoginRequest) -> Result<User, AuthError> {
        let email = check_login(request).map_err(AuthError::Validation)?;
        let incorrect = || AuthError::unauthorized(messages::EMAIL_OR_PASSWORD_IS_INCORRECT);

        let user = self.users.find_by_email(&email).await?.ok_or_else(incorrect)?;
        if !verify_password(&request.password, &user.password_hash).await? {
            return Err(incorrect());
        }
        Ok(user)
    }

    /// Issue a fresh session for an authenticated user.
    ///
    /// # Errors
    /// `Internal` when signing or the ledger write fails.
    #[instrument(skip(self))]
    pub async fn login(&self, user_id: Uuid, verify: VerifyStatus) -> Result<TokenPair, AuthError> {
        let pair = self.sign_pair(user_id, verify)?;
        self.persist_pair(pair).await
    }

    /// Drop a refresh token from the ledger. Unknown tokens are a no-op.
    ///
    /// # Errors
    /// `Internal` when the ledger write fails.
    #[instrument(skip_all)]
    pub async fn logout(&self, refresh_token: &str) -> Result<MessageResponse, AuthError> {
        self.refresh_tokens.delete_by_token(refresh_token).await?;
        Ok(MessageResponse::new(messages::LOGOUT_SUCCESS))
    }

    /// Rotate a refresh token.
    ///
    /// The old ledger row goes first; the new refresh token inherits
    /// `old_expiry`, so rotation never extends a session.
    ///
    /// # Errors
    /// `Unauthorized` when the old token was already redeemed.
    #[instrument(skip(self, old_refresh_token))]
    pub async fn refresh(
        &self,
        user_id: Uuid,
        verify: VerifyStatus,
        old_refresh_token: &str,
        old_expiry: DateTime<Utc>,
    ) -> Result<TokenPair, AuthError> {
        if !self.refresh_tokens.delete_by_token(old_refresh_token).await? {
            return Err(AuthError::unauthorized(
                messages::USED_REFRESH_TOKEN_OR_NOT_EXIST,
            ));
        }

        let access_token = self.signer.sign(TokenClass::Access, user_id, verify)?;
        let refresh =
            self.signer
                .issue_with_expiry(TokenClass::Refresh, user_id, verify, old_expiry)?;
        let pair = IssuedPair {
            record: RefreshTokenRecord {
                token: refresh.token.clone(),
                user_id,
                issued_at: refresh.payload.issued_at(),
                expires_at: refresh.payload.expires_at(),
            },
            tokens: TokenPair {
                access_token,
                refresh_token: refresh.token,
            },
        };
        self.persist_pair(pair).await
    }

    /// Mark the email verified and issue a session reflecting it.
    ///
    /// The write only promotes an `Unverified` user, so a concurrent
    /// confirmation or a ban landing after the caller's read is seen here.
    ///
    /// # Errors
    /// `NotFound` when the user vanished, `Forbidden` when it is banned.
    #[instrument(skip(self))]
    pub async fn verify_email(&self, user_id: Uuid) -> Result<VerifyEmailOutcome, AuthError> {
        let (promoted, pair) = tokio::try_join!(
            async {
                self.users
                    .mark_email_verified(user_id)
                    .await
                    .map_err(AuthError::from)
            },
            async { self.sign_pair(user_id, VerifyStatus::Verified) },
        )?;
        if !promoted {
            // The pair is dropped unrecorded; decide from the current row.
            let user = self.find_user(user_id).await?;
            return match user.verify {
                VerifyStatus::Banned => Err(AuthError::forbidden(messages::USER_IS_BANNED)),
                VerifyStatus::Verified => Ok(VerifyEmailOutcome::AlreadyVerified),
                VerifyStatus::Unverified => Err(AuthError::Internal(anyhow!(
                    "email verification for {user_id} did not apply"
                ))),
            };
        }
        let tokens = self.persist_pair(pair).await?;
        info!(user_id = %user_id, "email verified");
        Ok(VerifyEmailOutcome::Verified(tokens))
    }

    /// Apply a checked email-verify token to its account.
    ///
    /// # Errors
    /// `NotFound` for a missing user, `Forbidden` for a banned one and
    /// `Unauthorized` when the token is not the one stored on the user.
    #[instrument(skip(self, presented_token))]
    pub async fn confirm_email(
        &self,
        user_id: Uuid,
        presented_token: &str,
    ) -> Result<VerifyEmailOutcome, AuthError> {
        let user = self.find_user(user_id).await?;
        match user.verify.confirm_email() {
            Err(Banned) => Err(AuthError::forbidden(messages::USER_IS_BANNED)),
            Ok(EmailTransition::AlreadyVerified) => Ok(VerifyEmailOutcome::AlreadyVerified),
            Ok(EmailTransition::Promote) => {
                if user.email_verify_token != presented_token {
                    return Err(AuthError::unauthorized(
                        messages::EMAIL_VERIFY_TOKEN_IS_INCORRECT,
                    ));
                }
                self.verify_email(user_id).await
            }
        }
    }

    /// Issue and send a new email-verify token.
    ///
    /// # Errors
    /// `NotFound` for a missing user; `Forbidden` for a banned one while
    /// banned resends are blocked.
    #[instrument(skip(self))]
    pub async fn resend_email_verify(&self, user_id: Uuid) -> Result<ResendOutcome, AuthError> {
        let user = self.find_user(user_id).await?;
        match user.verify.confirm_email() {
            Ok(EmailTransition::AlreadyVerified) => return Ok(ResendOutcome::AlreadyVerified),
            Err(Banned) if self.config.block_banned_resend() => {
                return Err(AuthError::forbidden(messages::USER_IS_BANNED));
            }
            Err(Banned) | Ok(EmailTransition::Promote) => {}
        }

        let token = self
            .signer
            .sign(TokenClass::EmailVerify, user_id, user.verify)?;
        if !self.users.set_email_verify_token(user_id, &token).await? {
            return Err(AuthError::not_found(messages::USER_NOT_FOUND));
        }
        self.dispatch(&EmailMessage::verify_email(
            &user.email,
            self.config.frontend_base_url(),
            &token,
        ));
        Ok(ResendOutcome::Sent)
    }

    /// Issue a forgot-password token, replacing any outstanding one.
    ///
    /// # Errors
    /// `NotFound` for a missing user.
    #[instrument(skip(self))]
    pub async fn forgot_password(
        &self,
        user_id: Uuid,
        verify: VerifyStatus,
    ) -> Result<MessageResponse, AuthError> {
        let user = self.find_user(user_id).await?;
        let token = self
            .signer
            .sign(TokenClass::ForgotPassword, user_id, verify)?;
        if !self.users.set_forgot_password_token(user_id, &token).await? {
            return Err(AuthError::not_found(messages::USER_NOT_FOUND));
        }
        self.dispatch(&EmailMessage::reset_password(
            &user.email,
            self.config.frontend_base_url(),
            &token,
        ));
        Ok(MessageResponse::new(messages::CHECK_EMAIL_TO_RESET_PASSWORD))
    }

    /// Store a new password and retire the forgot-password token. Issues no
    /// session; the user logs in again.
    ///
    /// # Errors
    /// `NotFound` for a missing user.
    #[instrument(skip(self, new_password))]
    pub async fn reset_password(
        &self,
        user_id: Uuid,
        new_password: &str,
    ) -> Result<MessageResponse, AuthError> {
        let password_hash = hash_password(new_password).await?;
        if !self.users.reset_password(user_id, &password_hash).await? {
            return Err(AuthError::not_found(messages::USER_NOT_FOUND));
        }
        Ok(MessageResponse::new(messages::RESET_PASSWORD_SUCCESS))
    }

    /// Replace the password of a signed-in, verified user.
    ///
    /// # Errors
    /// `Validation` for bad input or a wrong old password, `NotFound` for a
    /// missing user.
    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: &ChangePasswordRequest,
    ) -> Result<MessageResponse, AuthError> {
        check_change_password(request).map_err(AuthError::Validation)?;
        let user = self.find_user(user_id).await?;
        if !verify_password(&request.old_password, &user.password_hash).await? {
            return Err(AuthError::invalid_field(
                "old_password",
                messages::OLD_PASSWORD_NOT_MATCH,
            ));
        }
        let password_hash = hash_password(&request.password).await?;
        if !self.users.update_password(user_id, &password_hash).await? {
            return Err(AuthError::not_found(messages::USER_NOT_FOUND));
        }
        Ok(MessageResponse::new(messages::CHANGE_PASSWORD_SUCCESS))
    }

    /// Sign in through the identity provider, creating the account on first
    /// sight of a provider-verified email.
    ///
    /// # Errors
    /// `Upstream` when the provider is missing or fails, `UpstreamRejected`
    /// when it reports the email as unverified.
    #[instrument(skip_all)]
    pub async fn oauth(&self, code: &str) -> Result<OAuthOutcome, AuthError> {
        let provider = self
            .identity_provider
            .as_ref()
            .ok_or_else(|| AuthError::Upstream(messages::OAUTH_NOT_CONFIGURED.to_string()))?;
        if code.trim().is_empty() {
            return Err(AuthError::invalid_field(
                "code",
                messages::OAUTH_CODE_IS_REQUIRED,
            ));
        }

        let tokens = provider
            .exchange_code(code)
            .await
            .map_err(|err| AuthError::Upstream(format!("{err:#}")))?;
        let profile = provider
            .fetch_profile(&tokens)
            .await
            .map_err(|err| AuthError::Upstream(format!("{err:#}")))?;
        if !profile.email_verified {
            return Err(AuthError::UpstreamRejected(
                messages::GMAIL_NOT_VERIFIED.to_string(),
            ));
        }

        let email = normalize_email(&profile.email);
        if let Some(outcome) = self.oauth_sign_in(&email).await? {
            return Ok(outcome);
        }

        let name = match profile.name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            name => name.to_string(),
        };
        let created = self
            .create_account(Registration {
                name,
                email: email.clone(),
                password: generate_throwaway_password(),
                date_of_birth: Utc::now(),
            })
            .await;
        match created {
            Ok(tokens) => Ok(OAuthOutcome {
                tokens,
                new_user: true,
                verify: VerifyStatus::Unverified,
            }),
            // Another sign-up claimed the email first; sign in to that account.
            Err(AuthError::Validation(_)) => self
                .oauth_sign_in(&email)
                .await?
                .ok_or_else(|| AuthError::not_found(messages::USER_NOT_FOUND)),
            Err(err) => Err(err),
        }
    }

    async fn oauth_sign_in(&self, email: &str) -> Result<Option<OAuthOutcome>, AuthError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            return Ok(None);
        };
        let tokens = self.login(user.id, user.verify).await?;
        Ok(Some(OAuthOutcome {
            tokens,
            new_user: false,
            verify: user.verify,
        }))
    }
}

/// A taken email is a field error even when it slipped past the up-front check.
fn insert_error(err: anyhow::Error) -> AuthError {
    if err.is::<EmailTaken>() {
        AuthError::invalid_field("email", messages::EMAIL_ALREADY_EXISTS)
    } else {
        AuthError::from(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::test_config;
    use crate::auth::notify::{MemoryNotifier, VERIFY_EMAIL_TEMPLATE};
    use crate::store::{MemoryRefreshTokenStore, MemoryUserRepository};
    use anyhow::{anyhow, Result};

    struct Fixture {
        service: AuthService,
        users: Arc<MemoryUserRepository>,
        ledger: Arc<MemoryRefreshTokenStore>,
        notifier: Arc<MemoryNotifier>,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserRepository::new());
        let ledger = Arc::new(MemoryRefreshTokenStore::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let service = AuthService::new(test_config(), users.clone(), ledger.clone())
            .with_notifier(notifier.clone());
        Fixture {
            service,
            users,
            ledger,
            notifier,
        }
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: None,
            email: email.to_string(),
            password: "Abcdef1!".to_string(),
            confirm_password: "Abcdef1!".to_string(),
            date_of_birth: "1999-01-01".to_string(),
        }
    }

    async fn registered(f: &Fixture, email: &str) -> Result<User> {
        f.service.register(&register_request(email)).await?;
        f.users
            .find_by_email(email)
            .await?
            .ok_or_else(|| anyhow!("user not stored"))
    }

    #[tokio::test]
    async fn register_rejects_taken_email() -> Result<()> {
        let f = fixture();
        registered(&f, "a@x.com").await?;
        let err = f.service.register(&register_request("A@X.com")).await;
        match err {
            Err(AuthError::Validation(errors)) => {
                assert_eq!(errors.get("email"), Some(messages::EMAIL_ALREADY_EXISTS));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(f.users.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn register_aggregates_taken_email_with_other_errors() -> Result<()> {
        let f = fixture();
        registered(&f, "a@x.com").await?;
        let request = RegisterRequest {
            password: "weak".to_string(),
            ..register_request("a@x.com")
        };
        let Err(AuthError::Validation(errors)) = f.service.register(&request).await else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("email"), Some(messages::EMAIL_ALREADY_EXISTS));
        assert_eq!(errors.get("password"), Some(messages::PASSWORD_LENGTH));
        Ok(())
    }

    #[tokio::test]
    async fn register_sends_stored_verify_token() -> Result<()> {
        let f = fixture();
        let user = registered(&f, "a@x.com").await?;
        let message = f
            .notifier
            .last("a@x.com", VERIFY_EMAIL_TEMPLATE)
            .ok_or_else(|| anyhow!("no verify email"))?;
        assert_eq!(message.token, user.email_verify_token);
        assert_eq!(user.name, "a");
        assert_ne!(user.password_hash, "Abcdef1!");
        Ok(())
    }

    #[tokio::test]
    async fn authenticate_checks_password() -> Result<()> {
        let f = fixture();
        let user = registered(&f, "a@x.com").await?;

        let found = f
            .service
            .authenticate(&LoginRequest {
                email: "A@x.com ".to_string(),
                password: "Abcdef1!".to_string(),
            })
            .await?;
        assert_eq!(found.id, user.id);

        for (email, password) in [("a@x.com", "Wrong1!x"), ("b@x.com", "Abcdef1!")] {
            let result = f
                .service
                .authenticate(&LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                })
                .await;
            assert!(matches!(
                result,
                Err(AuthError::Unauthorized(message)) if message == messages::EMAIL_OR_PASSWORD_IS_INCORRECT
            ));
        }
        Ok(())
    }

    #[tokio::test]
    async fn login_adds_a_ledger_row_per_device() -> Result<()> {
        let f = fixture();
        let user = registered(&f, "a@x.com").await?;
        f.service.login(user.id, user.verify).await?;
        f.service.login(user.id, user.verify).await?;
        assert_eq!(f.ledger.records_for(user.id).await.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn logout_is_idempotent() -> Result<()> {
        let f = fixture();
        let user = registered(&f, "a@x.com").await?;
        let pair = f.service.login(user.id, user.verify).await?;
        let first = f.service.logout(&pair.refresh_token).await?;
        let second = f.service.logout(&pair.refresh_token).await?;
        assert_eq!(first, second);
        assert_eq!(f.ledger.records_for(user.id).await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_refuses_redeemed_token() -> Result<()> {
        let f = fixture();
        let user = registered(&f, "a@x.com").await?;
        let pair = f.service.login(user.id, user.verify).await?;
        let expiry = Utc::now() + chrono::Duration::days(1);

        f.service
            .refresh(user.id, user.verify, &pair.refresh_token, expiry)
            .await?;
        let again = f
            .service
            .refresh(user.id, user.verify, &pair.refresh_token, expiry)
            .await;
        assert!(matches!(again, Err(AuthError::Unauthorized(_))));
        Ok(())
    }

    #[tokio::test]
    async fn confirm_email_paths() -> Result<()> {
        let f = fixture();
        let user = registered(&f, "a@x.com").await?;

        let wrong = f.service.confirm_email(user.id, "not-the-token").await;
        assert!(matches!(
            wrong,
            Err(AuthError::Unauthorized(message)) if message == messages::EMAIL_VERIFY_TOKEN_IS_INCORRECT
        ));

        let outcome = f
            .service
            .confirm_email(user.id, &user.email_verify_token)
            .await?;
        assert!(matches!(outcome, VerifyEmailOutcome::Verified(_)));

        let outcome = f
            .service
            .confirm_email(user.id, &user.email_verify_token)
            .await?;
        assert_eq!(outcome, VerifyEmailOutcome::AlreadyVerified);

        let missing = f.service.confirm_email(Uuid::new_v4(), "x").await;
        assert!(matches!(missing, Err(AuthError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn verify_email_never_lifts_a_ban() -> Result<()> {
        let f = fixture();
        let user = registered(&f, "a@x.com").await?;
        f.users.set_verify_status(user.id, VerifyStatus::Banned).await?;

        let outcome = f.service.verify_email(user.id).await;
        assert!(matches!(
            outcome,
            Err(AuthError::Forbidden(message)) if message == messages::USER_IS_BANNED
        ));
        let stored = f
            .users
            .find_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow!("missing"))?;
        assert_eq!(stored.verify, VerifyStatus::Banned);
        assert_eq!(f.ledger.records_for(user.id).await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_verification_promotes_once() -> Result<()> {
        let f = fixture();
        let user = registered(&f, "a@x.com").await?;

        let (first, second) = tokio::join!(
            f.service.verify_email(user.id),
            f.service.verify_email(user.id)
        );
        let outcomes = [first?, second?];
        let promoted = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, VerifyEmailOutcome::Verified(_)))
            .count();
        assert_eq!(promoted, 1);
        assert!(outcomes.contains(&VerifyEmailOutcome::AlreadyVerified));
        // Registration row plus the single verified session.
        assert_eq!(f.ledger.records_for(user.id).await.len(), 2);

        let missing = f.service.verify_email(Uuid::new_v4()).await;
        assert!(matches!(missing, Err(AuthError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn banned_accounts() -> Result<()> {
        let f = fixture();
        let user = registered(&f, "a@x.com").await?;
        f.users.set_verify_status(user.id, VerifyStatus::Banned).await?;

        let confirm = f
            .service
            .confirm_email(user.id, &user.email_verify_token)
            .await;
        assert!(matches!(confirm, Err(AuthError::Forbidden(_))));

        let resend = f.service.resend_email_verify(user.id).await;
        assert!(matches!(
            resend,
            Err(AuthError::Forbidden(message)) if message == messages::USER_IS_BANNED
        ));

        let lenient = AuthService::new(
            test_config().with_block_banned_resend(false),
            f.users.clone(),
            f.ledger.clone(),
        );
        assert_eq!(
            lenient.resend_email_verify(user.id).await?,
            ResendOutcome::Sent
        );
        Ok(())
    }

    #[tokio::test]
    async fn resend_replaces_verify_token() -> Result<()> {
        let f = fixture();
        let user = registered(&f, "a@x.com").await?;
        assert_eq!(
            f.service.resend_email_verify(user.id).await?,
            ResendOutcome::Sent
        );
        let updated = f
            .users
            .find_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow!("missing"))?;
        assert_ne!(updated.email_verify_token, user.email_verify_token);

        let message = f
            .notifier
            .last("a@x.com", VERIFY_EMAIL_TEMPLATE)
            .ok_or_else(|| anyhow!("no verify email"))?;
        assert_eq!(message.token, updated.email_verify_token);

        f.service.verify_email(user.id).await?;
        assert_eq!(
            f.service.resend_email_verify(user.id).await?,
            ResendOutcome::AlreadyVerified
        );
        Ok(())
    }

    #[tokio::test]
    async fn change_password_requires_old_password() -> Result<()> {
        let f = fixture();
        let user = registered(&f, "a@x.com").await?;
        let wrong = f
            .service
            .change_password(
                user.id,
                &ChangePasswordRequest {
                    old_password: "Nope123!".to_string(),
                    password: "Newpass1!".to_string(),
                    confirm_password: "Newpass1!".to_string(),
                },
            )
            .await;
        match wrong {
            Err(AuthError::Validation(errors)) => {
                assert_eq!(
                    errors.get("old_password"),
                    Some(messages::OLD_PASSWORD_NOT_MATCH)
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }

        f.service
            .change_password(
                user.id,
                &ChangePasswordRequest {
                    old_password: "Abcdef1!".to_string(),
                    password: "Newpass1!".to_string(),
                    confirm_password: "Newpass1!".to_string(),
                },
            )
            .await?;
        let updated = f
            .users
            .find_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow!("missing"))?;
        assert!(verify_password("Newpass1!", &updated.password_hash).await?);
        Ok(())
    }

    #[tokio::test]
    async fn oauth_without_provider_is_upstream_error() {
        let f = fixture();
        let result = f.service.oauth("code").await;
        assert!(matches!(
            result,
            Err(AuthError::Upstream(message)) if message == messages::OAUTH_NOT_CONFIGURED
        ));
    }
}
