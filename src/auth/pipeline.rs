//! Credential checks that run before a protected operation.
//!
//! Each check takes an [`IdentityContext`] and hands back an enriched copy, so
//! a handler composes exactly the checks its route needs and passes the result
//! forward. Nothing is stashed on a shared request object.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use super::error::AuthError;
use super::messages;
use super::token::{capitalize, TokenClass, TokenPayload, TokenSigner};
use super::validation::check_forgot_password_email;
use crate::store::{RefreshTokenStore, User, UserRepository};

/// A refresh token that passed signature and ledger checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub token: String,
    pub payload: TokenPayload,
    /// Expiry recorded in the ledger; rotation carries it over.
    pub expires_at: DateTime<Utc>,
}

/// Decoded credentials gathered for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityContext {
    authorization: Option<TokenPayload>,
    refresh: Option<RefreshGrant>,
    email_verify: Option<TokenPayload>,
    forgot_password: Option<TokenPayload>,
}

impl IdentityContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn authorization(&self) -> Option<&TokenPayload> {
        self.authorization.as_ref()
    }

    #[must_use]
    pub fn refresh(&self) -> Option<&RefreshGrant> {
        self.refresh.as_ref()
    }

    #[must_use]
    pub fn email_verify(&self) -> Option<&TokenPayload> {
        self.email_verify.as_ref()
    }

    #[must_use]
    pub fn forgot_password(&self) -> Option<&TokenPayload> {
        self.forgot_password.as_ref()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
#[must_use]
pub fn extract_bearer_token(value: Option<&str>) -> Option<&str> {
    let trimmed = value?.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[derive(Clone)]
pub struct CredentialPipeline {
    signer: Arc<TokenSigner>,
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
}

impl CredentialPipeline {
    #[must_use]
    pub fn new(
        signer: Arc<TokenSigner>,
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
    ) -> Self {
        Self {
            signer,
            users,
            refresh_tokens,
        }
    }

    /// Require a valid access token in an `Authorization` header value.
    ///
    /// # Errors
    /// `Unauthorized` when the header is missing, empty or the token fails
    /// verification.
    pub fn check_bearer(
        &self,
        mut ctx: IdentityContext,
        header: Option<&str>,
    ) -> Result<IdentityContext, AuthError> {
        let token = extract_bearer_token(header)
            .ok_or_else(|| AuthError::unauthorized(messages::ACCESS_TOKEN_IS_REQUIRED))?;
        let payload = self
            .signer
            .verify(TokenClass::Access, token)
            .map_err(|err| AuthError::unauthorized(capitalize(&err.to_string())))?;
        ctx.authorization = Some(payload);
        Ok(ctx)
    }

    /// Verify a refresh token and look it up in the ledger at the same time.
    ///
    /// # Errors
    /// `Unauthorized` for an empty, badly signed, expired or already redeemed
    /// token; `Internal` when the ledger cannot be read.
    pub async fn check_refresh(
        &self,
        mut ctx: IdentityContext,
        token: &str,
    ) -> Result<IdentityContext, AuthError> {
        if token.is_empty() {
            return Err(AuthError::unauthorized(messages::REFRESH_TOKEN_IS_REQUIRED));
        }

        let (verified, record) = tokio::join!(
            async { self.signer.verify(TokenClass::Refresh, token) },
            self.refresh_tokens.find_by_token(token)
        );
        let record = record?;

        let payload = verified.map_err(|err| {
            debug!("refresh token rejected: {err}");
            AuthError::unauthorized(messages::REFRESH_TOKEN_IS_INVALID)
        })?;
        let record = record
            .ok_or_else(|| AuthError::unauthorized(messages::USED_REFRESH_TOKEN_OR_NOT_EXIST))?;
        if record.user_id != payload.user_id {
            return Err(AuthError::unauthorized(messages::REFRESH_TOKEN_IS_INVALID));
        }

        ctx.refresh = Some(RefreshGrant {
            token: token.to_string(),
            payload,
            expires_at: record.expires_at,
        });
        Ok(ctx)
    }

    /// # Errors
    /// `Unauthorized` for an empty or badly signed token.
    pub fn check_email_verify(
        &self,
        mut ctx: IdentityContext,
        token: &str,
    ) -> Result<IdentityContext, AuthError> {
        if token.is_empty() {
            return Err(AuthError::unauthorized(
                messages::EMAIL_VERIFY_TOKEN_IS_REQUIRED,
            ));
        }
        let payload = self
            .signer
            .verify(TokenClass::EmailVerify, token)
            .map_err(|err| {
                debug!("email verify token rejected: {err}");
                AuthError::unauthorized(messages::EMAIL_VERIFY_TOKEN_IS_INVALID)
            })?;
        ctx.email_verify = Some(payload);
        Ok(ctx)
    }

    /// Accept a forgot-password token only while it is the one stored on the
    /// user; a later request or a completed reset retires it.
    ///
    /// # Errors
    /// `Unauthorized` for an empty, badly signed, superseded or orphaned token.
    pub async fn check_forgot_password(
        &self,
        mut ctx: IdentityContext,
        token: &str,
    ) -> Result<IdentityContext, AuthError> {
        if token.is_empty() {
            return Err(AuthError::unauthorized(
                messages::FORGOT_PASSWORD_TOKEN_IS_REQUIRED,
            ));
        }
        let payload = self
            .signer
            .verify(TokenClass::ForgotPassword, token)
            .map_err(|err| AuthError::unauthorized(capitalize(&err.to_string())))?;

        let user = self
            .users
            .find_by_id(payload.user_id)
            .await?
            .ok_or_else(|| AuthError::unauthorized(messages::USER_NOT_FOUND))?;
        if user.forgot_password_token != token {
            return Err(AuthError::unauthorized(
                messages::FORGOT_PASSWORD_TOKEN_IS_INCORRECT,
            ));
        }

        ctx.forgot_password = Some(payload);
        Ok(ctx)
    }

    /// Gate on the verify status snapshot carried by the access token.
    ///
    /// # Errors
    /// `Unauthorized` without a checked access token, `Forbidden` unless the
    /// snapshot is `Verified`.
    pub fn require_verified(&self, ctx: IdentityContext) -> Result<IdentityContext, AuthError> {
        let authorization = ctx
            .authorization
            .as_ref()
            .ok_or_else(|| AuthError::unauthorized(messages::ACCESS_TOKEN_IS_REQUIRED))?;
        if !authorization.verify.is_verified() {
            return Err(AuthError::forbidden(messages::USER_IS_NOT_VERIFIED));
        }
        Ok(ctx)
    }

    /// Resolve the account a password reset is requested for.
    ///
    /// # Errors
    /// `Validation` for a malformed email, `NotFound` for an unknown one.
    pub async fn check_account_email(&self, email: &str) -> Result<User, AuthError> {
        let email = check_forgot_password_email(email).map_err(AuthError::Validation)?;
        self.users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::not_found(messages::USER_NOT_FOUND))
    }
}
