//! Compact HS256 tokens for the four credential classes.
//!
//! Every class has its own HMAC key and lifetime, so a leaked forgot-password
//! secret cannot mint access tokens. Tokens are `header.payload.signature`,
//! each part unpadded base64url.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use ulid::Ulid;
use utoipa::ToSchema;
use uuid::Uuid;

use super::config::AuthConfig;
use super::verify_status::VerifyStatus;

type HmacSha256 = Hmac<Sha256>;

const ALG: &str = "HS256";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
    Access,
    Refresh,
    EmailVerify,
    ForgotPassword,
}

impl TokenClass {
    pub const ALL: [Self; 4] = [
        Self::Access,
        Self::Refresh,
        Self::EmailVerify,
        Self::ForgotPassword,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::EmailVerify => "email verify",
            Self::ForgotPassword => "forgot password",
        }
    }
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALG.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims carried by every token class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPayload {
    pub user_id: Uuid,
    pub token_type: TokenClass,
    pub verify: VerifyStatus,
    pub iat: i64,
    pub exp: i64,
    /// Unique per issued token; two tokens signed in the same second differ.
    pub jti: String,
}

impl TokenPayload {
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_default()
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

/// A freshly signed token together with its claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    pub token: String,
    pub payload: TokenPayload,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid token type")]
    WrongTokenType,
    /// `Hmac::new_from_slice` is fallible in signature only; HMAC takes keys
    /// of any length, so this is never produced with the current `hmac`.
    #[error("invalid signing key")]
    Key,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[must_use]
pub fn now_unix_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Signs and verifies tokens with the per-class keys from [`AuthConfig`].
#[derive(Clone, Debug)]
pub struct TokenSigner {
    config: AuthConfig,
}

impl TokenSigner {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn mac(&self, class: TokenClass) -> Result<HmacSha256, Error> {
        let secret = self.config.class(class).secret().expose_secret();
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| Error::Key)
    }

    /// Sign a token whose lifetime is the configured TTL of `class`.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn sign(
        &self,
        class: TokenClass,
        user_id: Uuid,
        verify: VerifyStatus,
    ) -> Result<String, Error> {
        self.issue(class, user_id, verify).map(|signed| signed.token)
    }

    /// Like [`TokenSigner::sign`] but also returns the claims that were signed.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue(
        &self,
        class: TokenClass,
        user_id: Uuid,
        verify: VerifyStatus,
    ) -> Result<SignedToken, Error> {
        let now = now_unix_seconds();
        let exp = now + self.config.class(class).ttl_seconds();
        self.sign_claims(class, user_id, verify, now, exp)
    }

    /// Sign a token that expires at an absolute instant instead of `now + ttl`.
    ///
    /// Refresh rotation uses this so a rotated token keeps the lifetime of the
    /// one it replaces.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue_with_expiry(
        &self,
        class: TokenClass,
        user_id: Uuid,
        verify: VerifyStatus,
        expires_at: DateTime<Utc>,
    ) -> Result<SignedToken, Error> {
        self.sign_claims(
            class,
            user_id,
            verify,
            now_unix_seconds(),
            expires_at.timestamp(),
        )
    }

    fn sign_claims(
        &self,
        class: TokenClass,
        user_id: Uuid,
        verify: VerifyStatus,
        iat: i64,
        exp: i64,
    ) -> Result<SignedToken, Error> {
        let payload = TokenPayload {
            user_id,
            token_type: class,
            verify,
            iat,
            exp,
            jti: Ulid::new().to_string(),
        };
        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let payload_b64 = b64e_json(&payload)?;
        let signing_input = format!("{header_b64}.{payload_b64}");

        let mut mac = self.mac(class)?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

        Ok(SignedToken {
            token: format!("{signing_input}.{signature_b64}"),
            payload,
        })
    }

    /// Verify a token against the key of `class` and return its claims.
    ///
    /// # Errors
    /// Returns an error if the token is malformed, signed with another key,
    /// issued for another class, or expired.
    pub fn verify(&self, class: TokenClass, token: &str) -> Result<TokenPayload, Error> {
        self.verify_at(class, token, now_unix_seconds())
    }

    /// [`TokenSigner::verify`] against an explicit clock.
    ///
    /// # Errors
    /// Same as [`TokenSigner::verify`].
    pub fn verify_at(
        &self,
        class: TokenClass,
        token: &str,
        now_unix_seconds: i64,
    ) -> Result<TokenPayload, Error> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
        let payload_b64 = parts.next().ok_or(Error::TokenFormat)?;
        let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
        if parts.next().is_some() {
            return Err(Error::TokenFormat);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != ALG {
            return Err(Error::UnsupportedAlg(header.alg));
        }

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
        let mut mac = self.mac(class)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| Error::InvalidSignature)?;

        let payload: TokenPayload = b64d_json(payload_b64)?;
        if payload.token_type != class {
            return Err(Error::WrongTokenType);
        }
        if payload.exp <= now_unix_seconds {
            return Err(Error::Expired);
        }

        Ok(payload)
    }
}

/// Uppercase the first character, used to surface verification failures.
#[must_use]
pub fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::test_config;
    use secrecy::SecretString;

    fn signer() -> TokenSigner {
        TokenSigner::new(&test_config())
    }

    #[test]
    fn sign_and_verify_each_class() -> Result<(), Error> {
        let signer = signer();
        let user_id = Uuid::new_v4();
        for class in TokenClass::ALL {
            let token = signer.sign(class, user_id, VerifyStatus::Verified)?;
            let payload = signer.verify(class, &token)?;
            assert_eq!(payload.user_id, user_id);
            assert_eq!(payload.token_type, class);
            assert_eq!(payload.verify, VerifyStatus::Verified);
            assert_eq!(
                payload.exp - payload.iat,
                test_config().class(class).ttl_seconds()
            );
        }
        Ok(())
    }

    #[test]
    fn rejects_token_from_another_class() -> Result<(), Error> {
        let signer = signer();
        let token = signer.sign(
            TokenClass::Refresh,
            Uuid::new_v4(),
            VerifyStatus::Unverified,
        )?;
        let result = signer.verify(TokenClass::Access, &token);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn secrets_of_any_length_sign() -> Result<(), Error> {
        let long = "k".repeat(300);
        let config = test_config()
            .with_secret(TokenClass::Access, SecretString::from("a"))
            .with_secret(TokenClass::Refresh, SecretString::from(long));
        let signer = TokenSigner::new(&config);
        let user_id = Uuid::new_v4();
        for class in [TokenClass::Access, TokenClass::Refresh] {
            let token = signer.sign(class, user_id, VerifyStatus::Verified)?;
            assert_eq!(signer.verify(class, &token)?.user_id, user_id);
        }
        Ok(())
    }

    #[test]
    fn rejects_matching_secret_with_wrong_class() -> Result<(), Error> {
        let config = test_config().with_secret(
            TokenClass::EmailVerify,
            SecretString::from("access-secret"),
        );
        let signer = TokenSigner::new(&config);
        let token = signer.sign(
            TokenClass::EmailVerify,
            Uuid::new_v4(),
            VerifyStatus::Unverified,
        )?;
        let result = signer.verify(TokenClass::Access, &token);
        assert!(matches!(result, Err(Error::WrongTokenType)));
        Ok(())
    }

    #[test]
    fn rejects_expired() -> Result<(), Error> {
        let signer = signer();
        let token = signer.sign(TokenClass::Access, Uuid::new_v4(), VerifyStatus::Verified)?;
        let far_future = now_unix_seconds() + 10 * 365 * 24 * 60 * 60;
        let result = signer.verify_at(TokenClass::Access, &token, far_future);
        assert!(matches!(result, Err(Error::Expired)));
        Ok(())
    }

    #[test]
    fn explicit_expiry_is_kept() -> Result<(), Error> {
        let signer = signer();
        let expires_at = Utc::now() + chrono::Duration::hours(3);
        let signed = signer.issue_with_expiry(
            TokenClass::Refresh,
            Uuid::new_v4(),
            VerifyStatus::Unverified,
            expires_at,
        )?;
        let payload = signer.verify(TokenClass::Refresh, &signed.token)?;
        assert_eq!(payload, signed.payload);
        assert_eq!(payload.exp, expires_at.timestamp());
        Ok(())
    }

    #[test]
    fn same_second_tokens_differ() -> Result<(), Error> {
        let signer = signer();
        let user_id = Uuid::new_v4();
        let expires_at = Utc::now() + chrono::Duration::hours(1);
        let first = signer.issue_with_expiry(
            TokenClass::Refresh,
            user_id,
            VerifyStatus::Verified,
            expires_at,
        )?;
        let second = signer.issue_with_expiry(
            TokenClass::Refresh,
            user_id,
            VerifyStatus::Verified,
            expires_at,
        )?;
        assert_ne!(first.token, second.token);
        assert_eq!(first.payload.exp, second.payload.exp);
        Ok(())
    }

    #[test]
    fn rejects_tampered_and_malformed() -> Result<(), Error> {
        let signer = signer();
        let token = signer.sign(TokenClass::Access, Uuid::new_v4(), VerifyStatus::Unverified)?;

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = b64e_json(&serde_json::json!({
            "user_id": Uuid::new_v4(),
            "token_type": "access",
            "verify": "verified",
            "iat": 0,
            "exp": i64::MAX,
            "jti": "x",
        }))?;
        parts[1] = &forged;
        let tampered = parts.join(".");
        assert!(matches!(
            signer.verify(TokenClass::Access, &tampered),
            Err(Error::InvalidSignature)
        ));

        assert!(matches!(
            signer.verify(TokenClass::Access, "not-a-token"),
            Err(Error::TokenFormat)
        ));
        assert!(matches!(
            signer.verify(TokenClass::Access, "a.b.c.d"),
            Err(Error::TokenFormat)
        ));
        Ok(())
    }

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("token expired"), "Token expired");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize(&Error::InvalidSignature.to_string()), "Invalid signature");
    }
}
