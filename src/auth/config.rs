//! Auth configuration: per-class token secrets and lifetimes, link targets and
//! account policies.

use anyhow::{Result, anyhow};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::token::TokenClass;

pub const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 15 * 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 100 * 24 * 60 * 60;
pub const DEFAULT_EMAIL_VERIFY_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_FORGOT_PASSWORD_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Secret and lifetime for one token class.
#[derive(Clone)]
pub struct TokenClassConfig {
    secret: SecretString,
    ttl_seconds: i64,
}

impl TokenClassConfig {
    #[must_use]
    pub fn new(secret: SecretString, ttl_seconds: i64) -> Self {
        Self {
            secret,
            ttl_seconds,
        }
    }

    pub(crate) fn secret(&self) -> &SecretString {
        &self.secret
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    frontend_base_url: String,
    access: TokenClassConfig,
    refresh: TokenClassConfig,
    email_verify: TokenClassConfig,
    forgot_password: TokenClassConfig,
    block_banned_resend: bool,
}

impl AuthConfig {
    /// Build a config with default lifetimes and empty secrets.
    ///
    /// Secrets must be set through [`AuthConfig::with_secret`] before
    /// [`AuthConfig::validate`] accepts the config.
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            access: TokenClassConfig::new(
                SecretString::default(),
                DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            ),
            refresh: TokenClassConfig::new(
                SecretString::default(),
                DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            ),
            email_verify: TokenClassConfig::new(
                SecretString::default(),
                DEFAULT_EMAIL_VERIFY_TOKEN_TTL_SECONDS,
            ),
            forgot_password: TokenClassConfig::new(
                SecretString::default(),
                DEFAULT_FORGOT_PASSWORD_TOKEN_TTL_SECONDS,
            ),
            block_banned_resend: true,
        }
    }

    #[must_use]
    pub fn with_secret(mut self, class: TokenClass, secret: SecretString) -> Self {
        self.class_mut(class).secret = secret;
        self
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, class: TokenClass, seconds: i64) -> Self {
        self.class_mut(class).ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_block_banned_resend(mut self, block: bool) -> Self {
        self.block_banned_resend = block;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn class(&self, class: TokenClass) -> &TokenClassConfig {
        match class {
            TokenClass::Access => &self.access,
            TokenClass::Refresh => &self.refresh,
            TokenClass::EmailVerify => &self.email_verify,
            TokenClass::ForgotPassword => &self.forgot_password,
        }
    }

    fn class_mut(&mut self, class: TokenClass) -> &mut TokenClassConfig {
        match class {
            TokenClass::Access => &mut self.access,
            TokenClass::Refresh => &mut self.refresh,
            TokenClass::EmailVerify => &mut self.email_verify,
            TokenClass::ForgotPassword => &mut self.forgot_password,
        }
    }

    #[must_use]
    pub fn block_banned_resend(&self) -> bool {
        self.block_banned_resend
    }

    /// Reject configs that would let one class forge another.
    ///
    /// # Errors
    /// Returns an error when a secret is empty, two classes share a secret, or
    /// a lifetime is not positive.
    pub fn validate(&self) -> Result<()> {
        for class in TokenClass::ALL {
            let config = self.class(class);
            if config.secret().expose_secret().is_empty() {
                return Err(anyhow!("missing secret for {class} tokens"));
            }
            if config.ttl_seconds() <= 0 {
                return Err(anyhow!("{class} token ttl must be positive"));
            }
        }

        for (index, first) in TokenClass::ALL.iter().enumerate() {
            for second in &TokenClass::ALL[index + 1..] {
                if self.class(*first).secret().expose_secret()
                    == self.class(*second).secret().expose_secret()
                {
                    return Err(anyhow!("{first} and {second} tokens share a secret"));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("frontend_base_url", &self.frontend_base_url)
            .field("access_ttl_seconds", &self.access.ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh.ttl_seconds)
            .field("email_verify_ttl_seconds", &self.email_verify.ttl_seconds)
            .field(
                "forgot_password_ttl_seconds",
                &self.forgot_password.ttl_seconds,
            )
            .field("secrets", &"***")
            .field("block_banned_resend", &self.block_banned_resend)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AuthConfig {
    AuthConfig::new("https://tessera.dev".to_string())
        .with_secret(TokenClass::Access, SecretString::from("access-secret"))
        .with_secret(TokenClass::Refresh, SecretString::from("refresh-secret"))
        .with_secret(
            TokenClass::EmailVerify,
            SecretString::from("email-verify-secret"),
        )
        .with_secret(
            TokenClass::ForgotPassword,
            SecretString::from("forgot-password-secret"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let config = AuthConfig::new("https://tessera.dev".to_string());
        assert_eq!(config.frontend_base_url(), "https://tessera.dev");
        assert_eq!(
            config.class(TokenClass::Access).ttl_seconds(),
            DEFAULT_ACCESS_TOKEN_TTL_SECONDS
        );
        assert!(config.block_banned_resend());

        let config = config
            .with_ttl_seconds(TokenClass::Refresh, 60)
            .with_block_banned_resend(false);
        assert_eq!(config.class(TokenClass::Refresh).ttl_seconds(), 60);
        assert!(!config.block_banned_resend());
    }

    #[test]
    fn validate_requires_all_secrets() {
        let config = AuthConfig::new("https://tessera.dev".to_string())
            .with_secret(TokenClass::Access, SecretString::from("a"));
        assert!(config.validate().is_err());
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_shared_secrets() {
        let config = test_config().with_secret(
            TokenClass::Refresh,
            SecretString::from("access-secret"),
        );
        let err = config.validate().map_err(|err| err.to_string());
        assert_eq!(
            err,
            Err("access and refresh tokens share a secret".to_string())
        );
    }

    #[test]
    fn validate_rejects_non_positive_ttl() {
        let config = test_config().with_ttl_seconds(TokenClass::EmailVerify, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_hides_secrets() {
        let rendered = format!("{:?}", test_config());
        assert!(!rendered.contains("access-secret"));
        assert!(rendered.contains("***"));
    }
}
