//! Identity provider bridge for the OAuth authorization-code flow.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::{fmt, time::Duration};
use tracing::{debug, instrument};

use crate::APP_USER_AGENT;

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v1/userinfo";
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct OAuthConfig {
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    token_url: String,
    userinfo_url: String,
    client_redirect_uri: Option<String>,
}

impl OAuthConfig {
    /// Google endpoints by default.
    #[must_use]
    pub fn new(client_id: String, client_secret: SecretString, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            client_redirect_uri: None,
        }
    }

    #[must_use]
    pub fn with_token_url(mut self, url: String) -> Self {
        self.token_url = url;
        self
    }

    #[must_use]
    pub fn with_userinfo_url(mut self, url: String) -> Self {
        self.userinfo_url = url;
        self
    }

    /// Frontend page that receives the issued tokens as query parameters.
    #[must_use]
    pub fn with_client_redirect_uri(mut self, uri: Option<String>) -> Self {
        self.client_redirect_uri = uri;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    #[must_use]
    pub fn userinfo_url(&self) -> &str {
        &self.userinfo_url
    }

    #[must_use]
    pub fn client_redirect_uri(&self) -> Option<&str> {
        self.client_redirect_uri.as_deref()
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("redirect_uri", &self.redirect_uri)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("client_redirect_uri", &self.client_redirect_uri)
            .finish()
    }
}

/// Tokens returned by the code exchange.
#[derive(Clone, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,
    pub id_token: String,
}

impl fmt::Debug for ProviderTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProviderTokens(***)")
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ProviderProfile {
    #[serde(default)]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default)]
    pub locale: String,
}

/// The two sequential calls of the authorization-code flow.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens>;

    async fn fetch_profile(&self, tokens: &ProviderTokens) -> Result<ProviderProfile>;
}

#[derive(Debug, Clone)]
pub struct GoogleIdentityProvider {
    client: Client,
    config: OAuthConfig,
}

impl GoogleIdentityProvider {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: OAuthConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .context("failed to build oauth http client")?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }
}

/// Error text from a provider error body, if any.
fn provider_error(body: &Value) -> &str {
    body["error_description"]
        .as_str()
        .or_else(|| body["error"].as_str())
        .or_else(|| body["error"]["message"].as_str())
        .unwrap_or("")
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    #[instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .context("failed to reach oauth token endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Value = response.json().await.unwrap_or(Value::Null);
            return Err(anyhow!(
                "{} - {}, {}",
                self.config.token_url,
                status,
                provider_error(&body)
            ));
        }

        debug!("oauth code exchanged");

        response
            .json::<ProviderTokens>()
            .await
            .context("failed to parse oauth token response")
    }

    #[instrument(skip_all)]
    async fn fetch_profile(&self, tokens: &ProviderTokens) -> Result<ProviderProfile> {
        let response = self
            .client
            .get(&self.config.userinfo_url)
            .query(&[("access_token", tokens.access_token.as_str()), ("alt", "json")])
            .bearer_auth(&tokens.id_token)
            .send()
            .await
            .context("failed to reach oauth userinfo endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Value = response.json().await.unwrap_or(Value::Null);
            return Err(anyhow!(
                "{} - {}, {}",
                self.config.userinfo_url,
                status,
                provider_error(&body)
            ));
        }

        let profile: Value = response
            .json()
            .await
            .context("failed to parse oauth userinfo response")?;
        parse_profile(profile)
    }
}

/// Google answers `verified_email` on v1 and `email_verified` on OpenID
/// userinfo; accept either.
fn parse_profile(mut body: Value) -> Result<ProviderProfile> {
    if body.get("email_verified").is_none() {
        if let Some(verified) = body.get("verified_email").cloned() {
            body["email_verified"] = verified;
        }
    }
    serde_json::from_value(body).context("failed to parse oauth profile")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_defaults_to_google_and_hides_secret() {
        let config = OAuthConfig::new(
            "client".to_string(),
            SecretString::from("shh"),
            "https://api.tessera.dev/users/oauth/google".to_string(),
        );
        assert_eq!(config.token_url(), GOOGLE_TOKEN_URL);
        assert_eq!(config.userinfo_url(), GOOGLE_USERINFO_URL);
        assert!(config.client_redirect_uri().is_none());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("shh"));
    }

    #[test]
    fn parse_profile_accepts_both_verified_fields() -> Result<()> {
        let v1 = parse_profile(json!({
            "id": "1",
            "email": "a@x.com",
            "verified_email": true,
            "name": "A",
        }))?;
        assert!(v1.email_verified);
        assert_eq!(v1.name, "A");

        let oidc = parse_profile(json!({
            "email": "a@x.com",
            "email_verified": false,
        }))?;
        assert!(!oidc.email_verified);
        assert!(oidc.locale.is_empty());
        Ok(())
    }

    #[test]
    fn parse_profile_requires_email() {
        assert!(parse_profile(json!({ "id": "1" })).is_err());
    }

    #[test]
    fn provider_error_prefers_description() {
        let body = json!({ "error": "invalid_grant", "error_description": "Bad Request" });
        assert_eq!(provider_error(&body), "Bad Request");
        assert_eq!(provider_error(&json!({ "error": "invalid_grant" })), "invalid_grant");
        assert_eq!(provider_error(&Value::Null), "");
    }
}
