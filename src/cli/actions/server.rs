use crate::{
    api,
    auth::{AuthConfig, OAuthConfig, TokenClass},
    cli::commands::{oauth, tokens},
};
use anyhow::Result;
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub frontend_base_url: String,
    pub block_banned_resend: bool,
    pub token_classes: Vec<(TokenClass, SecretString, i64)>,
    pub oauth: Option<oauth::Options>,
}

impl Args {
    #[must_use]
    pub fn new(
        port: u16,
        dsn: Option<String>,
        tokens: tokens::Options,
        oauth: Option<oauth::Options>,
    ) -> Self {
        Self {
            port,
            dsn,
            frontend_base_url: tokens.frontend_base_url,
            block_banned_resend: tokens.block_banned_resend,
            token_classes: tokens
                .classes
                .into_iter()
                .map(|class| (class.class, class.secret, class.ttl_seconds))
                .collect(),
            oauth,
        }
    }

    /// Assemble the auth config; rejected later by `AuthConfig::validate`
    /// when secrets collide.
    #[must_use]
    pub fn auth_config(&self) -> AuthConfig {
        self.token_classes.iter().fold(
            AuthConfig::new(self.frontend_base_url.clone())
                .with_block_banned_resend(self.block_banned_resend),
            |config, (class, secret, ttl_seconds)| {
                config
                    .with_secret(*class, secret.clone())
                    .with_ttl_seconds(*class, *ttl_seconds)
            },
        )
    }

    #[must_use]
    pub fn oauth_config(&self) -> Option<OAuthConfig> {
        self.oauth.as_ref().map(|options| {
            OAuthConfig::new(
                options.client_id.clone(),
                options.client_secret.clone(),
                options.redirect_uri.clone(),
            )
            .with_token_url(options.token_url.clone())
            .with_userinfo_url(options.userinfo_url.clone())
            .with_client_redirect_uri(options.client_redirect_uri.clone())
        })
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the config is rejected or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = args.auth_config();
    let oauth_config = args.oauth_config();

    debug!("Auth config: {:?}", auth_config);

    api::new(args.port, args.dsn, auth_config, oauth_config).await
}
