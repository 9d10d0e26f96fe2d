use crate::auth::oauth::{GOOGLE_TOKEN_URL, GOOGLE_USERINFO_URL};
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_CLIENT_ID: &str = "google-client-id";
pub const ARG_CLIENT_SECRET: &str = "google-client-secret";
pub const ARG_REDIRECT_URI: &str = "google-redirect-uri";
pub const ARG_TOKEN_URL: &str = "google-token-url";
pub const ARG_USERINFO_URL: &str = "google-userinfo-url";
pub const ARG_CLIENT_REDIRECT_URI: &str = "oauth-client-redirect-uri";

/// OAuth stays disabled unless a client id is given.
#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CLIENT_ID)
                .long(ARG_CLIENT_ID)
                .help("Google OAuth client id; enables GET /users/oauth/google")
                .env("TESSERA_GOOGLE_CLIENT_ID")
                .requires(ARG_CLIENT_SECRET)
                .requires(ARG_REDIRECT_URI),
        )
        .arg(
            Arg::new(ARG_CLIENT_SECRET)
                .long(ARG_CLIENT_SECRET)
                .help("Google OAuth client secret")
                .env("TESSERA_GOOGLE_CLIENT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_REDIRECT_URI)
                .long(ARG_REDIRECT_URI)
                .help("Redirect URI registered with the provider")
                .env("TESSERA_GOOGLE_REDIRECT_URI"),
        )
        .arg(
            Arg::new(ARG_TOKEN_URL)
                .long(ARG_TOKEN_URL)
                .help("Provider token endpoint")
                .env("TESSERA_GOOGLE_TOKEN_URL")
                .default_value(GOOGLE_TOKEN_URL),
        )
        .arg(
            Arg::new(ARG_USERINFO_URL)
                .long(ARG_USERINFO_URL)
                .help("Provider userinfo endpoint")
                .env("TESSERA_GOOGLE_USERINFO_URL")
                .default_value(GOOGLE_USERINFO_URL),
        )
        .arg(
            Arg::new(ARG_CLIENT_REDIRECT_URI)
                .long(ARG_CLIENT_REDIRECT_URI)
                .help("Frontend page that receives OAuth tokens as query parameters")
                .env("TESSERA_OAUTH_CLIENT_REDIRECT_URI"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub client_redirect_uri: Option<String>,
}

impl Options {
    /// `None` when no client id was configured.
    ///
    /// # Errors
    /// Returns an error if a client id is given without its secret or
    /// redirect URI.
    pub fn parse(matches: &ArgMatches) -> Result<Option<Self>> {
        let Some(client_id) = matches.get_one::<String>(ARG_CLIENT_ID).cloned() else {
            return Ok(None);
        };

        let client_secret = matches
            .get_one::<String>(ARG_CLIENT_SECRET)
            .cloned()
            .context("missing required argument: --google-client-secret")?;
        let redirect_uri = matches
            .get_one::<String>(ARG_REDIRECT_URI)
            .cloned()
            .context("missing required argument: --google-redirect-uri")?;
        let token_url = matches
            .get_one::<String>(ARG_TOKEN_URL)
            .cloned()
            .unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string());
        let userinfo_url = matches
            .get_one::<String>(ARG_USERINFO_URL)
            .cloned()
            .unwrap_or_else(|| GOOGLE_USERINFO_URL.to_string());

        Ok(Some(Self {
            client_id,
            client_secret: SecretString::from(client_secret),
            redirect_uri,
            token_url,
            userinfo_url,
            client_redirect_uri: matches.get_one::<String>(ARG_CLIENT_REDIRECT_URI).cloned(),
        }))
    }
}
