use crate::auth::config::{
    DEFAULT_ACCESS_TOKEN_TTL_SECONDS, DEFAULT_EMAIL_VERIFY_TOKEN_TTL_SECONDS,
    DEFAULT_FORGOT_PASSWORD_TOKEN_TTL_SECONDS, DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
};
use crate::auth::TokenClass;
use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_BLOCK_BANNED_RESEND: &str = "block-banned-resend";

/// Argument names for one token class.
struct ClassArgs {
    class: TokenClass,
    secret: &'static str,
    secret_env: &'static str,
    ttl: &'static str,
    ttl_env: &'static str,
    default_ttl: i64,
}

const CLASS_ARGS: [ClassArgs; 4] = [
    ClassArgs {
        class: TokenClass::Access,
        secret: "access-token-secret",
        secret_env: "TESSERA_ACCESS_TOKEN_SECRET",
        ttl: "access-token-ttl-seconds",
        ttl_env: "TESSERA_ACCESS_TOKEN_TTL_SECONDS",
        default_ttl: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
    },
    ClassArgs {
        class: TokenClass::Refresh,
        secret: "refresh-token-secret",
        secret_env: "TESSERA_REFRESH_TOKEN_SECRET",
        ttl: "refresh-token-ttl-seconds",
        ttl_env: "TESSERA_REFRESH_TOKEN_TTL_SECONDS",
        default_ttl: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
    },
    ClassArgs {
        class: TokenClass::EmailVerify,
        secret: "email-verify-token-secret",
        secret_env: "TESSERA_EMAIL_VERIFY_TOKEN_SECRET",
        ttl: "email-verify-token-ttl-seconds",
        ttl_env: "TESSERA_EMAIL_VERIFY_TOKEN_TTL_SECONDS",
        default_ttl: DEFAULT_EMAIL_VERIFY_TOKEN_TTL_SECONDS,
    },
    ClassArgs {
        class: TokenClass::ForgotPassword,
        secret: "forgot-password-token-secret",
        secret_env: "TESSERA_FORGOT_PASSWORD_TOKEN_SECRET",
        ttl: "forgot-password-token-ttl-seconds",
        ttl_env: "TESSERA_FORGOT_PASSWORD_TOKEN_TTL_SECONDS",
        default_ttl: DEFAULT_FORGOT_PASSWORD_TOKEN_TTL_SECONDS,
    },
];

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for verification and reset links")
                .env("TESSERA_FRONTEND_BASE_URL")
                .default_value("https://tessera.dev"),
        )
        .arg(
            Arg::new(ARG_BLOCK_BANNED_RESEND)
                .long(ARG_BLOCK_BANNED_RESEND)
                .help("Refuse to resend verification emails to banned accounts")
                .env("TESSERA_BLOCK_BANNED_RESEND")
                .default_value("true")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(bool)),
        );

    CLASS_ARGS.iter().fold(command, |command, args| {
        command
            .arg(
                Arg::new(args.secret)
                    .long(args.secret)
                    .help(format!("HMAC secret for {} tokens", args.class))
                    .env(args.secret_env)
                    .hide_env_values(true)
                    .required(true),
            )
            .arg(
                Arg::new(args.ttl)
                    .long(args.ttl)
                    .help(format!("Lifetime of {} tokens in seconds", args.class))
                    .env(args.ttl_env)
                    .default_value(args.default_ttl.to_string())
                    .value_parser(clap::value_parser!(i64).range(1..)),
            )
    })
}

/// Secret and lifetime parsed for one token class.
#[derive(Debug)]
pub struct ClassOptions {
    pub class: TokenClass,
    pub secret: SecretString,
    pub ttl_seconds: i64,
}

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub block_banned_resend: bool,
    pub classes: Vec<ClassOptions>,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .context("missing required argument: --frontend-base-url")?;
        let block_banned_resend = matches
            .get_one::<bool>(ARG_BLOCK_BANNED_RESEND)
            .copied()
            .unwrap_or(true);

        let classes = CLASS_ARGS
            .iter()
            .map(|args| {
                let secret = matches
                    .get_one::<String>(args.secret)
                    .cloned()
                    .with_context(|| format!("missing required argument: --{}", args.secret))?;
                let ttl_seconds = matches
                    .get_one::<i64>(args.ttl)
                    .copied()
                    .unwrap_or(args.default_ttl);
                Ok(ClassOptions {
                    class: args.class,
                    secret: SecretString::from(secret),
                    ttl_seconds,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            frontend_base_url,
            block_banned_resend,
            classes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn command() -> Command {
        with_args(Command::new("tessera"))
    }

    #[test]
    fn secrets_from_env() -> Result<()> {
        temp_env::with_vars(
            [
                ("TESSERA_ACCESS_TOKEN_SECRET", Some("a")),
                ("TESSERA_REFRESH_TOKEN_SECRET", Some("r")),
                ("TESSERA_EMAIL_VERIFY_TOKEN_SECRET", Some("e")),
                ("TESSERA_FORGOT_PASSWORD_TOKEN_SECRET", Some("f")),
                ("TESSERA_ACCESS_TOKEN_TTL_SECONDS", Some("60")),
                ("TESSERA_BLOCK_BANNED_RESEND", Some("false")),
            ],
            || {
                let matches = command().get_matches_from(vec!["tessera"]);
                let options = Options::parse(&matches)?;
                assert_eq!(options.frontend_base_url, "https://tessera.dev");
                assert!(!options.block_banned_resend);
                assert_eq!(options.classes.len(), 4);

                let access = &options.classes[0];
                assert_eq!(access.class, TokenClass::Access);
                assert_eq!(access.secret.expose_secret(), "a");
                assert_eq!(access.ttl_seconds, 60);

                let refresh = &options.classes[1];
                assert_eq!(refresh.ttl_seconds, DEFAULT_REFRESH_TOKEN_TTL_SECONDS);
                Ok(())
            },
        )
    }

    #[test]
    fn secrets_are_required() {
        temp_env::with_vars(
            [
                ("TESSERA_ACCESS_TOKEN_SECRET", None::<&str>),
                ("TESSERA_REFRESH_TOKEN_SECRET", None),
                ("TESSERA_EMAIL_VERIFY_TOKEN_SECRET", None),
                ("TESSERA_FORGOT_PASSWORD_TOKEN_SECRET", None),
            ],
            || {
                let result = command().try_get_matches_from(vec!["tessera"]);
                assert!(result.is_err());
            },
        );
    }

    #[test]
    fn ttl_must_be_positive() {
        let result = command().try_get_matches_from(vec![
            "tessera",
            "--access-token-secret",
            "a",
            "--refresh-token-secret",
            "r",
            "--email-verify-token-secret",
            "e",
            "--forgot-password-token-secret",
            "f",
            "--refresh-token-ttl-seconds",
            "0",
        ]);
        assert!(result.is_err());
    }
}
