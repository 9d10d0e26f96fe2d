//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action to run, such as starting the
//! API server with its token and OAuth configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{oauth, tokens, ARG_DSN, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches.get_one::<String>(ARG_DSN).cloned();

    let token_opts = tokens::Options::parse(matches)?;
    let oauth_opts = oauth::Options::parse(matches)?;

    Ok(Action::Server(Args::new(port, dsn, token_opts, oauth_opts)))
}
