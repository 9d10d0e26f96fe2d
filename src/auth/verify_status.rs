//! Account verification state machine.
//!
//! `Unverified -> Verified` happens through email confirmation. `Banned` is an
//! administrative state set outside this crate; nothing here produces it and
//! nothing here leaves it.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    #[default]
    Unverified,
    Verified,
    Banned,
}

/// What confirming an email means for an account in a given state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmailTransition {
    /// `Unverified` account, promote it to `Verified`.
    Promote,
    /// Nothing to do, the account was confirmed earlier.
    AlreadyVerified,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("user is banned")]
pub struct Banned;

impl VerifyStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Verified => "verified",
            Self::Banned => "banned",
        }
    }

    /// Decide the email-confirmation transition for the current state.
    ///
    /// # Errors
    /// Returns [`Banned`] for banned accounts.
    pub const fn confirm_email(self) -> Result<EmailTransition, Banned> {
        match self {
            Self::Unverified => Ok(EmailTransition::Promote),
            Self::Verified => Ok(EmailTransition::AlreadyVerified),
            Self::Banned => Err(Banned),
        }
    }

    #[must_use]
    pub const fn is_verified(self) -> bool {
        matches!(self, Self::Verified)
    }
}

impl fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerifyStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "unverified" => Ok(Self::Unverified),
            "verified" => Ok(Self::Verified),
            "banned" => Ok(Self::Banned),
            other => Err(format!("unknown verify status: {other}")),
        }
    }
}
