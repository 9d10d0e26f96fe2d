//! # Tessera (credential lifecycle authority)
//!
//! `tessera` issues and retires the credentials of an account-based service:
//! short-lived access tokens, rotating refresh tokens backed by a server-side
//! ledger, and single-purpose email-verify and forgot-password tokens.
//!
//! ## Token classes
//!
//! Each class is signed with its own HMAC secret, so a token minted for one
//! purpose never verifies as another. Every payload carries the user id, the
//! token class and a snapshot of the account's verify status.
//!
//! ## Refresh rotation
//!
//! A refresh token is redeemable exactly once. Rotation deletes the ledger
//! record before issuing a replacement that keeps the original expiry, so a
//! session cannot be extended past its first login.
//!
//! ## Verification state
//!
//! Accounts move from `unverified` to `verified` through the emailed link.
//! `banned` is terminal and only set outside this service.

pub mod api;
pub mod auth;
pub mod cli;
pub mod store;

pub use api::GIT_COMMIT_HASH;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
