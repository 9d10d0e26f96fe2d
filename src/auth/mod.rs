//! Credential lifecycle: token classes, verification state, the validation
//! pipeline and the service that ties them to storage.

pub mod config;
pub mod error;
pub mod messages;
pub mod notify;
pub mod oauth;
pub mod password;
pub mod pipeline;
pub mod service;
pub mod token;
pub mod types;
pub mod validation;
pub mod verify_status;

pub use config::{AuthConfig, TokenClassConfig};
pub use error::{AuthError, ValidationErrors};
pub use notify::{EmailMessage, LogNotifier, MemoryNotifier, Notifier};
pub use oauth::{
    GoogleIdentityProvider, IdentityProvider, OAuthConfig, ProviderProfile, ProviderTokens,
};
pub use pipeline::{CredentialPipeline, IdentityContext, RefreshGrant};
pub use service::AuthService;
pub use token::{SignedToken, TokenClass, TokenPayload, TokenSigner};
pub use types::{OAuthOutcome, ResendOutcome, TokenPair, VerifyEmailOutcome};
pub use verify_status::{EmailTransition, VerifyStatus};
