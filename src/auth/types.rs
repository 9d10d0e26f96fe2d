use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::verify_status::VerifyStatus;

#[derive(ToSchema, Deserialize, Debug, Clone, Default)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub date_of_birth: String,
}

#[derive(ToSchema, Deserialize, Debug, Clone, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(ToSchema, Deserialize, Debug, Clone, Default)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(ToSchema, Deserialize, Debug, Clone, Default)]
pub struct EmailVerifyRequest {
    #[serde(default)]
    pub email_verify_token: String,
}

#[derive(ToSchema, Deserialize, Debug, Clone, Default)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(ToSchema, Deserialize, Debug, Clone, Default)]
pub struct VerifyForgotPasswordRequest {
    #[serde(default)]
    pub forgot_password_token: String,
}

#[derive(ToSchema, Deserialize, Debug, Clone, Default)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub forgot_password_token: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(ToSchema, Deserialize, Debug, Clone, Default)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(IntoParams, Deserialize, Debug, Clone, Default)]
#[into_params(parameter_in = Query)]
pub struct OAuthQuery {
    /// Authorization code handed back by the provider.
    #[serde(default)]
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `{message, result}` envelope for operations that hand back tokens.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub message: String,
    pub result: TokenPair,
}

impl TokenResponse {
    pub fn new(message: impl Into<String>, result: TokenPair) -> Self {
        Self {
            message: message.into(),
            result,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyEmailOutcome {
    AlreadyVerified,
    Verified(TokenPair),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendOutcome {
    AlreadyVerified,
    Sent,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OAuthOutcome {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub new_user: bool,
    pub verify: VerifyStatus,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OAuthResponse {
    pub message: String,
    pub result: OAuthOutcome,
}
