//! Error taxonomy shared by the service, the pipeline and the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

/// Field-level validation failures collected for one request.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure; the first message for a field wins.
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{}", super::messages::VALIDATION_ERROR)]
    Validation(ValidationErrors),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// The identity provider answered but refused the identity.
    #[error("{0}")]
    UpstreamRejected(String),
    /// The identity provider could not be reached or answered garbage.
    #[error("{0}")]
    Upstream(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Single-field validation failure.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.push(field, message);
        Self::Validation(errors)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UpstreamRejected(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Signing failures are server faults; verification failures are mapped by
/// the pipeline before they get here.
impl From<super::token::Error> for AuthError {
    fn from(err: super::token::Error) -> Self {
        Self::Internal(anyhow::Error::new(err).context("failed to sign token"))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<String>,
}

impl From<&AuthError> for ErrorBody {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::Validation(errors) => Self {
                message: err.to_string(),
                errors: Some(errors.clone()),
                error_info: None,
            },
            AuthError::Internal(inner) => Self {
                message: inner.to_string(),
                errors: None,
                error_info: Some(format!("{inner:#}")),
            },
            _ => Self {
                message: err.to_string(),
                errors: None,
                error_info: None,
            },
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(err) = &self {
            error!("Failed to handle auth request: {err:#}");
        }
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn status_mapping() {
        assert_eq!(
            AuthError::Validation(ValidationErrors::new()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AuthError::unauthorized("x").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AuthError::UpstreamRejected("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Upstream("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AuthError::Internal(anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn first_message_per_field_wins() {
        let mut errors = ValidationErrors::new();
        errors.push("password", "password is required");
        errors.push("password", "password is too short");
        errors.push("email", "email is invalid");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("password"), Some("password is required"));
        assert!(!errors.is_empty());
        assert!(ValidationErrors::new().is_empty());
    }

    #[test]
    fn body_shapes() -> anyhow::Result<()> {
        let body = serde_json::to_value(ErrorBody::from(&AuthError::invalid_field(
            "email",
            "email is invalid",
        )))?;
        assert_eq!(body["message"], "validation error");
        assert_eq!(body["errors"]["email"], "email is invalid");
        assert!(body.get("error_info").is_none());

        let internal = AuthError::Internal(anyhow!("pool timed out").context("failed to load user"));
        let body = serde_json::to_value(ErrorBody::from(&internal))?;
        assert_eq!(body["message"], "failed to load user");
        assert_eq!(body["error_info"], "failed to load user: pool timed out");

        let body = serde_json::to_value(ErrorBody::from(&AuthError::unauthorized(
            "access token is required",
        )))?;
        assert_eq!(body["message"], "access token is required");
        assert!(body.get("errors").is_none());
        Ok(())
    }
}
