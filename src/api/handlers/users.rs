//! `/users` routes.

use axum::{
    extract::{Extension, Query},
    http::{header::AUTHORIZATION, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use std::sync::Arc;
use url::Url;

use super::AppState;
use crate::auth::{
    error::ErrorBody,
    messages,
    types::{
        ChangePasswordRequest, EmailVerifyRequest, ForgotPasswordRequest, LoginRequest,
        MessageResponse, OAuthOutcome, OAuthQuery, OAuthResponse, RefreshTokenRequest,
        RegisterRequest, ResetPasswordRequest, TokenResponse, VerifyForgotPasswordRequest,
    },
    validation::check_reset_password,
    AuthError, IdentityContext, ResendOutcome, VerifyEmailOutcome,
};

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// Missing or unparsable bodies are treated as empty so field validation
/// reports every missing field.
fn body<T: Default>(payload: Option<Json<T>>) -> T {
    payload.map(|Json(payload)| payload).unwrap_or_default()
}

#[utoipa::path(
    post,
    path = "/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = TokenResponse),
        (status = 401, description = "Email or password is incorrect", body = ErrorBody),
        (status = 422, description = "Invalid input", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn login(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<TokenResponse>, AuthError> {
    let request = body(payload);
    let user = state.auth.authenticate(&request).await?;
    let tokens = state.auth.login(user.id, user.verify).await?;
    Ok(Json(TokenResponse::new(messages::LOGIN_SUCCESS, tokens)))
}

#[utoipa::path(
    post,
    path = "/users/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = TokenResponse),
        (status = 422, description = "Invalid input or email taken", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn register(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<Json<TokenResponse>, AuthError> {
    let request = body(payload);
    let tokens = state.auth.register(&request).await?;
    Ok(Json(TokenResponse::new(messages::REGISTER_SUCCESS, tokens)))
}

#[utoipa::path(
    post,
    path = "/users/logout",
    request_body = RefreshTokenRequest,
    params(
        ("Authorization" = String, Header, description = "Bearer access token")
    ),
    responses(
        (status = 200, description = "Refresh token revoked", body = MessageResponse),
        (status = 401, description = "Missing, invalid or used token", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn logout(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<RefreshTokenRequest>>,
) -> Result<Json<MessageResponse>, AuthError> {
    let request = body(payload);
    let pipeline = state.auth.pipeline();
    let ctx = pipeline.check_bearer(IdentityContext::new(), authorization(&headers))?;
    pipeline.check_refresh(ctx, &request.refresh_token).await?;
    let response = state.auth.logout(&request.refresh_token).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/users/refresh-token",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Token pair rotated", body = TokenResponse),
        (status = 401, description = "Invalid or already used refresh token", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn refresh_token(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<RefreshTokenRequest>>,
) -> Result<Json<TokenResponse>, AuthError> {
    let request = body(payload);
    let ctx = state
        .auth
        .pipeline()
        .check_refresh(IdentityContext::new(), &request.refresh_token)
        .await?;
    let grant = ctx
        .refresh()
        .ok_or_else(|| AuthError::unauthorized(messages::REFRESH_TOKEN_IS_INVALID))?;
    let tokens = state
        .auth
        .refresh(
            grant.payload.user_id,
            grant.payload.verify,
            &grant.token,
            grant.expires_at,
        )
        .await?;
    Ok(Json(TokenResponse::new(
        messages::REFRESH_TOKEN_SUCCESS,
        tokens,
    )))
}

#[utoipa::path(
    post,
    path = "/users/verify-email",
    request_body = EmailVerifyRequest,
    responses(
        (status = 200, description = "Email verified, or verified before", body = TokenResponse),
        (status = 401, description = "Invalid or superseded token", body = ErrorBody),
        (status = 403, description = "User is banned", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn verify_email(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<EmailVerifyRequest>>,
) -> Result<Response, AuthError> {
    let request = body(payload);
    let ctx = state
        .auth
        .pipeline()
        .check_email_verify(IdentityContext::new(), &request.email_verify_token)?;
    let user_id = ctx
        .email_verify()
        .map(|payload| payload.user_id)
        .ok_or_else(|| AuthError::unauthorized(messages::EMAIL_VERIFY_TOKEN_IS_INVALID))?;

    let response = match state
        .auth
        .confirm_email(user_id, &request.email_verify_token)
        .await?
    {
        VerifyEmailOutcome::AlreadyVerified => {
            Json(MessageResponse::new(messages::EMAIL_ALREADY_VERIFIED_BEFORE)).into_response()
        }
        VerifyEmailOutcome::Verified(tokens) => {
            Json(TokenResponse::new(messages::EMAIL_VERIFY_SUCCESS, tokens)).into_response()
        }
    };
    Ok(response)
}

#[utoipa::path(
    post,
    path = "/users/resend-verify-email",
    params(
        ("Authorization" = String, Header, description = "Bearer access token")
    ),
    responses(
        (status = 200, description = "Verification email sent, or verified before", body = MessageResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 403, description = "User is banned", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn resend_verify_email(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<Json<MessageResponse>, AuthError> {
    let ctx = state
        .auth
        .pipeline()
        .check_bearer(IdentityContext::new(), authorization(&headers))?;
    let user_id = ctx
        .authorization()
        .map(|payload| payload.user_id)
        .ok_or_else(|| AuthError::unauthorized(messages::ACCESS_TOKEN_IS_REQUIRED))?;

    let message = match state.auth.resend_email_verify(user_id).await? {
        ResendOutcome::AlreadyVerified => messages::EMAIL_ALREADY_VERIFIED_BEFORE,
        ResendOutcome::Sent => messages::RESEND_EMAIL_VERIFY_SUCCESS,
    };
    Ok(Json(MessageResponse::new(message)))
}

#[utoipa::path(
    post,
    path = "/users/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link sent", body = MessageResponse),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 422, description = "Invalid email", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn forgot_password(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Result<Json<MessageResponse>, AuthError> {
    let request = body(payload);
    let user = state.auth.pipeline().check_account_email(&request.email).await?;
    let response = state.auth.forgot_password(user.id, user.verify).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/users/verify-forgot-password",
    request_body = VerifyForgotPasswordRequest,
    responses(
        (status = 200, description = "Token is current", body = MessageResponse),
        (status = 401, description = "Invalid or superseded token", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn verify_forgot_password(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<VerifyForgotPasswordRequest>>,
) -> Result<Json<MessageResponse>, AuthError> {
    let request = body(payload);
    state
        .auth
        .pipeline()
        .check_forgot_password(IdentityContext::new(), &request.forgot_password_token)
        .await?;
    Ok(Json(MessageResponse::new(
        messages::VERIFY_FORGOT_PASSWORD_TOKEN_SUCCESS,
    )))
}

#[utoipa::path(
    post,
    path = "/users/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced", body = MessageResponse),
        (status = 401, description = "Invalid or superseded token", body = ErrorBody),
        (status = 422, description = "Invalid password", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn reset_password(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<Json<MessageResponse>, AuthError> {
    let request = body(payload);
    check_reset_password(&request).map_err(AuthError::Validation)?;
    let ctx = state
        .auth
        .pipeline()
        .check_forgot_password(IdentityContext::new(), &request.forgot_password_token)
        .await?;
    let user_id = ctx
        .forgot_password()
        .map(|payload| payload.user_id)
        .ok_or_else(|| AuthError::unauthorized(messages::FORGOT_PASSWORD_TOKEN_IS_REQUIRED))?;
    let response = state
        .auth
        .reset_password(user_id, &request.password)
        .await?;
    Ok(Json(response))
}

#[utoipa::path(
    put,
    path = "/users/change-password",
    request_body = ChangePasswordRequest,
    params(
        ("Authorization" = String, Header, description = "Bearer access token")
    ),
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 403, description = "User is not verified", body = ErrorBody),
        (status = 422, description = "Invalid input or wrong old password", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn change_password(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> Result<Json<MessageResponse>, AuthError> {
    let request = body(payload);
    let pipeline = state.auth.pipeline();
    let ctx = pipeline.check_bearer(IdentityContext::new(), authorization(&headers))?;
    let ctx = pipeline.require_verified(ctx)?;
    let user_id = ctx
        .authorization()
        .map(|payload| payload.user_id)
        .ok_or_else(|| AuthError::unauthorized(messages::ACCESS_TOKEN_IS_REQUIRED))?;
    let response = state.auth.change_password(user_id, &request).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/users/oauth/google",
    params(OAuthQuery),
    responses(
        (status = 200, description = "Signed in through the provider", body = OAuthResponse),
        (status = 303, description = "Redirect to the frontend with tokens"),
        (status = 400, description = "Provider refused the identity", body = ErrorBody),
        (status = 502, description = "Provider unavailable", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn oauth_google(
    state: Extension<Arc<AppState>>,
    Query(query): Query<OAuthQuery>,
) -> Result<Response, AuthError> {
    let outcome = state.auth.oauth(&query.code).await?;
    match state.oauth_client_redirect.as_deref() {
        Some(target) => {
            let location = oauth_redirect_url(target, &outcome)?;
            Ok(Redirect::to(location.as_str()).into_response())
        }
        None => Ok(Json(OAuthResponse {
            message: messages::OAUTH_SUCCESS.to_string(),
            result: outcome,
        })
        .into_response()),
    }
}

fn oauth_redirect_url(target: &str, outcome: &OAuthOutcome) -> Result<Url, AuthError> {
    let mut url = Url::parse(target)
        .map_err(|err| anyhow::anyhow!("invalid oauth client redirect {target}: {err}"))?;
    url.query_pairs_mut()
        .append_pair("access_token", &outcome.tokens.access_token)
        .append_pair("refresh_token", &outcome.tokens.refresh_token)
        .append_pair("new_user", if outcome.new_user { "1" } else { "0" })
        .append_pair("verify", outcome.verify.as_str());
    Ok(url)
}
