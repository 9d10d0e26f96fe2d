use crate::{
    api::handlers::{health, AppState},
    auth::{AuthConfig, AuthService, GoogleIdentityProvider, OAuthConfig},
    store::{
        MemoryRefreshTokenStore, MemoryUserRepository, PgRefreshTokenStore, PgUserRepository,
    },
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::options,
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

/// Start the server.
///
/// Without a `dsn` the service runs on the in-memory stores.
///
/// # Errors
/// Return error if the config is invalid, the database is unreachable or the
/// listener fails
pub async fn new(
    port: u16,
    dsn: Option<String>,
    auth_config: AuthConfig,
    oauth_config: Option<OAuthConfig>,
) -> Result<()> {
    auth_config.validate()?;

    let (auth, database) = match dsn {
        Some(dsn) => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(&dsn)
                .await
                .context("Failed to connect to database")?;
            let auth = AuthService::new(
                auth_config,
                Arc::new(PgUserRepository::new(pool.clone())),
                Arc::new(PgRefreshTokenStore::new(pool.clone())),
            );
            (auth, Some(pool))
        }
        None => {
            warn!("No database configured, using in-memory stores");
            let auth = AuthService::new(
                auth_config,
                Arc::new(MemoryUserRepository::new()),
                Arc::new(MemoryRefreshTokenStore::new()),
            );
            (auth, None)
        }
    };

    let mut oauth_client_redirect = None;
    let auth = match oauth_config {
        Some(config) => {
            oauth_client_redirect = config.client_redirect_uri().map(str::to_string);
            let provider = GoogleIdentityProvider::new(config)?;
            auth.with_identity_provider(Arc::new(provider))
        }
        None => auth,
    };

    let state = Arc::new(
        AppState::new(auth, database).with_oauth_client_redirect(oauth_client_redirect),
    );
    let app = app(state)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", err);
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Wire the documented routes with request ids, tracing, CORS and the shared
/// state.
///
/// # Errors
/// Return error if the frontend base URL does not yield a valid origin
pub fn app(state: Arc<AppState>) -> Result<Router> {
    let frontend_origin = frontend_origin(state.auth.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    // Routes outside the OpenAPI router (preflight-only `OPTIONS /health`) are
    // not documented.
    let (router, _openapi) = router().split_for_parts();
    Ok(router
        .route("/health", options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state)),
        ))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_path() -> Result<()> {
        let origin = frontend_origin("https://tessera.dev/app/login")?;
        assert_eq!(origin, "https://tessera.dev");

        let origin = frontend_origin("http://localhost:5173/")?;
        assert_eq!(origin, "http://localhost:5173");

        assert!(frontend_origin("not a url").is_err());
        Ok(())
    }
}
