//! Route handlers. Each handler composes the credential checks its route
//! needs, then calls one `AuthService` operation.

pub mod health;
pub mod users;

use sqlx::PgPool;

use crate::auth::AuthService;

/// Shared handler state, installed as an `Extension`.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    /// `None` when running on the in-memory stores.
    pub database: Option<PgPool>,
    /// Frontend page that receives OAuth tokens; JSON is returned when unset.
    pub oauth_client_redirect: Option<String>,
}

impl AppState {
    #[must_use]
    pub fn new(auth: AuthService, database: Option<PgPool>) -> Self {
        Self {
            auth,
            database,
            oauth_client_redirect: None,
        }
    }

    #[must_use]
    pub fn with_oauth_client_redirect(mut self, uri: Option<String>) -> Self {
        self.oauth_client_redirect = uri;
        self
    }
}
