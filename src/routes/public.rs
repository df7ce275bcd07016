use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Routes reachable without a token. `create_router` merges this router
/// without any access layer, so nothing here may read `AuthAdmin`.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /admin/auth/login
        // Exchanges a username and password for an access token and stamps the
        // login time and client ip. Bad usernames and bad passwords get the same
        // 401 message.
        .route("/admin/auth/login", post(handlers::auth::login))
}
