use crate::{AppState, handlers::auth};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a bearer token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/register
        // Creates an unverified student and queues the verification mail.
        .route("/api/auth/register", post(auth::register))
        // GET /api/auth/verify-email?token=...
        .route("/api/auth/verify-email", get(auth::verify_email))
        // POST /api/auth/login
        // Requires an active, verified account.
        .route("/api/auth/login", post(auth::login))
}
