use crate::{AppState, handlers::admin};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Account administration, mounted under `/api/protected` next to the
/// authenticated routes. Authentication comes from the shared route layer;
/// every handler then requires `Action::ManageAccounts`, which only admins hold.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /users?active_only=true
        // One listing endpoint, optionally filtered to active accounts.
        .route("/users", get(admin::list_users))
        // POST /update-role
        .route("/update-role", post(admin::update_role))
        // POST /deactivate-user/{id}, /reactivate-user/{id}
        .route("/deactivate-user/{id}", post(admin::deactivate_user))
        .route("/reactivate-user/{id}", post(admin::reactivate_user))
}
