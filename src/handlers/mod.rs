//! HTTP handlers, one module per resource.
//!
//! Every protected handler receives the caller as an `AuthUser` and asks
//! `policy::authorize` (or `policy::require`) before touching the repository.
//! Ownership-scoped lookups pass the returned `StudentScope` down so that
//! "not yours" and "missing" both come back as `NotFound`.

pub mod account;
pub mod admin;
pub mod auth;
pub mod courses;
pub mod enrollments;
pub mod progress;
pub mod reading;
pub mod students;

use crate::{AppState, error::AppError, models::UserProfile};
use uuid::Uuid;

/// Loads the profile of an account that must exist (the caller, usually).
pub(crate) async fn load_profile(state: &AppState, id: Uuid) -> Result<UserProfile, AppError> {
    state
        .repo
        .find_user(id)
        .await?
        .map(UserProfile::from)
        .ok_or(AppError::NotFound("User not found"))
}
