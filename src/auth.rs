use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use uuid::Uuid;

use crate::{error::AppError, models::Role, repository::RepositoryState, token::TokenService};

/// AuthUser
///
/// The resolved identity of an authenticated request. Role and email come from the
/// user row, not from the token, so a role change or deactivation applies on the
/// very next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// AuthUser Extractor Implementation
///
/// 1. Reads `Authorization: Bearer <token>`.
/// 2. Verifies the token with the shared `TokenService`.
/// 3. Loads the account named by the `id` claim.
///
/// Rejection: `AppError`, so failures render as the usual JSON error body
/// (401 for token problems or a vanished account, 403 for a deactivated one).
///
/// Behind `auth_middleware` the identity is already resolved and stored in the
/// request extensions; handlers pick it up from there without another lookup.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let tokens = TokenService::from_ref(state);

        let token = bearer_token(parts).ok_or(AppError::MissingToken)?;
        let claims = tokens.verify(token)?;

        let user = repo.find_user(claims.id).await?.ok_or_else(|| {
            tracing::debug!(user_id = %claims.id, "token refers to a deleted account");
            AppError::InvalidCredentials
        })?;

        if !user.is_active {
            return Err(AppError::AccountDeactivated);
        }

        Ok(AuthUser {
            id: user.id,
            email: user.email,
            role: user.role,
        })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
