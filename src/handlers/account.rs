use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{
        ChangePasswordRequest, MessageResponse, UpdateProfileRequest, UserProfile,
        normalize_email,
    },
    password,
};

/// profile
///
/// [Authenticated Route] Same payload as `/api/auth/me`, under the protected prefix.
#[utoipa::path(
    get,
    path = "/api/protected/me",
    responses((status = 200, description = "Current user", body = UserProfile)),
    security(("bearer" = []))
)]
pub async fn profile(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, AppError> {
    super::load_profile(&state, user.id).await.map(Json)
}

/// change_password
#[utoipa::path(
    post,
    path = "/api/protected/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 422, description = "Password too short")
    ),
    security(("bearer" = []))
)]
pub async fn change_password(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate()?;

    let hash = password::hash_password(&payload.new_password)?;
    if !state.repo.update_password(user.id, &hash).await? {
        return Err(AppError::NotFound("User not found"));
    }

    tracing::info!(user_id = %user.id, "password changed");
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// update_profile
///
/// Replaces the caller's username and email. Taken values yield 409.
#[utoipa::path(
    post,
    path = "/api/protected/update-profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserProfile),
        (status = 409, description = "Email or username already taken")
    ),
    security(("bearer" = []))
)]
pub async fn update_profile(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    payload.validate()?;

    let email = normalize_email(&payload.email);
    let updated = state
        .repo
        .update_profile(user.id, payload.username.trim(), &email)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    Ok(Json(updated.into()))
}

/// delete_account
///
/// Removes the caller together with their progress, enrollments and any
/// student accounts they own.
#[utoipa::path(
    delete,
    path = "/api/protected/delete-account",
    responses((status = 200, description = "Deleted", body = MessageResponse)),
    security(("bearer" = []))
)]
pub async fn delete_account(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.repo.delete_user(user.id).await? {
        return Err(AppError::NotFound("User not found"));
    }

    tracing::info!(user_id = %user.id, "account deleted");
    Ok(Json(MessageResponse::new("Account deleted successfully")))
}
