use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{MessageResponse, Role, UpdateRoleRequest, UserListFilter, UserProfile},
    policy::{self, Action},
};

/// list_users
///
/// [Admin Route] Every account, or only active ones with `?active_only=true`.
#[utoipa::path(
    get,
    path = "/api/protected/users",
    params(UserListFilter),
    responses(
        (status = 200, description = "Users", body = [UserProfile]),
        (status = 403, description = "Admins only")
    ),
    security(("bearer" = []))
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<UserListFilter>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    policy::require(&user, Action::ManageAccounts)?;

    let users = state.repo.list_users(filter.active_only).await?;
    Ok(Json(users.iter().map(UserProfile::from).collect()))
}

/// update_role
///
/// [Admin Route] Changes the role of the account named by `username`.
/// Demoting an account to `student` is refused while students are still
/// linked to it, since a student's guardian must stay a guardian.
#[utoipa::path(
    post,
    path = "/api/protected/update-role",
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserProfile),
        (status = 403, description = "Admins only"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User still owns student accounts")
    ),
    security(("bearer" = []))
)]
pub async fn update_role(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<UserProfile>, AppError> {
    policy::require(&user, Action::ManageAccounts)?;

    let target = state
        .repo
        .find_user_by_username(&payload.username)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    if payload.role == Role::Student && state.repo.count_students_of(target.id).await? > 0 {
        return Err(AppError::Conflict(
            "User still has student accounts linked to them",
        ));
    }

    let updated = state
        .repo
        .set_role(&target.username, payload.role)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    tracing::info!(admin_id = %user.id, user_id = %updated.id, role = %updated.role, "role updated");
    Ok(Json(updated.into()))
}

/// deactivate_user
///
/// [Admin Route] Suspends any account. Suspended accounts cannot log in and
/// their existing tokens stop working.
#[utoipa::path(
    post,
    path = "/api/protected/deactivate-user/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deactivated", body = MessageResponse),
        (status = 404, description = "User not found"),
        (status = 409, description = "Cannot deactivate yourself or a guardian of students")
    ),
    security(("bearer" = []))
)]
pub async fn deactivate_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    policy::require(&user, Action::ManageAccounts)?;

    if id == user.id {
        return Err(AppError::Conflict("Administrators cannot deactivate themselves"));
    }
    // A student's guardian must stay an active account.
    if state.repo.count_students_of(id).await? > 0 {
        return Err(AppError::Conflict(
            "User still has student accounts linked to them",
        ));
    }

    let target = state
        .repo
        .set_user_active(id, false)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    tracing::info!(admin_id = %user.id, user_id = %target.id, "user deactivated");
    Ok(Json(MessageResponse::new(format!(
        "User {} deactivated",
        target.username
    ))))
}

/// reactivate_user
#[utoipa::path(
    post,
    path = "/api/protected/reactivate-user/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Reactivated", body = MessageResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []))
)]
pub async fn reactivate_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    policy::require(&user, Action::ManageAccounts)?;

    let target = state
        .repo
        .set_user_active(id, true)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    tracing::info!(admin_id = %user.id, user_id = %target.id, "user reactivated");
    Ok(Json(MessageResponse::new(format!(
        "User {} reactivated",
        target.username
    ))))
}
