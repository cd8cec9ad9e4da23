use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{
        MessageResponse, NewUser, Progress, RegisterRequest, Role, UpdateProfileRequest,
        UserProfile, normalize_email,
    },
    password,
    policy::{self, Action},
};

const STUDENT_NOT_FOUND: &str = "Student not found or not yours";

/// create_student
///
/// [Guardian/Admin Route] Creates a student account owned by the caller. No
/// verification mail: the guardian vouches for the address.
#[utoipa::path(
    post,
    path = "/api/protected/students/create",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Student created", body = UserProfile),
        (status = 403, description = "Not authorized to create students"),
        (status = 409, description = "Email or username already taken")
    ),
    security(("bearer" = []))
)]
pub async fn create_student(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let scope = policy::require(&user, Action::CreateStudent)?;
    payload.validate()?;

    let password_hash = password::hash_password(&payload.password)?;
    let student = state
        .repo
        .create_user(NewUser {
            username: payload.username.trim().to_string(),
            email: normalize_email(&payload.email),
            password_hash,
            role: Role::Student,
            verified: true,
            parent_id: scope.guardian(),
        })
        .await?;

    tracing::info!(student_id = %student.id, guardian_id = %user.id, "student created");
    Ok((StatusCode::CREATED, Json(student.into())))
}

/// my_students
#[utoipa::path(
    get,
    path = "/api/protected/students/my-students",
    responses(
        (status = 200, description = "Students owned by the caller", body = [UserProfile]),
        (status = 403, description = "Not authorized to view students")
    ),
    security(("bearer" = []))
)]
pub async fn my_students(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    let scope = policy::require(&user, Action::ListOwnStudents)?;
    let guardian = scope.guardian().unwrap_or(user.id);

    let students = state.repo.list_students_of(guardian).await?;
    Ok(Json(students.iter().map(UserProfile::from).collect()))
}

/// edit_student
#[utoipa::path(
    put,
    path = "/api/protected/students/edit/{id}",
    params(("id" = Uuid, Path, description = "Student ID")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 404, description = "Student not found or not yours"),
        (status = 409, description = "Email or username already taken")
    ),
    security(("bearer" = []))
)]
pub async fn edit_student(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let scope = policy::require(&user, Action::ManageStudent)?;
    payload.validate()?;

    let student = state
        .repo
        .update_student(
            id,
            scope,
            payload.username.trim(),
            &normalize_email(&payload.email),
        )
        .await?
        .ok_or(AppError::NotFound(STUDENT_NOT_FOUND))?;

    Ok(Json(student.into()))
}

/// student_progress
///
/// Progress rows of a student the caller may view.
#[utoipa::path(
    get,
    path = "/api/protected/students/{id}/progress",
    params(("id" = Uuid, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Progress", body = [Progress]),
        (status = 404, description = "Student not found or not yours")
    ),
    security(("bearer" = []))
)]
pub async fn student_progress(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Progress>>, AppError> {
    let scope = policy::require(&user, Action::ViewStudent)?;

    let student = state
        .repo
        .find_student(id, scope)
        .await?
        .ok_or(AppError::NotFound(STUDENT_NOT_FOUND))?;

    Ok(Json(state.repo.list_progress(student.id).await?))
}

/// deactivate_student
#[utoipa::path(
    post,
    path = "/api/protected/students/deactivate/{id}",
    params(("id" = Uuid, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Deactivated", body = MessageResponse),
        (status = 404, description = "Student not found or not yours")
    ),
    security(("bearer" = []))
)]
pub async fn deactivate_student(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    set_active(user, state, id, false).await
}

/// reactivate_student
#[utoipa::path(
    post,
    path = "/api/protected/students/reactivate/{id}",
    params(("id" = Uuid, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Reactivated", body = MessageResponse),
        (status = 404, description = "Student not found or not yours")
    ),
    security(("bearer" = []))
)]
pub async fn reactivate_student(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    set_active(user, state, id, true).await
}

async fn set_active(
    user: AuthUser,
    state: AppState,
    id: Uuid,
    active: bool,
) -> Result<Json<MessageResponse>, AppError> {
    let scope = policy::require(&user, Action::ManageStudent)?;

    let student = state
        .repo
        .set_student_active(id, scope, active)
        .await?
        .ok_or(AppError::NotFound(STUDENT_NOT_FOUND))?;

    let verb = if active { "reactivated" } else { "deactivated" };
    tracing::info!(student_id = %student.id, by = %user.id, "student {}", verb);
    Ok(Json(MessageResponse::new(format!(
        "Student {} {}.",
        student.username, verb
    ))))
}
