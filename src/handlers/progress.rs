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
    models::{Progress, ProgressRequest, ProgressUpdateRequest},
    policy::{self, Action},
};

/// create_progress
///
/// Records a reading attempt. The insert itself checks for an enrollment, so a
/// concurrent unenroll cannot slip a row through. An unknown course has no
/// enrollment either and gets the same 403.
#[utoipa::path(
    post,
    path = "/api/protected/progress",
    request_body = ProgressRequest,
    responses(
        (status = 201, description = "Recorded", body = Progress),
        (status = 403, description = "Not enrolled in this course"),
        (status = 422, description = "Percent out of range")
    ),
    security(("bearer" = []))
)]
pub async fn create_progress(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ProgressRequest>,
) -> Result<(StatusCode, Json<Progress>), AppError> {
    policy::require(&user, Action::RecordProgress)?;
    payload.validate()?;

    let progress = state
        .repo
        .create_progress(user.id, payload.course_id, payload.progress_percent)
        .await?
        .ok_or(AppError::NotEnrolled)?;

    Ok((StatusCode::CREATED, Json(progress)))
}

/// list_progress
///
/// The caller's own rows, most recent first.
#[utoipa::path(
    get,
    path = "/api/protected/progress",
    responses((status = 200, description = "Progress", body = [Progress])),
    security(("bearer" = []))
)]
pub async fn list_progress(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Progress>>, AppError> {
    Ok(Json(state.repo.list_progress(user.id).await?))
}

/// update_progress
#[utoipa::path(
    put,
    path = "/api/protected/progress/{id}",
    params(("id" = Uuid, Path, description = "Progress ID")),
    request_body = ProgressUpdateRequest,
    responses(
        (status = 200, description = "Updated", body = Progress),
        (status = 403, description = "No longer enrolled"),
        (status = 404, description = "Progress record not found")
    ),
    security(("bearer" = []))
)]
pub async fn update_progress(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProgressUpdateRequest>,
) -> Result<Json<Progress>, AppError> {
    policy::require(&user, Action::RecordProgress)?;
    payload.validate()?;

    if let Some(progress) = state
        .repo
        .update_progress(id, user.id, payload.progress_percent)
        .await?
    {
        return Ok(Json(progress));
    }

    // Nothing changed: either the row is not the caller's, or the enrollment is gone.
    match state.repo.find_progress(id, user.id).await? {
        Some(_) => Err(AppError::NotEnrolled),
        None => Err(AppError::NotFound("Progress record not found")),
    }
}

/// course_progress
///
/// The caller's rows for one course. Requires an enrollment in it.
#[utoipa::path(
    get,
    path = "/api/protected/progress/course/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Progress", body = [Progress]),
        (status = 403, description = "Not enrolled in this course")
    ),
    security(("bearer" = []))
)]
pub async fn course_progress(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<Progress>>, AppError> {
    if !state.repo.is_enrolled(user.id, course_id).await? {
        return Err(AppError::NotEnrolled);
    }

    Ok(Json(
        state
            .repo
            .list_progress_for_course(user.id, course_id)
            .await?,
    ))
}
