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
    models::{Course, CourseRequest, MessageResponse},
    policy::{self, Action},
};

/// list_courses
///
/// [Authenticated Route] The whole catalog.
#[utoipa::path(
    get,
    path = "/api/protected/courses",
    responses((status = 200, description = "Courses", body = [Course])),
    security(("bearer" = []))
)]
pub async fn list_courses(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Course>>, AppError> {
    policy::require(&user, Action::ReadCatalog)?;
    Ok(Json(state.repo.list_courses().await?))
}

/// get_course
#[utoipa::path(
    get,
    path = "/api/protected/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Found", body = Course),
        (status = 404, description = "Course not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Course>, AppError> {
    policy::require(&user, Action::ReadCatalog)?;

    state
        .repo
        .find_course(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Course not found"))
}

/// create_course
///
/// [Admin Route] Adds a catalog entry.
#[utoipa::path(
    post,
    path = "/api/protected/courses",
    request_body = CourseRequest,
    responses(
        (status = 201, description = "Created", body = Course),
        (status = 403, description = "Admins only"),
        (status = 422, description = "Invalid course")
    ),
    security(("bearer" = []))
)]
pub async fn create_course(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CourseRequest>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    policy::require(&user, Action::ManageCatalog)?;
    payload.validate()?;

    let course = state.repo.create_course(payload).await?;
    tracing::info!(course_id = %course.id, "course created");
    Ok((StatusCode::CREATED, Json(course)))
}

/// update_course
///
/// [Admin Route] Replaces every field of a course.
#[utoipa::path(
    put,
    path = "/api/protected/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = CourseRequest,
    responses(
        (status = 200, description = "Updated", body = Course),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Course not found")
    ),
    security(("bearer" = []))
)]
pub async fn update_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CourseRequest>,
) -> Result<Json<Course>, AppError> {
    policy::require(&user, Action::ManageCatalog)?;
    payload.validate()?;

    state
        .repo
        .update_course(id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Course not found"))
}

/// delete_course
///
/// [Admin Route] Enrollments and progress for the course go with it.
#[utoipa::path(
    delete,
    path = "/api/protected/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Course not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    policy::require(&user, Action::ManageCatalog)?;

    if !state.repo.delete_course(id).await? {
        return Err(AppError::NotFound("Course not found"));
    }

    tracing::info!(course_id = %id, "course deleted");
    Ok(Json(MessageResponse::new("Course deleted successfully")))
}
