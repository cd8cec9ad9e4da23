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
    models::{Enrollment, EnrollmentRequest, MessageResponse},
    policy::{self, Action},
};

const STUDENT_NOT_FOUND: &str = "Student not found or not yours";

/// create_enrollment
///
/// [Guardian/Admin Route] Enrolls a student in a course. The student must be
/// reachable by the caller (own student, or any student for admins); the
/// `(student, course)` unique key turns a second attempt into 409.
#[utoipa::path(
    post,
    path = "/api/protected/enrollments",
    request_body = EnrollmentRequest,
    responses(
        (status = 201, description = "Enrolled", body = Enrollment),
        (status = 403, description = "Not authorized to enroll"),
        (status = 404, description = "Student or course not found"),
        (status = 409, description = "Already enrolled")
    ),
    security(("bearer" = []))
)]
pub async fn create_enrollment(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<EnrollmentRequest>,
) -> Result<(StatusCode, Json<Enrollment>), AppError> {
    let scope = policy::require(&user, Action::Enroll)?;

    let student = state
        .repo
        .find_student(payload.student_id, scope)
        .await?
        .ok_or(AppError::NotFound(STUDENT_NOT_FOUND))?;

    if state.repo.find_course(payload.course_id).await?.is_none() {
        return Err(AppError::NotFound("Course not found"));
    }

    let enrollment = state
        .repo
        .create_enrollment(student.id, payload.course_id, user.id)
        .await?;

    tracing::info!(
        enrollment_id = %enrollment.id,
        student_id = %student.id,
        course_id = %payload.course_id,
        assigned_by = %user.id,
        "student enrolled"
    );
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// list_enrollments
///
/// Enrollments of one student. Students may only list their own.
#[utoipa::path(
    get,
    path = "/api/protected/enrollments/{id}",
    params(("id" = Uuid, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Enrollments", body = [Enrollment]),
        (status = 404, description = "Student not found")
    ),
    security(("bearer" = []))
)]
pub async fn list_enrollments(
    user: AuthUser,
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Vec<Enrollment>>, AppError> {
    let scope = policy::require(&user, Action::ViewStudent)?;

    let student = state
        .repo
        .find_student(student_id, scope)
        .await?
        .ok_or(AppError::NotFound(STUDENT_NOT_FOUND))?;

    Ok(Json(state.repo.list_enrollments(student.id).await?))
}

/// delete_enrollment
#[utoipa::path(
    delete,
    path = "/api/protected/enrollments/{id}",
    params(("id" = Uuid, Path, description = "Enrollment ID")),
    responses(
        (status = 200, description = "Removed", body = MessageResponse),
        (status = 403, description = "Not authorized"),
        (status = 404, description = "Enrollment not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_enrollment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(enrollment_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let scope = policy::require(&user, Action::Unenroll)?;

    if !state.repo.delete_enrollment(enrollment_id, scope).await? {
        return Err(AppError::NotFound("Enrollment not found"));
    }

    tracing::info!(%enrollment_id, removed_by = %user.id, "enrollment removed");
    Ok(Json(MessageResponse::new("Unenrolled successfully")))
}
