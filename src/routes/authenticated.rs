use crate::{
    AppState,
    handlers::{account, auth, courses, enrollments, progress, reading, students},
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Routes that live outside `/api/protected` but still need a token.
pub fn session_routes() -> Router<AppState> {
    Router::new().route("/api/auth/me", get(auth::me))
}

/// Authenticated Router Module
///
/// Mounted under `/api/protected`. Handlers here take an `AuthUser` and decide
/// per action through `policy`; the enclosing auth layer only guarantees that
/// the caller is a live, active account.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Own account ---
        .route("/me", get(account::profile))
        .route("/change-password", post(account::change_password))
        .route("/update-profile", post(account::update_profile))
        .route("/delete-account", delete(account::delete_account))
        // --- Course catalog ---
        // Reads for everyone; writes are checked for the admin role in the handlers.
        .route(
            "/courses",
            get(courses::list_courses).post(courses::create_course),
        )
        .route(
            "/courses/{id}",
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        // --- Enrollments ---
        // GET takes a student id, DELETE an enrollment id.
        .route("/enrollments", post(enrollments::create_enrollment))
        .route(
            "/enrollments/{id}",
            get(enrollments::list_enrollments).delete(enrollments::delete_enrollment),
        )
        // --- Progress (caller's own rows) ---
        .route(
            "/progress",
            get(progress::list_progress).post(progress::create_progress),
        )
        .route("/progress/{id}", put(progress::update_progress))
        .route("/progress/course/{course_id}", get(progress::course_progress))
        // --- Student management ---
        .route("/students/create", post(students::create_student))
        .route("/students/my-students", get(students::my_students))
        .route("/students/edit/{id}", put(students::edit_student))
        .route("/students/{id}/progress", get(students::student_progress))
        .route("/students/deactivate/{id}", post(students::deactivate_student))
        .route("/students/reactivate/{id}", post(students::reactivate_student))
        // --- Readings ---
        .route("/reading/upload", post(reading::upload_reading))
        .route("/reading/read/{filename}", get(reading::read_reading))
}
