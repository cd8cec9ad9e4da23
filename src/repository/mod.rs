use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{Course, CourseRequest, Enrollment, NewUser, Progress, Role, User},
    policy::StudentScope,
};

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// DuplicateKey
///
/// Which uniqueness rule an insert or update ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKey {
    Email,
    Username,
    Enrollment,
    Other,
}

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("duplicate {0:?}")]
    Duplicate(DuplicateKey),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// The persistence contract the handlers are written against. Methods that take a
/// `StudentScope` must apply it in the same query that looks the record up, so that
/// records outside the scope are indistinguishable from missing ones.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` usable across Axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Fails with `Duplicate(Email | Username)` instead of checking first.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn mark_verified(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn update_profile(&self, id: Uuid, username: &str, email: &str)
    -> RepoResult<Option<User>>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> RepoResult<bool>;
    /// Cascades to progress, enrollments and owned students.
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;
    async fn list_users(&self, active_only: bool) -> RepoResult<Vec<User>>;
    async fn set_role(&self, username: &str, role: Role) -> RepoResult<Option<User>>;
    async fn set_user_active(&self, id: Uuid, active: bool) -> RepoResult<Option<User>>;
    async fn count_students_of(&self, guardian_id: Uuid) -> RepoResult<i64>;

    // --- Students (ownership-scoped) ---
    async fn list_students_of(&self, guardian_id: Uuid) -> RepoResult<Vec<User>>;
    async fn find_student(&self, id: Uuid, scope: StudentScope) -> RepoResult<Option<User>>;
    async fn update_student(
        &self,
        id: Uuid,
        scope: StudentScope,
        username: &str,
        email: &str,
    ) -> RepoResult<Option<User>>;
    async fn set_student_active(
        &self,
        id: Uuid,
        scope: StudentScope,
        active: bool,
    ) -> RepoResult<Option<User>>;

    // --- Courses ---
    async fn list_courses(&self) -> RepoResult<Vec<Course>>;
    async fn find_course(&self, id: Uuid) -> RepoResult<Option<Course>>;
    async fn create_course(&self, req: CourseRequest) -> RepoResult<Course>;
    async fn update_course(&self, id: Uuid, req: CourseRequest) -> RepoResult<Option<Course>>;
    async fn delete_course(&self, id: Uuid) -> RepoResult<bool>;

    // --- Enrollments ---
    /// Fails with `Duplicate(Enrollment)` when the pair already exists.
    async fn create_enrollment(
        &self,
        student_id: Uuid,
        course_id: Uuid,
        assigned_by: Uuid,
    ) -> RepoResult<Enrollment>;
    async fn list_enrollments(&self, student_id: Uuid) -> RepoResult<Vec<Enrollment>>;
    /// Deletes only if the enrolled student falls inside `scope`.
    async fn delete_enrollment(&self, id: Uuid, scope: StudentScope) -> RepoResult<bool>;
    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> RepoResult<bool>;

    // --- Progress ---
    /// Inserts only while an enrollment for (user, course) exists; `None` otherwise.
    async fn create_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        percent: f64,
    ) -> RepoResult<Option<Progress>>;
    async fn find_progress(&self, id: Uuid, user_id: Uuid) -> RepoResult<Option<Progress>>;
    /// Updates only the caller's row and only while still enrolled; `None` otherwise.
    async fn update_progress(
        &self,
        id: Uuid,
        user_id: Uuid,
        percent: f64,
    ) -> RepoResult<Option<Progress>>;
    async fn list_progress(&self, user_id: Uuid) -> RepoResult<Vec<Progress>>;
    async fn list_progress_for_course(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> RepoResult<Vec<Progress>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
