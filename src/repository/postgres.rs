use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{DuplicateKey, RepoError, RepoResult, Repository};
use crate::{
    models::{Course, CourseRequest, Enrollment, NewUser, Progress, Role, User},
    policy::StudentScope,
};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, is_active, verified, parent_id, created_at";
const COURSE_COLUMNS: &str = "id, title, description, reading_level, age_range, difficulty, \
     language, estimated_duration, tags";
const ENROLLMENT_COLUMNS: &str = "id, student_id, course_id, assigned_by, assigned_on";
const PROGRESS_COLUMNS: &str = "id, user_id, course_id, progress_percent, last_activity";

// Ownership predicate shared by every student-scoped statement. Expects the
// guardian filter in $2 and the identity filter in $3, both nullable.
const STUDENT_SCOPE: &str =
    "role = 'student' AND ($2::uuid IS NULL OR parent_id = $2) AND ($3::uuid IS NULL OR id = $3)";

/// PostgresRepository
///
/// The production implementation of `Repository`. All statements are runtime-checked
/// (`query_as` + `FromRow`), so building the crate does not need a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Turns unique-constraint violations into `RepoError::Duplicate`; everything else
/// stays an opaque database error.
fn classify(err: sqlx::Error) -> RepoError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            let key = match db_err.constraint() {
                Some("users_email_key") => DuplicateKey::Email,
                Some("users_username_key") => DuplicateKey::Username,
                Some("enrollments_student_course_key") => DuplicateKey::Enrollment,
                _ => DuplicateKey::Other,
            };
            return RepoError::Duplicate(key);
        }
    }
    RepoError::Database(err)
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let sql = format!(
            "INSERT INTO users (id, username, email, password_hash, role, is_active, verified, parent_id) \
             VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.verified)
            .bind(user.parent_id)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn mark_verified(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("UPDATE users SET verified = TRUE WHERE id = $1 RETURNING {USER_COLUMNS}");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        username: &str,
        email: &str,
    ) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET username = $2, email = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> RepoResult<bool> {
        let res = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        // Progress, enrollments and owned students go with it (ON DELETE CASCADE).
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_users(&self, active_only: bool) -> RepoResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE ($1 = FALSE OR is_active = TRUE) \
             ORDER BY created_at, username"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn set_role(&self, username: &str, role: Role) -> RepoResult<Option<User>> {
        let sql = format!("UPDATE users SET role = $2 WHERE username = $1 RETURNING {USER_COLUMNS}");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> RepoResult<Option<User>> {
        let sql =
            format!("UPDATE users SET is_active = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(active)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn count_students_of(&self, guardian_id: Uuid) -> RepoResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE parent_id = $1")
            .bind(guardian_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // --- STUDENTS ---

    async fn list_students_of(&self, guardian_id: Uuid) -> RepoResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE parent_id = $1 ORDER BY created_at, username"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(guardian_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_student(&self, id: Uuid, scope: StudentScope) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND {STUDENT_SCOPE}");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(scope.guardian())
            .bind(scope.only())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_student(
        &self,
        id: Uuid,
        scope: StudentScope,
        username: &str,
        email: &str,
    ) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET username = $4, email = $5 WHERE id = $1 AND {STUDENT_SCOPE} \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(scope.guardian())
            .bind(scope.only())
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn set_student_active(
        &self,
        id: Uuid,
        scope: StudentScope,
        active: bool,
    ) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET is_active = $4 WHERE id = $1 AND {STUDENT_SCOPE} \
             RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(scope.guardian())
            .bind(scope.only())
            .bind(active)
            .fetch_optional(&self.pool)
            .await?)
    }

    // --- COURSES ---

    async fn list_courses(&self) -> RepoResult<Vec<Course>> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY created_at, title");
        Ok(sqlx::query_as::<_, Course>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_course(&self, id: Uuid) -> RepoResult<Option<Course>> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");
        Ok(sqlx::query_as::<_, Course>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_course(&self, req: CourseRequest) -> RepoResult<Course> {
        let sql = format!(
            "INSERT INTO courses (id, title, description, reading_level, age_range, difficulty, \
             language, estimated_duration, tags) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COURSE_COLUMNS}"
        );
        sqlx::query_as::<_, Course>(&sql)
            .bind(Uuid::new_v4())
            .bind(req.title)
            .bind(req.description)
            .bind(req.reading_level)
            .bind(req.age_range)
            .bind(req.difficulty)
            .bind(req.language)
            .bind(req.estimated_duration)
            .bind(req.tags)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn update_course(&self, id: Uuid, req: CourseRequest) -> RepoResult<Option<Course>> {
        let sql = format!(
            "UPDATE courses SET title = $2, description = $3, reading_level = $4, age_range = $5, \
             difficulty = $6, language = $7, estimated_duration = $8, tags = $9 \
             WHERE id = $1 RETURNING {COURSE_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Course>(&sql)
            .bind(id)
            .bind(req.title)
            .bind(req.description)
            .bind(req.reading_level)
            .bind(req.age_range)
            .bind(req.difficulty)
            .bind(req.language)
            .bind(req.estimated_duration)
            .bind(req.tags)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_course(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- ENROLLMENTS ---

    /// Single conditional insert: the unique key, not a prior SELECT, decides duplicates.
    async fn create_enrollment(
        &self,
        student_id: Uuid,
        course_id: Uuid,
        assigned_by: Uuid,
    ) -> RepoResult<Enrollment> {
        let sql = format!(
            "INSERT INTO enrollments (id, student_id, course_id, assigned_by, assigned_on) \
             VALUES ($1, $2, $3, $4, NOW()) \
             ON CONFLICT ON CONSTRAINT enrollments_student_course_key DO NOTHING \
             RETURNING {ENROLLMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Enrollment>(&sql)
            .bind(Uuid::new_v4())
            .bind(student_id)
            .bind(course_id)
            .bind(assigned_by)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?
            .ok_or(RepoError::Duplicate(DuplicateKey::Enrollment))
    }

    async fn list_enrollments(&self, student_id: Uuid) -> RepoResult<Vec<Enrollment>> {
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE student_id = $1 ORDER BY assigned_on"
        );
        Ok(sqlx::query_as::<_, Enrollment>(&sql)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_enrollment(&self, id: Uuid, scope: StudentScope) -> RepoResult<bool> {
        let res = sqlx::query(
            "DELETE FROM enrollments e USING users u \
             WHERE e.id = $1 AND u.id = e.student_id AND u.role = 'student' \
             AND ($2::uuid IS NULL OR u.parent_id = $2) AND ($3::uuid IS NULL OR u.id = $3)",
        )
        .bind(id)
        .bind(scope.guardian())
        .bind(scope.only())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> RepoResult<bool> {
        let enrolled: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM enrollments WHERE student_id = $1 AND course_id = $2)",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(enrolled)
    }

    // --- PROGRESS ---

    async fn create_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        percent: f64,
    ) -> RepoResult<Option<Progress>> {
        let sql = format!(
            "INSERT INTO progress (id, user_id, course_id, progress_percent, last_activity) \
             SELECT $1::uuid, $2::uuid, $3::uuid, $4::double precision, NOW() \
             WHERE EXISTS (SELECT 1 FROM enrollments WHERE student_id = $2 AND course_id = $3) \
             RETURNING {PROGRESS_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Progress>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(course_id)
            .bind(percent)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_progress(&self, id: Uuid, user_id: Uuid) -> RepoResult<Option<Progress>> {
        let sql = format!("SELECT {PROGRESS_COLUMNS} FROM progress WHERE id = $1 AND user_id = $2");
        Ok(sqlx::query_as::<_, Progress>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_progress(
        &self,
        id: Uuid,
        user_id: Uuid,
        percent: f64,
    ) -> RepoResult<Option<Progress>> {
        let sql = format!(
            "UPDATE progress p SET progress_percent = $3, last_activity = NOW() \
             WHERE p.id = $1 AND p.user_id = $2 AND EXISTS ( \
                 SELECT 1 FROM enrollments e WHERE e.student_id = p.user_id AND e.course_id = p.course_id) \
             RETURNING {PROGRESS_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Progress>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(percent)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_progress(&self, user_id: Uuid) -> RepoResult<Vec<Progress>> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM progress WHERE user_id = $1 ORDER BY last_activity DESC"
        );
        Ok(sqlx::query_as::<_, Progress>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_progress_for_course(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> RepoResult<Vec<Progress>> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM progress WHERE user_id = $1 AND course_id = $2 \
             ORDER BY last_activity DESC"
        );
        Ok(sqlx::query_as::<_, Progress>(&sql)
            .bind(user_id)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await?)
    }
}
