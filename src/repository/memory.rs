use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DuplicateKey, RepoError, RepoResult, Repository};
use crate::{
    models::{Course, CourseRequest, Enrollment, NewUser, Progress, Role, User},
    policy::StudentScope,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    courses: Vec<Course>,
    enrollments: Vec<Enrollment>,
    progress: Vec<Progress>,
}

impl Tables {
    fn check_unique_user(&self, id: Option<Uuid>, username: &str, email: &str) -> RepoResult<()> {
        let others = self.users.iter().filter(|u| Some(u.id) != id);
        for user in others {
            if user.email == email {
                return Err(RepoError::Duplicate(DuplicateKey::Email));
            }
            if user.username == username {
                return Err(RepoError::Duplicate(DuplicateKey::Username));
            }
        }
        Ok(())
    }

    fn student_mut(&mut self, id: Uuid, scope: StudentScope) -> Option<&mut User> {
        self.users.iter_mut().find(|u| {
            u.id == id && u.role == Role::Student && scope.admits(u.id, u.parent_id)
        })
    }

    fn enrolled(&self, user_id: Uuid, course_id: Uuid) -> bool {
        self.enrollments
            .iter()
            .any(|e| e.student_id == user_id && e.course_id == course_id)
    }
}

/// MemoryRepository
///
/// `Repository` backed by plain vectors behind a `tokio::sync::RwLock`. Mirrors the
/// constraints of the Postgres schema (unique keys, cascades, scoped lookups) so the
/// HTTP layer can be exercised end to end without a database.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut tables = self.tables.write().await;
        tables.check_unique_user(None, &user.username, &user.email)?;

        let row = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            is_active: true,
            verified: user.verified,
            parent_id: user.parent_id,
            created_at: Utc::now(),
        };
        tables.users.push(row.clone());
        Ok(row)
    }

    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn mark_verified(&self, id: Uuid) -> RepoResult<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.verified = true;
            u.clone()
        }))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        username: &str,
        email: &str,
    ) -> RepoResult<Option<User>> {
        let mut tables = self.tables.write().await;
        if !tables.users.iter().any(|u| u.id == id) {
            return Ok(None);
        }
        tables.check_unique_user(Some(id), username, email)?;
        Ok(tables.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.username = username.to_string();
            u.email = email.to_string();
            u.clone()
        }))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.users.iter().any(|u| u.id == id) {
            return Ok(false);
        }

        // Same reach as ON DELETE CASCADE on parent_id: the account and every account below it.
        let mut doomed: HashSet<Uuid> = HashSet::from([id]);
        loop {
            let before = doomed.len();
            for user in &tables.users {
                if user.parent_id.is_some_and(|p| doomed.contains(&p)) {
                    doomed.insert(user.id);
                }
            }
            if doomed.len() == before {
                break;
            }
        }

        tables.users.retain(|u| !doomed.contains(&u.id));
        tables.progress.retain(|p| !doomed.contains(&p.user_id));
        tables.enrollments.retain(|e| !doomed.contains(&e.student_id));
        for enrollment in tables.enrollments.iter_mut() {
            if enrollment.assigned_by.is_some_and(|a| doomed.contains(&a)) {
                enrollment.assigned_by = None;
            }
        }
        Ok(true)
    }

    async fn list_users(&self, active_only: bool) -> RepoResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| !active_only || u.is_active)
            .cloned()
            .collect())
    }

    async fn set_role(&self, username: &str, role: Role) -> RepoResult<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .users
            .iter_mut()
            .find(|u| u.username == username)
            .map(|u| {
                u.role = role;
                u.clone()
            }))
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> RepoResult<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.is_active = active;
            u.clone()
        }))
    }

    async fn count_students_of(&self, guardian_id: Uuid) -> RepoResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| u.parent_id == Some(guardian_id))
            .count() as i64)
    }

    async fn list_students_of(&self, guardian_id: Uuid) -> RepoResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| u.parent_id == Some(guardian_id))
            .cloned()
            .collect())
    }

    async fn find_student(&self, id: Uuid, scope: StudentScope) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.id == id && u.role == Role::Student && scope.admits(u.id, u.parent_id))
            .cloned())
    }

    async fn update_student(
        &self,
        id: Uuid,
        scope: StudentScope,
        username: &str,
        email: &str,
    ) -> RepoResult<Option<User>> {
        let mut tables = self.tables.write().await;
        if tables.student_mut(id, scope).is_none() {
            return Ok(None);
        }
        tables.check_unique_user(Some(id), username, email)?;
        Ok(tables.student_mut(id, scope).map(|u| {
            u.username = username.to_string();
            u.email = email.to_string();
            u.clone()
        }))
    }

    async fn set_student_active(
        &self,
        id: Uuid,
        scope: StudentScope,
        active: bool,
    ) -> RepoResult<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.student_mut(id, scope).map(|u| {
            u.is_active = active;
            u.clone()
        }))
    }

    async fn list_courses(&self) -> RepoResult<Vec<Course>> {
        Ok(self.tables.read().await.courses.clone())
    }

    async fn find_course(&self, id: Uuid) -> RepoResult<Option<Course>> {
        let tables = self.tables.read().await;
        Ok(tables.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn create_course(&self, req: CourseRequest) -> RepoResult<Course> {
        let course = Course {
            id: Uuid::new_v4(),
            title: req.title,
            description: req.description,
            reading_level: req.reading_level,
            age_range: req.age_range,
            difficulty: req.difficulty,
            language: req.language,
            estimated_duration: req.estimated_duration,
            tags: req.tags,
        };
        self.tables.write().await.courses.push(course.clone());
        Ok(course)
    }

    async fn update_course(&self, id: Uuid, req: CourseRequest) -> RepoResult<Option<Course>> {
        let mut tables = self.tables.write().await;
        Ok(tables.courses.iter_mut().find(|c| c.id == id).map(|c| {
            *c = Course {
                id,
                title: req.title,
                description: req.description,
                reading_level: req.reading_level,
                age_range: req.age_range,
                difficulty: req.difficulty,
                language: req.language,
                estimated_duration: req.estimated_duration,
                tags: req.tags,
            };
            c.clone()
        }))
    }

    async fn delete_course(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.courses.len();
        tables.courses.retain(|c| c.id != id);
        if tables.courses.len() == before {
            return Ok(false);
        }
        tables.enrollments.retain(|e| e.course_id != id);
        tables.progress.retain(|p| p.course_id != id);
        Ok(true)
    }

    async fn create_enrollment(
        &self,
        student_id: Uuid,
        course_id: Uuid,
        assigned_by: Uuid,
    ) -> RepoResult<Enrollment> {
        let mut tables = self.tables.write().await;
        if tables.enrolled(student_id, course_id) {
            return Err(RepoError::Duplicate(DuplicateKey::Enrollment));
        }
        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            student_id,
            course_id,
            assigned_by: Some(assigned_by),
            assigned_on: Utc::now(),
        };
        tables.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }

    async fn list_enrollments(&self, student_id: Uuid) -> RepoResult<Vec<Enrollment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .enrollments
            .iter()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn delete_enrollment(&self, id: Uuid, scope: StudentScope) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(position) = tables.enrollments.iter().position(|e| e.id == id) else {
            return Ok(false);
        };
        let student_id = tables.enrollments[position].student_id;
        let in_scope = tables.users.iter().any(|u| {
            u.id == student_id && u.role == Role::Student && scope.admits(u.id, u.parent_id)
        });
        if !in_scope {
            return Ok(false);
        }
        tables.enrollments.remove(position);
        Ok(true)
    }

    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> RepoResult<bool> {
        Ok(self.tables.read().await.enrolled(user_id, course_id))
    }

    async fn create_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        percent: f64,
    ) -> RepoResult<Option<Progress>> {
        let mut tables = self.tables.write().await;
        if !tables.enrolled(user_id, course_id) {
            return Ok(None);
        }
        let progress = Progress {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            progress_percent: percent,
            last_activity: Utc::now(),
        };
        tables.progress.push(progress.clone());
        Ok(Some(progress))
    }

    async fn find_progress(&self, id: Uuid, user_id: Uuid) -> RepoResult<Option<Progress>> {
        let tables = self.tables.read().await;
        Ok(tables
            .progress
            .iter()
            .find(|p| p.id == id && p.user_id == user_id)
            .cloned())
    }

    async fn update_progress(
        &self,
        id: Uuid,
        user_id: Uuid,
        percent: f64,
    ) -> RepoResult<Option<Progress>> {
        let mut tables = self.tables.write().await;
        let Some(course_id) = tables
            .progress
            .iter()
            .find(|p| p.id == id && p.user_id == user_id)
            .map(|p| p.course_id)
        else {
            return Ok(None);
        };
        if !tables.enrolled(user_id, course_id) {
            return Ok(None);
        }
        Ok(tables.progress.iter_mut().find(|p| p.id == id).map(|p| {
            p.progress_percent = percent;
            p.last_activity = Utc::now();
            p.clone()
        }))
    }

    async fn list_progress(&self, user_id: Uuid) -> RepoResult<Vec<Progress>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Progress> = tables
            .progress
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(rows)
    }

    async fn list_progress_for_course(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> RepoResult<Vec<Progress>> {
        let mut rows = self.list_progress(user_id).await?;
        rows.retain(|p| p.course_id == course_id);
        Ok(rows)
    }
}
