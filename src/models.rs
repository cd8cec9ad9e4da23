use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::AppError;

// --- Roles ---

/// Role
///
/// The closed set of account roles. Stored as lowercase text in `users.role`
/// and carried in the `role` claim of every access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Student,
    Parent,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "parent" => Ok(Role::Parent),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A row of the `users` table. Holds the password hash, so it is deliberately
/// not serializable; responses go through `UserProfile`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
    pub verified: bool,
    // Guardian that owns this account (students only).
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// NewUser
///
/// Everything the repository needs to insert a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub verified: bool,
    pub parent_id: Option<Uuid>,
}

/// Course
///
/// Catalog entry from the `courses` table. Courses have no owner; only
/// administrators may change them.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    // e.g. "Beginner", "Intermediate"
    pub reading_level: Option<String>,
    // e.g. "7-10"
    pub age_range: Option<String>,
    // 1 (easiest) to 5
    pub difficulty: Option<i32>,
    pub language: Option<String>,
    // Minutes.
    pub estimated_duration: Option<i32>,
    // Free text, usually comma separated.
    pub tags: Option<String>,
}

/// Enrollment
///
/// Links exactly one student to one course. `assigned_by` is the privileged
/// user that created the link (cleared if that user is deleted).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub assigned_by: Option<Uuid>,
    #[ts(type = "string")]
    pub assigned_on: DateTime<Utc>,
}

/// Progress
///
/// One reading attempt of a user against a course.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
pub struct Progress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub progress_percent: f64,
    #[ts(type = "string")]
    pub last_activity: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Self-registration payload (POST /api/auth/register). Also used by guardians
/// creating a student account.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// VerifyEmailQuery
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct VerifyEmailQuery {
    /// Token delivered in the verification mail.
    pub token: String,
}

/// UpdateProfileRequest
///
/// Replaces username and email. Used for the caller's own profile and for a
/// guardian editing one of their students.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateProfileRequest {
    pub username: String,
    pub email: String,
}

/// ChangePasswordRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

/// UpdateRoleRequest
///
/// Admin payload; an unknown role string is rejected during deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub username: String,
    pub role: Role,
}

/// UserListFilter
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct UserListFilter {
    /// Only return accounts that are not deactivated.
    #[serde(default)]
    pub active_only: bool,
}

/// CourseRequest
///
/// Full course body for create and edit (PUT replaces every field).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CourseRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reading_level: Option<String>,
    #[serde(default)]
    pub age_range: Option<String>,
    #[serde(default)]
    pub difficulty: Option<i32>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub estimated_duration: Option<i32>,
    #[serde(default)]
    pub tags: Option<String>,
}

/// EnrollmentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EnrollmentRequest {
    pub student_id: Uuid,
    pub course_id: Uuid,
}

/// ProgressRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProgressRequest {
    pub course_id: Uuid,
    pub progress_percent: f64,
}

/// ProgressUpdateRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProgressUpdateRequest {
    pub progress_percent: f64,
}

// --- Output Schemas ---

/// UserProfile
///
/// Public view of an account: everything except the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub verified: bool,
    pub is_active: bool,
    pub parent_id: Option<Uuid>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            verified: user.verified,
            is_active: user.is_active,
            parent_id: user.parent_id,
        }
    }
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile::from(&user)
    }
}

/// TokenResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// MessageResponse
///
/// Plain acknowledgement body, e.g. `{"detail": "Course deleted successfully"}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub detail: String,
}

impl MessageResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: detail.into() }
    }
}

/// UploadResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UploadResponse {
    pub detail: String,
    pub filename: String,
}

/// ReadingContent
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ReadingContent {
    pub content: String,
}

// --- Input Validation ---

const MIN_PASSWORD_LEN: usize = 8;
const MAX_USERNAME_LEN: usize = 50;

/// Trims and lower-cases an email so lookups and the unique key agree.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::validation("email", "not a valid email address"))
    }
}

pub(crate) fn validate_username(username: &str) -> Result<(), AppError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("username", "must not be empty"));
    }
    if trimmed.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::validation(
            "username",
            format!("must be at most {MAX_USERNAME_LEN} characters"),
        ));
    }
    Ok(())
}

pub(crate) fn validate_password(field: &'static str, password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            field,
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

pub(crate) fn validate_percent(percent: f64) -> Result<(), AppError> {
    if percent.is_finite() && (0.0..=100.0).contains(&percent) {
        Ok(())
    } else {
        Err(AppError::validation(
            "progress_percent",
            "must be a number between 0 and 100",
        ))
    }
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_username(&self.username)?;
        validate_email(&normalize_email(&self.email))?;
        validate_password("password", &self.password)
    }
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_username(&self.username)?;
        validate_email(&normalize_email(&self.email))
    }
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_password("new_password", &self.new_password)
    }
}

impl CourseRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::validation("title", "must not be empty"));
        }
        if let Some(difficulty) = self.difficulty {
            if !(1..=5).contains(&difficulty) {
                return Err(AppError::validation("difficulty", "must be between 1 and 5"));
            }
        }
        if let Some(minutes) = self.estimated_duration {
            if minutes < 0 {
                return Err(AppError::validation(
                    "estimated_duration",
                    "must not be negative",
                ));
            }
        }
        Ok(())
    }
}

impl ProgressRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_percent(self.progress_percent)
    }
}

impl ProgressUpdateRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_percent(self.progress_percent)
    }
}
