//! Router modules, split by who may reach them.
//!
//! `public` needs no token. `authenticated` and `admin` are merged under
//! `/api/protected` and wrapped in the `auth_middleware` route layer, so every
//! handler there runs with a resolved `AuthUser`. Role checks happen in the
//! handlers through `policy`.

/// Registration, login, email verification and health.
pub mod public;

/// Routes for any signed-in user (courses, enrollments, progress, students, readings).
pub mod authenticated;

/// Account administration; handlers reject non-admins.
pub mod admin;
