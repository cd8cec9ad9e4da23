//! Authorization policy.
//!
//! Every protected operation asks one question: may this caller perform this
//! action, and if so over which students? The answer is a [`Decision`]. An
//! allowed decision carries a [`StudentScope`] that repositories apply inside
//! their queries, so a student the caller does not own is filtered out before
//! existence is ever checked. "Not yours" and "does not exist" therefore look
//! the same to the caller.
//!
//! No IO happens here.

use uuid::Uuid;

use crate::{auth::AuthUser, models::Role};

/// Action
///
/// The operations the policy knows about. Adding a variant forces every role
/// to be decided in `decide` (the match is exhaustive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// List or read courses.
    ReadCatalog,
    /// Create, edit or delete courses.
    ManageCatalog,
    /// List users, change roles, (de)activate any account.
    ManageAccounts,
    /// Create a student account owned by the caller.
    CreateStudent,
    /// List the students the caller owns.
    ListOwnStudents,
    /// Edit, deactivate or reactivate a student account.
    ManageStudent,
    /// Read a student's progress or enrollments.
    ViewStudent,
    /// Enroll a student in a course.
    Enroll,
    /// Remove an enrollment.
    Unenroll,
    /// Create or update the caller's own progress.
    RecordProgress,
    /// Read an uploaded reading file.
    ReadUpload,
}

/// StudentScope
///
/// Which student accounts an allowed caller can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentScope {
    /// Any student (administrators).
    Any,
    /// Students whose `parent_id` is this guardian.
    GuardedBy(Uuid),
    /// Only this account (a student acting on itself).
    Only(Uuid),
}

impl StudentScope {
    /// Guardian filter for `parent_id = $n`, if any.
    pub fn guardian(self) -> Option<Uuid> {
        match self {
            StudentScope::GuardedBy(id) => Some(id),
            _ => None,
        }
    }

    /// Identity filter for `id = $n`, if any.
    pub fn only(self) -> Option<Uuid> {
        match self {
            StudentScope::Only(id) => Some(id),
            _ => None,
        }
    }

    /// In-memory equivalent of the SQL ownership predicate.
    pub fn admits(self, student_id: Uuid, parent_id: Option<Uuid>) -> bool {
        match self {
            StudentScope::Any => true,
            StudentScope::GuardedBy(guardian) => parent_id == Some(guardian),
            StudentScope::Only(id) => student_id == id,
        }
    }
}

/// Target
///
/// What the action is aimed at, when that is known before any query runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Role alone decides; record ownership (if any) is applied through the scope.
    Unscoped,
    /// A stored file whose name carries its owner's id.
    OwnedFile { owner: Option<Uuid> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// The caller's role may never perform the action.
    Forbidden(&'static str),
    /// The target is missing or not the caller's; indistinguishable on purpose.
    NotFound(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow(StudentScope),
    Deny(Denial),
}

impl Decision {
    pub fn into_result(self) -> Result<StudentScope, Denial> {
        match self {
            Decision::Allow(scope) => Ok(scope),
            Decision::Deny(denial) => Err(denial),
        }
    }

    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// authorize
///
/// The single decision procedure used by every protected handler.
pub fn authorize(caller: &AuthUser, action: Action, target: Target) -> Decision {
    let scope = match decide(caller.role, caller.id, action) {
        Ok(scope) => scope,
        Err(denial) => return Decision::Deny(denial),
    };

    match target {
        Target::Unscoped => Decision::Allow(scope),
        Target::OwnedFile { owner } => {
            let visible = match scope {
                StudentScope::Any => true,
                StudentScope::GuardedBy(id) | StudentScope::Only(id) => owner == Some(id),
            };
            if visible {
                Decision::Allow(scope)
            } else {
                Decision::Deny(Denial::NotFound("File not found"))
            }
        }
    }
}

/// Shorthand for the common `authorize(.., Target::Unscoped)?` call.
pub fn require(caller: &AuthUser, action: Action) -> Result<StudentScope, Denial> {
    authorize(caller, action, Target::Unscoped).into_result()
}

fn decide(role: Role, caller_id: Uuid, action: Action) -> Result<StudentScope, Denial> {
    use Action::*;
    use Role::*;

    match (role, action) {
        (_, ReadCatalog) => Ok(StudentScope::Any),
        (Admin, ManageCatalog) => Ok(StudentScope::Any),
        (Student | Parent | Teacher, ManageCatalog) => Err(Denial::Forbidden("Admins only")),

        (Admin, ManageAccounts) => Ok(StudentScope::Any),
        (Student | Parent | Teacher, ManageAccounts) => Err(Denial::Forbidden("Admins only")),

        // Whoever creates a student becomes its guardian, administrators included.
        (Admin | Parent | Teacher, CreateStudent | ListOwnStudents) => {
            Ok(StudentScope::GuardedBy(caller_id))
        }
        (Student, CreateStudent) => Err(Denial::Forbidden("Not authorized to create students")),
        (Student, ListOwnStudents) => Err(Denial::Forbidden("Not authorized to view students")),

        (Admin, ManageStudent | ViewStudent | Enroll | Unenroll) => Ok(StudentScope::Any),
        (Parent | Teacher, ManageStudent | ViewStudent | Enroll | Unenroll) => {
            Ok(StudentScope::GuardedBy(caller_id))
        }
        (Student, ViewStudent) => Ok(StudentScope::Only(caller_id)),
        (Student, ManageStudent) => Err(Denial::Forbidden("Not authorized to manage students")),
        (Student, Enroll) => Err(Denial::Forbidden("Not authorized to enroll")),
        (Student, Unenroll) => Err(Denial::Forbidden("Not authorized to remove enrollments")),

        (_, RecordProgress) => Ok(StudentScope::Only(caller_id)),

        (Admin, ReadUpload) => Ok(StudentScope::Any),
        (Student | Parent | Teacher, ReadUpload) => Ok(StudentScope::Only(caller_id)),
    }
}
