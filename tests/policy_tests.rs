use readiq_backend::{
    auth::AuthUser,
    models::Role,
    policy::{Action, Decision, Denial, StudentScope, Target, authorize, require},
};
use uuid::Uuid;

fn caller(role: Role) -> AuthUser {
    AuthUser {
        id: Uuid::new_v4(),
        email: format!("{role}@example.com"),
        role,
    }
}

const ALL_ACTIONS: [Action; 11] = [
    Action::ReadCatalog,
    Action::ManageCatalog,
    Action::ManageAccounts,
    Action::CreateStudent,
    Action::ListOwnStudents,
    Action::ManageStudent,
    Action::ViewStudent,
    Action::Enroll,
    Action::Unenroll,
    Action::RecordProgress,
    Action::ReadUpload,
];

#[test]
fn test_admin_is_allowed_everything() {
    let admin = caller(Role::Admin);
    for action in ALL_ACTIONS {
        assert!(
            authorize(&admin, action, Target::Unscoped).is_allowed(),
            "admin denied {action:?}"
        );
    }
}

#[test]
fn test_admin_scopes() {
    let admin = caller(Role::Admin);

    assert_eq!(require(&admin, Action::ManageStudent), Ok(StudentScope::Any));
    assert_eq!(require(&admin, Action::Enroll), Ok(StudentScope::Any));
    // Students an admin creates are owned by that admin.
    assert_eq!(
        require(&admin, Action::CreateStudent),
        Ok(StudentScope::GuardedBy(admin.id))
    );
    assert_eq!(
        require(&admin, Action::RecordProgress),
        Ok(StudentScope::Only(admin.id))
    );
}

#[test]
fn test_guardians_are_scoped_to_their_students() {
    for role in [Role::Parent, Role::Teacher] {
        let guardian = caller(role);
        let scope = StudentScope::GuardedBy(guardian.id);

        for action in [
            Action::CreateStudent,
            Action::ListOwnStudents,
            Action::ManageStudent,
            Action::ViewStudent,
            Action::Enroll,
            Action::Unenroll,
        ] {
            assert_eq!(require(&guardian, action), Ok(scope), "{role} {action:?}");
        }

        assert_eq!(
            require(&guardian, Action::ManageCatalog),
            Err(Denial::Forbidden("Admins only"))
        );
        assert_eq!(
            require(&guardian, Action::ManageAccounts),
            Err(Denial::Forbidden("Admins only"))
        );
    }
}

#[test]
fn test_student_permissions() {
    let student = caller(Role::Student);

    assert_eq!(require(&student, Action::ReadCatalog), Ok(StudentScope::Any));
    assert_eq!(
        require(&student, Action::ViewStudent),
        Ok(StudentScope::Only(student.id))
    );
    assert_eq!(
        require(&student, Action::RecordProgress),
        Ok(StudentScope::Only(student.id))
    );

    for action in [
        Action::ManageCatalog,
        Action::ManageAccounts,
        Action::CreateStudent,
        Action::ListOwnStudents,
        Action::ManageStudent,
        Action::Enroll,
        Action::Unenroll,
    ] {
        assert!(
            matches!(require(&student, action), Err(Denial::Forbidden(_))),
            "student allowed {action:?}"
        );
    }
}

#[test]
fn test_scope_admits() {
    let guardian = Uuid::new_v4();
    let student = Uuid::new_v4();

    assert!(StudentScope::Any.admits(student, None));
    assert!(StudentScope::GuardedBy(guardian).admits(student, Some(guardian)));
    assert!(!StudentScope::GuardedBy(guardian).admits(student, Some(Uuid::new_v4())));
    assert!(!StudentScope::GuardedBy(guardian).admits(student, None));
    assert!(StudentScope::Only(student).admits(student, Some(guardian)));
    assert!(!StudentScope::Only(student).admits(guardian, None));
}

#[test]
fn test_scope_query_filters() {
    let id = Uuid::new_v4();

    assert_eq!(StudentScope::Any.guardian(), None);
    assert_eq!(StudentScope::Any.only(), None);
    assert_eq!(StudentScope::GuardedBy(id).guardian(), Some(id));
    assert_eq!(StudentScope::GuardedBy(id).only(), None);
    assert_eq!(StudentScope::Only(id).guardian(), None);
    assert_eq!(StudentScope::Only(id).only(), Some(id));
}

#[test]
fn test_owned_files() {
    let owner = caller(Role::Student);
    let stranger = caller(Role::Teacher);
    let admin = caller(Role::Admin);
    let target = Target::OwnedFile {
        owner: Some(owner.id),
    };

    assert!(authorize(&owner, Action::ReadUpload, target).is_allowed());
    assert!(authorize(&admin, Action::ReadUpload, target).is_allowed());
    assert_eq!(
        authorize(&stranger, Action::ReadUpload, target),
        Decision::Deny(Denial::NotFound("File not found"))
    );

    // Files without an owner prefix are for admins only.
    let orphan = Target::OwnedFile { owner: None };
    assert!(authorize(&admin, Action::ReadUpload, orphan).is_allowed());
    assert!(!authorize(&owner, Action::ReadUpload, orphan).is_allowed());
}
