//! Runs the SQL repository against a live Postgres. Needs `DATABASE_URL`, so the
//! tests are ignored by default: `cargo test -- --ignored`.

use readiq_backend::{
    PostgresRepository,
    models::{CourseRequest, NewUser, Role, User},
    policy::StudentScope,
    repository::{DuplicateKey, RepoError, Repository},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// Rows persist between runs, so every name carries a random suffix.
fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..12])
}

async fn create_test_user(repo: &PostgresRepository, role: Role, parent: Option<&User>) -> User {
    let username = unique(role.as_str());
    repo.create_user(NewUser {
        email: format!("{username}@test.com"),
        username,
        password_hash: "not-a-real-hash".to_string(),
        role,
        verified: true,
        parent_id: parent.map(|p| p.id),
    })
    .await
    .expect("Failed to create test user")
}

async fn create_test_course(repo: &PostgresRepository) -> Uuid {
    repo.create_course(CourseRequest {
        title: unique("course"),
        difficulty: Some(2),
        ..CourseRequest::default()
    })
    .await
    .expect("Failed to create test course")
    .id
}

// --- Tests ---

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_user_lookup_and_unique_keys() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&repo, Role::Parent, None).await;

    let by_email = repo.find_user_by_email(&user.email).await.unwrap().unwrap();
    assert_eq!(by_email.id, user.id);
    assert_eq!(by_email.role, Role::Parent);
    assert!(by_email.is_active);

    let clash = repo
        .create_user(NewUser {
            username: unique("other"),
            email: user.email.clone(),
            password_hash: "x".to_string(),
            role: Role::Student,
            verified: false,
            parent_id: None,
        })
        .await;
    assert!(matches!(clash, Err(RepoError::Duplicate(DuplicateKey::Email))));

    let clash = repo
        .create_user(NewUser {
            username: user.username.clone(),
            email: format!("{}@test.com", unique("other")),
            password_hash: "x".to_string(),
            role: Role::Student,
            verified: false,
            parent_id: None,
        })
        .await;
    assert!(matches!(
        clash,
        Err(RepoError::Duplicate(DuplicateKey::Username))
    ));

    repo.delete_user(user.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_student_scope_is_enforced_in_sql() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let parent = create_test_user(&repo, Role::Parent, None).await;
    let stranger = create_test_user(&repo, Role::Teacher, None).await;
    let student = create_test_user(&repo, Role::Student, Some(&parent)).await;

    assert!(
        repo.find_student(student.id, StudentScope::GuardedBy(parent.id))
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        repo.find_student(student.id, StudentScope::GuardedBy(stranger.id))
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        repo.find_student(student.id, StudentScope::Only(student.id))
            .await
            .unwrap()
            .is_some()
    );

    let deactivated = repo
        .set_student_active(student.id, StudentScope::GuardedBy(parent.id), false)
        .await
        .unwrap()
        .unwrap();
    assert!(!deactivated.is_active);

    assert!(
        repo.set_student_active(student.id, StudentScope::GuardedBy(stranger.id), true)
            .await
            .unwrap()
            .is_none()
    );

    let students = repo.list_students_of(parent.id).await.unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(repo.count_students_of(parent.id).await.unwrap(), 1);

    repo.delete_user(parent.id).await.unwrap();
    repo.delete_user(stranger.id).await.unwrap();
    // Cascaded through parent_id.
    assert!(repo.find_user(student.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_enrollment_and_progress_lifecycle() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let parent = create_test_user(&repo, Role::Parent, None).await;
    let student = create_test_user(&repo, Role::Student, Some(&parent)).await;
    let course_id = create_test_course(&repo).await;

    // No enrollment yet, so no progress row.
    assert!(
        repo.create_progress(student.id, course_id, 10.0)
            .await
            .unwrap()
            .is_none()
    );

    let enrollment = repo
        .create_enrollment(student.id, course_id, parent.id)
        .await
        .unwrap();
    assert_eq!(enrollment.assigned_by, Some(parent.id));
    assert!(repo.is_enrolled(student.id, course_id).await.unwrap());

    let again = repo.create_enrollment(student.id, course_id, parent.id).await;
    assert!(matches!(
        again,
        Err(RepoError::Duplicate(DuplicateKey::Enrollment))
    ));

    let progress = repo
        .create_progress(student.id, course_id, 10.0)
        .await
        .unwrap()
        .unwrap();
    let updated = repo
        .update_progress(progress.id, student.id, 80.0)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.progress_percent, 80.0);
    assert!(updated.last_activity >= progress.last_activity);

    assert!(
        repo.update_progress(progress.id, parent.id, 90.0)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(
        repo.list_progress_for_course(student.id, course_id)
            .await
            .unwrap()
            .len(),
        1
    );

    assert!(
        repo.delete_enrollment(enrollment.id, StudentScope::GuardedBy(parent.id))
            .await
            .unwrap()
    );
    assert!(
        repo.update_progress(progress.id, student.id, 95.0)
            .await
            .unwrap()
            .is_none()
    );

    repo.delete_course(course_id).await.unwrap();
    assert!(repo.list_progress(student.id).await.unwrap().is_empty());
    repo.delete_user(parent.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_course_replace_and_delete() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let course_id = create_test_course(&repo).await;

    let replaced = repo
        .update_course(
            course_id,
            CourseRequest {
                title: "Retitled".to_string(),
                language: Some("en".to_string()),
                ..CourseRequest::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(replaced.title, "Retitled");
    assert_eq!(replaced.difficulty, None);
    assert_eq!(replaced.language.as_deref(), Some("en"));

    assert!(repo.delete_course(course_id).await.unwrap());
    assert!(repo.find_course(course_id).await.unwrap().is_none());
    assert!(
        repo.update_course(course_id, CourseRequest::default())
            .await
            .unwrap()
            .is_none()
    );
}
