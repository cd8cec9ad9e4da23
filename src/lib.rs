use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod password;
pub mod policy;
pub mod repository;
pub mod storage;
pub mod token;

pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use mailer::MailerState;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{LocalDiskStore, MockReadingStore, StorageState};
pub use token::TokenService;

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json` and
/// browsable through Swagger UI at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register, handlers::auth::verify_email, handlers::auth::login,
        handlers::auth::me,
        handlers::account::profile, handlers::account::change_password,
        handlers::account::update_profile, handlers::account::delete_account,
        handlers::admin::list_users, handlers::admin::update_role,
        handlers::admin::deactivate_user, handlers::admin::reactivate_user,
        handlers::courses::list_courses, handlers::courses::get_course,
        handlers::courses::create_course, handlers::courses::update_course,
        handlers::courses::delete_course,
        handlers::enrollments::create_enrollment, handlers::enrollments::list_enrollments,
        handlers::enrollments::delete_enrollment,
        handlers::progress::create_progress, handlers::progress::list_progress,
        handlers::progress::update_progress, handlers::progress::course_progress,
        handlers::students::create_student, handlers::students::my_students,
        handlers::students::edit_student, handlers::students::student_progress,
        handlers::students::deactivate_student, handlers::students::reactivate_student,
        handlers::reading::upload_reading, handlers::reading::read_reading,
    ),
    components(
        schemas(
            models::Role, models::Course, models::Enrollment, models::Progress,
            models::RegisterRequest, models::LoginRequest, models::UpdateProfileRequest,
            models::ChangePasswordRequest, models::UpdateRoleRequest, models::CourseRequest,
            models::EnrollmentRequest, models::ProgressRequest, models::ProgressUpdateRequest,
            models::UserProfile, models::TokenResponse, models::MessageResponse,
            models::UploadResponse, models::ReadingContent,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "readiq", description = "ReadIQ reading platform API")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by the protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// Everything a request may need, built once in `main` (or in a test) and
/// cloned per request. Each service sits behind an `Arc`, so clones are cheap.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    pub mailer: MailerState,
    pub tokens: TokenService,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for MailerState {
    fn from_ref(app_state: &AppState) -> MailerState {
        app_state.mailer.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Route layer for everything behind a token. Extracting `AuthUser` does the
/// work: a missing or bad token, a deleted account or a deactivated one rejects
/// the request before any handler runs. The resolved user is kept in the
/// request extensions, so the handler's own `AuthUser` costs no second query.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the route tree, the auth layer, observability layers and CORS.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let protected = Router::new()
        .merge(authenticated::session_routes())
        .nest(
            "/api/protected",
            authenticated::authenticated_routes().merge(admin::admin_routes()),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(protected)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, tagged with the `x-request-id` set by the layer above
/// so every log line of the request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
