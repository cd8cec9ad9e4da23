use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    mailer::{self, OutgoingMail},
    models::{
        LoginRequest, MessageResponse, NewUser, RegisterRequest, Role, TokenResponse,
        UserProfile, VerifyEmailQuery, normalize_email,
    },
    password,
};

/// register
///
/// [Public Route] Self-registration. Creates an unverified student account and
/// mails a verification link. The mail goes out on a background task; a delivery
/// failure is logged and does not undo the registration.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered, verification mail queued", body = MessageResponse),
        (status = 409, description = "Email or username already taken"),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    payload.validate()?;

    let email = normalize_email(&payload.email);
    let password_hash = password::hash_password(&payload.password)?;

    // The unique keys decide duplicates; there is no lookup first.
    let user = state
        .repo
        .create_user(NewUser {
            username: payload.username.trim().to_string(),
            email,
            password_hash,
            role: Role::Student,
            verified: false,
            parent_id: None,
        })
        .await?;

    tracing::info!(user_id = %user.id, "user registered");

    let token = state.tokens.issue_email_token(&user.email)?;
    mailer::dispatch(
        state.mailer.clone(),
        OutgoingMail::verification(&state.config, &user.email, &token),
    );

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            "User registered successfully. Please check your email to verify your account.",
        )),
    ))
}

/// verify_email
///
/// [Public Route] Consumes the token from the verification mail.
#[utoipa::path(
    get,
    path = "/api/auth/verify-email",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired token"),
        (status = 404, description = "User not found")
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = state.tokens.verify_email_token(&query.token).map_err(|e| {
        tracing::debug!(error = %e, "verification token rejected");
        AppError::InvalidVerificationToken
    })?;

    let user = state
        .repo
        .find_user_by_email(&email)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    if user.verified {
        return Ok(Json(MessageResponse::new("Email already verified")));
    }

    state
        .repo
        .mark_verified(user.id)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    tracing::info!(user_id = %user.id, "email verified");
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

/// login
///
/// [Public Route] Exchanges email and password for a bearer token.
///
/// Checks run in a fixed order: credentials, then `is_active`, then `verified`.
/// An unknown email and a wrong password produce the same response.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials or email not verified"),
        (status = 403, description = "Account deactivated")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let email = normalize_email(&payload.email);

    let Some(user) = state.repo.find_user_by_email(&email).await? else {
        password::verify_against_dummy(&payload.password);
        return Err(AppError::InvalidCredentials);
    };

    if !password::verify_password(&payload.password, &user.password_hash) {
        return Err(AppError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(AppError::AccountDeactivated);
    }
    if !user.verified {
        return Err(AppError::EmailNotVerified);
    }

    let access_token = state.tokens.issue(&user.email, user.role, user.id)?;
    tracing::info!(user_id = %user.id, "login succeeded");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// me
///
/// [Authenticated Route] Profile of the token holder.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn me(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, AppError> {
    super::load_profile(&state, user.id).await.map(Json)
}
