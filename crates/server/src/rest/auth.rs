use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use shared_types::{
    ApiResponse, AppError, AuthResponse, LoginRequest, RefreshRequest, RegisterRequest,
    UpdateProfileRequest, UserResponse,
};
use sqlx::{Pool, Postgres};

use crate::auth::extractors::{AdminRequired, AuthRequired};
use crate::auth::{cookies, jwt, password};
use crate::error_convert::ValidateRequest;
use crate::extract::{parse_id, ApiJson};
use crate::repo::user::{self as user_repo, NewUser, Session};

/// Wrap a session in the envelope and set both auth cookies.
fn session_response(session: Session, status: StatusCode) -> Response {
    let body = AuthResponse {
        user: UserResponse::from(session.user),
        access_token: session.access_token.clone(),
        refresh_token: session.refresh_token.clone(),
        expires_in: jwt::access_token_expiry_minutes() * 60,
    };
    let envelope = if status == StatusCode::CREATED {
        ApiResponse::created(body)
    } else {
        ApiResponse::ok(body)
    };
    let mut response = envelope.into_response();
    cookies::set_auth_cookies(
        response.headers_mut(),
        &session.access_token,
        &session.refresh_token,
    );
    response
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Advocate registered", body = AuthResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 409, description = "Email already registered", body = AppError)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(pool, payload))]
pub async fn register(
    State(pool): State<Pool<Postgres>>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<Response, AppError> {
    payload.validate_request()?;

    let password_hash = password::hash_password(&payload.password)
        .map_err(|e| AppError::internal(e.to_string()))?;
    let email = payload.email.trim().to_lowercase();

    let user = user_repo::create_with_subscription(
        &pool,
        NewUser {
            email: &email,
            password_hash: &password_hash,
            advocate_code: payload.advocate_code.trim(),
            advocate_name: payload.advocate_name.trim(),
            enrollment_number: payload.enrollment_number.as_deref(),
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "advocate registered");
    let session = user_repo::issue_session(&pool, user).await?;
    Ok(session_response(session, StatusCode::CREATED))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = AppError),
        (status = 403, description = "Account inactive", body = AppError)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(pool, payload))]
pub async fn login(
    State(pool): State<Pool<Postgres>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Response, AppError> {
    payload.validate_request()?;

    let email = payload.email.trim().to_lowercase();
    let user = user_repo::find_by_email(&pool, &email).await?;

    // Unknown emails still pay for a hash check.
    let valid = password::verify_login(
        &payload.password,
        user.as_ref().map(|u| u.password_hash.as_str()),
    );
    let user = match user {
        Some(user) if valid => user,
        _ => return Err(AppError::unauthorized("Invalid email or password")),
    };

    if !user.is_active {
        return Err(AppError::forbidden("Account is inactive"));
    }

    user_repo::record_login(&pool, user.id).await?;
    let session = user_repo::issue_session(&pool, user).await?;
    Ok(session_response(session, StatusCode::OK))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body(content = Option<RefreshRequest>, description = "Falls back to the refresh cookie"),
    responses(
        (status = 200, description = "Tokens rotated", body = AuthResponse),
        (status = 401, description = "Invalid or expired refresh token", body = AppError)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip_all)]
pub async fn refresh(
    State(pool): State<Pool<Postgres>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .map_err(|_| AppError::bad_request("Malformed JSON body"))?
            .refresh_token
    };

    let token = from_body
        .or_else(|| cookies::extract_refresh_token(&headers))
        .ok_or_else(|| AppError::unauthorized("Refresh token required"))?;

    let session = user_repo::rotate_refresh_token(&pool, &token).await?;
    Ok(session_response(session, StatusCode::OK))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Logged out; all refresh tokens revoked"),
        (status = 401, description = "Not authenticated", body = AppError)
    ),
    tag = "auth",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(pool, auth), fields(user_id = %auth.user_id))]
pub async fn logout(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
) -> Result<Response, AppError> {
    user_repo::revoke_all(&pool, auth.user_id).await?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    cookies::clear_auth_cookies(response.headers_mut());
    Ok(response)
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = AppError)
    ),
    tag = "auth",
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
) -> Result<ApiResponse<UserResponse>, AppError> {
    let user = user_repo::find_by_id(&pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("Account no longer exists"))?;
    Ok(ApiResponse::ok(UserResponse::from(user)))
}

/// Update the signed-in advocate's name, email, mobile or enrollment number.
/// Tokens keep the old name and email until the next refresh.
#[utoipa::path(
    patch,
    path = "/api/auth/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 401, description = "Not authenticated", body = AppError),
        (status = 409, description = "Email already in use", body = AppError)
    ),
    tag = "auth",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(pool, auth, payload), fields(user_id = %auth.user_id))]
pub async fn update_me(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<ApiResponse<UserResponse>, AppError> {
    payload.validate_request()?;
    let user = user_repo::update_profile(&pool, auth.user_id, &payload.changes())
        .await?
        .ok_or_else(|| AppError::unauthorized("Account no longer exists"))?;
    tracing::info!("profile updated");
    Ok(ApiResponse::ok(UserResponse::from(user)))
}

/// Mark an advocate's enrollment as verified. The advocate picks the change
/// up on their next token refresh.
#[utoipa::path(
    post,
    path = "/api/auth/verify/{user_id}",
    params(("user_id" = String, Path, description = "User UUID")),
    responses(
        (status = 200, description = "Advocate verified", body = UserResponse),
        (status = 403, description = "ADMIN role required", body = AppError),
        (status = 404, description = "User not found", body = AppError)
    ),
    tag = "auth",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(pool, admin), fields(admin = %admin.0.sub))]
pub async fn verify_advocate(
    State(pool): State<Pool<Postgres>>,
    admin: AdminRequired,
    Path(user_id): Path<String>,
) -> Result<ApiResponse<UserResponse>, AppError> {
    let id = parse_id(&user_id, "user")?;
    let user = user_repo::set_verified(&pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    tracing::info!(user_id = %user.id, "advocate verified");
    Ok(ApiResponse::ok(UserResponse::from(user)))
}
