use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use sqlx::{Pool, Postgres};

use super::cookies;
use super::jwt::validate_access_token;
use crate::repo::user as user_repo;

/// Permissive auth middleware.
///
/// On each request:
/// 1. Validates the access token from cookies (or Bearer header fallback)
/// 2. If missing or expired, attempts transparent refresh using the refresh cookie
/// 3. Sets rotated cookies on the response when a refresh happened
///
/// Does NOT reject unauthenticated requests. Extractors decide authorization.
pub async fn auth_middleware(
    State(pool): State<Pool<Postgres>>,
    mut req: Request,
    next: Next,
) -> Response {
    let headers = req.headers().clone();
    let mut refreshed: Option<(String, String)> = None;

    let access_token = cookies::extract_access_token(&headers);
    let mut needs_refresh = access_token.is_none();

    if let Some(token) = access_token {
        match validate_access_token(&token) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
            }
            Err(_) => needs_refresh = true,
        }
    }

    if needs_refresh {
        if let Some(refresh_token) = cookies::extract_refresh_token(&headers) {
            match user_repo::rotate_refresh_token(&pool, &refresh_token).await {
                Ok(session) => {
                    if let Ok(claims) = validate_access_token(&session.access_token) {
                        req.extensions_mut().insert(claims);
                        refreshed = Some((session.access_token, session.refresh_token));
                    }
                }
                Err(e) => tracing::debug!(error = %e, "transparent refresh rejected"),
            }
        }
    }

    let mut response = next.run(req).await;

    if let Some((access, refresh)) = refreshed {
        cookies::set_auth_cookies(response.headers_mut(), &access, &refresh);
    }

    response
}
