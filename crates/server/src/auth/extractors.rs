use axum::{extract::FromRequestParts, http::request::Parts};
use shared_types::{AppError, UserRole};
use uuid::Uuid;

use super::jwt::Claims;

fn claims_from(parts: &Parts) -> Result<(Claims, Uuid), AppError> {
    let claims = parts
        .extensions
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| AppError::unauthorized("Authentication required"))?;
    let id = claims
        .user_id()
        .ok_or_else(|| AppError::unauthorized("Invalid token subject"))?;
    Ok((claims, id))
}

/// Extractor that requires authentication. Returns 401 if no valid token.
pub struct AuthRequired {
    pub claims: Claims,
    pub user_id: Uuid,
}

impl<S: Send + Sync> FromRequestParts<S> for AuthRequired {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let (claims, user_id) = claims_from(parts)?;
        Ok(AuthRequired { claims, user_id })
    }
}

/// Authenticated advocate whose enrollment has been verified.
/// 401 without a token, 403 while unverified.
pub struct VerifiedAdvocate {
    pub claims: Claims,
    pub advocate_id: Uuid,
}

impl<S: Send + Sync> FromRequestParts<S> for VerifiedAdvocate {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let (claims, advocate_id) = claims_from(parts)?;
        if !claims.verified {
            return Err(AppError::forbidden(
                "Advocate enrollment has not been verified",
            ));
        }
        Ok(VerifiedAdvocate {
            claims,
            advocate_id,
        })
    }
}

/// Requires the ADMIN role. 401 if unauthenticated, 403 otherwise.
pub struct AdminRequired(pub Claims);

impl<S: Send + Sync> FromRequestParts<S> for AdminRequired {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let (claims, _) = claims_from(parts)?;
        if !claims.role().satisfies(UserRole::Admin) {
            return Err(AppError::forbidden("ADMIN role required"));
        }
        Ok(AdminRequired(claims))
    }
}
