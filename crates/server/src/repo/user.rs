use chrono::Utc;
use shared_types::{billing_period, AppError, Plan, ProfileChanges, User, USER_COLUMNS};
use sqlx::{Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::auth::jwt;
use crate::error_convert::SqlxErrorExt;

/// A freshly issued token pair for `user`.
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub advocate_code: &'a str,
    pub advocate_name: &'a str,
    pub enrollment_number: Option<&'a str>,
}

/// Create an unverified advocate together with a FREE subscription.
pub async fn create_with_subscription(
    pool: &Pool<Postgres>,
    new: NewUser<'_>,
) -> Result<User, AppError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, password_hash, advocate_code, advocate_name, enrollment_number)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(new.email)
    .bind(new.password_hash)
    .bind(new.advocate_code)
    .bind(new.advocate_name)
    .bind(new.enrollment_number)
    .fetch_one(&mut *tx)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let (_, period_end) = billing_period(Utc::now());
    sqlx::query(
        "INSERT INTO subscriptions (advocate_id, plan, end_date) VALUES ($1, $2, $3)",
    )
    .bind(user.id)
    .bind(Plan::Free.as_db_str())
    .bind(period_end)
    .execute(&mut *tx)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
    Ok(user)
}

pub async fn find_by_email(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

pub async fn find_by_id(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

pub async fn record_login(pool: &Pool<Postgres>, id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}

/// Mark an advocate's enrollment as verified. None if no such user.
pub async fn set_verified(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE id = $1
         RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Apply profile changes. A taken email surfaces as a Conflict through the
/// unique index. None if no such user.
pub async fn update_profile(
    pool: &Pool<Postgres>,
    id: Uuid,
    changes: &ProfileChanges,
) -> Result<Option<User>, AppError> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");
    if let Some(v) = &changes.advocate_name {
        qb.push(", advocate_name = ").push_bind(v.clone());
    }
    if let Some(v) = &changes.email {
        qb.push(", email = ").push_bind(v.clone());
    }
    if let Some(v) = &changes.mobile {
        qb.push(", mobile = ").push_bind(v.clone());
    }
    if let Some(v) = &changes.enrollment_number {
        qb.push(", enrollment_number = ").push_bind(v.clone());
    }
    qb.push(" WHERE id = ")
        .push_bind(id)
        .push(" RETURNING ")
        .push(USER_COLUMNS);

    qb.build_query_as::<User>()
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// Sign a token pair for `user` and persist the refresh token's hash.
pub async fn issue_session(pool: &Pool<Postgres>, user: User) -> Result<Session, AppError> {
    let access_token =
        jwt::create_access_token(&user).map_err(|e| AppError::internal(e.to_string()))?;
    let (refresh_token, expires_at) =
        jwt::create_refresh_token(&user).map_err(|e| AppError::internal(e.to_string()))?;

    sqlx::query("INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)")
        .bind(user.id)
        .bind(jwt::hash_token(&refresh_token))
        .bind(expires_at)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    Ok(Session {
        user,
        access_token,
        refresh_token,
    })
}

/// Exchange a refresh token for a new pair. The presented token is revoked;
/// presenting it again fails.
pub async fn rotate_refresh_token(
    pool: &Pool<Postgres>,
    raw_token: &str,
) -> Result<Session, AppError> {
    let invalid = || AppError::unauthorized("Invalid or expired refresh token");

    let claims = jwt::validate_refresh_token(raw_token).map_err(|_| invalid())?;
    let user_id = claims.user_id().ok_or_else(invalid)?;

    // Single conditional write: two concurrent rotations cannot both succeed.
    let revoked = sqlx::query(
        "UPDATE refresh_tokens SET revoked = TRUE
         WHERE token_hash = $1 AND user_id = $2 AND revoked = FALSE AND expires_at > NOW()",
    )
    .bind(jwt::hash_token(raw_token))
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    if revoked.rows_affected() == 0 {
        return Err(invalid());
    }

    // Reload so role and verification changes take effect on rotation.
    let user = find_by_id(pool, user_id).await?.ok_or_else(invalid)?;
    if !user.is_active {
        return Err(AppError::forbidden("Account is inactive"));
    }

    issue_session(pool, user).await
}

pub async fn revoke_all(pool: &Pool<Postgres>, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE")
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}
