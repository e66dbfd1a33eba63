use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role. Admins verify advocates; advocates own cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[default]
    Advocate,
    Admin,
}

impl UserRole {
    /// Parse from the DB column or JWT `role` claim. Unknown values default to Advocate.
    pub fn from_db_str(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => UserRole::Admin,
            _ => UserRole::Advocate,
        }
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            UserRole::Advocate => "ADVOCATE",
            UserRole::Admin => "ADMIN",
        }
    }

    /// Admin satisfies every role.
    pub fn satisfies(&self, required: UserRole) -> bool {
        match self {
            UserRole::Admin => true,
            UserRole::Advocate => required == UserRole::Advocate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub advocate_code: String,
    pub advocate_name: String,
    pub enrollment_number: Option<String>,
    pub mobile: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const USER_COLUMNS: &str = "id, email, password_hash, advocate_code, advocate_name, \
     enrollment_number, mobile, role, is_active, is_verified, last_login_at, created_at, \
     updated_at";

impl User {
    pub fn role(&self) -> UserRole {
        UserRole::from_db_str(&self.role)
    }
}

/// Authenticated user info (safe to send to client).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub advocate_code: String,
    pub advocate_name: String,
    pub enrollment_number: Option<String>,
    pub mobile: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub is_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            role: UserRole::from_db_str(&u.role),
            email: u.email,
            advocate_code: u.advocate_code,
            advocate_name: u.advocate_name,
            enrollment_number: u.enrollment_number,
            mobile: u.mobile,
            is_active: u.is_active,
            is_verified: u.is_verified,
            last_login_at: u.last_login_at,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(validator::Validate))]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[cfg_attr(
        feature = "validation",
        validate(email(message = "Valid email is required"))
    )]
    pub email: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 8, message = "Password must be at least 8 characters"))
    )]
    pub password: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, max = 50, message = "Advocate code is required"))
    )]
    pub advocate_code: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, max = 200, message = "Advocate name is required"))
    )]
    pub advocate_name: String,
    #[serde(default)]
    pub enrollment_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(validator::Validate))]
pub struct LoginRequest {
    #[cfg_attr(
        feature = "validation",
        validate(email(message = "Valid email is required"))
    )]
    pub email: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Password is required"))
    )]
    pub password: String,
}

/// Profile changes for the signed-in advocate. Absent fields are left as
/// they are; a blank mobile or enrollment number clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(validator::Validate))]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, max = 200, message = "Advocate name must be 1 to 200 characters"))
    )]
    pub advocate_name: Option<String>,
    #[serde(default)]
    #[cfg_attr(
        feature = "validation",
        validate(email(message = "Valid email is required"))
    )]
    pub email: Option<String>,
    #[serde(default)]
    #[cfg_attr(
        feature = "validation",
        validate(length(max = 20, message = "Mobile number is too long"))
    )]
    pub mobile: Option<String>,
    #[serde(default)]
    #[cfg_attr(
        feature = "validation",
        validate(length(max = 50, message = "Enrollment number is too long"))
    )]
    pub enrollment_number: Option<String>,
}

/// Normalized form of [`UpdateProfileRequest`]. The outer `Option` on the
/// nullable fields means "change it"; the inner one is the new value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub advocate_name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<Option<String>>,
    pub enrollment_number: Option<Option<String>>,
}

fn blank_to_none(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

impl UpdateProfileRequest {
    pub fn changes(&self) -> ProfileChanges {
        ProfileChanges {
            advocate_name: self.advocate_name.as_deref().map(|n| n.trim().to_string()),
            email: self.email.as_deref().map(|e| e.trim().to_lowercase()),
            mobile: self.mobile.as_deref().map(blank_to_none),
            enrollment_number: self.enrollment_number.as_deref().map(blank_to_none),
        }
    }
}

/// Refresh and logout accept the token in the body or fall back to the cookie.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}
