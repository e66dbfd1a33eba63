use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::{User, UserRole};
use uuid::Uuid;

/// Token type discriminator. A refresh token is never accepted as an access token.
const TOKEN_TYPE_ACCESS: &str = "access";
const TOKEN_TYPE_REFRESH: &str = "refresh";

/// JWT claims stored in access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub role: String,
    pub advocate_code: String,
    pub advocate_name: String,
    #[serde(default)]
    pub verified: bool,
    pub exp: i64,
    pub iat: i64,
    /// Unique per token so two tokens issued in the same second hash differently.
    pub jti: String,
    #[serde(default)]
    pub typ: String,
}

impl Claims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn role(&self) -> UserRole {
        UserRole::from_db_str(&self.role)
    }
}

/// SHA-256 of a raw token, hex encoded. Only this hash is persisted.
pub fn hash_token(raw_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn jwt_secret() -> Result<String, jsonwebtoken::errors::Error> {
    std::env::var("JWT_SECRET")
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ErrorKind::InvalidKeyFormat.into())
}

pub fn access_token_expiry_minutes() -> i64 {
    crate::config::env_parse("JWT_ACCESS_TOKEN_EXPIRY_MINUTES").unwrap_or(15)
}

pub fn refresh_token_expiry_days() -> i64 {
    crate::config::env_parse("JWT_REFRESH_TOKEN_EXPIRY_DAYS").unwrap_or(7)
}

fn claims_for(user: &User, typ: &str, expires_at: DateTime<Utc>) -> Claims {
    Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role.clone(),
        advocate_code: user.advocate_code.clone(),
        advocate_name: user.advocate_name.clone(),
        verified: user.is_verified,
        iat: Utc::now().timestamp(),
        exp: expires_at.timestamp(),
        jti: Uuid::new_v4().to_string(),
        typ: typ.to_string(),
    }
}

fn sign(claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(jwt_secret()?.as_bytes()),
    )
}

pub fn create_access_token(user: &User) -> Result<String, jsonwebtoken::errors::Error> {
    let expires_at = Utc::now() + Duration::minutes(access_token_expiry_minutes());
    sign(&claims_for(user, TOKEN_TYPE_ACCESS, expires_at))
}

pub fn create_refresh_token(
    user: &User,
) -> Result<(String, DateTime<Utc>), jsonwebtoken::errors::Error> {
    let expires_at = Utc::now() + Duration::days(refresh_token_expiry_days());
    let token = sign(&claims_for(user, TOKEN_TYPE_REFRESH, expires_at))?;
    Ok((token, expires_at))
}

fn decode_claims(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret()?.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Validate an access token. Tokens typed `refresh` are rejected.
pub fn validate_access_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let claims = decode_claims(token)?;
    if claims.typ != TOKEN_TYPE_ACCESS {
        return Err(ErrorKind::InvalidToken.into());
    }
    Ok(claims)
}

/// Validate a refresh token. Requires `typ: "refresh"`.
pub fn validate_refresh_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let claims = decode_claims(token)?;
    if claims.typ != TOKEN_TYPE_REFRESH {
        return Err(ErrorKind::InvalidToken.into());
    }
    Ok(claims)
}
