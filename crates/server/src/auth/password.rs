use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::OnceLock;

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Verify against the stored hash, or burn the same work against a fixed
/// hash when the account does not exist. Login latency then does not reveal
/// which emails are registered.
pub fn verify_login(password: &str, stored_hash: Option<&str>) -> bool {
    static DUMMY: OnceLock<String> = OnceLock::new();
    match stored_hash {
        Some(hash) => verify_password(password, hash).unwrap_or(false),
        None => {
            let dummy = DUMMY.get_or_init(|| hash_password("dummy-password").unwrap_or_default());
            let _ = verify_password(password, dummy);
            false
        }
    }
}
