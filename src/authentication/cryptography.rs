use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{Error, ErrorKind};

pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            log::error!("Failed to hash password: {e}");
            ErrorKind::Internal.new("Failed to hash password")
        })
}

/// A stored hash that does not parse is a server side fault, not a wrong password.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, Error> {
    let argon2 = Argon2::default();
    let parsed_hash = PasswordHash::new(password_hash).map_err(|e| {
        log::error!("Stored password hash is malformed: {e}");
        ErrorKind::Internal.new("Malformed password hash")
    })?;

    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
