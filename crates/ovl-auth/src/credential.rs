//! Credential hashing and verification.
//!
//! User passwords and client secrets are stored as Argon2id PHC strings and
//! verified in constant time; plaintext is never persisted or compared.
//!
//! # Security
//!
//! - Hashing uses Argon2id (hybrid mode) with default parameters
//! - Salts are generated using OsRng (cryptographically secure RNG)
//! - Rotated client secrets keep their old hashes and verify the same way
//!
//! # Example
//!
//! ```
//! use ovl_auth::credential::{hash_password, verify_password};
//!
//! let hash = hash_password("12345678").unwrap();
//! assert!(hash.starts_with("$argon2id$"));
//! assert!(verify_password("12345678", &hash).unwrap());
//! assert!(!verify_password("wrong", &hash).unwrap());
//! ```

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hash a password or client secret for storage using Argon2id.
///
/// # Arguments
///
/// * `secret` - The plaintext credential to hash
///
/// # Returns
///
/// PHC-formatted hash string suitable for database storage.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if hashing fails (rare).
pub fn hash_password(secret: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(secret.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a credential against a stored Argon2 hash.
///
/// # Arguments
///
/// * `secret` - The plaintext credential to verify
/// * `hash` - The PHC-formatted Argon2 hash from storage
///
/// # Returns
///
/// `Ok(true)` if the credential matches the hash, `Ok(false)` if it doesn't.
/// Returns `Err` only if the hash format is invalid.
pub fn verify_password(secret: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    let result = Argon2::default().verify_password(secret.as_bytes(), &parsed_hash);
    Ok(result.is_ok())
}
