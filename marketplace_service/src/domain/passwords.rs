use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::domain::error::{Error, ErrorKind};

/// Hash Argon2id con salt aleatorio, en formato PHC.
pub fn hash_password(password: &str) -> Result<String, Error> {
    const OP: &str = "passwords.hash";

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::new(ErrorKind::Internal, OP, e.to_string()))?;

    Ok(hash.to_string())
}

/// `Ok(false)` es password incorrecto; `Err` es un hash corrupto en la base.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, Error> {
    const OP: &str = "passwords.verify";

    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        Error::new(
            ErrorKind::Internal,
            OP,
            format!("stored password hash is invalid: {e}"),
        )
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();

        assert!(verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("same password").unwrap();
        let second = hash_password("same password").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_corrupt_stored_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-hash").is_err());
    }
}
