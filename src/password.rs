//! Password verification against stored salted hashes.
//!
//! The hash string selects the algorithm: PHC strings (`$argon2id$...`) are
//! checked with Argon2, modular-crypt bcrypt strings (`$2a$`, `$2b$`, `$2y$`)
//! with bcrypt. Both comparisons are constant-time.

use argon2::{Argon2, PasswordHash, PasswordVerifier};

use crate::models::User;

#[derive(thiserror::Error, Debug)]
pub enum PasswordError {
    #[error("unrecognised password hash format")]
    UnknownFormat,
    #[error("malformed password hash: {0}")]
    Malformed(String),
}

/// Check `candidate` against the user's stored hash.
///
/// `Ok(false)` means a well-formed hash that does not match; `Err` means the
/// stored hash itself could not be used.
pub fn matches(user: &User, candidate: &str) -> Result<bool, PasswordError> {
    verify(candidate, &user.password)
}

pub fn verify(candidate: &str, hash: &str) -> Result<bool, PasswordError> {
    if hash.starts_with("$argon2") {
        let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::Malformed(e.to_string()))?;
        // A PHC string may parse with the salt or digest missing.
        if parsed.salt.is_none() || parsed.hash.is_none() {
            return Err(PasswordError::Malformed("argon2 hash lacks salt or digest".into()));
        }
        return match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::Malformed(e.to_string())),
        };
    }
    if ["$2a$", "$2b$", "$2y$"].iter().any(|p| hash.starts_with(p)) {
        return bcrypt::verify(candidate, hash).map_err(|e| PasswordError::Malformed(e.to_string()));
    }
    Err(PasswordError::UnknownFormat)
}

impl User {
    pub fn password_matches(&self, candidate: &str) -> Result<bool, PasswordError> {
        matches(self, candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::SaltString;
    use argon2::PasswordHasher;

    fn argon2_hash(pw: &str) -> String {
        let salt = SaltString::encode_b64(b"fixed-test-salt!").unwrap();
        Argon2::default().hash_password(pw.as_bytes(), &salt).unwrap().to_string()
    }

    #[test]
    fn argon2_match_and_mismatch() {
        let hash = argon2_hash("hunter2");
        assert!(verify("hunter2", &hash).unwrap());
        assert!(!verify("hunter3", &hash).unwrap());
    }

    #[test]
    fn bcrypt_match_and_mismatch() {
        let hash = bcrypt::hash("hunter2", 4).unwrap();
        assert!(verify("hunter2", &hash).unwrap());
        assert!(!verify("nope", &hash).unwrap());
    }

    #[test]
    fn unknown_format_is_an_error() {
        assert!(matches!(verify("pw", "plaintext"), Err(PasswordError::UnknownFormat)));
    }

    #[test]
    fn truncated_hashes_are_errors() {
        assert!(verify("pw", "$argon2id$v=19$garbage").is_err());
        assert!(verify("pw", "$2b$04$short").is_err());
    }

    #[test]
    fn argon2_hash_without_digest_is_malformed() {
        let full = argon2_hash("hunter2");
        let no_digest = &full[..full.rfind('$').unwrap()];
        assert!(matches!(verify("hunter2", no_digest), Err(PasswordError::Malformed(_))));
    }
}
