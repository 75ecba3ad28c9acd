use bcrypt::{hash, verify, DEFAULT_COST};
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password must be at least 8 characters long")]
    TooShort,
    #[error("Password must be no more than 128 characters long")]
    TooLong,
    #[error("Password must contain at least one letter")]
    NoLetter,
    #[error("Password must contain at least one number")]
    NoNumber,
    #[error("Failed to hash password")]
    HashingFailed,
    #[error("Failed to verify password")]
    VerificationFailed,
}

/// Password strength requirements
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_letter: bool,
    pub require_number: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_letter: true,
            require_number: true,
        }
    }
}

/// Validate password strength according to policy
pub fn validate_password_strength(
    password: &str,
    policy: &PasswordPolicy,
) -> Result<(), PasswordError> {
    if password.len() < policy.min_length {
        return Err(PasswordError::TooShort);
    }

    if password.len() > policy.max_length {
        return Err(PasswordError::TooLong);
    }

    if policy.require_letter && !password.chars().any(|c| c.is_alphabetic()) {
        return Err(PasswordError::NoLetter);
    }

    if policy.require_number && !password.chars().any(|c| c.is_numeric()) {
        return Err(PasswordError::NoNumber);
    }

    Ok(())
}

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    validate_password_strength(password, &PasswordPolicy::default())?;

    hash(password, DEFAULT_COST).map_err(|_| PasswordError::HashingFailed)
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    verify(password, hash).map_err(|_| PasswordError::VerificationFailed)
}

/// Generate a secure random password reset token
pub fn generate_reset_token() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                            abcdefghijklmnopqrstuvwxyz\
                            0123456789";
    const TOKEN_LEN: usize = 32;

    let mut rng = rand::thread_rng();

    (0..TOKEN_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Basic shape check before hitting the database
pub fn is_valid_email(email: &str) -> bool {
    // Intentionally loose; the mailbox is verified by actually mailing it
    let re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    re.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_validation() {
        let policy = PasswordPolicy::default();

        assert!(matches!(
            validate_password_strength("short", &policy),
            Err(PasswordError::TooShort)
        ));

        assert!(matches!(
            validate_password_strength("12345678", &policy),
            Err(PasswordError::NoLetter)
        ));

        assert!(matches!(
            validate_password_strength("onlyletters", &policy),
            Err(PasswordError::NoNumber)
        ));

        assert!(validate_password_strength("training4life", &policy).is_ok());
    }

    #[test]
    fn test_password_hashing() {
        let password = "training4life";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong-password1", &hash).unwrap());
    }

    #[test]
    fn test_reset_token_generation() {
        let token1 = generate_reset_token();
        let token2 = generate_reset_token();

        assert_eq!(token1.len(), 32);
        assert_eq!(token2.len(), 32);
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("coach@example.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two@@example.com"));
    }
}
