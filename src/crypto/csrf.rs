use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

/// The size of the CSRF token in bytes.
const CSRF_TOKEN_SIZE: usize = 32;

/// Generates a new random CSRF token.
///
/// # Returns
///
/// A URL-safe base64-encoded CSRF token.
pub fn generate_csrf_token() -> String {
    let mut token = [0u8; CSRF_TOKEN_SIZE];
    OsRng.fill_bytes(&mut token);

    general_purpose::URL_SAFE_NO_PAD.encode(token)
}

/// Compares the token echoed by a form against the one in the cookie.
pub fn verify_csrf_token(cookie_token: Option<&str>, submitted: &str) -> Result<()> {
    let Some(expected) = cookie_token else {
        tracing::warn!("❌ CSRF: csrf_token cookie not found");
        return Err(AppError::Csrf);
    };

    if submitted.is_empty() || !bool::from(expected.as_bytes().ct_eq(submitted.as_bytes())) {
        tracing::warn!("❌ CSRF: tokens do not match");
        return Err(AppError::Csrf);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique_and_url_safe() {
        let a = generate_csrf_token();
        let b = generate_csrf_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_verify_csrf_token() {
        let token = generate_csrf_token();
        assert!(verify_csrf_token(Some(&token), &token).is_ok());
        assert!(matches!(verify_csrf_token(Some(&token), "forged"), Err(AppError::Csrf)));
        assert!(matches!(verify_csrf_token(None, &token), Err(AppError::Csrf)));
        assert!(matches!(verify_csrf_token(Some(""), ""), Err(AppError::Csrf)));
    }
}
