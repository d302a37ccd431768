use crate::error::AuthError;

const BEARER_PREFIX: &str = "Bearer ";

/// Check an `Authorization` header value against the configured admin token.
///
/// A missing header, another scheme or an empty token is `Missing`; any other
/// mismatch is `Invalid`, including surrounding whitespace. An empty
/// `expected` token never authorizes.
pub fn authorize(header: Option<&str>, expected: &str) -> Result<(), AuthError> {
    let token = header
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::Missing)?;

    if expected.is_empty() || !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        return Err(AuthError::Invalid);
    }
    Ok(())
}

/// Compare two byte strings without short-circuiting on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Generate a fresh random admin token.
pub fn generate_admin_token() -> String {
    format!("pg_{}", uuid::Uuid::new_v4().simple())
}
