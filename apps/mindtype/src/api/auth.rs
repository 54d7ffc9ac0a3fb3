//! # Admin Authentication
//!
//! Gate for the researcher data-retrieval routes.
//!
//! The server never stores the admin secret itself, only its BLAKE3 hex
//! digest (`server.admin_secret_hash` or `MINDTYPE_ADMIN_SECRET_HASH`).
//! A request is admitted when the digest of the presented secret equals the
//! stored digest under a constant-time comparison.
//!
//! ## Usage
//!
//! ```text
//! Authorization: Bearer <admin secret>
//! ```

use super::ApiSettings;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

// =============================================================================
// SECRET HASHING
// =============================================================================

/// BLAKE3 hex digest of an admin secret.
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    blake3::hash(secret.as_bytes()).to_hex().to_string()
}

/// Whether `provided` hashes to `expected_hash`, compared in constant time.
#[must_use]
pub fn verify_secret(provided: &str, expected_hash: &str) -> bool {
    let provided_hash = hash_secret(provided);
    let provided_bytes = provided_hash.as_bytes();
    let expected_bytes = expected_hash.as_bytes();

    // Pad to a common length so ct_eq always covers the same number of bytes.
    let max_len = provided_bytes.len().max(expected_bytes.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);
    padded_expected[..expected_bytes.len()].copy_from_slice(expected_bytes);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided_bytes.len() == expected_bytes.len()
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Admin authentication middleware.
///
/// - No admin hash configured: admin routes are closed (403)
/// - Missing or wrong secret: 401
pub async fn admin_auth_middleware(
    State(settings): State<Arc<ApiSettings>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(expected) = settings.admin_secret_hash.as_deref() else {
        tracing::warn!(
            event = "auth_failure",
            reason = "admin_not_configured",
            "Admin route requested but no admin secret hash is configured"
        );
        return Err((StatusCode::FORBIDDEN, "Admin access not configured"));
    };

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header_value) => {
            let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
            if verify_secret(provided, expected) {
                Ok(next.run(request).await)
            } else {
                tracing::warn!(
                    event = "auth_failure",
                    reason = "invalid_admin_secret",
                    "Authentication failed: invalid admin secret"
                );
                Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
            }
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_blake3_hex() {
        let hash = hash_secret("letmein");
        assert_eq!(hash.len(), 64);
        assert!(hash.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn verify_accepts_only_the_right_secret() {
        let stored = hash_secret("correct horse");
        assert!(verify_secret("correct horse", &stored));
        assert!(!verify_secret("correct horse ", &stored));
        assert!(!verify_secret("", &stored));
    }

    #[test]
    fn verify_rejects_truncated_hash() {
        let stored = hash_secret("secret");
        assert!(!verify_secret("secret", &stored[..32]));
    }
}
