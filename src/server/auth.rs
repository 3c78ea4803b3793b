//! Bearer-token access control for the Tilesmith API.
//!
//! When an access token is configured, every route except `/health` requires
//!
//! ```text
//! Authorization: Bearer {token}
//! ```
//!
//! The token is stored as its SHA-256 digest and compared in constant time,
//! so the comparison leaks neither content nor length.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::handlers::ErrorResponse;

// =============================================================================
// Types
// =============================================================================

/// Authentication error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header
    MissingToken,

    /// Header present but not of the form `Bearer {token}`
    MalformedHeader,

    /// Token does not match
    InvalidToken,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing access token"),
            AuthError::MalformedHeader => write!(f, "Authorization header must be 'Bearer <token>'"),
            AuthError::InvalidToken => write!(f, "Invalid access token"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "missing_token"),
            AuthError::MalformedHeader => (StatusCode::BAD_REQUEST, "malformed_authorization"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
        };
        let message = self.to_string();

        // A wrong token may be probing; a missing one is usually a misconfigured client
        if self == AuthError::InvalidToken {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Authentication failed: {}",
                message
            );
        } else {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Authentication failed: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Access Token
// =============================================================================

/// Shared-secret bearer token verifier.
#[derive(Clone)]
pub struct AccessTokenAuth {
    digest: Vec<u8>,
}

impl AccessTokenAuth {
    pub fn new(token: impl AsRef<[u8]>) -> Self {
        Self {
            digest: Sha256::digest(token.as_ref()).to_vec(),
        }
    }

    /// Check a presented token.
    pub fn verify(&self, presented: &str) -> Result<(), AuthError> {
        let presented = Sha256::digest(presented.as_bytes());
        if bool::from(presented.as_slice().ct_eq(self.digest.as_slice())) {
            Ok(())
        } else {
            Err(AuthError::InvalidToken)
        }
    }

    /// Check the `Authorization` header of a request.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
        let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
        let token = bearer_token(value).ok_or(AuthError::MalformedHeader)?;
        self.verify(token)
    }
}

impl std::fmt::Debug for AccessTokenAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenAuth").finish_non_exhaustive()
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

// =============================================================================
// Middleware
// =============================================================================

/// Axum middleware rejecting requests without a valid bearer token.
pub async fn auth_middleware(
    State(auth): State<AccessTokenAuth>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    auth.verify_headers(request.headers())?;
    Ok(next.run(request).await)
}

// =============================================================================
// Tests
// =============================================================================
