use thiserror::Error;

/// Why the session could not be re-established after a 401.
///
/// Any variant is terminal for the call that hit it; `RefreshRejected` and
/// `RefreshTransport` also clear the token store and fire the auth-failure
/// event.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("refresh token rejected by server: {0}")]
    RefreshRejected(String),

    #[error("refresh request failed: {0}")]
    RefreshTransport(#[source] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unauthorized - token may be expired")]
    Unauthorized,

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data.
    /// The cut is backed off to a char boundary so multi-byte content
    /// (e.g. localized error pages) cannot split a character.
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..end],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Build the login error for a credential-rejection response, extracting
    /// the backend's `detail` message when the body carries one.
    pub fn invalid_credentials(body: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            detail: String,
        }

        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.detail)
            .unwrap_or_else(|_| "Authentication failed".to_string());
        ApiError::InvalidCredentials(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_maps_unauthorized() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            ApiError::ServerError(_)
        ));
    }

    #[test]
    fn test_invalid_credentials_extracts_detail() {
        let err = ApiError::invalid_credentials(
            r#"{"detail": "No active account found with the given credentials"}"#,
        );
        match err {
            ApiError::InvalidCredentials(msg) => {
                assert_eq!(msg, "No active account found with the given credentials")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_credentials_generic_fallback() {
        let err = ApiError::invalid_credentials("<html>gateway</html>");
        match err {
            ApiError::InvalidCredentials(msg) => assert_eq!(msg, "Authentication failed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_long_body_truncated() {
        let body = "x".repeat(2000);
        match ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            ApiError::ServerError(msg) => assert!(msg.contains("truncated")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // A multi-byte character straddling the truncation point must not
        // panic the byte slice
        let body = format!("{}€€€", "x".repeat(499));
        match ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            ApiError::ServerError(msg) => {
                assert!(msg.contains("truncated"));
                assert!(msg.starts_with(&"x".repeat(499)));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Fully multi-byte body past the limit
        let body = "é".repeat(600);
        match ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            ApiError::ServerError(msg) => assert!(msg.contains("truncated")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
