use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced by backend calls and by the pending-request ledger.
///
/// `Clone` so one failure of a shared user query can be handed to every
/// attached caller.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(Arc<reqwest::Error>),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http {
        status: StatusCode,
        code: Option<String>,
        body: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Login cancelled: {0}")]
    LoginCancelled(String),

    #[error("Suspended request was abandoned before it could be delivered")]
    Abandoned,
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Network(Arc::new(err))
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Failure body shape: `{"err": "<code>"}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    err: Option<String>,
}

impl AuthError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let code = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.err)
            .filter(|code| !code.is_empty());
        AuthError::Http {
            status,
            code,
            body: Self::truncate_body(body),
        }
    }

    /// Server-provided error code (`err` field of the failure body), if any
    pub fn server_code(&self) -> Option<&str> {
        match self {
            AuthError::Http { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AuthError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the user gave up on the login prompt
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AuthError::LoginCancelled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_extracts_err_code() {
        let err = AuthError::from_status(StatusCode::UNAUTHORIZED, r#"{"err":"BAD_CREDENTIALS"}"#);
        assert_eq!(err.server_code(), Some("BAD_CREDENTIALS"));
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_from_status_without_code() {
        assert_eq!(AuthError::from_status(StatusCode::BAD_GATEWAY, "<html>oops</html>").server_code(), None);
        assert_eq!(AuthError::from_status(StatusCode::FORBIDDEN, r#"{"message":"no"}"#).server_code(), None);
        assert_eq!(AuthError::from_status(StatusCode::FORBIDDEN, r#"{"err":""}"#).server_code(), None);
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = AuthError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("truncated, 520 total bytes"));

        assert_eq!(AuthError::truncate_body("short"), "short");
    }

    #[test]
    fn test_truncate_body_respects_char_boundary() {
        let long = "é".repeat(MAX_ERROR_BODY_LENGTH);
        // Must not panic on a multi-byte boundary
        let truncated = AuthError::truncate_body(&long);
        assert!(truncated.contains("truncated"));
    }

    #[test]
    fn test_cancelled_is_distinguishable() {
        assert!(AuthError::LoginCancelled("cancelledByUser".into()).is_cancelled());
        assert!(!AuthError::from_status(StatusCode::UNAUTHORIZED, "").is_cancelled());
    }
}
