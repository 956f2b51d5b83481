use reqwest::StatusCode;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure of a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Credential invalid or expired and not refreshable
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network, rate-limit or server-side failure
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Provider rejected the request content
    #[error("rejected by provider: {0}")]
    Validation(String),

    /// Target task does not exist
    #[error("not found: {0}")]
    NotFound(String),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Error classification used in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    TransientProvider,
    Validation,
    NotFound,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Authentication => "AuthenticationError",
            Self::TransientProvider => "TransientProviderError",
            Self::Validation => "ValidationError",
            Self::NotFound => "NotFoundError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::Transient(_) => ErrorKind::TransientProvider,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Error message without the classification prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Authentication(m)
            | Self::Transient(m)
            | Self::Validation(m)
            | Self::NotFound(m) => m,
        }
    }

    /// Worth retrying the same call later
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Aborts the whole pass rather than a single task
    pub fn is_pass_fatal(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Classify a non-success HTTP response.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, truncate_body(body))
        };

        match status.as_u16() {
            403 if is_rate_limited(body) => Self::Transient(message),
            401 | 403 => Self::Authentication(message),
            404 | 410 => Self::NotFound(message),
            408 | 429 => Self::Transient(message),
            s if s >= 500 => Self::Transient(message),
            _ => Self::Validation(message),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status, &err.to_string());
        }
        if err.is_builder() {
            return Self::Validation(err.to_string());
        }
        // connect, timeout, body and decode failures
        Self::Transient(err.to_string())
    }
}

/// Google reports rate and quota limits as 403 with a reason in the body.
fn is_rate_limited(body: &str) -> bool {
    const REASONS: &[&str] = &[
        "rateLimitExceeded",
        "userRateLimitExceeded",
        "quotaExceeded",
        "dailyLimitExceeded",
    ];

    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return false;
    };
    let error = &value["error"];
    if error["status"] == "RESOURCE_EXHAUSTED" {
        return true;
    }
    error["errors"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|e| e["reason"].as_str())
        .any(|reason| REASONS.contains(&reason))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            ProviderError::from_status(StatusCode::UNAUTHORIZED, "").kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            ProviderError::from_status(StatusCode::FORBIDDEN, "").kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            ProviderError::from_status(StatusCode::NOT_FOUND, "").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ProviderError::from_status(StatusCode::TOO_MANY_REQUESTS, "").kind(),
            ErrorKind::TransientProvider
        );
        assert_eq!(
            ProviderError::from_status(StatusCode::BAD_GATEWAY, "").kind(),
            ErrorKind::TransientProvider
        );
        assert_eq!(
            ProviderError::from_status(StatusCode::BAD_REQUEST, "bad due").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ProviderError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "").kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_google_rate_limit_403_is_transient() {
        let body = r#"{"error": {"code": 403, "message": "Rate Limit Exceeded",
            "errors": [{"domain": "usageLimits", "reason": "rateLimitExceeded"}],
            "status": "PERMISSION_DENIED"}}"#;
        let err = ProviderError::from_status(StatusCode::FORBIDDEN, body);
        assert_eq!(err.kind(), ErrorKind::TransientProvider);
        assert!(!err.is_pass_fatal());

        let exhausted = r#"{"error": {"code": 403, "status": "RESOURCE_EXHAUSTED"}}"#;
        assert!(ProviderError::from_status(StatusCode::FORBIDDEN, exhausted).is_transient());
    }

    #[test]
    fn test_other_403_stays_authentication() {
        let body = r#"{"error": {"code": 403, "message": "Insufficient Permission",
            "errors": [{"reason": "insufficientPermissions"}]}}"#;
        let err = ProviderError::from_status(StatusCode::FORBIDDEN, body);
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(err.is_pass_fatal());
    }

    #[test]
    fn test_status_message_includes_body() {
        let err = ProviderError::from_status(StatusCode::BAD_REQUEST, "  invalid date \n");
        assert_eq!(err.message(), "HTTP 400 Bad Request: invalid date");
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(500);
        let err = ProviderError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert!(err.message().ends_with("..."));
        assert!(err.message().len() < 250);
    }

    #[test]
    fn test_fatal_and_transient_flags() {
        assert!(ProviderError::Authentication("x".into()).is_pass_fatal());
        assert!(!ProviderError::Transient("x".into()).is_pass_fatal());
        assert!(ProviderError::Transient("x".into()).is_transient());
        assert!(!ProviderError::Validation("x".into()).is_transient());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ErrorKind::TransientProvider.to_string(), "TransientProviderError");
        assert_eq!(ErrorKind::Authentication.label(), "AuthenticationError");
    }
}
