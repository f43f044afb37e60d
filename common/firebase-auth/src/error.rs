use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Failures surfaced by token verification.
///
/// Every variant except `Configuration` and `Transport` carries the final,
/// human-readable message; the Firebase client error code is available via
/// [`AuthError::code`].
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid verifier configuration: {0}")]
    Configuration(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    InvalidCredential(String),
    #[error("{0}")]
    IdTokenExpired(String),
    #[error("{0}")]
    SessionCookieExpired(String),
    #[error("{0}")]
    Internal(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Error kind descriptor, used where a profile has to name which error a
/// failure should become (for example the "expired" kind of a token type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    InvalidArgument,
    InvalidCredential,
    IdTokenExpired,
    SessionCookieExpired,
    Internal,
}

impl AuthErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            AuthErrorCode::InvalidArgument => "auth/argument-error",
            AuthErrorCode::InvalidCredential => "auth/invalid-credential",
            AuthErrorCode::IdTokenExpired => "auth/id-token-expired",
            AuthErrorCode::SessionCookieExpired => "auth/session-cookie-expired",
            AuthErrorCode::Internal => "auth/internal-error",
        }
    }

    pub fn is_expiry(&self) -> bool {
        matches!(
            self,
            AuthErrorCode::IdTokenExpired | AuthErrorCode::SessionCookieExpired
        )
    }

    /// Build the error of this kind carrying `message`.
    pub fn with_message(self, message: impl Into<String>) -> AuthError {
        let message = message.into();
        match self {
            AuthErrorCode::InvalidArgument => AuthError::InvalidArgument(message),
            AuthErrorCode::InvalidCredential => AuthError::InvalidCredential(message),
            AuthErrorCode::IdTokenExpired => AuthError::IdTokenExpired(message),
            AuthErrorCode::SessionCookieExpired => AuthError::SessionCookieExpired(message),
            AuthErrorCode::Internal => AuthError::Internal(message),
        }
    }
}

impl AuthError {
    pub fn kind(&self) -> Option<AuthErrorCode> {
        match self {
            AuthError::Configuration(_) | AuthError::Transport(_) => None,
            AuthError::InvalidArgument(_) => Some(AuthErrorCode::InvalidArgument),
            AuthError::InvalidCredential(_) => Some(AuthErrorCode::InvalidCredential),
            AuthError::IdTokenExpired(_) => Some(AuthErrorCode::IdTokenExpired),
            AuthError::SessionCookieExpired(_) => Some(AuthErrorCode::SessionCookieExpired),
            AuthError::Internal(_) => Some(AuthErrorCode::Internal),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Configuration(_) => "auth/invalid-configuration",
            AuthError::Transport(_) => AuthErrorCode::Internal.code(),
            other => other
                .kind()
                .map(|kind| kind.code())
                .unwrap_or(AuthErrorCode::Internal.code()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::InvalidArgument(_)
            | AuthError::IdTokenExpired(_)
            | AuthError::SessionCookieExpired(_) => StatusCode::UNAUTHORIZED,
            AuthError::Configuration(_)
            | AuthError::InvalidCredential(_)
            | AuthError::Internal(_)
            | AuthError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
