use std::error::Error as StdError;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::*;
use serde_json::{json, Value};

use domain::error::{
    AuthErrorKind, DomainErrorKind, Error as DomainError, ExternalErrorKind, InternalErrorKind,
    InvalidErrorKind,
};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Domain(DomainError),
    Web(WebErrorKind),
}

/// Failures that originate in the web layer itself.
#[derive(Debug, PartialEq)]
pub enum WebErrorKind {
    /// The session store could not be read or written.
    Session,
    /// The request body is not the JSON the handler expects.
    InvalidBody(String),
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

/// JSON error body: `{"error": {"code", "message", "details"?}}`.
fn error_response(status: StatusCode, code: &str, message: &str, details: Option<Value>) -> Response {
    let mut error = json!({ "code": code, "message": message });
    if let Some(details) = details {
        error["details"] = details;
    }
    (status, Json(json!({ "error": error }))).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Domain(domain_error) => domain_error_response(domain_error),
            Error::Web(WebErrorKind::Session) => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "SESSION_ERROR",
                "Session storage failed",
                None,
            ),
            Error::Web(WebErrorKind::InvalidBody(reason)) => error_response(
                StatusCode::BAD_REQUEST,
                "INVALID_BODY",
                "Request body must be valid JSON",
                Some(Value::String(reason)),
            ),
        }
    }
}

fn domain_error_response(err: DomainError) -> Response {
    match err.error_kind {
        DomainErrorKind::Internal(internal_error_kind) => match internal_error_kind {
            InternalErrorKind::Config => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIGURATION_ERROR",
                "OAuth configuration incomplete",
                None,
            ),
            InternalErrorKind::Auth(auth_error_kind) => match auth_error_kind {
                AuthErrorKind::NotAuthenticated => error_response(
                    StatusCode::UNAUTHORIZED,
                    "NOT_AUTHENTICATED",
                    "Not authenticated. Please log in first.",
                    None,
                ),
                AuthErrorKind::NoRefreshToken => error_response(
                    StatusCode::UNAUTHORIZED,
                    "NO_REFRESH_TOKEN",
                    "No refresh token available. Please log in again.",
                    None,
                ),
                AuthErrorKind::InvalidState => error_response(
                    StatusCode::BAD_REQUEST,
                    "INVALID_STATE",
                    "Invalid or expired OAuth state",
                    None,
                ),
                AuthErrorKind::MissingCode => error_response(
                    StatusCode::BAD_REQUEST,
                    "MISSING_CODE",
                    "Authorization code missing",
                    None,
                ),
                AuthErrorKind::Denied { error, description } => error_response(
                    StatusCode::BAD_REQUEST,
                    &error,
                    description.as_deref().unwrap_or("Authorization was denied"),
                    None,
                ),
                AuthErrorKind::UnsupportedGrant => error_response(
                    StatusCode::BAD_REQUEST,
                    "UNSUPPORTED_GRANT",
                    "This provider does not support the password grant",
                    None,
                ),
            },
            InternalErrorKind::Invalid(InvalidErrorKind::RecordId) => error_response(
                StatusCode::BAD_REQUEST,
                "INVALID_ID",
                "Record id must be 1-64 characters of letters, digits, '_' or '-'",
                None,
            ),
            InternalErrorKind::Invalid(InvalidErrorKind::UnknownObject) => error_response(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Unknown object type",
                None,
            ),
            InternalErrorKind::Other(message) => {
                error!("Internal error: {message}");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error",
                    None,
                )
            }
        },
        DomainErrorKind::External(external_error_kind) => match external_error_kind {
            ExternalErrorKind::TokenExchange(fault) | ExternalErrorKind::TokenRefresh(fault) => {
                error_response(StatusCode::BAD_REQUEST, &fault.code, &fault.message, fault.details)
            }
            ExternalErrorKind::Provider(fault) => error_response(
                StatusCode::from_u16(fault.status).unwrap_or(StatusCode::BAD_GATEWAY),
                &fault.code,
                &fault.message,
                fault.details,
            ),
            ExternalErrorKind::Network => error_response(
                StatusCode::BAD_GATEWAY,
                "NETWORK_ERROR",
                "Unable to reach the provider. Check network connectivity and try again.",
                None,
            ),
            ExternalErrorKind::Other(message) => error_response(
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                &message,
                None,
            ),
        },
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self::Domain(err.into())
    }
}

/// Session store failures are reported as a web-layer error.
pub(crate) fn session_error(err: tower_sessions::session::Error) -> Error {
    warn!("Session store error: {err:?}");
    Error::Web(WebErrorKind::Session)
}

pub(crate) fn invalid_body(rejection: JsonRejection) -> Error {
    debug!("Rejected request body: {rejection}");
    Error::Web(WebErrorKind::InvalidBody(rejection.body_text()))
}
