//! Error types for the `crm-auth` crate.
//!
//! Follows the same pattern as domain::error with a root Error struct and error kind enums.

use std::error::Error as StdError;
use std::fmt;

use serde::Serialize;

/// Top-level error type for crm-auth crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in crm-auth.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Config(ConfigErrorKind),
    OAuth(OAuthErrorKind),
    Token(TokenErrorKind),
    /// A CRM API call answered with a non-success status.
    Api(ProviderFault),
    Http(HttpErrorKind),
}

/// Errors detected before any network call because the client is not configured.
#[derive(Debug, PartialEq)]
pub enum ConfigErrorKind {
    MissingClientCredentials,
    MissingPasswordCredentials,
    InvalidUrl,
}

/// Errors from OAuth operations.
#[derive(Debug, PartialEq)]
pub enum OAuthErrorKind {
    /// The provider redirected back with an `error` parameter.
    AuthorizationDenied { error: String, description: Option<String> },
    /// Missing, stale or mismatched `state` on callback.
    InvalidState,
    MissingCode,
    TokenExchangeFailed(ProviderFault),
    TokenRefreshFailed(ProviderFault),
    UnsupportedGrant,
    InvalidResponse,
}

/// Errors from token management operations.
#[derive(Debug, PartialEq)]
pub enum TokenErrorKind {
    NotAuthenticated,
    NoRefreshToken,
}

/// Errors from HTTP client operations.
#[derive(Debug, PartialEq)]
pub enum HttpErrorKind {
    BuilderFailed,
    RequestFailed,
    Timeout,
    Network,
}

/// A provider-reported failure, decoded from whichever error shape the provider uses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderFault {
    #[serde(skip)]
    pub status: u16,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ProviderFault {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for ProviderFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status, self.message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Config(kind) => write!(f, "Configuration error: {:?}", kind),
            ErrorKind::OAuth(OAuthErrorKind::TokenExchangeFailed(fault)) => {
                write!(f, "OAuth token exchange failed: {}", fault)
            }
            ErrorKind::OAuth(OAuthErrorKind::TokenRefreshFailed(fault)) => {
                write!(f, "OAuth token refresh failed: {}", fault)
            }
            ErrorKind::OAuth(kind) => write!(f, "OAuth error: {:?}", kind),
            ErrorKind::Token(kind) => write!(f, "Token error: {:?}", kind),
            ErrorKind::Api(fault) => write!(f, "Provider API error: {}", fault),
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else if err.is_timeout() {
            ErrorKind::Http(HttpErrorKind::Timeout)
        } else if err.is_request() && !err.is_connect() {
            ErrorKind::Http(HttpErrorKind::RequestFailed)
        } else {
            ErrorKind::Http(HttpErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

/// Helper function to create configuration errors.
pub fn config_error(kind: ConfigErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Config(kind),
    }
}

/// Helper function to create OAuth errors.
pub fn oauth_error(kind: OAuthErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::OAuth(kind),
    }
}

/// Helper function to create token errors.
pub fn token_error(kind: TokenErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Token(kind),
    }
}

/// Helper function to wrap a decoded provider API failure.
pub fn api_error(fault: ProviderFault) -> Error {
    Error {
        source: None,
        error_kind: ErrorKind::Api(fault),
    }
}
