//! Error types for the `domain` layer.
use crm_auth::error::{
    ConfigErrorKind, Error as CrmAuthError, ErrorKind as CrmAuthErrorKind, OAuthErrorKind,
    ProviderFault, TokenErrorKind,
};
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. `web` depends on `domain` but never on `crm-auth` error kinds
/// directly; the various `error_kind`s are used by `web` to pick HTTP status codes,
/// error codes and redirects.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

/// Errors raised by this process before or instead of a provider round-trip.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    /// Client credentials or other required settings are missing.
    Config,
    Auth(AuthErrorKind),
    Invalid(InvalidErrorKind),
    Other(String),
}

/// Authentication state problems for the caller's auth context.
#[derive(Debug, PartialEq)]
pub enum AuthErrorKind {
    NotAuthenticated,
    NoRefreshToken,
    /// Callback `state` missing, stale or not the one issued to this session.
    InvalidState,
    MissingCode,
    /// The provider redirected back with an `error` parameter.
    Denied {
        error: String,
        description: Option<String>,
    },
    UnsupportedGrant,
}

/// Request input rejected before any provider call.
#[derive(Debug, PartialEq)]
pub enum InvalidErrorKind {
    RecordId,
    UnknownObject,
}

/// Enum representing the various kinds of external errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    /// The token endpoint rejected an authorization code or password grant.
    TokenExchange(ProviderFault),
    /// The token endpoint rejected a refresh token.
    TokenRefresh(ProviderFault),
    /// A CRM API call failed with the provider's own status and error fields.
    Provider(ProviderFault),
    Network,
    Other(String),
}

impl Error {
    pub fn internal(error_kind: InternalErrorKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(error_kind),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// This is where we translate errors from the `crm-auth` layer to the `domain` layer.
impl From<CrmAuthError> for Error {
    fn from(err: CrmAuthError) -> Self {
        let error_kind = match &err.error_kind {
            CrmAuthErrorKind::Config(ConfigErrorKind::InvalidUrl) => DomainErrorKind::Internal(
                InternalErrorKind::Other("Invalid provider URL".to_string()),
            ),
            CrmAuthErrorKind::Config(_) => DomainErrorKind::Internal(InternalErrorKind::Config),
            CrmAuthErrorKind::OAuth(oauth_error_kind) => match oauth_error_kind {
                OAuthErrorKind::AuthorizationDenied { error, description } => {
                    DomainErrorKind::Internal(InternalErrorKind::Auth(AuthErrorKind::Denied {
                        error: error.clone(),
                        description: description.clone(),
                    }))
                }
                OAuthErrorKind::InvalidState => {
                    DomainErrorKind::Internal(InternalErrorKind::Auth(AuthErrorKind::InvalidState))
                }
                OAuthErrorKind::MissingCode => {
                    DomainErrorKind::Internal(InternalErrorKind::Auth(AuthErrorKind::MissingCode))
                }
                OAuthErrorKind::UnsupportedGrant => DomainErrorKind::Internal(
                    InternalErrorKind::Auth(AuthErrorKind::UnsupportedGrant),
                ),
                OAuthErrorKind::TokenExchangeFailed(fault) => {
                    DomainErrorKind::External(ExternalErrorKind::TokenExchange(fault.clone()))
                }
                OAuthErrorKind::TokenRefreshFailed(fault) => {
                    DomainErrorKind::External(ExternalErrorKind::TokenRefresh(fault.clone()))
                }
                OAuthErrorKind::InvalidResponse => DomainErrorKind::External(
                    ExternalErrorKind::Other("Unreadable token response".to_string()),
                ),
            },
            CrmAuthErrorKind::Token(TokenErrorKind::NotAuthenticated) => {
                DomainErrorKind::Internal(InternalErrorKind::Auth(AuthErrorKind::NotAuthenticated))
            }
            CrmAuthErrorKind::Token(TokenErrorKind::NoRefreshToken) => {
                DomainErrorKind::Internal(InternalErrorKind::Auth(AuthErrorKind::NoRefreshToken))
            }
            CrmAuthErrorKind::Api(fault) => {
                DomainErrorKind::External(ExternalErrorKind::Provider(fault.clone()))
            }
            CrmAuthErrorKind::Http(_) => DomainErrorKind::External(ExternalErrorKind::Network),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}
