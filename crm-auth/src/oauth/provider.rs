//! OAuth provider trait and types.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::state::PendingAuthorization;
use super::token::{TokenGrant, TokenRecord};
use crate::error::{
    config_error, oauth_error, ConfigErrorKind, Error, OAuthErrorKind, ProviderFault,
};
use crate::http::{status_line_fault, ApiRequest, Payload, ProviderReply, ProviderResponse};

/// CRM platforms the proxy can authenticate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Salesforce,
    Hubspot,
}

impl ProviderKind {
    /// Get the provider identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Salesforce => "salesforce",
            ProviderKind::Hubspot => "hubspot",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Salesforce => "Salesforce",
            ProviderKind::Hubspot => "HubSpot",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client registration shared by every provider.
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
    pub scopes: String,
}

impl OAuthClientConfig {
    /// Fails with a configuration error before any network call when the
    /// client id or secret is missing or blank.
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        redirect_uri: String,
        scopes: String,
    ) -> Result<Self, Error> {
        let client_id = client_id.filter(|id| !id.trim().is_empty());
        let client_secret = client_secret.filter(|secret| !secret.trim().is_empty());

        match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Ok(Self {
                client_id,
                client_secret: SecretString::from(client_secret),
                redirect_uri,
                scopes,
            }),
            _ => Err(config_error(
                ConfigErrorKind::MissingClientCredentials,
                "OAuth client id and secret must both be configured",
            )),
        }
    }
}

/// Authorization request with URL and the pending data to keep in the session.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Authorization URL the browser navigates to.
    pub url: String,
    pub pending: PendingAuthorization,
}

/// Trait for OAuth 2.0 CRM providers.
///
/// Implementations handle platform-specific details:
/// - Authorization URL generation (with PKCE where supported)
/// - Authorization code exchange and token refresh
/// - Where API calls are sent and how failures are shaped
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider kind.
    fn provider(&self) -> ProviderKind;

    /// Whether login attaches a PKCE challenge.
    fn uses_pkce(&self) -> bool {
        false
    }

    /// Client shared by token and API calls.
    fn http_client(&self) -> &reqwest::Client;

    /// Build the authorization URL for a pending attempt.
    fn authorization_url(&self, pending: &PendingAuthorization) -> Result<String, Error>;

    /// Exchange authorization code for tokens.
    ///
    /// # Arguments
    ///
    /// * `code` - Authorization code from OAuth callback
    /// * `code_verifier` - PKCE code verifier if PKCE was used
    async fn exchange_code(&self, code: &str, code_verifier: Option<&str>)
        -> Result<TokenGrant, Error>;

    /// Obtain a new access token from a refresh token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, Error>;

    /// Legacy resource-owner password grant; unsupported unless overridden.
    async fn password_grant(&self) -> Result<TokenGrant, Error> {
        Err(oauth_error(
            OAuthErrorKind::UnsupportedGrant,
            "password grant is not supported by this provider",
        ))
    }

    /// Base URL API requests are resolved against.
    fn api_base_url(&self, record: &TokenRecord) -> String;

    /// Decode a failed API response into the provider's error fields.
    fn decode_fault(&self, status: StatusCode, payload: &Payload) -> ProviderFault {
        decode_oauth_fault(status, payload)
    }

    /// Start a login attempt.
    fn begin_authorization(&self) -> Result<AuthorizationRequest, Error> {
        let pending = PendingAuthorization::issue(self.uses_pkce());
        let url = self.authorization_url(&pending)?;
        Ok(AuthorizationRequest { url, pending })
    }

    /// Issue one API call with the record's bearer token.
    async fn send(&self, request: &ApiRequest, record: &TokenRecord) -> Result<ProviderReply, Error> {
        let url = request.url(&self.api_base_url(record))?;

        let mut builder = self
            .http_client()
            .request(request.method.clone(), url)
            .bearer_auth(record.access_token.expose_secret())
            .header(ACCEPT, "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = ProviderResponse::read(builder.send().await?).await?;
        Ok(self.classify(response))
    }

    /// Sort a response into success, recoverable 401 or failure.
    fn classify(&self, response: ProviderResponse) -> ProviderReply {
        if response.status.is_success() {
            ProviderReply::Success(response)
        } else if response.status == StatusCode::UNAUTHORIZED {
            ProviderReply::Unauthorized(self.decode_fault(response.status, &response.payload))
        } else {
            ProviderReply::Failure(self.decode_fault(response.status, &response.payload))
        }
    }
}

/// Decode the RFC 6749 `{error, error_description}` shape, or HubSpot's
/// `{status, message}` variant used by its token endpoint.
pub fn decode_oauth_fault(status: StatusCode, payload: &Payload) -> ProviderFault {
    let Some(body) = payload.as_json() else {
        return status_line_fault(status);
    };

    let code = body
        .get("error")
        .or_else(|| body.get("status"))
        .and_then(|v| v.as_str());
    let message = body
        .get("error_description")
        .or_else(|| body.get("message"))
        .and_then(|v| v.as_str());

    match (code, message) {
        (Some(code), message) => {
            ProviderFault::new(status.as_u16(), code, message.unwrap_or(code))
        }
        (None, Some(message)) => {
            ProviderFault::new(status.as_u16(), status_line_fault(status).code, message)
        }
        (None, None) => status_line_fault(status),
    }
}
