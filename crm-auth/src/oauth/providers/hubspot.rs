//! HubSpot OAuth provider implementation.

use async_trait::async_trait;
use log::*;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use url::Url;

use super::request_token;
use crate::error::{ConfigErrorKind, Error, ErrorKind, OAuthErrorKind, ProviderFault};
use crate::http::Payload;
use crate::oauth::provider::decode_oauth_fault;
use crate::oauth::token::{TokenGrant, TokenRecord};
use crate::oauth::{OAuthClientConfig, PendingAuthorization, ProviderKind};

pub const DEFAULT_AUTH_URL: &str = "https://app.hubspot.com";
pub const DEFAULT_API_BASE_URL: &str = "https://api.hubapi.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub client: OAuthClientConfig,
    /// Host of the consent screen.
    pub auth_url: String,
    /// Host of the token endpoint and the CRM API.
    pub api_base_url: String,
}

/// HubSpot OAuth provider.
pub struct Provider {
    config: Config,
    http_client: reqwest::Client,
}

impl Provider {
    pub fn new(config: Config, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    fn api_base(&self) -> &str {
        self.config.api_base_url.trim_end_matches('/')
    }

    fn token_endpoint(&self) -> String {
        format!("{}/oauth/v1/token", self.api_base())
    }
}

#[async_trait]
impl crate::oauth::Provider for Provider {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Hubspot
    }

    fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    fn authorization_url(&self, pending: &PendingAuthorization) -> Result<String, Error> {
        let endpoint = format!(
            "{}/oauth/authorize",
            self.config.auth_url.trim_end_matches('/')
        );
        let mut url = Url::parse(&endpoint).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Config(ConfigErrorKind::InvalidUrl),
        })?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client.client_id)
            .append_pair("redirect_uri", &self.config.client.redirect_uri)
            .append_pair("scope", &self.config.client.scopes)
            .append_pair("state", &pending.state);

        Ok(url.into())
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenGrant, Error> {
        let client = &self.config.client;
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.expose_secret().as_str()),
            ("redirect_uri", client.redirect_uri.as_str()),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }

        let grant = request_token(
            &self.http_client,
            &self.token_endpoint(),
            &form,
            OAuthErrorKind::TokenExchangeFailed,
        )
        .await?;
        info!("Exchanged HubSpot authorization code for tokens");
        Ok(grant)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, Error> {
        let client = &self.config.client;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.expose_secret().as_str()),
            ("redirect_uri", client.redirect_uri.as_str()),
        ];

        let grant = request_token(
            &self.http_client,
            &self.token_endpoint(),
            &form,
            OAuthErrorKind::TokenRefreshFailed,
        )
        .await?;
        info!("Refreshed HubSpot access token");
        Ok(grant)
    }

    fn api_base_url(&self, _record: &TokenRecord) -> String {
        self.api_base().to_string()
    }

    /// CRM API errors arrive as `{"status":"error","message","category","errors"}`.
    fn decode_fault(&self, status: StatusCode, payload: &Payload) -> ProviderFault {
        let Some(body) = payload.as_json() else {
            return decode_oauth_fault(status, payload);
        };

        match (
            body.get("category").and_then(|v| v.as_str()),
            body.get("message").and_then(|v| v.as_str()),
        ) {
            (Some(category), message) => {
                let fault =
                    ProviderFault::new(status.as_u16(), category, message.unwrap_or(category));
                match body.get("errors") {
                    Some(errors) if !errors.is_null() => fault.with_details(errors.clone()),
                    _ => fault,
                }
            }
            _ => decode_oauth_fault(status, payload),
        }
    }
}
