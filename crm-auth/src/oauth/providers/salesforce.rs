//! Salesforce OAuth provider implementation.
//!
//! Web-server flow with PKCE against `{login_url}/services/oauth2/*`, plus the
//! legacy username-password grant for orgs that still allow it.

use async_trait::async_trait;
use log::*;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::request_token;
use crate::error::{
    config_error, ConfigErrorKind, Error, ErrorKind, OAuthErrorKind, ProviderFault,
};
use crate::http::Payload;
use crate::oauth::pkce::{PkceVerifier, CHALLENGE_METHOD};
use crate::oauth::provider::decode_oauth_fault;
use crate::oauth::token::{TokenGrant, TokenRecord};
use crate::oauth::{OAuthClientConfig, PendingAuthorization, ProviderKind};

pub const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com";

/// Credentials for the username-password grant.
#[derive(Debug, Clone)]
pub struct PasswordCredentials {
    pub username: String,
    pub password: SecretString,
    /// Appended to the password when the org requires it.
    pub security_token: Option<SecretString>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub client: OAuthClientConfig,
    /// Host for authorize and token endpoints, e.g. `https://login.salesforce.com`.
    pub login_url: String,
    pub password: Option<PasswordCredentials>,
}

/// Salesforce OAuth provider.
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

    fn login_url(&self) -> &str {
        self.config.login_url.trim_end_matches('/')
    }

    fn authorize_endpoint(&self) -> String {
        format!("{}/services/oauth2/authorize", self.login_url())
    }

    fn token_endpoint(&self) -> String {
        format!("{}/services/oauth2/token", self.login_url())
    }
}

#[async_trait]
impl crate::oauth::Provider for Provider {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Salesforce
    }

    fn uses_pkce(&self) -> bool {
        true
    }

    fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    fn authorization_url(&self, pending: &PendingAuthorization) -> Result<String, Error> {
        let mut url = Url::parse(&self.authorize_endpoint()).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Config(ConfigErrorKind::InvalidUrl),
        })?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client.client_id)
                .append_pair("redirect_uri", &self.config.client.redirect_uri)
                .append_pair("scope", &self.config.client.scopes)
                .append_pair("state", &pending.state);
            if let Some(verifier) = &pending.code_verifier {
                let challenge = PkceVerifier::from_string(verifier.clone()).challenge();
                query
                    .append_pair("code_challenge", challenge.as_str())
                    .append_pair("code_challenge_method", CHALLENGE_METHOD);
            }
        }

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
        info!("Exchanged Salesforce authorization code for tokens");
        Ok(grant)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, Error> {
        let client = &self.config.client;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.expose_secret().as_str()),
        ];

        let grant = request_token(
            &self.http_client,
            &self.token_endpoint(),
            &form,
            OAuthErrorKind::TokenRefreshFailed,
        )
        .await?;
        info!("Refreshed Salesforce access token");
        Ok(grant)
    }

    async fn password_grant(&self) -> Result<TokenGrant, Error> {
        let credentials = self.config.password.as_ref().ok_or_else(|| {
            config_error(
                ConfigErrorKind::MissingPasswordCredentials,
                "Salesforce username and password must be configured",
            )
        })?;

        let mut password = credentials.password.expose_secret().clone();
        if let Some(security_token) = &credentials.security_token {
            password.push_str(security_token.expose_secret());
        }

        let client = &self.config.client;
        let form = [
            ("grant_type", "password"),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.expose_secret().as_str()),
            ("username", credentials.username.as_str()),
            ("password", password.as_str()),
        ];

        let grant = request_token(
            &self.http_client,
            &self.token_endpoint(),
            &form,
            OAuthErrorKind::TokenExchangeFailed,
        )
        .await?;
        info!("Authenticated to Salesforce with the password grant");
        Ok(grant)
    }

    fn api_base_url(&self, record: &TokenRecord) -> String {
        record
            .instance_url
            .clone()
            .unwrap_or_else(|| self.login_url().to_string())
    }

    /// REST API errors arrive as `[{"message", "errorCode", "fields"}]`.
    fn decode_fault(&self, status: StatusCode, payload: &Payload) -> ProviderFault {
        let first = payload
            .as_json()
            .and_then(|body| body.as_array())
            .and_then(|errors| errors.first());

        match first {
            Some(error) => {
                let code = error
                    .get("errorCode")
                    .and_then(|v| v.as_str())
                    .unwrap_or("UNKNOWN_ERROR");
                let message = error
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or(code);
                let fault = ProviderFault::new(status.as_u16(), code, message);
                match error.get("fields") {
                    Some(fields) if !fields.is_null() => fault.with_details(fields.clone()),
                    _ => fault,
                }
            }
            None => decode_oauth_fault(status, payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::oauth::Provider as _;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn provider(login_url: &str) -> Provider {
        let client = OAuthClientConfig::new(
            Some("sf-client".to_string()),
            Some("sf-secret".to_string()),
            "http://localhost:4000/api/sf/auth/callback".to_string(),
            "api refresh_token".to_string(),
        )
        .unwrap();
        Provider::new(
            Config {
                client,
                login_url: login_url.to_string(),
                password: Some(PasswordCredentials {
                    username: "user@example.com".to_string(),
                    password: SecretString::from("hunter2".to_string()),
                    security_token: Some(SecretString::from("TOKEN".to_string())),
                }),
            },
            reqwest::Client::new(),
        )
    }

    fn query_value(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_authorization_url_includes_pkce() {
        let provider = provider(DEFAULT_LOGIN_URL);
        let request = provider.begin_authorization().unwrap();
        let url = Url::parse(&request.url).unwrap();

        assert_eq!(url.path(), "/services/oauth2/authorize");
        assert_eq!(query_value(&url, "response_type").as_deref(), Some("code"));
        assert_eq!(query_value(&url, "client_id").as_deref(), Some("sf-client"));
        assert_eq!(
            query_value(&url, "redirect_uri").as_deref(),
            Some("http://localhost:4000/api/sf/auth/callback")
        );
        assert_eq!(query_value(&url, "scope").as_deref(), Some("api refresh_token"));
        assert_eq!(query_value(&url, "state"), Some(request.pending.state.clone()));
        assert_eq!(query_value(&url, "code_challenge_method").as_deref(), Some("S256"));

        let verifier = PkceVerifier::from_string(request.pending.code_verifier.clone().unwrap());
        assert_eq!(
            query_value(&url, "code_challenge").as_deref(),
            Some(verifier.challenge().as_str())
        );
    }

    #[tokio::test]
    async fn test_exchange_code_posts_form_with_verifier() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/services/oauth2/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "abc".into()),
                Matcher::UrlEncoded("client_id".into(), "sf-client".into()),
                Matcher::UrlEncoded("client_secret".into(), "sf-secret".into()),
                Matcher::UrlEncoded(
                    "redirect_uri".into(),
                    "http://localhost:4000/api/sf/auth/callback".into(),
                ),
                Matcher::UrlEncoded("code_verifier".into(), "verifier-123".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "access_token": "T1",
                    "refresh_token": "R1",
                    "instance_url": "https://org.example.com",
                    "token_type": "Bearer"
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let grant = provider(&server.url())
            .exchange_code("abc", Some("verifier-123"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(grant.access_token, "T1");
        assert_eq!(grant.refresh_token.as_deref(), Some("R1"));
        assert_eq!(grant.instance_url.as_deref(), Some("https://org.example.com"));
    }

    #[tokio::test]
    async fn test_exchange_code_surfaces_error_description() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/services/oauth2/token")
            .with_status(400)
            .with_body(
                json!({"error": "invalid_grant", "error_description": "expired authorization code"})
                    .to_string(),
            )
            .create_async()
            .await;

        let err = provider(&server.url())
            .exchange_code("abc", None)
            .await
            .unwrap_err();

        match err.error_kind {
            ErrorKind::OAuth(OAuthErrorKind::TokenExchangeFailed(fault)) => {
                assert_eq!(fault.code, "invalid_grant");
                assert_eq!(fault.message, "expired authorization code");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_password_grant_appends_security_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/services/oauth2/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "password".into()),
                Matcher::UrlEncoded("username".into(), "user@example.com".into()),
                Matcher::UrlEncoded("password".into(), "hunter2TOKEN".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({"access_token": "T1", "instance_url": "https://org.example.com"})
                    .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let grant = provider(&server.url()).password_grant().await.unwrap();

        mock.assert_async().await;
        assert_eq!(grant.access_token, "T1");
        assert!(grant.refresh_token.is_none());
    }

    #[test]
    fn test_decode_fault_rest_error_array() {
        let provider = provider(DEFAULT_LOGIN_URL);
        let payload = Payload::Json(json!([{
            "message": "Required fields are missing: [LastName]",
            "errorCode": "REQUIRED_FIELD_MISSING",
            "fields": ["LastName"]
        }]));

        let fault = provider.decode_fault(StatusCode::BAD_REQUEST, &payload);
        assert_eq!(fault.code, "REQUIRED_FIELD_MISSING");
        assert_eq!(fault.message, "Required fields are missing: [LastName]");
        assert_eq!(fault.details, Some(json!(["LastName"])));
    }

    #[test]
    fn test_api_base_url_prefers_instance_url() {
        let provider = provider(DEFAULT_LOGIN_URL);
        let mut record = TokenRecord {
            access_token: SecretString::from("T1".to_string()),
            refresh_token: None,
            instance_url: None,
            expires_at: None,
        };
        assert_eq!(provider.api_base_url(&record), DEFAULT_LOGIN_URL);

        record.instance_url = Some("https://org.example.com".to_string());
        assert_eq!(provider.api_base_url(&record), "https://org.example.com");
    }
}
