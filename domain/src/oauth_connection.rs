//! OAuth connection lifecycle for one auth context and provider:
//! login, callback, refresh, status and logout.

use crate::error::Error;
use crate::gateway::crm;
use crm_auth::error::{oauth_error, token_error, OAuthErrorKind, TokenErrorKind};
use crm_auth::oauth::token::AuthStatus;
use crm_auth::oauth::{redeem_pending, AuthorizationRequest, PendingAuthorization, ProviderKind};
use log::*;
use serde::Deserialize;
use service::AppState;

/// Query parameters the provider appends when redirecting back.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Start a login: build the authorization URL and the pending data the caller
/// must keep in the browser's session until the callback.
pub fn begin_authorization(
    app_state: &AppState,
    kind: ProviderKind,
) -> Result<AuthorizationRequest, Error> {
    let provider = crm::new_provider(&app_state.config, &app_state.http_client, kind)?;
    let request = provider.begin_authorization()?;

    info!("Starting {} OAuth login", kind.display_name());
    Ok(request)
}

/// Finish a login from the provider's redirect.
///
/// `pending` is whatever the session held, already removed from it so that it
/// can never be redeemed twice. The code is only exchanged when the provider
/// reported no error and the returned `state` matches the pending one.
/// `context_id` is `None` when the session never started a login.
pub async fn complete_authorization(
    app_state: &AppState,
    kind: ProviderKind,
    context_id: Option<&str>,
    pending: Option<PendingAuthorization>,
    params: &CallbackParams,
) -> Result<AuthStatus, Error> {
    if let Some(error) = &params.error {
        warn!(
            "{} authorization denied: {error} ({})",
            kind.display_name(),
            params.error_description.as_deref().unwrap_or("no description")
        );
        return Err(oauth_error(
            OAuthErrorKind::AuthorizationDenied {
                error: error.clone(),
                description: params.error_description.clone(),
            },
            "provider returned an error to the callback",
        )
        .into());
    }

    let code_verifier = redeem_pending(pending, params.state.as_deref())
        .inspect_err(|_| warn!("Rejected {} callback with invalid state", kind.display_name()))?;
    // A pending authorization is only ever stored next to an auth context.
    let context_id = context_id.ok_or_else(|| {
        oauth_error(OAuthErrorKind::InvalidState, "no auth context for this session")
    })?;

    let code = params
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| oauth_error(OAuthErrorKind::MissingCode, "code parameter missing"))?;

    let provider = crm::new_provider(&app_state.config, &app_state.http_client, kind)?;
    let status = app_state
        .token_manager()
        .complete_authorization(provider.as_ref(), context_id, code, code_verifier.as_deref())
        .await
        .inspect_err(|e| warn!("Failed to exchange {} authorization code: {e}", kind.display_name()))?;

    Ok(status)
}

/// Authenticate with the legacy username-password grant.
pub async fn password_login(
    app_state: &AppState,
    kind: ProviderKind,
    context_id: &str,
) -> Result<AuthStatus, Error> {
    let provider = crm::new_provider(&app_state.config, &app_state.http_client, kind)?;
    let status = app_state
        .token_manager()
        .password_login(provider.as_ref(), context_id)
        .await
        .inspect_err(|e| warn!("{} password login failed: {e}", kind.display_name()))?;

    Ok(status)
}

pub async fn refresh(
    app_state: &AppState,
    kind: ProviderKind,
    context_id: Option<&str>,
) -> Result<AuthStatus, Error> {
    let Some(context_id) = context_id else {
        return Err(token_error(TokenErrorKind::NoRefreshToken, "No auth context for this session").into());
    };
    let provider = crm::new_provider(&app_state.config, &app_state.http_client, kind)?;
    let status = app_state
        .token_manager()
        .refresh(provider.as_ref(), context_id)
        .await?;

    Ok(status)
}

pub async fn status(
    app_state: &AppState,
    kind: ProviderKind,
    context_id: Option<&str>,
) -> Result<AuthStatus, Error> {
    let Some(context_id) = context_id else {
        return Ok(AuthStatus::unauthenticated());
    };
    Ok(app_state
        .token_manager()
        .status(context_id, kind.as_str())
        .await?)
}

/// Clear local tokens only; nothing is revoked at the provider.
pub async fn logout(
    app_state: &AppState,
    kind: ProviderKind,
    context_id: Option<&str>,
) -> Result<(), Error> {
    let Some(context_id) = context_id else {
        return Ok(());
    };
    app_state
        .token_manager()
        .logout(context_id, kind.as_str())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthErrorKind, DomainErrorKind, ExternalErrorKind, InternalErrorKind};
    use clap::Parser;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;
    use service::config::Config;

    const CONTEXT: &str = "context-1";

    fn app_state(server: &ServerGuard) -> AppState {
        let config = Config::try_parse_from([
            "crm_auth_proxy",
            "--sf-client-id",
            "sf-id",
            "--sf-client-secret",
            "sf-secret",
        ])
        .unwrap()
        .set_provider_base_url(&server.url());
        AppState::new(config, reqwest::Client::new())
    }

    fn params(code: Option<&str>, state: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            ..Default::default()
        }
    }

    fn auth_error_kind(err: Error) -> AuthErrorKind {
        match err.error_kind {
            DomainErrorKind::Internal(InternalErrorKind::Auth(kind)) => kind,
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mismatched_state_never_exchanges_code() {
        let mut server = Server::new_async().await;
        let token = server
            .mock("POST", "/services/oauth2/token")
            .expect(0)
            .create_async()
            .await;
        let app_state = app_state(&server);

        let pending = PendingAuthorization::issue(true);
        let err = complete_authorization(
            &app_state,
            ProviderKind::Salesforce,
            Some(CONTEXT),
            Some(pending),
            &params(Some("abc"), Some("not-the-issued-state")),
        )
        .await
        .unwrap_err();

        assert_eq!(auth_error_kind(err), AuthErrorKind::InvalidState);
        token.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_pending_or_state_is_invalid_state() {
        let server = Server::new_async().await;
        let app_state = app_state(&server);

        let err = complete_authorization(
            &app_state,
            ProviderKind::Salesforce,
            Some(CONTEXT),
            None,
            &params(Some("abc"), Some("anything")),
        )
        .await
        .unwrap_err();
        assert_eq!(auth_error_kind(err), AuthErrorKind::InvalidState);

        let err = complete_authorization(
            &app_state,
            ProviderKind::Salesforce,
            Some(CONTEXT),
            Some(PendingAuthorization::issue(true)),
            &params(Some("abc"), None),
        )
        .await
        .unwrap_err();
        assert_eq!(auth_error_kind(err), AuthErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_provider_error_is_reported_before_state_check() {
        let server = Server::new_async().await;
        let app_state = app_state(&server);

        let callback = CallbackParams {
            error: Some("access_denied".to_string()),
            error_description: Some("end-user denied authorization".to_string()),
            ..Default::default()
        };
        let err = complete_authorization(
            &app_state,
            ProviderKind::Salesforce,
            Some(CONTEXT),
            None,
            &callback,
        )
        .await
        .unwrap_err();

        assert_eq!(
            auth_error_kind(err),
            AuthErrorKind::Denied {
                error: "access_denied".to_string(),
                description: Some("end-user denied authorization".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_code() {
        let server = Server::new_async().await;
        let app_state = app_state(&server);
        let pending = PendingAuthorization::issue(true);
        let state = pending.state.clone();

        let err = complete_authorization(
            &app_state,
            ProviderKind::Salesforce,
            Some(CONTEXT),
            Some(pending),
            &params(None, Some(&state)),
        )
        .await
        .unwrap_err();

        assert_eq!(auth_error_kind(err), AuthErrorKind::MissingCode);
    }

    #[tokio::test]
    async fn test_successful_callback_sends_verifier_and_stores_tokens() {
        let mut server = Server::new_async().await;
        let pending = PendingAuthorization::issue(true);
        let state = pending.state.clone();
        let verifier = pending.code_verifier.clone().unwrap();

        let token = server
            .mock("POST", "/services/oauth2/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("code".into(), "abc".into()),
                Matcher::UrlEncoded("code_verifier".into(), verifier),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "access_token": "T1",
                    "refresh_token": "R1",
                    "instance_url": "https://org.example.com",
                    "expires_in": 3600
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let app_state = app_state(&server);

        complete_authorization(
            &app_state,
            ProviderKind::Salesforce,
            Some(CONTEXT),
            Some(pending),
            &params(Some("abc"), Some(&state)),
        )
        .await
        .unwrap();

        let status = status(&app_state, ProviderKind::Salesforce, Some(CONTEXT))
            .await
            .unwrap();
        assert!(status.authenticated);
        assert!(status.has_refresh_token);
        assert_eq!(status.instance_url.as_deref(), Some("https://org.example.com"));
        token.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_exchange_failure_carries_provider_message() {
        let mut server = Server::new_async().await;
        let _token = server
            .mock("POST", "/services/oauth2/token")
            .with_status(400)
            .with_body(
                json!({"error": "invalid_grant", "error_description": "expired authorization code"})
                    .to_string(),
            )
            .create_async()
            .await;
        let app_state = app_state(&server);
        let pending = PendingAuthorization::issue(true);
        let state = pending.state.clone();

        let err = complete_authorization(
            &app_state,
            ProviderKind::Salesforce,
            Some(CONTEXT),
            Some(pending),
            &params(Some("abc"), Some(&state)),
        )
        .await
        .unwrap_err();

        match err.error_kind {
            DomainErrorKind::External(ExternalErrorKind::TokenExchange(fault)) => {
                assert_eq!(fault.message, "expired authorization code");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
        assert!(
            !status(&app_state, ProviderKind::Salesforce, Some(CONTEXT))
                .await
                .unwrap()
                .authenticated
        );
    }

    #[tokio::test]
    async fn test_login_without_credentials_is_config_error() {
        let config = Config::try_parse_from(["crm_auth_proxy"]).unwrap();
        let app_state = AppState::new(config, reqwest::Client::new());

        match begin_authorization(&app_state, ProviderKind::Hubspot) {
            Err(err) => assert_eq!(
                err.error_kind,
                DomainErrorKind::Internal(InternalErrorKind::Config)
            ),
            Ok(_) => panic!("expected a configuration error"),
        }
    }

    #[tokio::test]
    async fn test_refresh_without_tokens_and_logout() {
        let server = Server::new_async().await;
        let app_state = app_state(&server);

        let err = refresh(&app_state, ProviderKind::Salesforce, Some(CONTEXT))
            .await
            .unwrap_err();
        assert_eq!(auth_error_kind(err), AuthErrorKind::NoRefreshToken);

        logout(&app_state, ProviderKind::Salesforce, Some(CONTEXT))
            .await
            .unwrap();
        assert_eq!(
            status(&app_state, ProviderKind::Salesforce, Some(CONTEXT))
                .await
                .unwrap(),
            AuthStatus::unauthenticated()
        );
    }

    #[tokio::test]
    async fn test_session_without_auth_context() {
        let mut server = Server::new_async().await;
        let token = server
            .mock("POST", "/services/oauth2/token")
            .expect(0)
            .create_async()
            .await;
        let app_state = app_state(&server);

        assert_eq!(
            status(&app_state, ProviderKind::Salesforce, None)
                .await
                .unwrap(),
            AuthStatus::unauthenticated()
        );

        let err = refresh(&app_state, ProviderKind::Salesforce, None)
            .await
            .unwrap_err();
        assert_eq!(auth_error_kind(err), AuthErrorKind::NoRefreshToken);

        logout(&app_state, ProviderKind::Salesforce, None)
            .await
            .unwrap();

        let pending = PendingAuthorization::issue(true);
        let state = pending.state.clone();
        let err = complete_authorization(
            &app_state,
            ProviderKind::Salesforce,
            None,
            Some(pending),
            &params(Some("abc"), Some(&state)),
        )
        .await
        .unwrap_err();
        assert_eq!(auth_error_kind(err), AuthErrorKind::InvalidState);

        token.assert_async().await;
    }
}
