//! Controller for the OAuth connection lifecycle of one provider.
//!
//! Mounted once per provider; the provider is supplied by an `Extension`
//! layer on the nested router. The callback answers with redirects because it
//! is reached by the browser coming back from the provider.

use crate::error::session_error;
use crate::extractors::auth_context::{AuthContext, SessionContext};
use crate::{AppState, Error};

use axum::extract::{Extension, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::error::{
    AuthErrorKind, DomainErrorKind, Error as DomainError, ExternalErrorKind, InternalErrorKind,
};
use domain::oauth_connection::{self, CallbackParams};
use domain::{PendingAuthorization, ProviderKind};
use log::*;
use serde_json::json;
use url::form_urlencoded;

/// Session key under which a provider's pending authorization is kept.
pub(crate) fn pending_key(kind: ProviderKind) -> String {
    format!("{}.oauth", kind.as_str())
}

fn troubleshooting(kind: ProviderKind) -> Vec<&'static str> {
    match kind {
        ProviderKind::Salesforce => vec![
            "Set SF_CLIENT_ID and SF_CLIENT_SECRET to the Connected App's consumer key and secret",
            "Make sure SF_REDIRECT_URI exactly matches the Connected App's callback URL",
            "Enable OAuth settings with the 'api' and 'refresh_token' scopes on the Connected App",
            "Use SF_LOGIN_URL=https://test.salesforce.com for sandbox orgs",
        ],
        ProviderKind::Hubspot => vec![
            "Set HUBSPOT_CLIENT_ID and HUBSPOT_CLIENT_SECRET from the HubSpot app's Auth settings",
            "Make sure HUBSPOT_REDIRECT_URI exactly matches a redirect URL of the HubSpot app",
            "Check that HUBSPOT_SCOPES only lists scopes enabled for the app",
        ],
    }
}

/// GET /api/{provider}/auth/login
///
/// Starts the OAuth flow and returns the authorization URL for the browser to open.
pub async fn login(
    State(app_state): State<AppState>,
    Extension(kind): Extension<ProviderKind>,
    context: AuthContext,
) -> Result<Response, Error> {
    let request = match oauth_connection::begin_authorization(&app_state, kind) {
        Ok(request) => request,
        Err(err) if err.error_kind == DomainErrorKind::Internal(InternalErrorKind::Config) => {
            warn!("{} OAuth is not configured", kind.display_name());
            return Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "OAuth configuration incomplete",
                    "troubleshooting": troubleshooting(kind),
                })),
            )
                .into_response());
        }
        Err(err) => return Err(err.into()),
    };

    context
        .session
        .insert(&pending_key(kind), &request.pending)
        .await
        .map_err(session_error)?;

    Ok(Json(json!({ "success": true, "authUrl": request.url })).into_response())
}

/// GET /api/{provider}/auth/callback
///
/// Completes the flow and redirects the browser to `/` with the outcome in
/// the query string. The pending authorization is removed from the session
/// whatever the outcome.
pub async fn callback(
    State(app_state): State<AppState>,
    Extension(kind): Extension<ProviderKind>,
    context: SessionContext,
    Query(params): Query<CallbackParams>,
) -> Result<Response, Error> {
    let pending = context
        .session
        .remove::<PendingAuthorization>(&pending_key(kind))
        .await
        .map_err(session_error)?;

    match oauth_connection::complete_authorization(&app_state, kind, context.id(), pending, &params)
        .await
    {
        Ok(_) => {
            info!("{} login completed", kind.display_name());
            Ok(redirect_home(&[("auth", "success")]))
        }
        Err(err) => Ok(callback_failure(err)),
    }
}

fn callback_failure(err: DomainError) -> Response {
    match &err.error_kind {
        DomainErrorKind::Internal(InternalErrorKind::Auth(auth_error_kind)) => {
            match auth_error_kind {
                AuthErrorKind::Denied { error, description } => match description {
                    Some(description) => {
                        redirect_home(&[("error", error.as_str()), ("message", description.as_str())])
                    }
                    None => redirect_home(&[("error", error.as_str())]),
                },
                AuthErrorKind::InvalidState => redirect_home(&[("error", "invalid_state")]),
                AuthErrorKind::MissingCode => redirect_home(&[("error", "missing_code")]),
                _ => redirect_home(&[("error", "authentication_failed")]),
            }
        }
        DomainErrorKind::External(ExternalErrorKind::TokenExchange(fault)) => redirect_home(&[
            ("error", "token_exchange_failed"),
            ("message", fault.message.as_str()),
        ]),
        DomainErrorKind::Internal(InternalErrorKind::Config) => {
            redirect_home(&[("error", "configuration_error")])
        }
        DomainErrorKind::External(ExternalErrorKind::Network) => redirect_home(&[
            ("error", "network_error"),
            ("message", "Unable to reach the provider"),
        ]),
        _ => {
            error!("OAuth callback failed: {err}");
            redirect_home(&[("error", "authentication_failed")])
        }
    }
}

/// `302 Found` to `/` with the given query parameters.
fn redirect_home(params: &[(&str, &str)]) -> Response {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    (StatusCode::FOUND, [(header::LOCATION, format!("/?{query}"))]).into_response()
}

/// POST /api/{provider}/auth/refresh
pub async fn refresh(
    State(app_state): State<AppState>,
    Extension(kind): Extension<ProviderKind>,
    context: SessionContext,
) -> Result<Response, Error> {
    match oauth_connection::refresh(&app_state, kind, context.id()).await {
        Ok(_) => Ok(Json(json!({ "success": true })).into_response()),
        Err(err) => match err.error_kind {
            DomainErrorKind::External(ExternalErrorKind::TokenRefresh(fault)) => Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": fault.message })),
            )
                .into_response()),
            _ => Err(err.into()),
        },
    }
}

/// POST /api/{provider}/auth/password
///
/// Authenticates with the configured username and password instead of a browser redirect.
pub async fn password(
    State(app_state): State<AppState>,
    Extension(kind): Extension<ProviderKind>,
    context: AuthContext,
) -> Result<impl IntoResponse, Error> {
    let status = oauth_connection::password_login(&app_state, kind, &context.id).await?;

    Ok(Json(json!({
        "success": true,
        "instanceUrl": status.instance_url,
    })))
}

/// GET /api/{provider}/auth/status
pub async fn status(
    State(app_state): State<AppState>,
    Extension(kind): Extension<ProviderKind>,
    context: SessionContext,
) -> Result<impl IntoResponse, Error> {
    let status = oauth_connection::status(&app_state, kind, context.id()).await?;
    Ok(Json(status))
}

/// POST /api/{provider}/auth/logout
pub async fn logout(
    State(app_state): State<AppState>,
    Extension(kind): Extension<ProviderKind>,
    context: SessionContext,
) -> Result<impl IntoResponse, Error> {
    oauth_connection::logout(&app_state, kind, context.id()).await?;
    Ok(Json(json!({ "success": true })))
}
