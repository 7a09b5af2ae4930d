use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use log::*;
use rand::RngCore;
use sha2::{Digest, Sha512};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};

pub use service::AppState;

mod controller;
mod error;
mod extractors;
pub mod router;
mod session_store;

pub use error::{Error, Result};
pub use session_store::ExpiringMemoryStore;

/// How often expired sessions and their token records are dropped.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Build the full application: provider routes, CORS and the signed session cookie.
pub fn app(app_state: AppState) -> Router {
    app_with_store(app_state, ExpiringMemoryStore::default())
}

fn app_with_store<S: SessionStore + Clone>(app_state: AppState, store: S) -> Router {
    let cors = cors_layer(&app_state.config.allowed_origins);
    let sessions = session_layer(&app_state, store);

    router::define_routes(app_state).layer(sessions).layer(cors)
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = app_state.config.port;

    let listener = tokio::net::TcpListener::bind((interface.as_str(), port)).await?;
    info!("Server starting... listening for connections on http://{interface}:{port}");

    let store = ExpiringMemoryStore::default();
    tokio::spawn(sweep_sessions_periodically(store.clone(), app_state.clone()));

    axum::serve(listener, app_with_store(app_state, store)).await
}

async fn sweep_sessions_periodically(store: ExpiringMemoryStore, app_state: AppState) {
    let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        sweep_expired_sessions(&store, &app_state).await;
    }
}

/// Remove expired sessions along with the token records of their auth contexts.
async fn sweep_expired_sessions(store: &ExpiringMemoryStore, app_state: &AppState) {
    for context_id in store.remove_expired().await {
        if let Err(err) = app_state.token_manager().forget_context(&context_id).await {
            warn!("Failed to drop tokens of expired auth context {context_id}: {err}");
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

fn session_layer<S: SessionStore + Clone>(
    app_state: &AppState,
    store: S,
) -> SessionManagerLayer<S, SignedCookie> {
    let config = &app_state.config;

    // Saving on every request keeps the inactivity expiry sliding.
    SessionManagerLayer::new(store)
        .with_signed(session_key(config.session_secret()))
        .with_secure(config.is_production())
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(
            config.session_expiry_seconds as i64,
        )))
        .with_always_save(true)
}

/// 64 bytes of signing key: the SHA-512 of the configured secret, or random bytes.
///
/// A blank secret counts as unset.
fn session_key(secret: Option<&str>) -> Key {
    let material = match secret.filter(|secret| !secret.trim().is_empty()) {
        Some(secret) => Sha512::digest(secret.as_bytes()).to_vec(),
        None => {
            warn!("SESSION_SECRET is not set; sessions will not survive a restart");
            let mut bytes = vec![0u8; 64];
            rand::thread_rng().fill_bytes(&mut bytes);
            bytes
        }
    };
    Key::from(material.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::auth_context::AUTH_CONTEXT_KEY;
    use clap::Parser;
    use crm_auth::oauth::token::{TokenGrant, TokenRecord};
    use serde_json::json;
    use std::collections::HashMap;
    use tower_sessions::session::{Id, Record};

    #[test]
    fn test_session_key_is_stable_for_a_secret() {
        let first = session_key(Some("correct horse battery staple"));
        let second = session_key(Some("correct horse battery staple"));
        assert_eq!(first.master(), second.master());
    }

    #[test]
    fn test_session_key_is_random_without_secret() {
        assert_ne!(session_key(None).master(), session_key(None).master());
    }

    #[test]
    fn test_session_key_treats_blank_secret_as_unset() {
        let empty = session_key(Some(""));
        assert_ne!(empty.master(), Sha512::digest(b"").as_slice());
        assert_ne!(empty.master(), session_key(Some("")).master());
        assert_ne!(session_key(Some("   ")).master(), session_key(Some("   ")).master());
    }

    #[tokio::test]
    async fn test_sweep_drops_tokens_of_expired_sessions() {
        let config = service::config::Config::try_parse_from(["crm_auth_proxy"]).unwrap();
        let app_state = AppState::new(config, reqwest::Client::new());
        let store = ExpiringMemoryStore::default();

        for (context_id, expires_in) in [
            ("ctx-expired", time::Duration::minutes(-1)),
            ("ctx-active", time::Duration::minutes(30)),
        ] {
            let mut data = HashMap::new();
            data.insert(AUTH_CONTEXT_KEY.to_string(), json!(context_id));
            store
                .save(&Record {
                    id: Id::default(),
                    data,
                    expiry_date: time::OffsetDateTime::now_utc() + expires_in,
                })
                .await
                .unwrap();
            app_state
                .token_manager()
                .store_record(context_id, "salesforce", token_record())
                .await
                .unwrap();
        }

        sweep_expired_sessions(&store, &app_state).await;

        let manager = app_state.token_manager();
        assert!(!manager.status("ctx-expired", "salesforce").await.unwrap().authenticated);
        assert!(manager.status("ctx-active", "salesforce").await.unwrap().authenticated);
        assert!(store.remove_expired().await.is_empty());
    }

    fn token_record() -> TokenRecord {
        TokenRecord::from_grant(TokenGrant {
            access_token: "T1".to_string(),
            refresh_token: Some("R1".to_string()),
            instance_url: Some("https://org.example.com".to_string()),
            expires_in: None,
        })
    }
}
