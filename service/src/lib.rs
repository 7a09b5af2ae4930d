use config::Config;
use crm_auth::http::HttpClientBuilder;
use crm_auth::oauth::token::{Manager, MemoryStorage};
use log::info;
use std::sync::Arc;

pub mod config;
pub mod logging;

/// Token records are process memory only; a restart signs everyone out.
pub type TokenManager = Manager<MemoryStorage>;

/// Build the HTTP client every provider call goes through.
pub fn init_http_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    info!(
        "Provider HTTP client config: timeout={}s",
        config.http_timeout_secs
    );

    HttpClientBuilder::new()
        .with_timeout(config.http_timeout())
        .build()
}

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub token_manager: Arc<TokenManager>,
    pub http_client: reqwest::Client,
    pub config: Config,
}

impl AppState {
    pub fn new(app_config: Config, http_client: reqwest::Client) -> Self {
        Self {
            token_manager: Arc::new(Manager::new(MemoryStorage::new())),
            http_client,
            config: app_config,
        }
    }

    pub fn token_manager(&self) -> &TokenManager {
        self.token_manager.as_ref()
    }
}
