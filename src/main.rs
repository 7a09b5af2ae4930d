use log::{error, info};
use service::{config::Config, logging::Logger, AppState};

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting CRM auth proxy [{}] on port {}",
        config.runtime_env(),
        config.port
    );

    let http_client = match service::init_http_client(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build the provider HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let app_state = AppState::new(config, http_client);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}
