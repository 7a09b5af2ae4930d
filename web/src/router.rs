use crate::controller::{auth_controller, health_check_controller, record_controller};
use crate::AppState;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use domain::ProviderKind;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .nest(
            "/api/sf",
            provider_routes(app_state.clone(), ProviderKind::Salesforce),
        )
        .nest(
            "/api/hubspot",
            provider_routes(app_state, ProviderKind::Hubspot),
        )
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

/// Every route of one provider; handlers read the provider from the `Extension`.
fn provider_routes(app_state: AppState, kind: ProviderKind) -> Router {
    Router::new()
        .merge(auth_routes(app_state.clone()))
        .merge(record_routes(app_state))
        .layer(Extension(kind))
}

fn auth_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/auth/login", get(auth_controller::login))
        .route("/auth/callback", get(auth_controller::callback))
        .route("/auth/refresh", post(auth_controller::refresh))
        .route("/auth/password", post(auth_controller::password))
        .route("/auth/status", get(auth_controller::status))
        .route("/auth/logout", post(auth_controller::logout))
        .with_state(app_state)
}

fn record_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/{object}",
            get(record_controller::index).post(record_controller::create),
        )
        .route(
            "/{object}/{id}",
            get(record_controller::read)
                .put(record_controller::update)
                .patch(record_controller::update)
                .delete(record_controller::delete),
        )
        .with_state(app_state)
}
