//! Backend of a couples prediction game for a dating reality show.
//!
//!
//!
//! # General Infrastructure
//! - Frontend talks to the service through an authenticating reverse proxy
//! - The proxy forwards the signed in user id as `x-user-id`
//! - When `PROXY_KEY` is configured, the proxy also sends it as `x-proxy-key` and requests
//!   without it cannot claim an identity
//! - Redis holds the catalog (seasons, participants, episodes, official couples), user
//!   profiles and predictions
//!
//!
//!
//! # Prediction sessions
//!
//! Each user editing an episode gets a [`show::Session`] held in memory, keyed by
//! `(user, episode)`. The session owns the builder state. Activations and unpairing never
//! touch Redis, only saving does. Sessions idle for longer than `SESSION_IDLE_SECS` are
//! swept every minute, the stored prediction is restored on the next open.
//!
//! Saving is refused with `409` unless the episode is open and inside its
//! `openAt..closeAt` window.
//!
//!
//!
//! # Notes
//!
//! ## Scoring
//! A prediction scores `round(100 * correct / official couples)`. Only the latest prediction
//! of each user counts towards rankings and episode statistics.
//!
//! ## Catalog
//! Admin routes require the `admin` role on the caller's profile. The first admin is
//! promoted with the `admin` CLI.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run locally against a Redis on the default port.
//! ```sh
//! RUST_LOG=info cargo run -p couples
//! ```
//!
//! Seed a season.
//! ```sh
//! cargo run -p admin -- import season.json
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        HeaderName, HeaderValue, Method,
        header::CONTENT_TYPE,
    },
    routing::{delete, get, patch, post},
};
use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod admin;
pub mod config;
pub mod database;
pub mod error;
pub mod routes;
pub mod state;
pub mod utils;

use config::Config;
use routes::*;
use state::{AppState, spawn_session_sweeper};
use utils::{PROXY_KEY_HEADER, USER_HEADER};

pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/health", get(health_handler))
        .route("/seasons", get(seasons_handler))
        .route("/seasons/{id}/participants", get(season_participants_handler))
        .route("/episodes", get(episodes_handler))
        .route("/episodes/{id}", get(episode_handler))
        .route("/episodes/{id}/roster", get(roster_handler))
        .route("/episodes/{id}/results", get(results_handler))
        .route("/episodes/{id}/rankings", get(rankings_handler));

    let user = Router::new()
        .route("/me/profile", get(get_profile_handler).put(put_profile_handler))
        .route("/me/predictions", get(my_predictions_handler))
        .route(
            "/episodes/{id}/prediction",
            get(get_prediction_handler).put(put_prediction_handler),
        )
        .route(
            "/episodes/{id}/builder",
            get(builder_view_handler).post(open_builder_handler),
        )
        .route("/episodes/{id}/builder/activate", post(activate_handler))
        .route("/episodes/{id}/builder/unpair", post(unpair_handler))
        .route("/episodes/{id}/builder/reset", post(reset_handler))
        .route("/episodes/{id}/builder/save", post(save_handler));

    let admin = Router::new()
        .route("/admin/seasons", post(create_season_handler))
        .route("/admin/seasons/{id}", patch(update_season_handler))
        .route("/admin/participants", post(create_participant_handler))
        .route(
            "/admin/participants/{id}",
            patch(update_participant_handler).delete(delete_participant_handler),
        )
        .route("/admin/episodes", post(create_episode_handler))
        .route("/admin/episodes/{id}", patch(update_episode_handler))
        .route("/admin/couples", post(create_couple_handler))
        .route("/admin/couples/{id}", delete(delete_couple_handler));

    public.merge(user).merge(admin).with_state(state)
}

fn cors(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(USER_HEADER),
            HeaderName::from_static(PROXY_KEY_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60));

    match HeaderValue::from_str(&config.frontend_origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!("Ignoring invalid FRONTEND_ORIGIN {}: {e}", config.frontend_origin);
            layer
        }
    }
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new(Config::load()?).await?;
    spawn_session_sweeper(state.clone());

    info!("Starting server...");

    let app = router(state.clone()).layer(cors(&state.config));

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use show::MemoryStore;

    use super::*;

    #[test]
    fn test_router_builds() {
        let state = AppState::with_store(config::test_config(), Arc::new(MemoryStore::new()));

        let _ = router(state.clone()).layer(cors(&state.config));
    }
}
