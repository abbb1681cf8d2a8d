mod config;
mod engine;
mod errors;
mod feeds;
mod models;
mod server;
mod state;

use crate::state::EngineEvent;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    // Structured logging (stderr so stdout stays clean for supervisors)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("strikesight monitor starting");

    // Load config
    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    // Bounded event channel into the engine
    let (engine_tx, engine_rx) = mpsc::channel::<EngineEvent>(512);

    // Shared state
    let app_state = state::AppState::new(cfg.clone(), engine_tx.clone());

    // ── Spawn tasks ──

    // 1. Spot price feed task
    let feed_url = cfg.feed_base_url.clone();
    let feed_symbol = cfg.feed_symbol.clone();
    let feed_poll = cfg.feed_poll_secs;
    let feed_tx = app_state.engine_tx.clone();
    tokio::spawn(async move {
        feeds::binance::run_spot_feed(feed_url, feed_symbol, feed_poll, feed_tx).await;
    });

    // 2. Simulation tick generator (10-second cadence by default)
    let tick_tx = app_state.engine_tx.clone();
    let tick_secs = cfg.sim_interval_secs.max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(tick_secs));
        loop {
            interval.tick().await;
            if tick_tx.send(EngineEvent::Tick).await.is_err() {
                break;
            }
        }
    });

    // 3. Engine task (core loop -- this is the hot path)
    let engine_state = app_state.clone();
    let engine_cfg = cfg.clone();
    tokio::spawn(async move {
        engine::run_engine(engine_state, engine_cfg, engine_rx).await;
    });

    // 4. Axum HTTP + WS server
    let server_state = app_state.clone();
    let port = app_state.config.server_port;

    let app = axum::Router::new()
        .route("/api/state", axum::routing::get(server::routes::get_state))
        .route(
            "/api/simulation",
            axum::routing::get(server::routes::get_simulation),
        )
        .route(
            "/api/counters",
            axum::routing::get(server::routes::get_counters),
        )
        .route("/ws", axum::routing::get(server::ws::ws_handler))
        .fallback_service(
            tower_http::services::ServeDir::new("dashboard/dist")
                .fallback(tower_http::services::ServeFile::new("dashboard/dist/index.html")),
        )
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(server_state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}
