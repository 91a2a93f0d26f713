//! Price Feed Hub Server
//!
//! Polls Pyth for the latest prices, keeps a capped history per feed and
//! serves it to WebSocket clients.

mod config;
mod connections;
mod routes;

use axum::{
    http::{header, Method},
    Router,
};
use feedhub_pyth::PythClient;
use feedhub_services::{
    ChannelReplies, Hub, PriceFeedJob, Scheduler, StatusJob, TopicLogStore, WebSocketState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::connections::ConnectionStats;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ws_state: Arc<WebSocketState>,
    pub topic_log: Arc<TopicLogStore>,
    pub connections: Arc<ConnectionStats>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,feedhub_api=debug,feedhub_services=debug")
            }),
        )
        .init();

    info!("Starting Price Feed Hub");

    let config = AppConfig::from_env()?;

    let topic_log = Arc::new(TopicLogStore::new(config.topic_log_max_len));
    let (hub, _hub_task) = Hub::new().spawn();

    // Periodic jobs: price ingestion and status report
    let pyth_client = PythClient::new(&config.pyth_api_host)?;
    info!(
        "Tracking {} feed(s) from {}, keeping {} records per topic",
        config.ingestion.feed_ids.len(),
        pyth_client.base_url(),
        config.topic_log_max_len
    );
    let price_job = PriceFeedJob::new(Arc::new(pyth_client), topic_log.clone(), &config.ingestion)
        .with_hub(hub.clone());
    let status_job = StatusJob::new(hub.clone(), topic_log.clone());

    let mut scheduler = Scheduler::new();
    scheduler
        .register(config.ingestion.poll_interval, Arc::new(price_job))
        .register(config.status_interval, Arc::new(status_job));
    let _job_handles = scheduler.start();

    // Create session event channel for the connection tally
    let (session_tx, session_rx) = WebSocketState::create_session_event_channel();

    let replies = ChannelReplies::new(topic_log.clone(), config.ingestion.feed_ids.clone());
    let mut ws_state = WebSocketState::new(hub, replies, config.session.clone());
    ws_state.set_session_event_sender(session_tx);
    let ws_state = Arc::new(ws_state);

    let connections = Arc::new(ConnectionStats::new());
    let connections_for_events = Arc::clone(&connections);
    tokio::spawn(async move {
        connections_for_events.process_session_events(session_rx).await;
    });

    // Create app state
    let state = AppState {
        ws_state,
        topic_log,
        connections,
    };

    // Configure CORS for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // Build router
    let app = Router::new()
        .nest("/api", routes::api_routes())
        .merge(routes::ws_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
