use crate::config::Config;
use crate::images::ImageProxy;
use crate::metadata::Orchestrator;
use crate::services::Services;
use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod routes_images;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    pub images: Arc<ImageProxy>,
}

impl AppContext {
    pub fn from_services(services: &Services) -> Self {
        Self {
            config: services.config.clone(),
            orchestrator: services.orchestrator.clone(),
            images: services.images.clone(),
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .merge(routes_images::image_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server and run until a shutdown signal arrives.
pub async fn start_server(services: Arc<Services>) -> Result<()> {
    let config = services.config.clone();
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let sweeper = services.spawn_background();
    let resets = reset_on_hangup(&services);
    let app = create_router(AppContext::from_services(&services));

    tracing::info!("Starting server on {}", addr);
    tracing::info!("Image links use {}", config.server.public_url());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for handle in [sweeper, resets].into_iter().flatten() {
        handle.abort();
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Forward SIGHUP to [`Services::reset`]. Configuration itself is fixed
/// for the life of the process; a hangup only drops pacing state and
/// cached API tokens.
#[cfg(unix)]
fn reset_on_hangup(services: &Arc<Services>) -> Option<tokio::task::JoinHandle<()>> {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(sig) => sig,
        Err(e) => {
            tracing::error!("Failed to install SIGHUP handler: {}", e);
            return None;
        }
    };

    let (tx, rx) = tokio::sync::mpsc::channel(1);
    let listener = services.spawn_reset_listener(rx);
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            if tx.send(()).await.is_err() {
                break;
            }
        }
    });
    Some(listener)
}

#[cfg(not(unix))]
fn reset_on_hangup(_services: &Arc<Services>) -> Option<tokio::task::JoinHandle<()>> {
    None
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
