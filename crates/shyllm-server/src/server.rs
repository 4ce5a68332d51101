//! Server setup, routing and process lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use shyllm_engine::{HostOptions, ModelHost, ModelLoader};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::{ServeArgs, ServerConfig},
    error::LaunchError,
    handlers,
    state::AppState,
};

/// Create the API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::handle_root))
        .route("/health", get(handlers::handle_health))
        .route("/generate", post(handlers::handle_generate))
        .route("/stream", post(handlers::handle_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the configured address, falling back to an OS-assigned port when
/// `port_fallback` is set and the address is taken.
pub async fn bind_listener(config: &ServerConfig) -> Result<TcpListener, LaunchError> {
    let addr = config.bind_addr;
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse && config.port_fallback => {
            tracing::warn!(%addr, "address in use, binding an ephemeral port instead");
            let fallback = SocketAddr::new(addr.ip(), 0);
            TcpListener::bind(fallback)
                .await
                .map_err(|source| LaunchError::Bind {
                    addr: fallback,
                    source,
                })
        }
        Err(source) => Err(LaunchError::Bind { addr, source }),
    }
}

/// Serve until SIGINT/SIGTERM or a fatal model fault, then unload the model.
pub async fn run_server(state: AppState, listener: TcpListener) -> Result<(), LaunchError> {
    let addr = listener.local_addr().map_err(LaunchError::Serve)?;
    tracing::info!(%addr, "listening");

    let app = create_router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.shutdown_token()))
        .await
        .map_err(LaunchError::Serve)?;

    if let Some(host) = state.installed_host() {
        host.shutdown().await;
    }

    match state.fault() {
        Some(fault) => Err(LaunchError::ModelFault(fault.clone())),
        None => {
            tracing::info!("server stopped");
            Ok(())
        }
    }
}

/// Load the model, then bind and serve. Nothing is bound if loading fails.
pub async fn launch(args: ServeArgs, loader: Arc<dyn ModelLoader>) -> Result<(), LaunchError> {
    let (model_config, server_config) = args.resolve()?;
    let options = HostOptions {
        request_timeout: server_config.request_timeout,
    };

    let host = tokio::task::spawn_blocking(move || {
        ModelHost::initialize(loader.as_ref(), model_config, options)
    })
    .await
    .map_err(|err| LaunchError::Loader(err.to_string()))??;

    let state = AppState::serving(server_config, Arc::new(host));
    let listener = bind_listener(&state.config).await?;
    run_server(state, listener).await
}

async fn shutdown_signal(fault: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
        _ = fault.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn busy_port_falls_back_only_when_enabled() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let mut config = ServerConfig {
            bind_addr: addr,
            port_fallback: true,
            ..Default::default()
        };
        let listener = bind_listener(&config).await.unwrap();
        let bound = listener.local_addr().unwrap();
        assert_eq!(bound.ip(), addr.ip());
        assert_ne!(bound.port(), addr.port());

        config.port_fallback = false;
        let err = bind_listener(&config).await.unwrap_err();
        assert!(
            matches!(&err, LaunchError::Bind { addr: failed, source }
                if *failed == addr && source.kind() == std::io::ErrorKind::AddrInUse),
            "{err}"
        );
    }
}
