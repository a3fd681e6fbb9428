//! Server lifecycle.

use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

use crate::{routes::create_router, state::AppState};

/// Server startup or runtime failure
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Could not bind the listening socket
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// Accept loop failed
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// HTTP server for the gateway
#[derive(Debug)]
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server over prepared state
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Bind the configured address and serve until Ctrl-C or SIGTERM
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound or the server fails
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.state.config.server.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an existing listener until `shutdown` resolves
    ///
    /// # Errors
    /// Returns an error if the server fails
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        info!(address = %local, "Gateway listening");

        axum::serve(listener, create_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Gateway stopped");
        Ok(())
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
