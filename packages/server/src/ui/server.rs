//! Server execution logic.

use std::{future::Future, io, sync::Arc, time::Duration};

use tokio::net::TcpListener;

use super::{
    handler::handle_connection, pool::ConnectionPool, signal::shutdown_signal, state::AppState,
};

/// Pause after a failed `accept` before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// TCP file transfer server
///
/// This struct owns the shared state and the worker pool, and runs the accept loop.
///
/// # Example
///
/// ```ignore
/// let state = AppState::new(repository, storage, message_pusher, clock, policy, settings);
/// let server = Server::new(state, 50);
/// server.run("127.0.0.1", 8888).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
    pool: ConnectionPool,
}

impl Server {
    /// Create a new Server instance
    ///
    /// # Arguments
    ///
    /// * `state` - Use cases and per-connection settings
    /// * `max_connections` - Number of connections served concurrently
    pub fn new(state: AppState, max_connections: usize) -> Self {
        Self {
            state: Arc::new(state),
            pool: ConnectionPool::new(max_connections),
        }
    }

    /// Handle to the worker pool, for observing its usage.
    pub fn pool(&self) -> ConnectionPool {
        self.pool.clone()
    }

    /// Bind to `host:port` and serve until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address.
    pub async fn run(self, host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Kadai server listening on {}", listener.local_addr()?);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Accept connections on `listener` until `shutdown` resolves.
    ///
    /// Each accepted socket gets its own task, which first waits for a slot in
    /// the worker pool. Connections already being served are not interrupted
    /// by shutdown; waiting ones are dropped.
    pub async fn serve(self, listener: TcpListener, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        // 一時的なエラー（fd 枯渇など）では待ってから accept を続ける
                        tokio::select! {
                            _ = &mut shutdown => break,
                            _ = accept_backoff(&e) => continue,
                        }
                    }
                },
            };

            let state = self.state.clone();
            let pool = self.pool.clone();
            tokio::spawn(async move {
                let _permit = match pool.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::debug!("Pool closed, dropping connection from {}", peer);
                        return;
                    }
                };
                tracing::debug!("Pool usage: {}/{}", pool.in_use(), pool.capacity());
                handle_connection(stream, peer, state).await;
            });
        }

        self.pool.close();
    }
}

async fn accept_backoff(error: &io::Error) {
    tracing::warn!(
        "Failed to accept connection: {}; retrying in {:?}",
        error,
        ACCEPT_RETRY_DELAY
    );
    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
}
