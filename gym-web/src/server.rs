//! Gym Web Server
//!
//! Main web server implementation using Axum.

use crate::{create_app, AppState, WebError, WebResult};
use axum::serve;
use gym_core::GymConfig;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Main gym web server
pub struct GymServer {
    config: GymConfig,
    state: AppState,
}

impl GymServer {
    /// Create a new server; connects storage and loads the policy
    pub async fn new(config: GymConfig) -> WebResult<Self> {
        config.validate()?;
        let state = AppState::new(config.clone()).await?;

        Ok(Self { config, state })
    }

    /// Bind the configured address
    pub async fn bind(&self) -> WebResult<TcpListener> {
        TcpListener::bind(self.config.address())
            .await
            .map_err(WebError::Server)
    }

    /// Start the web server and run until Ctrl-C
    pub async fn start(self) -> WebResult<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> WebResult<()> {
        let address = listener.local_addr().map_err(WebError::Server)?;
        info!("Starting gym API on http://{}", address);

        let app = create_app(self.state);

        if let Err(e) = serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        info!("Server shut down");
        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &GymConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Builder for GymServer
pub struct GymServerBuilder {
    config: GymConfig,
}

impl GymServerBuilder {
    /// Start from an existing configuration
    pub fn new(config: GymConfig) -> Self {
        Self { config }
    }

    /// Set the server host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.server.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Set database URL
    pub fn database_url<S: Into<String>>(mut self, database_url: S) -> Self {
        self.config.database.url = database_url.into();
        self
    }

    /// Set the token signing secret
    pub fn jwt_secret<S: Into<String>>(mut self, secret: S) -> Self {
        self.config.auth.jwt_secret = secret.into();
        self
    }

    /// Grant `subject` the admin role at start-up
    pub fn bootstrap_admin<S: Into<String>>(mut self, subject: S) -> Self {
        self.config.auth.bootstrap_admin = Some(subject.into());
        self
    }

    /// Build the server
    pub async fn build(self) -> WebResult<GymServer> {
        GymServer::new(self.config).await
    }
}

impl Default for GymServerBuilder {
    fn default() -> Self {
        Self::new(GymConfig::default())
    }
}
