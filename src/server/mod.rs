pub mod api;

use crate::relay::Relay;
use self::api::ApiOptions;
use std::error::Error;
use log::info;
use tokio::net::TcpListener;

pub struct Server {
    host: String,
    port: u16,
    relay: Relay,
    options: ApiOptions,
}

impl Server {
    pub fn new(host: impl Into<String>, port: u16, relay: Relay, options: ApiOptions) -> Self {
        Self { host: host.into(), port, relay, options }
    }

    /// Resolves the host name, so `localhost` works as well as an IP literal.
    async fn bind(&self) -> Result<TcpListener, Box<dyn Error + Send + Sync>> {
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await.map_err(|e|
            format!(
                "Failed to bind HTTP server to {}:{}: {}. Try a different port.",
                self.host,
                self.port,
                e
            )
        )?;
        Ok(listener)
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let app = api::router(self.relay.clone(), &self.options)?;
        let listener = self.bind().await?;

        info!("Server ready on http://{}", listener.local_addr()?);
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal()).await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
