//! Video server
//!
//! [`VideoServer`] ties the HTTP listener to a [`StreamDispatcher`] and runs the
//! session sweeper next to the accept loop for as long as the server runs.

pub mod config;
pub mod listener;

pub use config::ServerConfig;
pub use listener::HttpServer;

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::bus::Bus;
use crate::codec::CodecRegistry;
use crate::error::Result;
use crate::registry::SessionRegistry;
use crate::router::StreamDispatcher;

/// HTTP front end streaming bus topics to clients
pub struct VideoServer {
    http: HttpServer<StreamDispatcher>,
}

impl VideoServer {
    /// Create a server for `bus` offering the stream types in `codecs`
    pub fn new(config: ServerConfig, bus: Arc<dyn Bus>, codecs: CodecRegistry) -> Result<Self> {
        config.validate()?;
        let dispatcher = Arc::new(StreamDispatcher::new(bus, codecs));
        Ok(Self {
            http: HttpServer::new(config, dispatcher),
        })
    }

    pub fn dispatcher(&self) -> &Arc<StreamDispatcher> {
        self.http.handler()
    }

    /// Sessions currently held by the server
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        self.dispatcher().sessions()
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        self.http.bind().await
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = self.bind().await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let sweeper = self.sessions().spawn_sweeper();
        let result = self.http.serve_until(listener, shutdown).await;
        sweeper.abort();

        tracing::info!(sessions = self.sessions().len(), "Video server stopped");
        result
    }
}
