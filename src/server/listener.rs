//! HTTP listener
//!
//! Handles the TCP accept loop and spawns one task per connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use http::StatusCode;
use tokio::net::{TcpListener, TcpStream};

use crate::error::{Error, Result};
use crate::http::connection::HttpConnection;
use crate::http::request::read_request;
use crate::http::{HttpReply, RequestHandler};
use crate::server::config::ServerConfig;

/// HTTP server driving a [`RequestHandler`]
pub struct HttpServer<H: RequestHandler> {
    config: ServerConfig,
    handler: Arc<H>,
    next_connection_id: AtomicU64,
}

impl<H: RequestHandler> HttpServer<H> {
    /// Create a new server with the given configuration and handler
    pub fn new(config: ServerConfig, handler: Arc<H>) -> Self {
        Self {
            config,
            handler,
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Get a reference to the request handler
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");
        Ok(listener)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.accept_loop(&listener).await
    }

    /// Run the server on an already bound listener until `shutdown` resolves
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            connection_id = connection_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let handler = Arc::clone(&self.handler);
        let queue = self.config.connection_queue;
        let max_request_size = self.config.max_request_size;

        tokio::spawn(async move {
            let (mut reader, writer) = socket.into_split();
            let (connection, io) = HttpConnection::channel(queue, peer_addr.to_string());
            let peer_watch = io.peer_watch();
            let writer_task = tokio::spawn(io.run_writer(writer));

            match read_request(&mut reader, max_request_size).await {
                Ok(request) => {
                    tokio::spawn(peer_watch.run(reader));
                    dispatch(handler.as_ref(), &request, connection).await;
                }
                Err(Error::Http(e)) => {
                    tracing::debug!(peer = %peer_addr, error = %e, "Bad request");
                    let _ = HttpReply::write_stock(StatusCode::BAD_REQUEST, &connection).await;
                    drop(connection);
                }
                Err(e) => {
                    tracing::debug!(peer = %peer_addr, error = %e, "Failed to read request");
                    connection.close();
                }
            }

            let _ = writer_task.await;
            tracing::debug!(connection_id = connection_id, "Connection closed");
        });
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

/// Invoke `handler` for one request. Errors stop at this boundary: they are
/// logged and the connection is left as the handler left it.
async fn dispatch<H: RequestHandler>(
    handler: &H,
    request: &crate::http::HttpRequest,
    connection: HttpConnection,
) {
    tracing::info!(uri = %request.uri, peer = %connection.peer(), "Handling request");

    if let Err(e) = handler.handle(request, connection).await {
        tracing::warn!(uri = %request.uri, error = %e, "Error handling request");
    }
}
