//! Request dispatcher
//!
//! Maps each request path onto its handler:
//!
//! | Path             | Handler                                        |
//! |------------------|------------------------------------------------|
//! | `/`              | camera/topic discovery page                    |
//! | `/stream`        | start a streaming session of the given `type`  |
//! | `/stream_viewer` | HTML page embedding the `type`'s player        |
//! | `/snapshot`      | start a one-frame JPEG session                 |
//!
//! Anything else gets a stock 404. Stream and snapshot handlers return as soon
//! as the session is registered; the session writes the response from bus
//! callback threads.

pub mod html;

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;

use crate::bus::Bus;
use crate::codec::{create_snapshot_session, CodecRegistry, DEFAULT_CODEC, NO_CACHE};
use crate::directory::TopicDirectory;
use crate::error::Result;
use crate::http::{HttpConnection, HttpReply, HttpRequest, RequestHandler};
use crate::registry::SessionRegistry;
use crate::server::config::SERVER_NAME;
use crate::session::SessionRef;

/// Turns requests into pages and registered streaming sessions
pub struct StreamDispatcher {
    bus: Arc<dyn Bus>,
    codecs: CodecRegistry,
    directory: TopicDirectory,
    sessions: Arc<SessionRegistry>,
}

impl StreamDispatcher {
    /// Create a dispatcher over `bus` serving the stream types in `codecs`
    pub fn new(bus: Arc<dyn Bus>, codecs: CodecRegistry) -> Self {
        Self {
            directory: TopicDirectory::new(Arc::clone(&bus)),
            bus,
            codecs,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }

    /// Registry holding the sessions this dispatcher started
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Registered stream types
    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// `/`: list cameras and their image topics
    async fn handle_list_streams(&self, connection: HttpConnection) -> Result<()> {
        let groups = self.directory.list_groups().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Topic discovery failed");
            Vec::new()
        });

        HttpReply::builder(StatusCode::OK)
            .header("Connection", "close")
            .header("Server", SERVER_NAME)
            .header("Cache-Control", NO_CACHE)
            .header("Pragma", "no-cache")
            .header("Content-Type", "text/html")
            .write(&connection)
            .await?;

        connection.write(html::topic_list_page(&groups)).await
    }

    /// `/stream`: start and register a session of the requested type
    async fn handle_stream(&self, request: &HttpRequest, connection: HttpConnection) -> Result<()> {
        let stream_type = request.query_param_or("type", DEFAULT_CODEC);
        let Some(codec) = self.codecs.resolve(stream_type) else {
            tracing::debug!(stream_type = stream_type, "Unknown stream type");
            return HttpReply::write_stock(StatusCode::NOT_FOUND, &connection).await;
        };

        let session = codec
            .strategy
            .create_session(request, connection, Arc::clone(&self.bus));
        self.start_and_register(session)
    }

    /// `/snapshot`: one-frame session, whatever `type` says
    async fn handle_snapshot(&self, request: &HttpRequest, connection: HttpConnection) -> Result<()> {
        let session = create_snapshot_session(request, connection, Arc::clone(&self.bus));
        self.start_and_register(session)
    }

    /// `/stream_viewer`: page embedding the requested type's player
    async fn handle_stream_viewer(
        &self,
        request: &HttpRequest,
        connection: HttpConnection,
    ) -> Result<()> {
        let stream_type = request.query_param_or("type", DEFAULT_CODEC);
        let Some(codec) = self.codecs.resolve(stream_type) else {
            return HttpReply::write_stock(StatusCode::NOT_FOUND, &connection).await;
        };

        let topic = request.query_param_or("topic", "");

        HttpReply::builder(StatusCode::OK)
            .header("Connection", "close")
            .header("Server", SERVER_NAME)
            .header("Content-Type", "text/html")
            .write(&connection)
            .await?;

        let fragment = codec.strategy.create_viewer(request);
        connection.write(html::viewer_page(topic, &fragment)).await
    }

    /// A session that fails to start is dropped along with its connection.
    fn start_and_register(&self, session: SessionRef) -> Result<()> {
        session.start()?;
        self.sessions.insert(session);
        Ok(())
    }
}

#[async_trait]
impl RequestHandler for StreamDispatcher {
    async fn handle(&self, request: &HttpRequest, connection: HttpConnection) -> Result<()> {
        match request.path.as_str() {
            "/" => self.handle_list_streams(connection).await,
            "/stream" => self.handle_stream(request, connection).await,
            "/stream_viewer" => self.handle_stream_viewer(request, connection).await,
            "/snapshot" => self.handle_snapshot(request, connection).await,
            _ => HttpReply::write_stock(StatusCode::NOT_FOUND, &connection).await,
        }
    }
}
