//! camfeed: stream camera topics from a pub/sub bus over HTTP
//!
//! Camera images published on a [`bus`] are exposed to browsers and players
//! through four routes:
//!
//! - `/` lists cameras and their image topics
//! - `/stream?topic=..&type=..` streams a topic (`mjpeg` by default, also
//!   `vp8` and `h264`)
//! - `/stream_viewer?topic=..&type=..` serves a page that plays the stream
//! - `/snapshot?topic=..` answers with a single JPEG frame
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use camfeed::{CodecRegistry, LocalBus, ServerConfig, VideoServer};
//!
//! # async fn example() -> camfeed::Result<()> {
//! let bus = Arc::new(LocalBus::new(2)?);
//! bus.advertise("/cam1/image_raw", "sensor_msgs/Image");
//! bus.advertise("/cam1/camera_info", "sensor_msgs/CameraInfo");
//!
//! let server = VideoServer::new(ServerConfig::default(), bus, CodecRegistry::with_defaults())?;
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod codec;
pub mod directory;
pub mod error;
pub mod http;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod stats;

pub use bus::{Bus, ImageFrame, LocalBus, TopicInfo};
pub use codec::{CodecRegistry, StreamerType};
pub use directory::{CameraGroup, TopicDirectory};
pub use error::{Error, Result};
pub use registry::SessionRegistry;
pub use router::StreamDispatcher;
pub use server::{ServerConfig, VideoServer};
pub use session::{SessionRef, StreamingSession};
