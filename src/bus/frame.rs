//! Topic and frame types carried by the bus

use bytes::Bytes;

/// Declared data type of image topics
pub const IMAGE_DATATYPE: &str = "sensor_msgs/Image";

/// Declared data type of camera metadata topics
pub const CAMERA_INFO_DATATYPE: &str = "sensor_msgs/CameraInfo";

/// A topic as reported by discovery
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicInfo {
    /// Fully qualified topic name (e.g., "/cam1/image_raw")
    pub name: String,
    /// Declared data type (e.g., "sensor_msgs/Image")
    pub datatype: String,
}

impl TopicInfo {
    /// Create a new topic record
    pub fn new(name: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            datatype: datatype.into(),
        }
    }

    /// Image topic shorthand
    pub fn image(name: impl Into<String>) -> Self {
        Self::new(name, IMAGE_DATATYPE)
    }

    /// Camera metadata topic shorthand
    pub fn camera_info(name: impl Into<String>) -> Self {
        Self::new(name, CAMERA_INFO_DATATYPE)
    }
}

/// One image delivered on a topic
///
/// Cheap to clone: `data` is reference counted, so every subscriber shares the
/// same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    /// Pixel or compression format of `data` (e.g., "jpeg", "rgb8", "h264")
    pub encoding: String,
    pub width: u32,
    pub height: u32,
    /// Capture time in milliseconds
    pub timestamp: u64,
    pub data: Bytes,
}

impl ImageFrame {
    /// Create a frame
    pub fn new(encoding: impl Into<String>, width: u32, height: u32, data: Bytes) -> Self {
        Self {
            encoding: encoding.into(),
            width,
            height,
            timestamp: 0,
            data,
        }
    }

    /// JPEG-compressed frame
    pub fn jpeg(width: u32, height: u32, data: Bytes) -> Self {
        Self::new("jpeg", width, height, data)
    }

    /// Set the capture timestamp
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}
