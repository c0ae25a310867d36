//! Camera discovery
//!
//! Groups image topics under the camera that owns them. A camera is
//! recognised by its metadata topic (`<base>/camera_info`); every image topic
//! whose name starts with `<base>/` belongs to it. Assignment is greedy in
//! discovery order: the first camera to match an image topic claims it, and
//! image topics no camera matches are left out.

use std::sync::Arc;

use crate::bus::{Bus, TopicInfo, CAMERA_INFO_DATATYPE, IMAGE_DATATYPE};
use crate::error::Result;

/// Name suffix identifying a camera metadata topic
pub const CAMERA_INFO_SUFFIX: &str = "/camera_info";

/// Image topics claimed by one camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraGroup {
    /// Topic prefix shared by the camera's topics, ending in `/`
    pub base: String,
    /// Full names of the claimed image topics, in discovery order
    pub image_topics: Vec<String>,
}

impl CameraGroup {
    /// Image topics paired with their name relative to `base`
    pub fn children(&self) -> impl Iterator<Item = (&str, &str)> {
        self.image_topics
            .iter()
            .map(|topic| (topic.as_str(), &topic[self.base.len()..]))
    }
}

/// Group `topics` (in discovery order) into cameras
pub fn group_topics(topics: &[TopicInfo]) -> Vec<CameraGroup> {
    let mut image_topics: Vec<&str> = Vec::new();
    let mut camera_info_topics: Vec<&str> = Vec::new();
    for topic in topics {
        if topic.datatype == IMAGE_DATATYPE {
            image_topics.push(&topic.name);
        } else if topic.datatype == CAMERA_INFO_DATATYPE {
            camera_info_topics.push(&topic.name);
        }
    }

    let mut groups = Vec::new();
    for info_topic in camera_info_topics {
        if !info_topic.ends_with(CAMERA_INFO_SUFFIX) {
            continue;
        }
        // Keep the separator: "/cam1/camera_info" -> "/cam1/"
        let base = &info_topic[..info_topic.len() - CAMERA_INFO_SUFFIX.len() + 1];

        // Claimed topics leave the pool so no later camera can take them
        let (claimed, rest): (Vec<&str>, Vec<&str>) = image_topics
            .into_iter()
            .partition(|image_topic| image_topic.starts_with(base));
        image_topics = rest;

        groups.push(CameraGroup {
            base: base.to_string(),
            image_topics: claimed.into_iter().map(str::to_string).collect(),
        });
    }

    groups
}

/// Computes camera groups from the bus on demand. Nothing is cached.
#[derive(Clone)]
pub struct TopicDirectory {
    bus: Arc<dyn Bus>,
}

impl TopicDirectory {
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self { bus }
    }

    /// Current camera groups, in camera discovery order
    pub fn list_groups(&self) -> Result<Vec<CameraGroup>> {
        let topics = self.bus.list_topics()?;
        Ok(group_topics(&topics))
    }
}
