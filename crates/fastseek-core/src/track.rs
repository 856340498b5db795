use serde::{Deserialize, Serialize};

/// Codec identifier prefix shared by all video tracks.
pub const VIDEO_MIME_PREFIX: &str = "video/";

/// Per-track metadata discovered while demuxing a container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackDescriptor {
    pub index: usize,
    /// MIME-like codec identifier, e.g. `video/h264` or `audio/aac`.
    pub mime: String,
    /// Native dimensions in pixels; 0 until known.
    pub width: u32,
    pub height: u32,
    /// Track duration in microseconds, non-negative.
    pub duration_us: i64,
}

impl TrackDescriptor {
    pub fn is_video(&self) -> bool {
        self.mime.starts_with(VIDEO_MIME_PREFIX)
    }
}
