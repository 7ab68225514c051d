//! Capture configuration, grounded on
//! `strand-cam-remote-control::Mp4RecordingConfig`'s shape (one config
//! struct per recording mode, `Serialize + Deserialize`) but with an opaque
//! `codec_name`/`codec_options` pair rather than a closed codec enum, since
//! the video capture core's encoder is an external collaborator it never
//! constructs itself.

use capture_drawable::Rect;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether the timestamp band is rendered into captured frames. Constant
/// for the lifetime of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageByInterval {
    WithTimestamp,
    WithoutTimestamp,
}

impl ImageByInterval {
    pub fn draws_timestamp(self) -> bool {
        matches!(self, ImageByInterval::WithTimestamp)
    }
}

/// Parameters shared by full-video and sequenced capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoParams {
    /// 1..=120.
    pub frame_rate: u32,
    pub image_by_interval: ImageByInterval,
    /// Opaque to the core; passed through to [crate::Encoder::open].
    pub codec_name: String,
    /// Opaque to the core; passed through to [crate::Encoder::open].
    pub codec_options: String,
    /// POSIX-style owner/group/other read bitmask, passed through to the
    /// encoder and PNG sink untouched.
    pub file_permissions: u32,
    pub crop_rect: Rect,
    pub draw_pointer: bool,
}

/// Additional parameters for sequenced (file-rotating) capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedVideoParams {
    pub video: VideoParams,
    /// Must be positive; rejected at construction (spec.md §8: "Zero-duration
    /// `break_interval` is rejected at construction").
    #[serde(with = "duration_as_secs_f64")]
    pub break_interval: Duration,
    pub filename_prefix: String,
    pub extension: String,
    pub png_extension: String,
}

mod duration_as_secs_f64 {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
