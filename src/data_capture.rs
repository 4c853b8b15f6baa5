//! Capture client: records the screen plus microphone into one blob.

pub mod codec;
pub mod platform;
pub mod recorder;
pub mod types;


pub use codec::{select_mime_type, CODEC_PREFERENCES, FALLBACK_MIME_TYPE};
pub use platform::{MediaEncoder, MediaPlatform, MediaStream, MediaTrack, TrackRef};
pub use recorder::{CaptureSession, StopHandle};
pub use types::{
    format_elapsed, CaptureStatus, DisplayConstraints, EncoderEvent, PreviewHandle, RecordedBlob,
    StopReason, TrackKind, MAX_DURATION_SECS,
};
