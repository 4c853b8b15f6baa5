//! Common data types used across the data_capture subsystem.

use std::fmt;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Hard cap on one capture session, in seconds.
pub const MAX_DURATION_SECS: u32 = 180;

/// Lifecycle of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    /// Nothing acquired
    Idle,
    /// Waiting for the platform to grant display and microphone access
    Requesting,
    /// Encoder running, timer ticking
    Recording,
    /// Blob and preview available
    Stopped,
}

impl fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureStatus::Idle => write!(f, "idle"),
            CaptureStatus::Requesting => write!(f, "requesting"),
            CaptureStatus::Recording => write!(f, "recording"),
            CaptureStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why a recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The user pressed stop.
    UserRequested,
    /// Screen sharing was revoked from the platform's own UI.
    ShareEnded,
    /// The elapsed counter reached [`MAX_DURATION_SECS`].
    DurationCap,
    /// The encoder finished on its own.
    EncoderFinished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Options passed to the display capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConstraints {
    pub frame_rate: u32,
    /// Ask for tab/system audio along with the video
    pub audio: bool,
}

impl Default for DisplayConstraints {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            audio: true,
        }
    }
}

/// Signals delivered by a running encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// A chunk of encoded output. Empty chunks are ignored.
    Data(Bytes),
    /// The encoder flushed its last chunk and will not emit again.
    Stopped,
    Error(String),
}

/// The finished capture: concatenated encoder output and its container type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBlob {
    bytes: Bytes,
    mime_type: String,
}

impl RecordedBlob {
    pub fn new(bytes: Bytes, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn from_chunks(chunks: &[Bytes], mime_type: &str) -> Self {
        let mut buf = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in chunks {
            buf.extend_from_slice(chunk);
        }
        Self::new(buf.freeze(), mime_type)
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension matching the container, `webm` unless the MIME type says otherwise.
    pub fn extension(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .and_then(|essence| essence.trim().strip_prefix("video/"))
            .filter(|sub| !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("webm")
    }
}

/// Locally dereferenceable reference to a recorded blob (an object URL in a
/// browser). Must be revoked through the platform once unused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewHandle(pub String);

impl PreviewHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `MM:SS / MM:SS` timer label.
pub fn format_elapsed(elapsed_secs: u32, max_secs: u32) -> String {
    format!(
        "{:02}:{:02} / {:02}:{:02}",
        elapsed_secs / 60,
        elapsed_secs % 60,
        max_secs / 60,
        max_secs % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_are_concatenated_in_order() {
        let blob = RecordedBlob::from_chunks(
            &[Bytes::from_static(b"ab"), Bytes::from_static(b"cd")],
            "video/webm;codecs=vp9,opus",
        );
        assert_eq!(blob.bytes().as_ref(), b"abcd");
        assert_eq!(blob.len(), 4);
        assert_eq!(blob.extension(), "webm");
    }

    #[test]
    fn extension_follows_container() {
        assert_eq!(RecordedBlob::new(Bytes::new(), "video/mp4").extension(), "mp4");
        assert_eq!(RecordedBlob::new(Bytes::new(), "audio/ogg").extension(), "webm");
    }

    #[test]
    fn timer_label() {
        assert_eq!(format_elapsed(0, MAX_DURATION_SECS), "00:00 / 03:00");
        assert_eq!(format_elapsed(75, MAX_DURATION_SECS), "01:15 / 03:00");
        assert_eq!(format_elapsed(180, MAX_DURATION_SECS), "03:00 / 03:00");
    }
}
