//! Seams between the capture session and the media platform.
//!
//! A platform hands out live tracks, encoders and preview handles. Browsers,
//! desktop capture libraries and the test doubles all plug in here.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use super::types::{DisplayConstraints, EncoderEvent, PreviewHandle, RecordedBlob, TrackKind};
use crate::error_handling::types::CaptureError;

/// One live audio or video source.
///
/// `stop` must be idempotent.
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> &str;
    fn kind(&self) -> TrackKind;
    fn stop(&self);
    fn is_live(&self) -> bool;
    /// Flips to `true` when the platform ends the track on its own, e.g. when
    /// the user revokes screen sharing from the system UI.
    fn ended(&self) -> watch::Receiver<bool>;
}

pub type TrackRef = Arc<dyn MediaTrack>;

/// An ordered set of tracks.
#[derive(Clone, Default)]
pub struct MediaStream {
    tracks: Vec<TrackRef>,
}

impl MediaStream {
    pub fn new(tracks: Vec<TrackRef>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[TrackRef] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &TrackRef> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &TrackRef> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    /// Display video first, then display audio, then microphone audio.
    pub fn combine(display: &MediaStream, microphone: &MediaStream) -> MediaStream {
        let tracks = display
            .video_tracks()
            .take(1)
            .chain(display.audio_tracks())
            .chain(microphone.audio_tracks())
            .cloned()
            .collect();
        MediaStream { tracks }
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tracks.iter().map(|t| (t.id().to_string(), t.kind())))
            .finish()
    }
}

/// A running encoder over a combined stream.
pub trait MediaEncoder: Send {
    /// Begin encoding. Chunks, errors and the final `Stopped` are delivered
    /// through `events`.
    fn start(&mut self, events: mpsc::UnboundedSender<EncoderEvent>) -> Result<(), CaptureError>;

    /// Ask the encoder to flush. It emits its last `Data` chunk followed by
    /// `Stopped`. Calling it again is a no-op.
    fn stop(&mut self);
}

#[async_trait]
pub trait MediaPlatform: Send + Sync {
    /// Prompt for a screen, window or tab to capture.
    async fn display_media(
        &self,
        constraints: &DisplayConstraints,
    ) -> Result<MediaStream, CaptureError>;

    /// Prompt for microphone access.
    async fn microphone(&self) -> Result<MediaStream, CaptureError>;

    fn is_type_supported(&self, mime_type: &str) -> bool;

    fn create_encoder(
        &self,
        stream: &MediaStream,
        mime_type: &str,
    ) -> Result<Box<dyn MediaEncoder>, CaptureError>;

    fn create_preview(&self, blob: &RecordedBlob) -> PreviewHandle;

    fn revoke_preview(&self, handle: &PreviewHandle);
}

/// Stops every track of the wrapped stream when dropped, unless released
/// with [`StreamGuard::into_inner`].
pub(crate) struct StreamGuard {
    stream: MediaStream,
}

impl StreamGuard {
    pub(crate) fn new(stream: MediaStream) -> Self {
        Self { stream }
    }

    pub(crate) fn stream(&self) -> &MediaStream {
        &self.stream
    }

    pub(crate) fn into_inner(mut self) -> MediaStream {
        std::mem::take(&mut self.stream)
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.stream.stop_all();
    }
}
