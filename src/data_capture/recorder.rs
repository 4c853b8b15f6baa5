//! Capture session state machine.
//!
//! A [`CaptureSession`] owns everything one recording needs: the display and
//! microphone streams, the encoder, the collected chunks and, once stopped,
//! the finished blob with its preview handle. Nothing is shared with other
//! sessions.
//!
//! ```no_run
//! # use screenrec::data_capture::{CaptureSession, MediaPlatform};
//! # async fn run<P: MediaPlatform>(platform: std::sync::Arc<P>) -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = CaptureSession::new(platform);
//! session.start().await?;
//! let stop = session.stop_handle();
//! // hand `stop` to the UI, then drive the recording
//! let reason = session.record().await?;
//! let path = session.download(std::path::Path::new("."), Some("demo")).await?;
//! # let _ = (reason, path, stop);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use super::codec::select_mime_type;
use super::platform::{MediaEncoder, MediaPlatform, MediaStream, StreamGuard};
use super::types::{
    format_elapsed, CaptureStatus, DisplayConstraints, EncoderEvent, PreviewHandle, RecordedBlob,
    StopReason, MAX_DURATION_SECS,
};
use crate::client::Uploader;
use crate::error_handling::types::{CaptureError, UploadError};
use crate::storage::types::Recording;

/// How long a stopping encoder gets to hand over its last chunk.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_DOWNLOAD_NAME: &str = "recording";

/// Requests the end of a running recording. Cheap to clone.
#[derive(Clone)]
pub struct StopHandle {
    notify: Arc<Notify>,
}

impl StopHandle {
    /// A stop requested before `record()` runs is remembered.
    pub fn stop(&self) {
        self.notify.notify_one();
    }
}

struct ActiveCapture {
    display: MediaStream,
    microphone: MediaStream,
    encoder: Box<dyn MediaEncoder>,
    events: mpsc::UnboundedReceiver<EncoderEvent>,
    share_ended: Option<watch::Receiver<bool>>,
    chunks: Vec<Bytes>,
    mime_type: String,
}

impl ActiveCapture {
    fn push(&mut self, chunk: Bytes) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    fn shutdown(&mut self) {
        self.encoder.stop();
        self.display.stop_all();
        self.microphone.stop_all();
    }
}

impl Drop for ActiveCapture {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct FinishedCapture {
    blob: RecordedBlob,
    preview: PreviewHandle,
    reason: StopReason,
}

enum State {
    Idle,
    Requesting,
    Recording(ActiveCapture),
    Stopped(FinishedCapture),
}

/// Holds the session in `Requesting` and puts it back to `Idle` if the
/// pending `start()` is dropped.
struct RequestingGuard<'a> {
    state: &'a mut State,
    armed: bool,
}

impl<'a> RequestingGuard<'a> {
    fn enter(state: &'a mut State) -> Self {
        *state = State::Requesting;
        Self { state, armed: true }
    }

    fn defuse(mut self) {
        self.armed = false;
    }
}

impl Drop for RequestingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!("Capture request cancelled");
            *self.state = State::Idle;
        }
    }
}

/// One screen recording, from permission prompt to upload.
pub struct CaptureSession<P: MediaPlatform> {
    platform: Arc<P>,
    constraints: DisplayConstraints,
    max_duration: u32,
    state: State,
    elapsed: watch::Sender<u32>,
    stop: Arc<Notify>,
}

impl<P: MediaPlatform> CaptureSession<P> {
    pub fn new(platform: Arc<P>) -> Self {
        let (elapsed, _) = watch::channel(0);
        Self {
            platform,
            constraints: DisplayConstraints::default(),
            max_duration: MAX_DURATION_SECS,
            state: State::Idle,
            elapsed,
            stop: Arc::new(Notify::new()),
        }
    }

    pub fn with_constraints(mut self, constraints: DisplayConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn status(&self) -> CaptureStatus {
        match self.state {
            State::Idle => CaptureStatus::Idle,
            State::Requesting => CaptureStatus::Requesting,
            State::Recording(_) => CaptureStatus::Recording,
            State::Stopped(_) => CaptureStatus::Stopped,
        }
    }

    pub fn elapsed_secs(&self) -> u32 {
        *self.elapsed.borrow()
    }

    pub fn subscribe_elapsed(&self) -> watch::Receiver<u32> {
        self.elapsed.subscribe()
    }

    /// Timer label for the current session, e.g. `01:15 / 03:00`.
    pub fn format_elapsed(&self) -> String {
        format_elapsed(self.elapsed_secs(), self.max_duration)
    }

    /// Handle for the session started by the latest `start()`.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            notify: Arc::clone(&self.stop),
        }
    }

    /// MIME type picked for the running or finished recording.
    pub fn mime_type(&self) -> Option<&str> {
        match &self.state {
            State::Recording(active) => Some(&active.mime_type),
            State::Stopped(done) => Some(done.blob.mime_type()),
            _ => None,
        }
    }

    pub fn recorded(&self) -> Option<&RecordedBlob> {
        match &self.state {
            State::Stopped(done) => Some(&done.blob),
            _ => None,
        }
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        match &self.state {
            State::Stopped(done) => Some(&done.preview),
            _ => None,
        }
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        match &self.state {
            State::Stopped(done) => Some(done.reason),
            _ => None,
        }
    }

    /// Acquire display and microphone, then start the encoder.
    ///
    /// On any failure every stream acquired so far is stopped and the session
    /// goes back to `Idle`.
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        match self.state {
            State::Requesting | State::Recording(_) => return Err(CaptureError::AlreadyActive),
            State::Stopped(_) => self.release(),
            State::Idle => {}
        }
        self.elapsed.send_replace(0);
        self.stop = Arc::new(Notify::new());

        info!("Requesting display and microphone access");
        let (display, microphone) = {
            let requesting = RequestingGuard::enter(&mut self.state);
            let platform = &self.platform;
            let constraints = &self.constraints;
            // Each stream is guarded as soon as it resolves, so dropping this
            // future while the other request is pending still releases it.
            let acquired = tokio::join!(
                async { platform.display_media(constraints).await.map(StreamGuard::new) },
                async { platform.microphone().await.map(StreamGuard::new) }
            );
            requesting.defuse();
            acquired
        };
        let (display, microphone) = match (display, microphone) {
            (Ok(display), Ok(microphone)) => (display, microphone),
            (Err(e), _) | (_, Err(e)) => return Err(self.abort(e)),
        };

        let combined = MediaStream::combine(display.stream(), microphone.stream());
        if combined.video_tracks().next().is_none() {
            return Err(self.abort(CaptureError::NoDevices(
                "display capture returned no video track".to_string(),
            )));
        }
        let mime_type = select_mime_type(|m| self.platform.is_type_supported(m));
        debug!("Selected encoder type {}", mime_type);

        let mut encoder = match self.platform.create_encoder(&combined, mime_type) {
            Ok(encoder) => encoder,
            Err(e) => return Err(self.abort(e)),
        };
        let (tx, events) = mpsc::unbounded_channel();
        if let Err(e) = encoder.start(tx) {
            return Err(self.abort(e));
        }

        let share_ended = display.stream().video_tracks().next().map(|t| t.ended());
        info!(
            "Recording {} track(s) as {}",
            combined.tracks().len(),
            mime_type
        );
        self.state = State::Recording(ActiveCapture {
            display: display.into_inner(),
            microphone: microphone.into_inner(),
            encoder,
            events,
            share_ended,
            chunks: Vec::new(),
            mime_type: mime_type.to_string(),
        });
        Ok(())
    }

    fn abort(&mut self, err: CaptureError) -> CaptureError {
        warn!("Capture start failed: {}", err);
        self.state = State::Idle;
        err
    }

    /// Run the recording until it is stopped, the share ends or the duration
    /// cap is hit.
    pub async fn record(&mut self) -> Result<StopReason, CaptureError> {
        let stop = Arc::clone(&self.stop);
        let max = self.max_duration;
        let active = match &mut self.state {
            State::Recording(active) => active,
            _ => return Err(CaptureError::InvalidState("no recording in progress")),
        };

        let share_ended = wait_for_end(active.share_ended.clone());
        tokio::pin!(share_ended);
        let period = Duration::from_secs(1);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut elapsed = 0u32;
        let mut encoder_done = false;

        let outcome = loop {
            tokio::select! {
                biased;
                _ = stop.notified() => break Ok(StopReason::UserRequested),
                _ = &mut share_ended => break Ok(StopReason::ShareEnded),
                event = active.events.recv() => match event {
                    Some(EncoderEvent::Data(chunk)) => active.push(chunk),
                    Some(EncoderEvent::Error(e)) => break Err(CaptureError::Encoder(e)),
                    Some(EncoderEvent::Stopped) | None => {
                        encoder_done = true;
                        break Ok(StopReason::EncoderFinished);
                    }
                },
                _ = ticker.tick() => {
                    elapsed += 1;
                    self.elapsed.send_replace(elapsed);
                    if elapsed >= max {
                        break Ok(StopReason::DurationCap);
                    }
                }
            }
        };

        match outcome {
            Ok(reason) => {
                self.finish(reason, encoder_done).await?;
                Ok(reason)
            }
            Err(e) => {
                error!("Recording aborted: {}", e);
                self.release();
                Err(e)
            }
        }
    }

    async fn finish(&mut self, reason: StopReason, encoder_done: bool) -> Result<(), CaptureError> {
        let mut active = match std::mem::replace(&mut self.state, State::Idle) {
            State::Recording(active) => active,
            other => {
                self.state = other;
                return Err(CaptureError::InvalidState("no recording in progress"));
            }
        };
        debug!("Stopping capture ({:?})", reason);
        active.encoder.stop();
        if !encoder_done {
            let drained = timeout(FLUSH_TIMEOUT, async {
                while let Some(event) = active.events.recv().await {
                    match event {
                        EncoderEvent::Data(chunk) => active.push(chunk),
                        EncoderEvent::Stopped => break,
                        EncoderEvent::Error(e) => {
                            warn!("Encoder error while flushing: {}", e);
                            break;
                        }
                    }
                }
            })
            .await;
            if drained.is_err() {
                warn!("Encoder did not confirm stop within {:?}", FLUSH_TIMEOUT);
            }
        }
        active.shutdown();

        let blob = RecordedBlob::from_chunks(&active.chunks, &active.mime_type);
        let preview = self.platform.create_preview(&blob);
        info!(
            "Capture stopped after {} ({} bytes)",
            self.format_elapsed(),
            blob.len()
        );
        self.state = State::Stopped(FinishedCapture {
            blob,
            preview,
            reason,
        });
        Ok(())
    }

    /// Write the finished blob to `<dir>/<title or "recording">.<ext>`.
    pub async fn download(&self, dir: &Path, title: Option<&str>) -> Result<PathBuf, CaptureError> {
        let blob = self
            .recorded()
            .ok_or(CaptureError::InvalidState("nothing recorded yet"))?;
        let stem = title
            .map(sanitize_file_stem)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string());
        let path = dir.join(format!("{}.{}", stem, blob.extension()));
        tokio::fs::write(&path, blob.bytes()).await?;
        info!("Saved recording to {}", path.display());
        Ok(path)
    }

    /// Send the finished blob to the backend. The blob stays available
    /// whatever the outcome.
    pub async fn upload<U>(&self, uploader: &U, title: Option<&str>) -> Result<Recording, UploadError>
    where
        U: Uploader + ?Sized,
    {
        let blob = self
            .recorded()
            .ok_or(UploadError::InvalidState("nothing recorded yet"))?;
        let recording = uploader.upload(blob, title).await.map_err(|e| {
            error!("Upload failed, recording kept locally: {}", e);
            e
        })?;
        info!("Uploaded recording {}", recording.id);
        Ok(recording)
    }

    /// Stop everything this session holds and return to `Idle`.
    pub fn release(&mut self) {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Recording(active) => {
                debug!("Releasing active capture");
                drop(active);
            }
            State::Stopped(done) => self.platform.revoke_preview(&done.preview),
            State::Idle | State::Requesting => {}
        }
    }
}

impl<P: MediaPlatform> Drop for CaptureSession<P> {
    fn drop(&mut self) {
        self.release();
    }
}

async fn wait_for_end(ended: Option<watch::Receiver<bool>>) {
    match ended {
        Some(mut rx) => {
            if rx.wait_for(|ended| *ended).await.is_err() {
                // Sender gone without signalling: the track can no longer end.
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

fn sanitize_file_stem(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn share_end_waits_for_signal() {
        let (tx, rx) = watch::channel(false);
        let mut ended = task::spawn(wait_for_end(Some(rx)));
        assert_pending!(ended.poll());
        tx.send_replace(true);
        assert!(ended.is_woken());
        assert_ready!(ended.poll());
    }

    #[test]
    fn missing_track_never_ends() {
        let mut ended = task::spawn(wait_for_end(None));
        assert_pending!(ended.poll());

        let (tx, rx) = watch::channel(false);
        let mut orphaned = task::spawn(wait_for_end(Some(rx)));
        drop(tx);
        assert_pending!(orphaned.poll());
    }

    #[test]
    fn file_stems_are_sanitized() {
        assert_eq!(sanitize_file_stem("  my demo  "), "my demo");
        assert_eq!(sanitize_file_stem("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_file_stem(".."), "");
    }
}
