//! External collaborator seams.
//!
//! The client does not manage the WiFi association and does not decode
//! video. It only asks a [`Reachability`] predicate whether the device
//! address is worth dialing, and hands stream URLs and surface handles
//! through to a [`StreamRenderer`]. Both live behind traits so the
//! platform wires in real implementations and tests wire in recordings.

use std::sync::Mutex;

use thiserror::Error;

/// Opaque handle to a platform rendering surface, passed through to the
/// playback collaborator untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceHandle(pub u64);

/// Failure reported by the streaming-playback collaborator.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct RendererError(pub String);

/// Answers whether the configured device address is reachable over the
/// active network association.
#[cfg_attr(test, mockall::automock)]
pub trait Reachability: Send + Sync {
    fn is_reachable(&self) -> bool;
}

/// Reachability stand-in that always says yes; the default when no
/// platform check is wired in.
pub struct AlwaysReachable;

impl Reachability for AlwaysReachable {
    fn is_reachable(&self) -> bool {
        true
    }
}

/// Streaming-playback collaborator: renders a live transport stream onto
/// an attached surface and captures snapshots of the rendered frames.
#[cfg_attr(test, mockall::automock)]
pub trait StreamRenderer: Send + Sync {
    fn attach_surface(&self, surface: SurfaceHandle);
    fn start(&self, url: &str) -> Result<(), RendererError>;
    fn stop(&self);
    /// Captures the current frame to local storage, returning its path.
    fn snapshot(&self) -> Result<String, RendererError>;
}

/// Renderer that renders nothing. Used when the embedding application has
/// no playback surface (e.g. the CLI harness).
pub struct NullRenderer;

impl StreamRenderer for NullRenderer {
    fn attach_surface(&self, _surface: SurfaceHandle) {}

    fn start(&self, _url: &str) -> Result<(), RendererError> {
        Ok(())
    }

    fn stop(&self) {}

    fn snapshot(&self) -> Result<String, RendererError> {
        Err(RendererError("no rendering surface attached".to_string()))
    }
}

/// Renderer that records every call; the playback double used across the
/// client's own tests.
#[derive(Default)]
pub struct RecordingRenderer {
    state: Mutex<RecorderState>,
}

#[derive(Default)]
struct RecorderState {
    surface: Option<SurfaceHandle>,
    started_urls: Vec<String>,
    stop_calls: usize,
    playing: bool,
    snapshot_counter: usize,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surface(&self) -> Option<SurfaceHandle> {
        self.state.lock().unwrap().surface
    }

    pub fn started_urls(&self) -> Vec<String> {
        self.state.lock().unwrap().started_urls.clone()
    }

    pub fn stop_calls(&self) -> usize {
        self.state.lock().unwrap().stop_calls
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }
}

impl StreamRenderer for RecordingRenderer {
    fn attach_surface(&self, surface: SurfaceHandle) {
        self.state.lock().unwrap().surface = Some(surface);
    }

    fn start(&self, url: &str) -> Result<(), RendererError> {
        let mut state = self.state.lock().unwrap();
        state.started_urls.push(url.to_string());
        state.playing = true;
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.stop_calls += 1;
        state.playing = false;
    }

    fn snapshot(&self) -> Result<String, RendererError> {
        let mut state = self.state.lock().unwrap();
        if !state.playing {
            return Err(RendererError("stream is not playing".to_string()));
        }
        state.snapshot_counter += 1;
        Ok(format!("/tmp/vision/snapshot_{:04}.jpg", state.snapshot_counter))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
