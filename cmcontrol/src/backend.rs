//! Backend-agnostic playback contract.
//!
//! Every playback target implements the same five-operation surface; higher
//! layers only interact with backends through this trait so transport and
//! volume stay target-neutral. Backends are selected by runtime
//! configuration through trait objects.

use crate::errors::Result;

/// Capability contract implemented by every playback target.
pub trait Backend: Send {
    /// Short label for user-facing messages ("chromecast", "local").
    fn kind(&self) -> &'static str;

    /// Begin playing the queue head immediately, superseding any prior
    /// playback. Fails with [`PlayerError::NoSongsToPlay`] when the queue
    /// is empty.
    ///
    /// [`PlayerError::NoSongsToPlay`]: crate::errors::PlayerError::NoSongsToPlay
    fn force_play(&self) -> Result<()>;

    /// Toggle between playing and paused. From stopped, backends start the
    /// queue head when one is available; never a hard failure.
    fn playpause(&self) -> Result<()>;

    /// Absolute volume in `[0.0, 1.0]`; out-of-range values are clamped.
    fn volume_set(&self, value: f32) -> Result<()>;

    /// Signed relative volume adjustment.
    fn volume_delta(&self, delta: f32) -> Result<()>;

    /// Halt playback and release per-track resources. Idempotent.
    fn stop(&self) -> Result<()>;
}

/// Local playback state. Chromecast state lives on the device itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}
