use thiserror::Error;

/// Result type used throughout the playback engine.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Errors raised by the playback engine and its backends.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// The queue was empty at a point requiring a current track.
    #[error("no songs to play")]
    NoSongsToPlay,

    /// No cast device with the configured friendly name advertised itself
    /// within the discovery window.
    #[error("cast device named '{0}' not found")]
    DeviceNotFound(String),

    /// A command or configuration referenced an unknown backend.
    #[error("unknown backend: '{0}'")]
    InvalidBackendName(String),

    /// The cast device rejected or failed a control operation.
    #[error("Chromecast error: {0}")]
    Cast(String),

    /// Local audio output failed (device, decode, or worker gone).
    #[error("audio output error: {0}")]
    Audio(String),

    /// Fetching a stream for local playback failed.
    #[error("stream fetch failed: {0}")]
    Fetch(String),

    /// Catalog lookup failed.
    #[error(transparent)]
    Catalog(#[from] cmsubsonic::SubsonicError),
}

impl PlayerError {
    pub fn cast(err: impl std::fmt::Display) -> Self {
        PlayerError::Cast(err.to_string())
    }

    pub fn audio(err: impl std::fmt::Display) -> Self {
        PlayerError::Audio(err.to_string())
    }

    pub fn fetch(err: impl std::fmt::Display) -> Self {
        PlayerError::Fetch(err.to_string())
    }
}
