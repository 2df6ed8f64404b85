use thiserror::Error;

/// Result type used throughout the catalog client.
pub type Result<T> = std::result::Result<T, SubsonicError>;

/// Errors raised by the Subsonic catalog client.
#[derive(Error, Debug)]
pub enum SubsonicError {
    /// Fuzzy matching found no album close to the query.
    #[error("no album found matching '{0}'")]
    AlbumNotFound(String),

    /// The server answered with a Subsonic-level error envelope.
    #[error("Subsonic API error (code {code}): {message}")]
    Api { code: u32, message: String },

    /// Transport failure or non-2xx HTTP status.
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),

    /// Failed to read the response body.
    #[error("failed to read response body: {0}")]
    Io(#[from] std::io::Error),

    /// The response body was not the JSON shape we expect.
    #[error("malformed Subsonic response: {0}")]
    Json(#[from] serde_json::Error),
}
