use std::fmt;

/// A single playable track as resolved from the catalog.
///
/// Immutable value: produced by the catalog client, consumed read-only by
/// playback backends for metadata display and stream initiation.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    /// Track title.
    pub title: String,
    /// Album the track belongs to.
    pub album: String,
    /// Track artist.
    pub artist: String,
    /// Fully authenticated stream URL.
    pub url: String,
    /// MIME type of the stream, e.g. `audio/mpeg`.
    pub content_type: String,
    /// Fully authenticated cover art URL.
    pub cover_art: String,
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.artist, self.title, self.album)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_artist_title_album() {
        let song = Song {
            title: "The Jack".into(),
            album: "High Voltage".into(),
            artist: "AC/DC".into(),
            url: "https://example.com/stream?id=1".into(),
            content_type: "audio/mpeg".into(),
            cover_art: "https://example.com/cover?id=1".into(),
        };
        assert_eq!(song.to_string(), "AC/DC - The Jack (High Voltage)");
    }
}
