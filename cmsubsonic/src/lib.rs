//! # Subsonic catalog client
//!
//! Resolves a fuzzy album name against a Subsonic music library and returns
//! the album's tracks as ready-to-stream [`Song`] values, including the
//! per-request token authentication the Subsonic REST API requires.
//!
//! ## Usage
//!
//! ```no_run
//! use cmsubsonic::{SongCatalog, SubsonicClient};
//!
//! let client = SubsonicClient::new("https://music.example.com", "alice", "secret");
//! let (album, songs) = client.songs_for_album("High Voltage")?;
//! println!("{album}: {} tracks", songs.len());
//! # Ok::<(), cmsubsonic::SubsonicError>(())
//! ```

mod client;
mod error;
mod song;

pub use client::{SongCatalog, SubsonicClient};
pub use error::{Result, SubsonicError};
pub use song::Song;
