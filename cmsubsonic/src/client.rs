use std::cmp::Ordering;
use std::time::Duration;

use md5::{Digest, Md5};
use rand::distr::{Alphanumeric, SampleString};
use serde::Deserialize;
use tracing::debug;
use ureq::Agent;

use crate::error::{Result, SubsonicError};
use crate::song::Song;

const API_VERSION: &str = "1.16.1";
const CLIENT_ID: &str = "castme";
const SALT_LEN: usize = 10;

/// Global timeout for catalog calls.
const CATALOG_TIMEOUT: Duration = Duration::from_secs(20);

/// Page size for `getAlbumList`; large enough for typical home libraries.
const ALBUM_LIST_SIZE: u32 = 500;

/// Minimum Jaro-Winkler similarity for a query to resolve to an album.
const MATCH_THRESHOLD: f64 = 0.6;

/// Album lookup surface the orchestration layer depends on.
///
/// Kept as a trait so the player can be exercised against a fake catalog.
pub trait SongCatalog: Send {
    /// Resolve `query` to the closest album and return its name together
    /// with the album's tracks in playback order.
    fn songs_for_album(&self, query: &str) -> Result<(String, Vec<Song>)>;

    /// All album names known to the library, for listing.
    fn album_names(&self) -> Result<Vec<String>>;
}

/// Subsonic REST client backed by `ureq`.
pub struct SubsonicClient {
    agent: Agent,
    base_url: String,
    user: String,
    password: String,
}

impl SubsonicClient {
    pub fn new(server: &str, user: &str, password: &str) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(CATALOG_TIMEOUT))
            .build()
            .into();
        Self {
            agent,
            base_url: server.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password: password.to_string(),
        }
    }

    /// Token-auth query parameters, salted per request.
    fn auth_params(&self) -> Vec<(String, String)> {
        let salt = Alphanumeric.sample_string(&mut rand::rng(), SALT_LEN);
        let mut hasher = Md5::new();
        hasher.update(self.password.as_bytes());
        hasher.update(salt.as_bytes());
        let token = format!("{:x}", hasher.finalize());

        vec![
            ("u".to_string(), self.user.clone()),
            ("t".to_string(), token),
            ("s".to_string(), salt),
            ("v".to_string(), API_VERSION.to_string()),
            ("c".to_string(), CLIENT_ID.to_string()),
            ("f".to_string(), "json".to_string()),
        ]
    }

    /// Build a fully authenticated URL for `verb`. Also used to mint the
    /// stream and cover-art URLs embedded in [`Song`].
    fn url_for(&self, verb: &str, params: &[(&str, &str)]) -> String {
        let query: Vec<String> = self
            .auth_params()
            .into_iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(&v)))
            .chain(
                params
                    .iter()
                    .map(|(k, v)| format!("{k}={}", urlencoding::encode(v))),
            )
            .collect();
        format!("{}/rest/{}?{}", self.base_url, verb, query.join("&"))
    }

    fn call(&self, verb: &str, params: &[(&str, &str)]) -> Result<ApiResponse> {
        let url = self.url_for(verb, params);
        debug!(verb, "Calling Subsonic API");
        let mut response = self.agent.get(&url).call()?;
        let body = response.body_mut().read_to_string()?;
        let envelope: Envelope = serde_json::from_str(&body)?;

        let api = envelope.response;
        if api.status != "ok" {
            let (code, message) = api
                .error
                .map(|e| (e.code, e.message))
                .unwrap_or((0, "unknown error".to_string()));
            return Err(SubsonicError::Api { code, message });
        }
        Ok(api)
    }

    fn album_list(&self) -> Result<Vec<AlbumEntry>> {
        let api = self.call(
            "getAlbumList",
            &[
                ("type", "alphabeticalByName"),
                ("size", &ALBUM_LIST_SIZE.to_string()),
            ],
        )?;
        Ok(api.album_list.map(|list| list.album).unwrap_or_default())
    }

    fn songs_of(&self, album: &AlbumEntry) -> Result<Vec<Song>> {
        let cover_url = match &album.cover_art {
            Some(id) => self.url_for("getCoverArt", &[("id", id)]),
            None => String::new(),
        };

        let api = self.call("getAlbum", &[("id", &album.id)])?;
        let entries = api.album.map(|a| a.song).unwrap_or_default();

        Ok(entries
            .into_iter()
            .map(|entry| Song {
                url: self.url_for("stream", &[("id", &entry.id)]),
                title: entry.title,
                album: entry.album,
                artist: entry.artist,
                content_type: entry.content_type,
                cover_art: cover_url.clone(),
            })
            .collect())
    }
}

impl SongCatalog for SubsonicClient {
    fn songs_for_album(&self, query: &str) -> Result<(String, Vec<Song>)> {
        let albums = self.album_list()?;
        let best = closest_album(query, &albums)
            .ok_or_else(|| SubsonicError::AlbumNotFound(query.to_string()))?;
        debug!(query, resolved = %best.album, "Fuzzy-resolved album");
        let songs = self.songs_of(best)?;
        Ok((best.album.clone(), songs))
    }

    fn album_names(&self) -> Result<Vec<String>> {
        Ok(self
            .album_list()?
            .into_iter()
            .map(|album| album.album)
            .collect())
    }
}

/// Closest album by case-insensitive Jaro-Winkler similarity, or `None`
/// when nothing clears [`MATCH_THRESHOLD`].
fn closest_album<'a>(query: &str, albums: &'a [AlbumEntry]) -> Option<&'a AlbumEntry> {
    let needle = query.to_lowercase();
    albums
        .iter()
        .map(|album| {
            (
                strsim::jaro_winkler(&needle, &album.album.to_lowercase()),
                album,
            )
        })
        .filter(|(score, _)| *score >= MATCH_THRESHOLD)
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal))
        .map(|(_, album)| album)
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "subsonic-response")]
    response: ApiResponse,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default, rename = "albumList")]
    album_list: Option<AlbumList>,
    #[serde(default)]
    album: Option<AlbumWithSongs>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: u32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AlbumList {
    #[serde(default)]
    album: Vec<AlbumEntry>,
}

#[derive(Debug, Deserialize)]
struct AlbumEntry {
    id: String,
    album: String,
    #[serde(default, rename = "coverArt")]
    cover_art: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlbumWithSongs {
    #[serde(default)]
    song: Vec<SongEntry>,
}

#[derive(Debug, Deserialize)]
struct SongEntry {
    id: String,
    title: String,
    album: String,
    artist: String,
    #[serde(rename = "contentType")]
    content_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALBUM_LIST_BODY: &str = r#"{
        "subsonic-response": {
            "status": "ok",
            "version": "1.16.1",
            "albumList": {
                "album": [
                    {"id": "al-1", "album": "High Voltage", "coverArt": "co-1"},
                    {"id": "al-2", "album": "Powerage", "coverArt": "co-2"}
                ]
            }
        }
    }"#;

    const HIGH_VOLTAGE_BODY: &str = r#"{
        "subsonic-response": {
            "status": "ok",
            "version": "1.16.1",
            "album": {
                "id": "al-1",
                "song": [
                    {"id": "s-1", "title": "The Jack", "album": "High Voltage",
                     "artist": "AC/DC", "contentType": "audio/mpeg"},
                    {"id": "s-2", "title": "Tnt", "album": "High Voltage",
                     "artist": "AC/DC", "contentType": "audio/mpeg"}
                ]
            }
        }
    }"#;

    fn mock_album_list(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/rest/getAlbumList")
            .match_query(mockito::Matcher::Any)
            .with_body(ALBUM_LIST_BODY)
            .create()
    }

    #[test]
    fn fuzzy_query_resolves_album_and_returns_tracks() {
        let mut server = mockito::Server::new();
        let _albums = mock_album_list(&mut server);
        let _album = server
            .mock("GET", "/rest/getAlbum")
            .match_query(mockito::Matcher::UrlEncoded("id".into(), "al-1".into()))
            .with_body(HIGH_VOLTAGE_BODY)
            .create();

        let client = SubsonicClient::new(&server.url(), "alice", "secret");
        let (album, songs) = client.songs_for_album("Hoghvoltge").unwrap();

        assert_eq!(album, "High Voltage");
        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].title, "The Jack");
        assert_eq!(songs[0].content_type, "audio/mpeg");
        assert!(songs[0].url.contains("/rest/stream"), "url: {}", songs[0].url);
        assert!(songs[0].url.contains("id=s-1"), "url: {}", songs[0].url);
        assert!(songs[0].cover_art.contains("id=co-1"));
    }

    #[test]
    fn unmatched_query_is_album_not_found() {
        let mut server = mockito::Server::new();
        let _albums = mock_album_list(&mut server);

        let client = SubsonicClient::new(&server.url(), "alice", "secret");
        match client.songs_for_album("zzzzzz") {
            Err(SubsonicError::AlbumNotFound(query)) => assert_eq!(query, "zzzzzz"),
            other => panic!("expected AlbumNotFound, got {other:?}"),
        }
    }

    #[test]
    fn album_names_lists_catalog() {
        let mut server = mockito::Server::new();
        let _albums = mock_album_list(&mut server);

        let client = SubsonicClient::new(&server.url(), "alice", "secret");
        let names = client.album_names().unwrap();
        assert_eq!(names, vec!["High Voltage", "Powerage"]);
    }

    #[test]
    fn failed_envelope_maps_to_api_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/rest/getAlbumList")
            .match_query(mockito::Matcher::Any)
            .with_body(
                r#"{"subsonic-response": {"status": "failed",
                    "error": {"code": 40, "message": "Wrong username or password"}}}"#,
            )
            .create();

        let client = SubsonicClient::new(&server.url(), "alice", "wrong");
        match client.album_names() {
            Err(SubsonicError::Api { code, message }) => {
                assert_eq!(code, 40);
                assert_eq!(message, "Wrong username or password");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn auth_params_carry_salted_token() {
        let client = SubsonicClient::new("https://music.example.com", "alice", "secret");
        let url = client.url_for("ping", &[]);
        assert!(url.starts_with("https://music.example.com/rest/ping?"));
        assert!(url.contains("u=alice"));
        assert!(url.contains("&t="));
        assert!(url.contains("&s="));
        assert!(url.contains("v=1.16.1"));
        assert!(url.contains("c=castme"));
    }

    #[test]
    fn closest_album_prefers_best_score() {
        let albums = vec![
            AlbumEntry {
                id: "1".into(),
                album: "High Voltage".into(),
                cover_art: None,
            },
            AlbumEntry {
                id: "2".into(),
                album: "Highway to Hell".into(),
                cover_art: None,
            },
        ];
        let best = closest_album("high voltage", &albums).unwrap();
        assert_eq!(best.id, "1");
        assert!(closest_album("qqqq", &albums).is_none());
    }
}
