//! Playback orchestration.
//!
//! [`Player`] binds the catalog, the shared queue, and the registered
//! backends together. Exactly one backend is current at a time; every
//! transport command goes to it. Switching backends stops the old one
//! first and, when the queue still has songs, restarts playback on the
//! new one so the listening session carries over.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use cmsubsonic::{Song, SongCatalog};

use crate::backend::Backend;
use crate::errors::{PlayerError, Result};
use crate::queue::PlayQueue;

pub struct Player {
    queue: Arc<PlayQueue>,
    catalog: Box<dyn SongCatalog>,
    backends: HashMap<String, Box<dyn Backend>>,
    current: String,
}

impl Player {
    pub fn new(catalog: Box<dyn SongCatalog>, queue: Arc<PlayQueue>) -> Self {
        Self {
            queue,
            catalog,
            backends: HashMap::new(),
            current: String::new(),
        }
    }

    pub fn register(&mut self, name: &str, backend: Box<dyn Backend>) {
        self.backends.insert(name.to_string(), backend);
    }

    /// Pick the starting backend. Unlike [`switch`](Self::switch) this
    /// neither stops anything nor restarts playback.
    pub fn select(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(PlayerError::InvalidBackendName(name.to_string()));
        }
        self.current = name.to_string();
        Ok(())
    }

    pub fn current_backend_name(&self) -> &str {
        &self.current
    }

    fn current_backend(&self) -> Result<&dyn Backend> {
        self.backends
            .get(&self.current)
            .map(Box::as_ref)
            .ok_or_else(|| PlayerError::InvalidBackendName(self.current.clone()))
    }

    /// Resolve `query` against the catalog and append the album's songs
    /// to the queue. Returns the album name the query resolved to. On
    /// error the queue is left unchanged.
    pub fn queue_album(&self, query: &str) -> Result<String> {
        let (name, songs) = self.catalog.songs_for_album(query)?;
        info!(album = %name, songs = songs.len(), "Album queued");
        self.queue.extend(songs);
        Ok(name)
    }

    pub fn list_albums(&self) -> Result<Vec<String>> {
        Ok(self.catalog.album_names()?)
    }

    pub fn queue_snapshot(&self) -> Vec<Song> {
        self.queue.snapshot()
    }

    pub fn force_play(&self) -> Result<()> {
        self.current_backend()?.force_play()
    }

    pub fn playpause(&self) -> Result<()> {
        self.current_backend()?.playpause()
    }

    pub fn volume_set(&self, value: f32) -> Result<()> {
        self.current_backend()?.volume_set(value)
    }

    pub fn volume_delta(&self, delta: f32) -> Result<()> {
        self.current_backend()?.volume_delta(delta)
    }

    /// Skip the current queue head and start the next song. An empty
    /// queue after the drop is an error the caller can show the user.
    pub fn next(&self) -> Result<()> {
        let backend = self.current_backend()?;
        self.queue.pop_front();
        backend.force_play()
    }

    /// Stop playback and drop every queued song.
    pub fn clear(&self) -> Result<()> {
        self.queue.clear();
        self.current_backend()?.stop()
    }

    /// Hand the session over to `name`. The outgoing backend is stopped
    /// (failures logged, never fatal) and, when songs remain queued, the
    /// incoming one picks up from the queue head.
    pub fn switch(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(PlayerError::InvalidBackendName(name.to_string()));
        }
        if name == self.current {
            return Ok(());
        }

        if let Ok(backend) = self.current_backend() {
            if let Err(err) = backend.stop() {
                warn!(backend = self.current, error = %err, "Stop failed while switching");
            }
        }

        info!(from = self.current, to = name, "Switching backend");
        self.current = name.to_string();

        if self.queue.is_empty() {
            Ok(())
        } else {
            self.current_backend()?.force_play()
        }
    }
}
