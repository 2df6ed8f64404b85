//! Shared play queue.
//!
//! The single source of truth for "what plays next". Shared by reference
//! (via `Arc`) between the command-dispatch path and whichever backend is
//! active, so switching targets preserves the remaining tracks.
//!
//! Invariant: the head, when present, is the track that is current or about
//! to be current on the active backend; a track is popped at most once.

use std::collections::VecDeque;
use std::sync::Mutex;

use cmsubsonic::Song;

/// Ordered, thread-safe queue of tracks.
#[derive(Default)]
pub struct PlayQueue {
    inner: Mutex<VecDeque<Song>>,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `songs` in order, keeping whatever is already queued.
    pub fn extend(&self, songs: Vec<Song>) {
        self.inner.lock().unwrap().extend(songs);
    }

    /// Consume the head. This is the only way a track leaves the queue.
    pub fn pop_front(&self) -> Option<Song> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Clone of the head without consuming it.
    pub fn front(&self) -> Option<Song> {
        self.inner.lock().unwrap().front().cloned()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Copy of the current contents, for display.
    pub fn snapshot(&self) -> Vec<Song> {
        self.inner.lock().unwrap().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(title: &str) -> Song {
        Song {
            title: title.into(),
            album: "High Voltage".into(),
            artist: "AC/DC".into(),
            url: format!("https://example.com/stream?id={title}"),
            content_type: "audio/mpeg".into(),
            cover_art: String::new(),
        }
    }

    #[test]
    fn extend_keeps_order_and_pop_consumes_head() {
        let queue = PlayQueue::new();
        queue.extend(vec![song("a"), song("b")]);
        queue.extend(vec![song("c")]);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.front().unwrap().title, "a");
        assert_eq!(queue.pop_front().unwrap().title, "a");
        assert_eq!(queue.pop_front().unwrap().title, "b");
        assert_eq!(queue.pop_front().unwrap().title, "c");
        assert!(queue.pop_front().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn front_does_not_consume() {
        let queue = PlayQueue::new();
        queue.extend(vec![song("a")]);
        assert_eq!(queue.front().unwrap().title, "a");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn clear_empties_the_queue() {
        let queue = PlayQueue::new();
        queue.extend(vec![song("a"), song("b")]);
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.snapshot().is_empty());
    }
}
