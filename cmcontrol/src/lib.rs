//! # Playback orchestration engine
//!
//! The core of CastMe: a shared play queue, a backend-agnostic playback
//! contract with two interchangeable implementations (Chromecast and local
//! audio output), and the [`Player`] facade that dispatches user commands to
//! the current backend and switches targets without losing the queue.
//!
//! Two concurrency domains live here: the Chromecast status listener (a
//! thread receiving device-pushed events) and the local audio worker (a
//! thread owning the only output handle, driven by a command channel). Both
//! share the play queue with the command-dispatch path; queue-head mutation
//! is serialized per backend so a finished-track advance can never race a
//! user-initiated `force_play`.

pub mod backend;
pub mod chromecast;
pub mod errors;
pub mod local;
pub mod player;
pub mod queue;

pub use backend::{Backend, PlaybackState};
pub use chromecast::ChromecastBackend;
pub use errors::{PlayerError, Result};
pub use local::{LocalBackend, PlayerCommand};
pub use player::Player;
pub use queue::PlayQueue;
