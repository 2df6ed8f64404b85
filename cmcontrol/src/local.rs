//! Local audio backend.
//!
//! The audio library is not safe to drive from arbitrary threads, so a
//! single worker thread owns the output handle and every audio call happens
//! there. The rest of the program reaches it exclusively through a FIFO
//! command channel; the worker polls that channel with a short timeout,
//! interleaved with an end-of-track check, so user commands and natural
//! track completion are both observed with bounded latency.
//!
//! Unlike the cast backend, the local worker pops the queue head only when
//! a track finishes naturally: while a track plays, the head *is* the
//! current track.

use std::io::Cursor;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, error, info};
use ureq::Agent;

use cmsubsonic::Song;

use crate::backend::{Backend, PlaybackState};
use crate::errors::{PlayerError, Result};
use crate::queue::PlayQueue;

/// Poll cadence for the command channel, which also bounds how stale the
/// end-of-track check can get.
const COMMAND_POLL: Duration = Duration::from_millis(100);

/// Timeout for fetching a stream into memory.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a fetched stream; generous enough for lossless albums'
/// longest tracks.
const MAX_STREAM_BYTES: u64 = 256 * 1024 * 1024;

/// Commands handled by the playback worker, one variant per operation.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    SetVolume(f32),
    AdjustVolume(f32),
    PlayPause,
    ForcePlay,
    Stop,
    Exit,
}

/// Handle to the playback worker; implements [`Backend`] by enqueueing
/// commands, never touching audio state itself.
pub struct LocalBackend {
    queue: Arc<PlayQueue>,
    tx: Sender<PlayerCommand>,
    worker: Option<JoinHandle<()>>,
}

impl LocalBackend {
    pub fn new(queue: Arc<PlayQueue>) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker_queue = Arc::clone(&queue);
        let worker = thread::Builder::new()
            .name("castme-audio".to_string())
            .spawn(move || audio_worker(rx, worker_queue))
            .map_err(PlayerError::audio)?;

        Ok(Self {
            queue,
            tx,
            worker: Some(worker),
        })
    }

    fn send(&self, command: PlayerCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| PlayerError::Audio("playback worker is gone".to_string()))
    }

    /// Tell the worker to exit and join it, releasing the output device.
    /// Must run before process exit; `Drop` falls back to it.
    pub fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.tx.send(PlayerCommand::Exit);
            if worker.join().is_err() {
                error!("Playback worker panicked");
            }
        }
    }
}

impl Drop for LocalBackend {
    fn drop(&mut self) {
        self.close();
    }
}

impl Backend for LocalBackend {
    fn kind(&self) -> &'static str {
        "local"
    }

    fn force_play(&self) -> Result<()> {
        if self.queue.is_empty() {
            return Err(PlayerError::NoSongsToPlay);
        }
        self.send(PlayerCommand::ForcePlay)
    }

    fn playpause(&self) -> Result<()> {
        self.send(PlayerCommand::PlayPause)
    }

    fn volume_set(&self, value: f32) -> Result<()> {
        self.send(PlayerCommand::SetVolume(value))
    }

    fn volume_delta(&self, delta: f32) -> Result<()> {
        self.send(PlayerCommand::AdjustVolume(delta))
    }

    fn stop(&self) -> Result<()> {
        self.send(PlayerCommand::Stop)
    }
}

/// The worker: sole owner of the audio output. Drains the command channel
/// and watches for the current sink draining out (the end-of-track
/// signal).
fn audio_worker(rx: Receiver<PlayerCommand>, queue: Arc<PlayQueue>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(output) => output,
        Err(err) => {
            // Senders see the hung-up channel as an Audio error.
            error!(error = %err, "Failed to open the audio output device");
            return;
        }
    };
    let agent: Agent = Agent::config_builder()
        .timeout_global(Some(FETCH_TIMEOUT))
        .build()
        .into();

    let mut sink: Option<Sink> = None;
    let mut state = PlaybackState::Stopped;
    let mut volume = 1.0f32;

    loop {
        match rx.recv_timeout(COMMAND_POLL) {
            Ok(PlayerCommand::Exit) => break,
            Ok(command) => {
                apply_command(command, &handle, &agent, &queue, &mut sink, &mut state, &mut volume);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        // End-of-track poll: the sink drained while we were nominally
        // playing, so the head finished naturally.
        let finished = state == PlaybackState::Playing
            && sink.as_ref().map(Sink::empty).unwrap_or(true);
        if finished {
            match advance_after_finish(&queue) {
                Some(next) => match start_song(&handle, &agent, &next, volume) {
                    Ok(new_sink) => sink = Some(new_sink),
                    Err(err) => {
                        error!(error = %err, song = %next, "Failed to start next track");
                        sink = None;
                        state = PlaybackState::Stopped;
                    }
                },
                None => {
                    info!("Queue drained, playback finished");
                    sink = None;
                    state = PlaybackState::Stopped;
                }
            }
        }
    }

    // Dropping the stream/sink here releases the output device.
    debug!("Playback worker exiting");
}

fn apply_command(
    command: PlayerCommand,
    handle: &OutputStreamHandle,
    agent: &Agent,
    queue: &Arc<PlayQueue>,
    sink: &mut Option<Sink>,
    state: &mut PlaybackState,
    volume: &mut f32,
) {
    debug!(?command, ?state, "Worker command");
    match command {
        PlayerCommand::SetVolume(value) => {
            *volume = value.clamp(0.0, 1.0);
            if let Some(sink) = sink.as_ref() {
                sink.set_volume(*volume);
            }
        }
        PlayerCommand::AdjustVolume(delta) => {
            *volume = (*volume + delta).clamp(0.0, 1.0);
            if let Some(sink) = sink.as_ref() {
                sink.set_volume(*volume);
            }
        }
        PlayerCommand::PlayPause => match *state {
            PlaybackState::Playing => {
                if let Some(sink) = sink.as_ref() {
                    sink.pause();
                }
                *state = PlaybackState::Paused;
            }
            PlaybackState::Paused => {
                // Resume the retained buffer, no re-fetch.
                if let Some(sink) = sink.as_ref() {
                    sink.play();
                }
                *state = PlaybackState::Playing;
            }
            PlaybackState::Stopped => {
                start_head(handle, agent, queue, sink, state, *volume);
            }
        },
        PlayerCommand::ForcePlay => {
            start_head(handle, agent, queue, sink, state, *volume);
        }
        PlayerCommand::Stop => {
            // Queue untouched: stop halts output and discards the buffer.
            if let Some(sink) = sink.take() {
                sink.stop();
            }
            *state = PlaybackState::Stopped;
        }
        PlayerCommand::Exit => unreachable!("Exit is handled by the worker loop"),
    }
}

/// Start playing the queue head without popping it; the head is consumed
/// on natural completion only. Fetch or decode failure reports and leaves
/// the worker stopped, keeping the command queue usable as a retry point.
fn start_head(
    handle: &OutputStreamHandle,
    agent: &Agent,
    queue: &Arc<PlayQueue>,
    sink: &mut Option<Sink>,
    state: &mut PlaybackState,
    volume: f32,
) {
    let Some(song) = queue.front() else {
        info!("No songs to play");
        return;
    };
    match start_song(handle, agent, &song, volume) {
        Ok(new_sink) => {
            *sink = Some(new_sink);
            *state = PlaybackState::Playing;
        }
        Err(err) => {
            error!(error = %err, song = %song, "Failed to start playback");
            *sink = None;
            *state = PlaybackState::Stopped;
        }
    }
}

/// Fetch `song` into memory, decode it, and start a fresh sink.
fn start_song(
    handle: &OutputStreamHandle,
    agent: &Agent,
    song: &Song,
    volume: f32,
) -> Result<Sink> {
    info!(song = %song, "Playing locally");
    let bytes = fetch_song(agent, song)?;
    debug!(bytes = bytes.len(), "Stream fetched");

    let source = Decoder::new(Cursor::new(bytes)).map_err(PlayerError::audio)?;
    let sink = Sink::try_new(handle).map_err(PlayerError::audio)?;
    sink.set_volume(volume);
    sink.append(source);
    Ok(sink)
}

/// Blocking GET of the stream body; non-2xx statuses surface as errors.
fn fetch_song(agent: &Agent, song: &Song) -> Result<Vec<u8>> {
    let mut response = agent.get(&song.url).call().map_err(PlayerError::fetch)?;
    response
        .body_mut()
        .with_config()
        .limit(MAX_STREAM_BYTES)
        .read_to_vec()
        .map_err(PlayerError::fetch)
}

/// The head just finished: consume it and return the new head, if any,
/// which the caller should start.
fn advance_after_finish(queue: &PlayQueue) -> Option<Song> {
    queue.pop_front();
    queue.front()
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
    fn finished_track_is_popped_and_next_head_returned() {
        let queue = PlayQueue::new();
        queue.extend(vec![song("a"), song("b")]);

        let next = advance_after_finish(&queue).expect("b should be up next");
        assert_eq!(next.title, "b");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.front().unwrap().title, "b");
    }

    #[test]
    fn finishing_the_last_track_leaves_nothing_to_play() {
        let queue = PlayQueue::new();
        queue.extend(vec![song("a")]);

        assert!(advance_after_finish(&queue).is_none());
        assert!(queue.is_empty());
    }
}
