//! Chromecast backend built on the `rust_cast` library.
//!
//! Control operations open short-lived connections to the device (the Cast
//! protocol is cheap to connect over) while a dedicated listener thread
//! keeps a long-lived connection for heartbeats and device-pushed media
//! status. When the device reports its current item finished, the listener
//! pops the next queue head and loads it. Both the
//! listener and user-initiated commands mutate the queue head under the
//! same session mutex, so the two can never pop concurrently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent};
use rust_cast::channels::heartbeat::HeartbeatResponse;
use rust_cast::channels::media::{
    IdleReason, Image, Media, MediaResponse, Metadata, MusicTrackMediaMetadata, PlayerState,
    StreamType,
};
use rust_cast::channels::receiver::{CastDeviceApp, ReceiverResponse};
use rust_cast::{CastDevice, ChannelMessage};
use tracing::{debug, info, warn};

use cmsubsonic::Song;

use crate::backend::Backend;
use crate::errors::{PlayerError, Result};
use crate::queue::PlayQueue;

const CAST_SERVICE_TYPE: &str = "_googlecast._tcp.local.";
const DEFAULT_DESTINATION_ID: &str = "receiver-0";

/// App id of the Default Media Receiver, the app we stream through.
const MEDIA_RECEIVER_APP_ID: &str = "CC1AD845";

/// How long to wait for the device to advertise itself over mDNS.
const DISCOVERY_WINDOW: Duration = Duration::from_secs(5);
const DISCOVERY_POLL: Duration = Duration::from_millis(250);

/// Delay before the listener re-connects after a dropped connection.
const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(2);

type CastResult<T> = std::result::Result<T, rust_cast::errors::Error>;

/// Receiver session state shared between the command path and the listener.
///
/// The mutex around this state doubles as the serialization point for
/// queue-head pops: whoever starts the next track holds it from pop to load.
#[derive(Debug, Default)]
struct CastSession {
    session_id: Option<String>,
    transport_id: Option<String>,
    media_session_id: Option<i32>,
}

impl CastSession {
    fn clear(&mut self) {
        self.session_id = None;
        self.transport_id = None;
        self.media_session_id = None;
    }
}

/// Cast target resolved by friendly name at construction.
pub struct ChromecastBackend {
    name: String,
    host: String,
    port: u16,
    queue: Arc<PlayQueue>,
    session: Arc<Mutex<CastSession>>,
    shutdown: Arc<AtomicBool>,
}

impl ChromecastBackend {
    /// Resolve `friendly_name` on the local network, verify the control
    /// channel answers, and start the status listener. Blocks until the
    /// device is ready; fails with [`PlayerError::DeviceNotFound`] when no
    /// matching device shows up within the discovery window.
    pub fn new(friendly_name: &str, queue: Arc<PlayQueue>) -> Result<Self> {
        let (host, port) = discover(friendly_name, DISCOVERY_WINDOW)?;
        info!(name = friendly_name, host, port, "Found cast device");

        let backend = Self {
            name: friendly_name.to_string(),
            host,
            port,
            queue,
            session: Arc::new(Mutex::new(CastSession::default())),
            shutdown: Arc::new(AtomicBool::new(false)),
        };

        // Caller absorbs the delay: make sure the control channel is up
        // before handing the backend out.
        let device = backend.connect()?;
        let status = backend.receiver_status(&device)?;
        debug!(
            name = friendly_name,
            volume = status.volume.level.unwrap_or(0.0),
            "Cast control channel ready"
        );

        backend.spawn_listener();
        Ok(backend)
    }

    /// Friendly name the device was resolved by.
    pub fn friendly_name(&self) -> &str {
        &self.name
    }

    /// Open a fresh connection to the device and bring up the virtual
    /// connection + heartbeat channels.
    fn connect(&self) -> Result<CastDevice<'static>> {
        let device = CastDevice::connect_without_host_verification(self.host.clone(), self.port)
            .map_err(PlayerError::cast)?;
        device
            .connection
            .connect(DEFAULT_DESTINATION_ID.to_string())
            .map_err(PlayerError::cast)?;
        device.heartbeat.ping().map_err(PlayerError::cast)?;
        Ok(device)
    }

    fn receiver_status(
        &self,
        device: &CastDevice<'_>,
    ) -> Result<rust_cast::channels::receiver::Status> {
        device.receiver.get_status().map_err(PlayerError::cast)
    }

    /// Make sure the media receiver app is running, adopting a session that
    /// is already live when possible. Returns `(transport_id, session_id)`.
    fn ensure_app(
        &self,
        device: &CastDevice<'_>,
        session: &mut CastSession,
    ) -> Result<(String, String)> {
        if let (Some(transport), Some(session_id)) =
            (session.transport_id.clone(), session.session_id.clone())
        {
            return Ok((transport, session_id));
        }

        let status = self.receiver_status(device)?;
        let (transport_id, session_id) = match status
            .applications
            .iter()
            .find(|app| app.app_id == MEDIA_RECEIVER_APP_ID)
        {
            Some(app) => (app.transport_id.clone(), app.session_id.clone()),
            None => {
                let app = device
                    .receiver
                    .launch_app(&CastDeviceApp::DefaultMediaReceiver)
                    .map_err(PlayerError::cast)?;
                (app.transport_id, app.session_id)
            }
        };

        device
            .connection
            .connect(transport_id.as_str())
            .map_err(PlayerError::cast)?;
        session.transport_id = Some(transport_id.clone());
        session.session_id = Some(session_id.clone());
        Ok((transport_id, session_id))
    }

    fn spawn_listener(&self) {
        let host = self.host.clone();
        let port = self.port;
        let queue = Arc::clone(&self.queue);
        let session = Arc::clone(&self.session);
        let shutdown = Arc::clone(&self.shutdown);

        // Listener errors never propagate; the thread reconnects until the
        // backend is dropped.
        let _ = thread::Builder::new()
            .name("castme-cast-listener".to_string())
            .spawn(move || {
                while !shutdown.load(Ordering::Relaxed) {
                    match listen(&host, port, &queue, &session, &shutdown) {
                        Ok(()) => break,
                        Err(err) => {
                            warn!(error = %err, "Cast listener connection lost, retrying");
                            thread::sleep(LISTENER_RETRY_DELAY);
                        }
                    }
                }
                debug!("Cast listener stopped");
            });
    }
}

impl Backend for ChromecastBackend {
    fn kind(&self) -> &'static str {
        "chromecast"
    }

    fn force_play(&self) -> Result<()> {
        let mut session = self.session.lock().unwrap();
        if self.queue.is_empty() {
            return Err(PlayerError::NoSongsToPlay);
        }

        let device = self.connect()?;
        let (transport_id, session_id) = self.ensure_app(&device, &mut session)?;

        // Pop under the session lock so the listener cannot advance
        // concurrently.
        let song = self.queue.pop_front().ok_or(PlayerError::NoSongsToPlay)?;
        info!(song = %song, "Casting");
        let media_session_id = load_song(&device, &transport_id, &session_id, &song)
            .map_err(PlayerError::cast)?;
        session.media_session_id = media_session_id;
        Ok(())
    }

    fn playpause(&self) -> Result<()> {
        let session = self.session.lock().unwrap();
        let (Some(transport_id), Some(media_session_id)) =
            (session.transport_id.clone(), session.media_session_id)
        else {
            info!("Nothing loaded on the cast device, playpause ignored");
            return Ok(());
        };
        drop(session);

        let device = self.connect()?;
        let status = device
            .media
            .get_status(transport_id.as_str(), Some(media_session_id))
            .map_err(PlayerError::cast)?;

        let playing = status
            .entries
            .first()
            .map(|entry| matches!(entry.player_state, PlayerState::Playing))
            .unwrap_or(false);

        if playing {
            device
                .media
                .pause(transport_id.as_str(), media_session_id)
                .map_err(PlayerError::cast)?;
        } else {
            device
                .media
                .play(transport_id.as_str(), media_session_id)
                .map_err(PlayerError::cast)?;
        }
        Ok(())
    }

    fn volume_set(&self, value: f32) -> Result<()> {
        let device = self.connect()?;
        device
            .receiver
            .set_volume(value.clamp(0.0, 1.0))
            .map_err(PlayerError::cast)?;
        Ok(())
    }

    fn volume_delta(&self, delta: f32) -> Result<()> {
        let device = self.connect()?;
        let status = self.receiver_status(&device)?;
        let level = status.volume.level.unwrap_or(0.0);
        device
            .receiver
            .set_volume((level + delta).clamp(0.0, 1.0))
            .map_err(PlayerError::cast)?;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let mut session = self.session.lock().unwrap();
        let Some(session_id) = session.session_id.clone() else {
            return Ok(());
        };
        session.clear();
        drop(session);

        let device = self.connect()?;
        device
            .receiver
            .stop_app(session_id.as_str())
            .map_err(PlayerError::cast)?;
        Ok(())
    }
}

impl Drop for ChromecastBackend {
    fn drop(&mut self) {
        // The listener notices on its next message or reconnect attempt;
        // receive() has no timeout so we do not join it.
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Browse mDNS for a cast device whose advertised friendly name (`fn` TXT
/// property) matches, returning its address and port.
fn discover(friendly_name: &str, window: Duration) -> Result<(String, u16)> {
    let daemon = ServiceDaemon::new()
        .map_err(|err| PlayerError::Cast(format!("failed to start mDNS daemon: {err}")))?;
    let receiver = daemon
        .browse(CAST_SERVICE_TYPE)
        .map_err(|err| PlayerError::Cast(format!("mDNS browse failed: {err}")))?;

    let deadline = Instant::now() + window;
    let mut found = None;

    while Instant::now() < deadline {
        let timeout = deadline
            .saturating_duration_since(Instant::now())
            .min(DISCOVERY_POLL);
        let Ok(event) = receiver.recv_timeout(timeout) else {
            continue;
        };
        if let ServiceEvent::ServiceResolved(service) = event {
            let advertised = service
                .get_property_val_str("fn")
                .map(str::trim)
                .unwrap_or_default();
            debug!(advertised, "Cast device advertised");
            if advertised == friendly_name {
                let mut addresses: Vec<_> = service.get_addresses_v4().iter().copied().collect();
                addresses.sort();
                if let Some(address) = addresses.first() {
                    found = Some((address.to_string(), service.get_port()));
                    break;
                }
            }
        }
    }

    if let Err(err) = daemon.stop_browse(CAST_SERVICE_TYPE) {
        debug!(error = %err, "Failed to stop mDNS browse cleanly");
    }
    let _ = daemon.shutdown();

    found.ok_or_else(|| PlayerError::DeviceNotFound(friendly_name.to_string()))
}

/// Push a play-media command for `song`, tagged as a music track with its
/// catalog metadata. Returns the new media session id when reported.
fn load_song(
    device: &CastDevice<'_>,
    transport_id: &str,
    session_id: &str,
    song: &Song,
) -> CastResult<Option<i32>> {
    let images = if song.cover_art.is_empty() {
        Vec::new()
    } else {
        vec![Image {
            url: song.cover_art.clone(),
            dimensions: None,
        }]
    };

    let metadata = MusicTrackMediaMetadata {
        title: Some(song.title.clone()),
        artist: Some(song.artist.clone()),
        album_name: Some(song.album.clone()),
        images,
        ..Default::default()
    };

    let media = Media {
        content_id: song.url.clone(),
        content_type: song.content_type.clone(),
        stream_type: StreamType::Buffered,
        duration: None,
        metadata: Some(Metadata::MusicTrack(metadata)),
    };

    let status = device.media.load(transport_id, session_id, &media)?;
    Ok(status.entries.first().map(|entry| entry.media_session_id))
}

/// One listener connection: answer heartbeats, follow receiver status to
/// attach to the media app transport, and auto-advance on finished tracks.
fn listen(
    host: &str,
    port: u16,
    queue: &Arc<PlayQueue>,
    session: &Arc<Mutex<CastSession>>,
    shutdown: &Arc<AtomicBool>,
) -> CastResult<()> {
    let device = CastDevice::connect_without_host_verification(host.to_string(), port)?;
    device
        .connection
        .connect(DEFAULT_DESTINATION_ID.to_string())?;
    device.heartbeat.ping()?;

    // Prime the session from whatever is already running on the device.
    let status = device.receiver.get_status()?;
    attach_media_app(&device, session, &status.applications)?;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            return Ok(());
        }

        match device.receive()? {
            ChannelMessage::Heartbeat(response) => {
                if matches!(response, HeartbeatResponse::Ping) {
                    device.heartbeat.pong()?;
                }
            }
            ChannelMessage::Receiver(ReceiverResponse::Status(status)) => {
                attach_media_app(&device, session, &status.applications)?;
            }
            ChannelMessage::Media(MediaResponse::Status(status)) => {
                for entry in &status.entries {
                    if matches!(entry.player_state, PlayerState::Idle)
                        && matches!(entry.idle_reason, Some(IdleReason::Finished))
                    {
                        advance(&device, queue, session);
                    }
                }
            }
            ChannelMessage::Media(MediaResponse::LoadFailed(_)) => {
                // The queue is left as-is so the operator can retry or skip.
                warn!("Cast device rejected the media load");
            }
            ChannelMessage::Media(MediaResponse::LoadCancelled(_)) => {
                warn!("Cast media load was cancelled");
            }
            _ => {}
        }
    }
}

/// Connect to the media receiver app's transport when it (re)appears and
/// record its ids; clear the session fields when the app went away.
fn attach_media_app(
    device: &CastDevice<'_>,
    session: &Arc<Mutex<CastSession>>,
    applications: &[rust_cast::channels::receiver::Application],
) -> CastResult<()> {
    let mut session = session.lock().unwrap();
    match applications
        .iter()
        .find(|app| app.app_id == MEDIA_RECEIVER_APP_ID)
    {
        Some(app) => {
            if session.transport_id.as_deref() != Some(app.transport_id.as_str()) {
                debug!(transport = %app.transport_id, "Attaching to media receiver app");
                device.connection.connect(app.transport_id.as_str())?;
                session.transport_id = Some(app.transport_id.clone());
                session.session_id = Some(app.session_id.clone());
            }
        }
        None => {
            if session.transport_id.is_some() {
                debug!("Media receiver app went away");
                session.clear();
            }
        }
    }
    Ok(())
}

/// Auto-advance: the device finished its current item; pop the next head
/// and load it. Holds the session lock across pop + load so a concurrent
/// `force_play`/`stop` cannot interleave.
fn advance(device: &CastDevice<'_>, queue: &Arc<PlayQueue>, session: &Arc<Mutex<CastSession>>) {
    let mut session = session.lock().unwrap();
    let (Some(transport_id), Some(session_id)) =
        (session.transport_id.clone(), session.session_id.clone())
    else {
        return;
    };

    let Some(song) = queue.pop_front() else {
        info!("Queue drained, playback finished");
        return;
    };

    info!(song = %song, "Auto-advancing to next track");
    match load_song(device, &transport_id, &session_id, &song) {
        Ok(media_session_id) => session.media_session_id = media_session_id,
        // Never crash the listener on a failed load.
        Err(err) => warn!(error = %err, song = %song, "Failed to load next track"),
    }
}
