use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{File, Input, YoutubeDl},
    tracks::TrackHandle,
    CoreEvent, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    audio::voice::{AudioResource, ResourceEvents, VoiceTransport},
    error::{PlayerError, PlayerResult},
};

/// Transporte de voz respaldado por songbird para una guild.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    http_client: reqwest::Client,
    ready: Arc<watch::Sender<bool>>,
    joined: AtomicBool,
    handlers_registered: AtomicBool,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, guild_id: GuildId, http_client: reqwest::Client) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            manager,
            guild_id,
            http_client,
            ready: Arc::new(ready),
            joined: AtomicBool::new(false),
            handlers_registered: AtomicBool::new(false),
        }
    }

    fn input_for(&self, locator: &str, is_file: bool) -> Input {
        if is_file {
            File::new(std::path::PathBuf::from(locator)).into()
        } else {
            YoutubeDl::new(self.http_client.clone(), locator.to_string()).into()
        }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn join(&self, channel: ChannelId) -> PlayerResult<()> {
        let call = self
            .manager
            .join(self.guild_id, channel)
            .await
            .map_err(|e| {
                error!("Error al obtener handler de voz: {:?}", e);
                PlayerError::ConnectionUnavailable(e.to_string())
            })?;

        let mut handler = call.lock().await;

        if !self.handlers_registered.swap(true, Ordering::SeqCst) {
            for (event, connected) in [
                (CoreEvent::DriverConnect, true),
                (CoreEvent::DriverReconnect, true),
                (CoreEvent::DriverDisconnect, false),
            ] {
                handler.add_global_event(
                    Event::Core(event),
                    ConnectionStateHandler {
                        guild_id: self.guild_id,
                        ready: self.ready.clone(),
                        connected,
                    },
                );
            }
        }

        // songbird ya negoció la conexión durante `join`, el evento de
        // DriverConnect pudo dispararse antes de registrar el handler
        if handler.current_connection().is_some() {
            self.ready.send_replace(true);
        }
        self.joined.store(true, Ordering::SeqCst);

        info!("🔊 Conectado al canal de voz {} en guild {}", channel, self.guild_id);
        Ok(())
    }

    fn readiness(&self) -> Option<watch::Receiver<bool>> {
        self.joined
            .load(Ordering::SeqCst)
            .then(|| self.ready.subscribe())
    }

    async fn create_resource(
        &self,
        locator: &str,
        is_file: bool,
        events: ResourceEvents,
    ) -> PlayerResult<Box<dyn AudioResource>> {
        let call = self.manager.get(self.guild_id).ok_or_else(|| {
            PlayerError::ConnectionUnavailable(format!("no hay llamada activa en guild {}", self.guild_id))
        })?;

        let input = self.input_for(locator, is_file);
        let track_handle = {
            let mut handler = call.lock().await;
            handler.play_only_input(input)
        };

        track_handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndNotifier {
                    events: events.clone(),
                },
            )
            .map_err(|e| PlayerError::Streaming(format!("Error al agregar event handler: {}", e)))?;

        track_handle
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackErrorNotifier {
                    guild_id: self.guild_id,
                    events,
                },
            )
            .map_err(|e| PlayerError::Streaming(format!("Error al agregar event handler: {}", e)))?;

        debug!("🎵 Recurso creado en guild {}: {}", self.guild_id, locator);
        Ok(Box::new(SongbirdResource { handle: track_handle }))
    }

    async fn leave(&self) -> PlayerResult<()> {
        self.joined.store(false, Ordering::SeqCst);
        self.handlers_registered.store(false, Ordering::SeqCst);
        self.ready.send_replace(false);

        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| PlayerError::ConnectionUnavailable(e.to_string()))
    }
}

struct SongbirdResource {
    handle: TrackHandle,
}

impl AudioResource for SongbirdResource {
    fn set_volume(&self, volume: f32) {
        let _ = self.handle.set_volume(volume);
    }

    fn pause(&self) {
        let _ = self.handle.pause();
    }

    fn resume(&self) {
        let _ = self.handle.play();
    }

    fn stop(&self) {
        let _ = self.handle.stop();
    }
}

/// Refleja el estado del driver de voz en el canal de readiness
struct ConnectionStateHandler {
    guild_id: GuildId,
    ready: Arc<watch::Sender<bool>>,
    connected: bool,
}

#[async_trait]
impl VoiceEventHandler for ConnectionStateHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        if self.connected {
            debug!("🔌 Driver de voz conectado en guild {}", self.guild_id);
        } else {
            warn!("🔌 Driver de voz desconectado en guild {}", self.guild_id);
        }
        self.ready.send_replace(self.connected);
        None
    }
}

struct TrackEndNotifier {
    events: ResourceEvents,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.events.ended();
        None
    }
}

struct TrackErrorNotifier {
    guild_id: GuildId,
    events: ResourceEvents,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut reason = String::from("error desconocido");
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                error!(
                    "❌ Error en track para guild {}: {:?}",
                    self.guild_id, state.playing
                );
                reason = format!("{:?}", state.playing);
            }
        }

        self.events.failed(reason);
        None
    }
}
