use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        events::{EventSender, PlayerEvent},
        queue::{LoopMode, TrackQueue, TrackRequest},
        voice::{Readiness, StreamErrorCallback, VoiceSession},
    },
    error::{PlayerError, PlayerResult},
};

/// Parámetros de reproducción de una guild
#[derive(Debug, Clone, Copy)]
pub struct PlayerSettings {
    pub volume: f32,
    pub ready_timeout: Duration,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume: 0.1,
            ready_timeout: Duration::from_secs(5),
        }
    }
}

/// Estado de reproducción. `current_index == None` significa reposo.
#[derive(Debug, Default)]
pub struct PlaybackState {
    queue: TrackQueue,
    current_index: Option<usize>,
    loop_mode: LoopMode,
    jump_target: Option<usize>,
    is_playing: bool,
    volume: f32,
    /// Se incrementa con cada `clear` para que el ciclo en curso no avance
    /// sobre una cola que ya no existe
    epoch: u64,
}

impl PlaybackState {
    /// Calcula el índice del siguiente track.
    ///
    /// Un salto pendiente gana siempre, luego la repetición de track, luego
    /// la vuelta al inicio de la cola; si no, se avanza uno y `None` indica
    /// que la cola se agotó.
    pub fn compute_next_index(&mut self) -> Option<usize> {
        if let Some(target) = self.jump_target.take() {
            return Some(target);
        }

        if self.loop_mode == LoopMode::Track {
            return self.current_index;
        }

        let next = self.current_index.map_or(0, |index| index + 1);
        if self.loop_mode == LoopMode::Queue && next == self.queue.len() {
            return Some(0);
        }

        self.current_index = (next != self.queue.len()).then_some(next);
        self.current_index
    }

    fn current_track(&self) -> Option<&TrackRequest> {
        self.current_index.and_then(|index| self.queue.item_at(index))
    }
}

/// Reproductor de una guild: cola, índice actual, modo de repetición y el
/// ciclo de reproducción que los recorre.
pub struct GuildPlayer {
    guild_id: GuildId,
    state: Mutex<PlaybackState>,
    voice: Arc<VoiceSession>,
    events: EventSender,
    ready_timeout: Duration,
}

impl GuildPlayer {
    pub fn new(
        guild_id: GuildId,
        voice: Arc<VoiceSession>,
        events: EventSender,
        settings: PlayerSettings,
    ) -> Arc<Self> {
        let state = PlaybackState {
            volume: settings.volume.clamp(0.0, 1.0),
            ..Default::default()
        };

        Arc::new(Self {
            guild_id,
            state: Mutex::new(state),
            voice,
            events,
            ready_timeout: settings.ready_timeout,
        })
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn voice(&self) -> &Arc<VoiceSession> {
        &self.voice
    }

    /// Agrega un track; si el reproductor está en reposo empieza a sonar
    /// el track recién agregado.
    pub fn enqueue(self: &Arc<Self>, track: TrackRequest) {
        self.events.emit(PlayerEvent::Queued(track.clone()));

        let start = {
            let mut state = self.state.lock();
            state.queue.enqueue(track);

            if state.current_index.is_some() {
                false
            } else {
                state.current_index = Some(state.queue.len() - 1);
                if state.is_playing {
                    debug!("Ciclo en curso en guild {}, tomará el nuevo índice", self.guild_id);
                }
                !state.is_playing
            }
        };

        if start {
            self.start_play_cycle();
        }
    }

    pub fn skip(&self) {
        info!("⏭️ Saltando track en guild {}", self.guild_id);
        self.voice.force_stop();
    }

    /// Salta a `index`. Sin reproducción en curso empieza directamente ahí.
    pub fn jump_to(self: &Arc<Self>, index: usize) -> PlayerResult<()> {
        let idle = {
            let mut state = self.state.lock();
            let len = state.queue.len();
            if index >= len {
                return Err(PlayerError::OutOfRange { index, len });
            }

            if state.is_playing {
                state.jump_target = Some(index);
                false
            } else {
                state.current_index = Some(index);
                true
            }
        };

        info!("🎯 Saltando a la posición {} en guild {}", index, self.guild_id);
        if idle {
            self.start_play_cycle();
        } else {
            self.skip();
        }
        Ok(())
    }

    /// Elimina el track en `index` manteniendo el índice actual sobre el
    /// mismo track lógico.
    pub fn remove_at(&self, index: usize) -> PlayerResult<TrackRequest> {
        let (removed, was_current) = {
            let mut state = self.state.lock();
            let removed = state.queue.remove_at(index)?;
            let was_current = state.current_index == Some(index);

            if let Some(current) = state.current_index {
                if index <= current {
                    state.current_index = current.checked_sub(1);
                }
            }

            (removed, was_current)
        };

        if was_current {
            self.skip();
        }
        Ok(removed)
    }

    pub fn set_loop_mode(&self, mode: LoopMode) {
        self.state.lock().loop_mode = mode;
        match mode {
            LoopMode::Off => info!("➡️ Repetición desactivada"),
            LoopMode::Track => info!("🔂 Repetir canción activado"),
            LoopMode::Queue => info!("🔁 Repetir cola activado"),
        }
    }

    pub fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.state.lock().volume = volume;
        self.voice.set_volume(volume);
        info!("🔊 Volumen ajustado a {}%", (volume * 100.0).round() as u32);
    }

    pub fn clear(&self) {
        {
            let mut state = self.state.lock();
            state.queue = TrackQueue::new();
            state.current_index = None;
            state.loop_mode = LoopMode::Off;
            state.jump_target = None;
            state.epoch += 1;
        }

        self.voice.force_stop();
        self.events.emit(PlayerEvent::Cleared);
        info!("🗑️ Cola limpiada en guild {}", self.guild_id);
    }

    /// Limpia la cola y abandona el canal de voz
    pub async fn reset(&self) -> PlayerResult<()> {
        self.clear();
        self.voice.leave().await
    }

    pub fn pause(&self) {
        self.voice.pause();
    }

    pub fn resume(&self) {
        self.voice.resume();
    }

    pub fn queue_snapshot(&self) -> Vec<TrackRequest> {
        self.state.lock().queue.items().to_vec()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.lock().current_index
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.state.lock().loop_mode
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().is_playing
    }

    pub fn now_playing(&self) -> Option<TrackRequest> {
        self.state.lock().current_track().cloned()
    }

    /// Arranca el ciclo de reproducción si no hay uno en curso.
    fn start_play_cycle(self: &Arc<Self>) {
        let stops = {
            let mut state = self.state.lock();
            if state.is_playing {
                warn!("⚠️ Ciclo de reproducción ya activo en guild {}, ignorando", self.guild_id);
                return;
            }

            if state.current_track().is_none() {
                state.current_index = None;
                drop(state);
                self.go_idle();
                return;
            }

            state.is_playing = true;
            self.voice.stop_count()
        };

        let player = self.clone();
        tokio::spawn(async move { player.run_cycle(stops).await });
    }

    /// `stops` es el contador de paradas leído al elegir el track actual:
    /// un `skip` posterior lo detiene aunque aún no haya empezado a sonar.
    async fn run_cycle(self: Arc<Self>, mut stops: u64) {
        loop {
            let (track, epoch) = {
                let mut state = self.state.lock();
                let current = state.current_track().cloned();
                match current {
                    Some(track) => (track, state.epoch),
                    None => {
                        state.current_index = None;
                        state.is_playing = false;
                        drop(state);
                        self.go_idle();
                        return;
                    }
                }
            };

            let outcome = self.play_track(&track, stops).await;
            if let Err(e) = &outcome {
                error!("❌ Error reproduciendo {} en guild {}: {}", track.title, self.guild_id, e);
                self.voice.force_stop();
                self.events.emit(PlayerEvent::Failed {
                    track: track.clone(),
                    reason: e.to_string(),
                });
            }
            self.events.emit(PlayerEvent::Finished(track));

            if outcome.is_err() {
                let mut state = self.state.lock();
                state.current_index = None;
                state.is_playing = false;
                drop(state);
                self.go_idle();
                return;
            }

            let mut state = self.state.lock();
            if state.epoch == epoch {
                let next = state.compute_next_index();
                state.current_index = next;
            } else {
                debug!("Cola limpiada durante la reproducción en guild {}", self.guild_id);
            }
            stops = self.voice.stop_count();
        }
    }

    /// Reproduce un track hasta que termina, falla o es detenido. Solo los
    /// errores de transporte se propagan; un error de streaming cuenta como
    /// fin del track.
    async fn play_track(&self, track: &TrackRequest, stops: u64) -> PlayerResult<()> {
        info!("🎵 Reproduciendo: {} en guild {}", track.title, self.guild_id);
        self.events.emit(PlayerEvent::NowPlaying(track.clone()));

        if self.voice.wait_until_ready(self.ready_timeout, stops).await? == Readiness::Cancelled {
            debug!("Track detenido antes de que la conexión estuviera lista");
            return Ok(());
        }

        let volume = self.state.lock().volume;
        self.voice.set_volume(volume);

        let on_error: StreamErrorCallback = {
            let events = self.events.clone();
            let failed = track.clone();
            Arc::new(move |reason: String| {
                warn!("Error de streaming en {}: {}", failed.title, reason);
                events.emit(PlayerEvent::Failed {
                    track: failed.clone(),
                    reason,
                });
            })
        };

        match self
            .voice
            .start_streaming(&track.locator, track.is_file, stops, on_error)
            .await
        {
            Ok(()) => self.voice.wait_until_finished().await,
            Err(PlayerError::Streaming(reason)) => {
                warn!("No se pudo reproducir {}: {}", track.title, reason);
                self.events.emit(PlayerEvent::Failed {
                    track: track.clone(),
                    reason,
                });
            }
            Err(e) => return Err(e),
        }

        debug!("Track terminado en guild {}: {}", self.guild_id, track.title);
        Ok(())
    }

    fn go_idle(&self) {
        info!("📭 Cola terminada, reproductor en reposo en guild {}", self.guild_id);
        self.events.emit(PlayerEvent::Idle);
    }
}
