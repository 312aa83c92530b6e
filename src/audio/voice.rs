use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::ChannelId;
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{PlayerError, PlayerResult};

/// Callback para errores de streaming que llegan fuera de banda
pub type StreamErrorCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Conexión de voz de una guild, tal como la expone el transporte.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn join(&self, channel: ChannelId) -> PlayerResult<()>;

    /// Estado de la conexión; `None` si nunca se pidió una conexión.
    fn readiness(&self) -> Option<watch::Receiver<bool>>;

    /// Crea un recurso reproduciendo `locator`. El transporte debe avisar
    /// por `events` cuando el recurso termina o falla.
    async fn create_resource(
        &self,
        locator: &str,
        is_file: bool,
        events: ResourceEvents,
    ) -> PlayerResult<Box<dyn AudioResource>>;

    async fn leave(&self) -> PlayerResult<()>;
}

/// Un recurso de audio sonando en el transporte.
pub trait AudioResource: Send + Sync {
    fn set_volume(&self, volume: f32);
    fn pause(&self);
    fn resume(&self);
    fn stop(&self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PlaybackSignal {
    generation: u64,
    active: bool,
    stops: u64,
}

/// Canal por el que el transporte reporta el fin (o el fallo) de un recurso.
#[derive(Clone)]
pub struct ResourceEvents {
    generation: u64,
    signal: Arc<watch::Sender<PlaybackSignal>>,
    on_error: StreamErrorCallback,
}

impl ResourceEvents {
    pub fn ended(&self) {
        let generation = self.generation;
        self.signal.send_if_modified(|state| {
            if state.generation == generation && state.active {
                state.active = false;
                true
            } else {
                false
            }
        });
    }

    /// Un error de streaming cuenta como fin del recurso.
    pub fn failed(&self, reason: impl Into<String>) {
        if self.is_current() {
            (self.on_error)(reason.into());
        }
        self.ended();
    }

    fn is_current(&self) -> bool {
        let state = *self.signal.borrow();
        state.generation == self.generation && state.active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// `force_stop` llegó mientras se esperaba la conexión
    Cancelled,
}

struct ActiveResource {
    generation: u64,
    handle: Box<dyn AudioResource>,
}

/// Conexión de voz más el recurso que suena en ella.
pub struct VoiceSession {
    transport: Arc<dyn VoiceTransport>,
    resource: Mutex<Option<ActiveResource>>,
    volume: Mutex<f32>,
    signal: Arc<watch::Sender<PlaybackSignal>>,
}

impl VoiceSession {
    pub fn new(transport: Arc<dyn VoiceTransport>, volume: f32) -> Self {
        let (signal, _) = watch::channel(PlaybackSignal::default());
        Self {
            transport,
            resource: Mutex::new(None),
            volume: Mutex::new(volume.clamp(0.0, 1.0)),
            signal: Arc::new(signal),
        }
    }

    pub async fn join(&self, channel: ChannelId) -> PlayerResult<()> {
        self.transport.join(channel).await?;
        info!("🔊 Conectado al canal de voz {}", channel);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.transport.readiness().is_some()
    }

    /// Número de `force_stop` recibidos hasta ahora. El reproductor lo lee al
    /// elegir un track para no perder una parada que llegue antes de crearlo.
    pub fn stop_count(&self) -> u64 {
        self.signal.borrow().stops
    }

    /// Espera a que la conexión esté lista, a que venza `timeout` o a que
    /// llegue un `force_stop` posterior a `since_stop`.
    pub async fn wait_until_ready(
        &self,
        timeout: Duration,
        since_stop: u64,
    ) -> PlayerResult<Readiness> {
        let mut ready = self.transport.readiness().ok_or_else(|| {
            PlayerError::ConnectionUnavailable("no hay conexión de voz".to_string())
        })?;
        let mut stops = self.signal.subscribe();

        let wait = async {
            tokio::select! {
                biased;
                _ = stops.wait_for(|state| state.stops != since_stop) => Ok(Readiness::Cancelled),
                res = ready.wait_for(|ready| *ready) => match res {
                    Ok(_) => Ok(Readiness::Ready),
                    Err(_) => Err(PlayerError::ConnectionUnavailable(
                        "la conexión de voz se cerró".to_string(),
                    )),
                },
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PlayerError::ReadinessTimeout(timeout)),
        }
    }

    /// Crea un recurso nuevo para `locator`, reemplazando el anterior. No
    /// crea nada si hubo un `force_stop` después de `since_stop`.
    pub async fn start_streaming(
        &self,
        locator: &str,
        is_file: bool,
        since_stop: u64,
        on_stream_error: StreamErrorCallback,
    ) -> PlayerResult<()> {
        let mut generation = None;
        self.signal.send_if_modified(|state| {
            if state.stops != since_stop {
                return false;
            }
            state.generation += 1;
            state.active = true;
            generation = Some(state.generation);
            true
        });

        let Some(generation) = generation else {
            debug!("Parada recibida antes de crear el recurso para {}", locator);
            return Ok(());
        };

        if let Some(previous) = self.resource.lock().take() {
            previous.handle.stop();
        }

        let events = ResourceEvents {
            generation,
            signal: self.signal.clone(),
            on_error: on_stream_error,
        };

        let handle = match self.transport.create_resource(locator, is_file, events).await {
            Ok(handle) => handle,
            Err(e) => {
                self.deactivate(generation);
                return Err(e);
            }
        };

        let state = *self.signal.borrow();
        if state.generation != generation || !state.active {
            // force_stop (o un error inmediato) llegó mientras se creaba el recurso
            debug!("Recurso {} descartado antes de sonar", generation);
            handle.stop();
            return Ok(());
        }

        handle.set_volume(*self.volume.lock());
        *self.resource.lock() = Some(ActiveResource { generation, handle });
        debug!("▶️ Recurso {} creado para {}", generation, locator);
        Ok(())
    }

    /// Espera a que el recurso activo termine o sea eliminado por
    /// `force_stop`. Vuelve de inmediato si no hay recurso.
    pub async fn wait_until_finished(&self) {
        let mut rx = self.signal.subscribe();
        let state = *rx.borrow_and_update();

        if state.active {
            let generation = state.generation;
            let _ = rx
                .wait_for(|state| state.generation != generation || !state.active)
                .await;
        }

        self.release(state.generation);
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    pub fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        *self.volume.lock() = volume;

        if let Some(active) = self.resource.lock().as_ref() {
            active.handle.set_volume(volume);
        }
    }

    pub fn pause(&self) {
        if let Some(active) = self.resource.lock().as_ref() {
            active.handle.pause();
            info!("⏸️ Reproducción pausada");
        }
    }

    pub fn resume(&self) {
        if let Some(active) = self.resource.lock().as_ref() {
            active.handle.resume();
            info!("▶️ Reproducción reanudada");
        }
    }

    pub fn has_resource(&self) -> bool {
        self.resource.lock().is_some()
    }

    /// Detiene y elimina el recurso activo. Seguro sin recurso.
    pub fn force_stop(&self) {
        if let Some(active) = self.resource.lock().take() {
            active.handle.stop();
            debug!("⏹️ Recurso {} detenido", active.generation);
        }

        self.signal.send_modify(|state| {
            state.active = false;
            state.stops += 1;
        });
    }

    pub async fn leave(&self) -> PlayerResult<()> {
        self.force_stop();
        if let Err(e) = self.transport.leave().await {
            warn!("Error al salir del canal de voz: {}", e);
            return Err(e);
        }
        info!("👋 Desconectado del canal de voz");
        Ok(())
    }

    fn deactivate(&self, generation: u64) {
        self.signal.send_if_modified(|state| {
            if state.generation == generation && state.active {
                state.active = false;
                true
            } else {
                false
            }
        });
    }

    fn release(&self, generation: u64) {
        let mut slot = self.resource.lock();
        if slot.as_ref().is_some_and(|r| r.generation == generation) {
            *slot = None;
        }
    }
}
