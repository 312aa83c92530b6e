use tokio::sync::mpsc;
use tracing::debug;

use crate::audio::queue::TrackRequest;

/// Eventos que el reproductor emite hacia el canal de notificaciones.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Queued(TrackRequest),
    NowPlaying(TrackRequest),
    Failed { track: TrackRequest, reason: String },
    /// El track terminó (natural, skip o error); retira el mensaje de "reproduciendo"
    Finished(TrackRequest),
    /// La cola fue limpiada
    Cleared,
    Idle,
}

impl PlayerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PlayerEvent::Queued(_) => "queued",
            PlayerEvent::NowPlaying(_) => "now-playing",
            PlayerEvent::Failed { .. } => "failed",
            PlayerEvent::Finished(_) => "finished",
            PlayerEvent::Cleared => "cleared",
            PlayerEvent::Idle => "idle",
        }
    }

    pub fn track(&self) -> Option<&TrackRequest> {
        match self {
            PlayerEvent::Queued(track)
            | PlayerEvent::NowPlaying(track)
            | PlayerEvent::Finished(track)
            | PlayerEvent::Failed { track, .. } => Some(track),
            PlayerEvent::Cleared | PlayerEvent::Idle => None,
        }
    }
}

/// Extremo emisor de eventos. Los eventos se entregan en orden por una
/// única tarea; si nadie escucha se descartan.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl EventSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: PlayerEvent) {
        debug!("📣 Evento {}", event.kind());
        let _ = self.tx.send(event);
    }
}
