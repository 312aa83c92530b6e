use std::time::Duration;
use thiserror::Error;

/// Errores del reproductor por guild.
///
/// `OutOfRange` y `TrackUnresolvable` son culpa de quien llama y se
/// reportan al usuario. Los errores de transporte abortan el ciclo de
/// reproducción actual y dejan al reproductor en reposo.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("índice {index} fuera de rango (la cola tiene {len} canciones)")]
    OutOfRange { index: usize, len: usize },

    #[error("conexión de voz no disponible: {0}")]
    ConnectionUnavailable(String),

    #[error("la conexión de voz no estuvo lista tras {0:?}")]
    ReadinessTimeout(Duration),

    #[error("no se pudo resolver la canción '{query}': {reason}")]
    TrackUnresolvable { query: String, reason: String },

    #[error("error de streaming: {0}")]
    Streaming(String),
}

pub type PlayerResult<T> = std::result::Result<T, PlayerError>;
