use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::{ResolvedTrack, TrackResolver};
use crate::error::{PlayerError, PlayerResult};

const AUDIO_EXTENSIONS: [&str; 5] = ["mp3", "wav", "ogg", "flac", "m4a"];

/// Resuelve archivos de audio dentro del directorio de medios
pub struct LocalFileResolver {
    root: PathBuf,
}

impl LocalFileResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn unresolvable(query: &str, reason: &str) -> PlayerError {
        PlayerError::TrackUnresolvable {
            query: query.to_string(),
            reason: reason.to_string(),
        }
    }

    fn is_audio(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
    }
}

#[async_trait]
impl TrackResolver for LocalFileResolver {
    async fn resolve(&self, query: &str) -> PlayerResult<ResolvedTrack> {
        let relative = Path::new(query.trim());

        // Solo rutas relativas sin "..", para no salir del directorio de medios
        if relative.as_os_str().is_empty()
            || !relative.components().all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(Self::unresolvable(query, "ruta no permitida"));
        }

        if !Self::is_audio(relative) {
            return Err(Self::unresolvable(query, "formato de audio no soportado"));
        }

        let path = self.root.join(relative);
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|_| Self::unresolvable(query, "el archivo no existe"))?;
        if !metadata.is_file() {
            return Err(Self::unresolvable(query, "no es un archivo"));
        }

        let title = relative
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(query)
            .to_string();

        debug!("📁 Archivo resuelto: {}", path.display());
        Ok(ResolvedTrack {
            title: format!("Archivo: {}", title),
            locator: path.to_string_lossy().into_owned(),
            is_file: true,
        })
    }
}
