use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{ResolvedTrack, TrackResolver};
use crate::error::{PlayerError, PlayerResult};

/// Cliente para resolver canciones con yt-dlp
pub struct YouTubeClient {
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    webpage_url: Option<String>,
    url: Option<String>,
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            // Limitar requests concurrentes para evitar rate limiting
            rate_limiter: Semaphore::new(3),
        }
    }

    pub fn is_youtube_url(url: &str) -> bool {
        let Ok(parsed) = url::Url::parse(url) else {
            return false;
        };

        matches!(
            parsed.host_str(),
            Some("youtube.com" | "www.youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtu.be")
        )
    }

    /// Las URLs http(s) se consultan tal cual; el resto se busca
    fn target_for(query: &str) -> String {
        match url::Url::parse(query) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => query.to_string(),
            _ => format!("ytsearch1:{}", query),
        }
    }

    async fn dump_json(&self, target: &str) -> Result<YtDlpInfo, String> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| e.to_string())?;

        debug!("📊 Obteniendo info de: {}", target);

        let output = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                target,
            ])
            .output()
            .await
            .map_err(|e| format!("Error al ejecutar yt-dlp: {}", e))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(format!("yt-dlp error: {}", error.trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| "No se encontraron resultados".to_string())?;

        serde_json::from_str(line).map_err(|e| format!("Error al parsear respuesta de yt-dlp: {}", e))
    }
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackResolver for YouTubeClient {
    async fn resolve(&self, query: &str) -> PlayerResult<ResolvedTrack> {
        info!("🔍 Resolviendo: {}", query);
        let target = Self::target_for(query);

        let info = self.dump_json(&target).await.map_err(|reason| {
            warn!("❌ No se pudo resolver {}: {}", query, reason);
            PlayerError::TrackUnresolvable {
                query: query.to_string(),
                reason,
            }
        })?;

        let locator = info
            .webpage_url
            .or(info.url)
            .ok_or_else(|| PlayerError::TrackUnresolvable {
                query: query.to_string(),
                reason: "yt-dlp no devolvió una URL".to_string(),
            })?;

        Ok(ResolvedTrack {
            title: info.title,
            locator,
            is_file: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_url_detection() {
        assert!(YouTubeClient::is_youtube_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YouTubeClient::is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(YouTubeClient::is_youtube_url(
            "https://music.youtube.com/watch?v=test"
        ));
        assert!(!YouTubeClient::is_youtube_url("https://example.com/video"));
        assert!(!YouTubeClient::is_youtube_url("never gonna give you up"));
    }

    #[test]
    fn plain_text_becomes_search() {
        assert_eq!(YouTubeClient::target_for("lofi beats"), "ytsearch1:lofi beats");
        assert_eq!(
            YouTubeClient::target_for("https://youtu.be/abc"),
            "https://youtu.be/abc"
        );
        assert_eq!(YouTubeClient::target_for("ftp://host/a.mp3"), "ytsearch1:ftp://host/a.mp3");
    }

    #[test]
    fn parses_dump_json_line() {
        let info: YtDlpInfo = serde_json::from_str(
            r#"{"id":"abc","title":"Song","webpage_url":"https://youtu.be/abc","duration":12.0}"#,
        )
        .unwrap();
        assert_eq!(info.title, "Song");
        assert_eq!(info.webpage_url.as_deref(), Some("https://youtu.be/abc"));
    }
}
