use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info, warn};

/// Ajustes persistidos por servidor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: u64,
    pub volume: f32,
    /// Canal donde se anuncian las canciones
    pub last_text_channel: Option<u64>,
    /// Mensaje de "reproduciendo" que se borra al terminar la canción
    pub last_playing_message: Option<u64>,
}

impl GuildSettings {
    fn new(guild_id: u64, volume: f32) -> Self {
        Self {
            guild_id,
            volume,
            last_text_channel: None,
            last_playing_message: None,
        }
    }
}

/// Almacenamiento en archivos JSON, uno por servidor
pub struct JsonStorage {
    data_dir: PathBuf,
    default_volume: f32,
    guilds_cache: HashMap<u64, GuildSettings>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf, default_volume: f32) -> Result<Self> {
        let guilds_dir = data_dir.join("guilds");
        fs::create_dir_all(&guilds_dir)
            .await
            .with_context(|| format!("No se pudo crear {}", guilds_dir.display()))?;

        info!("📁 Storage inicializado en: {}", data_dir.display());

        let mut storage = Self {
            data_dir,
            default_volume,
            guilds_cache: HashMap::new(),
        };
        storage.load_all_guilds().await?;

        Ok(storage)
    }

    /// Obtiene los ajustes de un servidor, creándolos si no existen
    pub async fn guild_settings(&mut self, guild_id: u64) -> Result<GuildSettings> {
        if let Some(settings) = self.guilds_cache.get(&guild_id) {
            return Ok(settings.clone());
        }

        let settings = match self.load_guild_settings(guild_id).await {
            Ok(settings) => settings,
            Err(e) => {
                if !is_missing_file(&e) {
                    warn!(
                        "⚠️ Ajustes ilegibles para guild {}, se reemplazan por los valores por defecto: {}",
                        guild_id, e
                    );
                }
                let settings = GuildSettings::new(guild_id, self.default_volume);
                self.save_guild_settings(&settings).await?;
                info!("📝 Ajustes por defecto creados para guild {}", guild_id);
                settings
            }
        };

        self.guilds_cache.insert(guild_id, settings.clone());
        Ok(settings)
    }

    pub async fn update_guild_settings(&mut self, settings: GuildSettings) -> Result<()> {
        self.save_guild_settings(&settings).await?;
        debug!("💾 Ajustes actualizados para guild {}", settings.guild_id);
        self.guilds_cache.insert(settings.guild_id, settings);
        Ok(())
    }

    pub async fn set_volume(&mut self, guild_id: u64, volume: f32) -> Result<()> {
        let mut settings = self.guild_settings(guild_id).await?;
        settings.volume = volume.clamp(0.0, 1.0);
        self.update_guild_settings(settings).await
    }

    pub async fn set_last_text_channel(&mut self, guild_id: u64, channel_id: u64) -> Result<()> {
        let mut settings = self.guild_settings(guild_id).await?;
        if settings.last_text_channel == Some(channel_id) {
            return Ok(());
        }
        settings.last_text_channel = Some(channel_id);
        self.update_guild_settings(settings).await
    }

    /// Guarda el mensaje de "reproduciendo" y devuelve el anterior
    pub async fn replace_playing_message(
        &mut self,
        guild_id: u64,
        message_id: Option<u64>,
    ) -> Result<Option<u64>> {
        let mut settings = self.guild_settings(guild_id).await?;
        let previous = std::mem::replace(&mut settings.last_playing_message, message_id);
        self.update_guild_settings(settings).await?;
        Ok(previous)
    }

    async fn load_guild_settings(&self, guild_id: u64) -> Result<GuildSettings> {
        let content = fs::read_to_string(self.guild_file_path(guild_id)).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn save_guild_settings(&self, settings: &GuildSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(self.guild_file_path(settings.guild_id), content).await?;
        Ok(())
    }

    async fn load_all_guilds(&mut self) -> Result<()> {
        let mut files = fs::read_dir(self.data_dir.join("guilds")).await?;
        let mut loaded_count = 0;

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            let Some(guild_id) = path
                .file_stem()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("guild_"))
                .and_then(|id| id.parse::<u64>().ok())
            else {
                continue;
            };

            match self.load_guild_settings(guild_id).await {
                Ok(settings) => {
                    self.guilds_cache.insert(guild_id, settings);
                    loaded_count += 1;
                }
                Err(e) => warn!("Error cargando ajustes para guild {}: {}", guild_id, e),
            }
        }

        if loaded_count > 0 {
            info!("📂 Cargados ajustes de {} servidores", loaded_count);
        }

        Ok(())
    }

    fn guild_file_path(&self, guild_id: u64) -> PathBuf {
        self.data_dir
            .join("guilds")
            .join(format!("guild_{}.json", guild_id))
    }
}

fn is_missing_file(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn creates_defaults_on_first_access() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path().to_path_buf(), 0.1).await.unwrap();

        let settings = storage.guild_settings(7).await.unwrap();

        assert_eq!(settings, GuildSettings::new(7, 0.1));
        assert!(dir.path().join("guilds/guild_7.json").exists());
    }

    #[tokio::test]
    async fn settings_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut storage = JsonStorage::new(dir.path().to_path_buf(), 0.1).await.unwrap();
            storage.set_volume(7, 0.4).await.unwrap();
            storage.set_last_text_channel(7, 99).await.unwrap();
            storage.replace_playing_message(7, Some(1234)).await.unwrap();
        }

        let mut storage = JsonStorage::new(dir.path().to_path_buf(), 0.1).await.unwrap();
        let settings = storage.guild_settings(7).await.unwrap();

        assert_eq!(
            settings,
            GuildSettings {
                guild_id: 7,
                volume: 0.4,
                last_text_channel: Some(99),
                last_playing_message: Some(1234),
            }
        );
    }

    #[tokio::test]
    async fn replace_playing_message_returns_previous() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path().to_path_buf(), 0.1).await.unwrap();

        assert_eq!(storage.replace_playing_message(1, Some(10)).await.unwrap(), None);
        assert_eq!(storage.replace_playing_message(1, None).await.unwrap(), Some(10));
        assert_eq!(storage.guild_settings(1).await.unwrap().last_playing_message, None);
    }

    #[tokio::test]
    async fn volume_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path().to_path_buf(), 0.1).await.unwrap();

        storage.set_volume(3, 4.0).await.unwrap();

        assert_eq!(storage.guild_settings(3).await.unwrap().volume, 1.0);
    }

    #[tokio::test]
    async fn corrupt_file_is_replaced_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path().to_path_buf(), 0.1).await.unwrap();
        let path = dir.path().join("guilds/guild_3.json");
        fs::write(&path, "{not json").await.unwrap();

        let err = storage.load_guild_settings(3).await.unwrap_err();
        assert!(!is_missing_file(&err));
        assert!(is_missing_file(&storage.load_guild_settings(4).await.unwrap_err()));

        assert_eq!(storage.guild_settings(3).await.unwrap(), GuildSettings::new(3, 0.1));
        let content = fs::read_to_string(&path).await.unwrap();
        assert!(serde_json::from_str::<GuildSettings>(&content).is_ok());
    }
}
