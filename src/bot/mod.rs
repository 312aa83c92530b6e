//! # Bot Module
//!
//! Discord front end for Sayu Music.
//!
//! - Slash command registration and dispatch ([`commands`], [`handlers`])
//! - One [`session::GuildSession`] per guild, created on first use
//! - Event announcements to the guild's text channel ([`announcer`])
//! - Cleanup when the bot is disconnected from voice
//!
//! ## Architecture
//!
//! [`SayuBot`] implements Serenity's [`EventHandler`]. Each guild gets a
//! [`GuildPlayer`] wired to a songbird-backed [`VoiceSession`]; the player's
//! events are drained by an [`announcer::Announcer`] task that runs until the
//! player is gone and its last event has been delivered.

use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod announcer;
pub mod commands;
pub mod handlers;
pub mod session;

use crate::{
    audio::{
        events::EventSender,
        player::{GuildPlayer, PlayerSettings},
        songbird_transport::SongbirdTransport,
        voice::VoiceSession,
    },
    config::Config,
    sources::{LocalFileResolver, YouTubeClient},
    storage::JsonStorage,
};
use announcer::{Announcer, HttpSink};
use session::GuildSession;

/// Main Discord bot handler.
///
/// All shared state is behind [`Arc`]; the per-guild registry is a
/// [`DashMap`] so commands from different guilds never contend.
pub struct SayuBot {
    config: Arc<Config>,
    /// Ajustes persistidos por guild (volumen, canal de anuncios)
    pub storage: Arc<tokio::sync::Mutex<JsonStorage>>,
    sessions: DashMap<GuildId, Arc<GuildSession>>,
    youtube: YouTubeClient,
    files: LocalFileResolver,
    /// Cliente HTTP compartido con las entradas de songbird
    http_client: reqwest::Client,
}

impl SayuBot {
    pub fn new(config: Config, storage: Arc<tokio::sync::Mutex<JsonStorage>>) -> Self {
        let files = LocalFileResolver::new(config.media_dir.clone());

        Self {
            config: Arc::new(config),
            storage,
            sessions: DashMap::new(),
            youtube: YouTubeClient::new(),
            files,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn youtube(&self) -> &YouTubeClient {
        &self.youtube
    }

    pub fn files(&self) -> &LocalFileResolver {
        &self.files
    }

    /// Sesión existente de la guild, sin crearla
    pub fn existing_session(&self, guild_id: GuildId) -> Option<Arc<GuildSession>> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    /// Obtiene la sesión de la guild o la crea con el volumen guardado.
    pub async fn session(&self, ctx: &Context, guild_id: GuildId) -> Result<Arc<GuildSession>> {
        if let Some(session) = self.existing_session(guild_id) {
            return Ok(session);
        }

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let volume = self
            .storage
            .lock()
            .await
            .guild_settings(guild_id.get())
            .await?
            .volume;

        let transport = Arc::new(SongbirdTransport::new(
            manager,
            guild_id,
            self.http_client.clone(),
        ));
        let voice = Arc::new(VoiceSession::new(transport, volume));
        let (events, rx) = EventSender::channel();
        let player = GuildPlayer::new(
            guild_id,
            voice,
            events,
            PlayerSettings {
                volume,
                ready_timeout: self.config.ready_timeout(),
            },
        );

        let announcer = Announcer::new(guild_id, HttpSink(ctx.http.clone()), self.storage.clone());
        let task = tokio::spawn(announcer.run(rx));

        info!("🎛️ Sesión creada para guild {}", guild_id);
        let session = Arc::new(GuildSession::new(player, task));
        Ok(self.sessions.entry(guild_id).or_insert(session).clone())
    }

    /// Limpia la cola, sale del canal y olvida la sesión
    pub async fn end_session(&self, guild_id: GuildId) -> Result<()> {
        if let Some((_, session)) = self.sessions.remove(&guild_id) {
            match Arc::try_unwrap(session) {
                Ok(session) => session.shutdown().await?,
                // Otro comando aún la usa; sus anuncios se entregan al soltarla
                Err(shared) => shared.player.reset().await?,
            }
            info!("👋 Sesión terminada en guild {}", guild_id);
        }
        Ok(())
    }

    /// Registers slash commands, per guild when `GUILD_ID` is set.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for SayuBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Si alguien desconecta al bot del canal de voz, la sesión se descarta.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            if let Err(e) = self.end_session(guild_id).await {
                error!("Error al limpiar la sesión: {:?}", e);
            }
        }
    }
}
