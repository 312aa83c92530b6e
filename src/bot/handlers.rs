use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::info;

use super::{session::GuildSession, SayuBot};
use crate::{audio::queue::LoopMode, sources::TrackResolver, ui::embeds};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &SayuBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await?,
        "speak" => handle_speak(ctx, &command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await?,
        "jump" => handle_jump(ctx, &command, bot, guild_id).await?,
        "remove" => handle_remove(ctx, &command, bot, guild_id).await?,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await?,
        "clear" => handle_clear(ctx, &command, bot, guild_id).await?,
        "loop" => handle_loop(ctx, &command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, &command, bot, guild_id).await?,
        "volume" => handle_volume(ctx, &command, bot, guild_id).await?,
        "join" => handle_join(ctx, &command, bot, guild_id).await?,
        "leave" => handle_leave(ctx, &command, bot, guild_id).await?,
        "help" => reply_embed(ctx, &command, embeds::create_help_embed(), true).await?,
        _ => reply_ephemeral(ctx, &command, "❌ Comando no reconocido").await?,
    }

    Ok(())
}

// Handlers de reproducción

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = option_str(command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    defer(ctx, command).await?;
    request_track(ctx, command, bot, guild_id, bot.youtube(), query).await
}

async fn handle_speak(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
) -> Result<()> {
    let file = option_str(command, "file")
        .ok_or_else(|| anyhow::anyhow!("Archivo no proporcionado"))?;

    defer(ctx, command).await?;
    request_track(ctx, command, bot, guild_id, bot.files(), file).await
}

/// Conecta si hace falta, resuelve y encola; responde sobre la
/// interacción ya diferida.
async fn request_track(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
    resolver: &dyn TrackResolver,
    query: &str,
) -> Result<()> {
    let result: Result<_> = async {
        let channel_id = get_user_voice_channel(ctx, guild_id, command.user.id)?;
        let session = connect(ctx, command, bot, guild_id, channel_id).await?;
        session
            .request(resolver, query, command.user.id, bot.config().max_queue_size)
            .await
    }
    .await;

    let embed = match result {
        Ok((track, position)) => embeds::create_track_added_embed(&track, position),
        Err(e) => embeds::create_error_embed("No se pudo agregar", &e.to_string()),
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;
    Ok(())
}

// Handlers de control

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = playing_session(bot, guild_id) else {
        return reply_ephemeral(ctx, command, "❌ No hay nada reproduciéndose actualmente").await;
    };

    session.player.skip();
    reply(ctx, command, "⏭️ Canción saltada").await
}

async fn handle_jump(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(index) = option_position(command) else {
        return reply_ephemeral(ctx, command, "❌ Posición inválida").await;
    };
    let Some(session) = bot.existing_session(guild_id) else {
        return reply_ephemeral(ctx, command, "❌ La cola está vacía").await;
    };

    match session.player.jump_to(index) {
        Ok(()) => reply(ctx, command, &format!("🎯 Saltando a la posición {}", index + 1)).await,
        Err(e) => {
            let embed = embeds::create_error_embed("No se pudo saltar", &e.to_string());
            reply_embed(ctx, command, embed, true).await
        }
    }
}

async fn handle_remove(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(index) = option_position(command) else {
        return reply_ephemeral(ctx, command, "❌ Posición inválida").await;
    };
    let Some(session) = bot.existing_session(guild_id) else {
        return reply_ephemeral(ctx, command, "❌ La cola está vacía").await;
    };

    match session.player.remove_at(index) {
        Ok(removed) => {
            let embed = embeds::create_success_embed(
                "Eliminado de la cola",
                &format!("**{}**", removed.title),
            );
            reply_embed(ctx, command, embed, false).await
        }
        Err(e) => {
            let embed = embeds::create_error_embed("No se pudo eliminar", &e.to_string());
            reply_embed(ctx, command, embed, true).await
        }
    }
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = playing_session(bot, guild_id) else {
        return reply_ephemeral(ctx, command, "❌ No hay nada reproduciéndose actualmente").await;
    };

    session.player.pause();
    reply(ctx, command, "⏸️ Reproducción pausada").await
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = playing_session(bot, guild_id) else {
        return reply_ephemeral(ctx, command, "❌ No hay nada reproduciéndose actualmente").await;
    };

    session.player.resume();
    reply(ctx, command, "▶️ Reproducción reanudada").await
}

async fn handle_clear(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
) -> Result<()> {
    if let Some(session) = bot.existing_session(guild_id) {
        session.player.clear();
    }
    reply(ctx, command, "⏹️ Reproducción detenida y cola limpiada").await
}

async fn handle_loop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(mode) = option_str(command, "mode").and_then(LoopMode::parse) else {
        return reply_ephemeral(ctx, command, "❌ Modo de repetición inválido").await;
    };
    let session = bot.session(ctx, guild_id).await?;

    session.player.set_loop_mode(mode);

    let message = match mode {
        LoopMode::Track => "🔂 Repetir canción activado",
        LoopMode::Queue => "🔁 Repetir cola activado",
        LoopMode::Off => "➡️ Repetición desactivada",
    };
    reply(ctx, command, message).await
}

// Handlers de información

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
) -> Result<()> {
    let page = option_int(command, "page").unwrap_or(1).max(1) as usize;

    let embed = match bot.existing_session(guild_id) {
        Some(session) => embeds::create_queue_embed(
            &session.player.queue_snapshot(),
            session.player.current_index(),
            session.player.loop_mode(),
            page,
        ),
        None => embeds::create_queue_embed(&[], None, LoopMode::Off, page),
    };

    reply_embed(ctx, command, embed, false).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
) -> Result<()> {
    let current = playing_session(bot, guild_id).and_then(|s| s.player.now_playing());

    match current {
        Some(track) => reply_embed(ctx, command, embeds::create_now_playing_embed(&track), false).await,
        None => reply_ephemeral(ctx, command, "❌ No hay nada reproduciéndose actualmente").await,
    }
}

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
) -> Result<()> {
    let volume = match option_int(command, "level") {
        Some(level) => {
            let volume = (level as f32 / 100.0).clamp(0.0, 1.0);
            if let Some(session) = bot.existing_session(guild_id) {
                session.player.set_volume(volume);
            }
            bot.storage
                .lock()
                .await
                .set_volume(guild_id.get(), volume)
                .await?;
            volume
        }
        None => match bot.existing_session(guild_id) {
            Some(session) => session.player.volume(),
            None => bot.storage.lock().await.guild_settings(guild_id.get()).await?.volume,
        },
    };

    reply_embed(ctx, command, embeds::create_volume_embed(volume), false).await
}

// Handlers de conexión

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
) -> Result<()> {
    let channel_id = match get_user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => channel_id,
        Err(e) => return reply_ephemeral(ctx, command, &format!("❌ {}", e)).await,
    };

    defer(ctx, command).await?;
    let content = match connect(ctx, command, bot, guild_id, channel_id).await {
        Ok(_) => "🔊 Conectado al canal de voz".to_string(),
        Err(e) => format!("❌ {}", e),
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

async fn handle_leave(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
) -> Result<()> {
    bot.end_session(guild_id).await?;
    reply(ctx, command, "👋 Desconectado del canal de voz").await
}

// Funciones auxiliares

/// Sesión de la guild unida al canal de voz, y canal de anuncios actualizado
async fn connect(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SayuBot,
    guild_id: GuildId,
    channel_id: ChannelId,
) -> Result<Arc<GuildSession>> {
    let session = bot.session(ctx, guild_id).await?;

    if !session.player.voice().is_connected() {
        session.player.voice().join(channel_id).await?;
    }

    bot.storage
        .lock()
        .await
        .set_last_text_channel(guild_id.get(), command.channel_id.get())
        .await?;

    Ok(session)
}

fn playing_session(bot: &SayuBot, guild_id: GuildId) -> Option<Arc<GuildSession>> {
    bot.existing_session(guild_id)
        .filter(|session| session.player.is_playing())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow::anyhow!("Guild no encontrada en caché"))?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or_else(|| anyhow::anyhow!("Debes estar en un canal de voz"))
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn option_int(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

/// Las posiciones se muestran desde 1
fn option_position(command: &CommandInteraction) -> Option<usize> {
    option_int(command, "position")
        .filter(|position| *position >= 1)
        .map(|position| position as usize - 1)
}

async fn defer(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;
    Ok(())
}

async fn reply(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;
    Ok(())
}

async fn reply_ephemeral(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn reply_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}
