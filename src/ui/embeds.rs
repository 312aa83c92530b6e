use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{
    audio::{
        events::PlayerEvent,
        queue::{LoopMode, TrackRequest},
    },
    sources::YouTubeClient,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Sayu Music";

const ITEMS_PER_PAGE: usize = 10;

/// Embed que corresponde a un evento del reproductor, si se anuncia
pub fn embed_for_event(event: &PlayerEvent) -> Option<CreateEmbed> {
    match event {
        PlayerEvent::NowPlaying(track) => Some(create_now_playing_embed(track)),
        PlayerEvent::Failed { track, reason } => Some(create_failed_embed(track, reason)),
        PlayerEvent::Idle => Some(create_idle_embed()),
        // La cola se anuncia en la respuesta al comando
        PlayerEvent::Queued(_) | PlayerEvent::Finished(_) | PlayerEvent::Cleared => None,
    }
}

fn source_label(track: &TrackRequest) -> &'static str {
    if track.is_file {
        "📁 Archivo local"
    } else if YouTubeClient::is_youtube_url(&track.locator) {
        "▶️ YouTube"
    } else {
        "🔗 Enlace"
    }
}

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(track: &TrackRequest) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by), true)
        .field("Fuente", source_label(track), true);

    if !track.is_file {
        embed = embed.url(&track.locator);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed cuando se agrega una canción a la cola
pub fn create_track_added_embed(track: &TrackRequest, position: usize) -> CreateEmbed {
    CreateEmbed::default()
        .title("✅ Agregado a la cola")
        .description(format!("**{}**", track.title))
        .color(colors::MUSIC_PURPLE)
        .field("📍 Posición", position.to_string(), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by), true)
        .field(
            "🕐 Agregado",
            track.added_at.format("%H:%M:%S UTC").to_string(),
            true,
        )
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_failed_embed(track: &TrackRequest, reason: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("⚠️ No se pudo reproducir")
        .description(format!("**{}**\n{}", track.title, reason))
        .color(colors::WARNING_ORANGE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_idle_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("😴 Cola terminada")
        .description("💡 Usa `/play <canción>` para seguir escuchando")
        .color(colors::NEUTRAL_GRAY)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Una página de la cola: índices `[start, end)` sobre la cola completa
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePage {
    pub start: usize,
    pub end: usize,
    pub current_page: usize,
    pub total_pages: usize,
}

impl QueuePage {
    /// `page` empieza en 1; páginas fuera de rango se ajustan a la última
    pub fn new(total_items: usize, page: usize, per_page: usize) -> Self {
        let total_pages = total_items.div_ceil(per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * per_page;
        let end = (start + per_page).min(total_items);

        Self {
            start,
            end,
            current_page,
            total_pages,
        }
    }
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(
    items: &[TrackRequest],
    current: Option<usize>,
    loop_mode: LoopMode,
    page: usize,
) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if items.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    let queue_page = QueuePage::new(items.len(), page, ITEMS_PER_PAGE);
    let mut description = String::new();

    for (offset, item) in items[queue_page.start..queue_page.end].iter().enumerate() {
        let index = queue_page.start + offset;
        let marker = if Some(index) == current { "▶️ " } else { "" };
        description.push_str(&format!("{}**{}**. {}\n", marker, index + 1, item.title));
    }

    let status = match loop_mode {
        LoopMode::Track => "🔂 Repetir canción",
        LoopMode::Queue => "🔁 Repetir cola",
        LoopMode::Off => "➡️ Sin repetición",
    };

    embed
        .description(description)
        .field(
            "Información",
            format!("**Total:** {} canciones • {}", items.len(), status),
            false,
        )
        .footer(CreateEmbedFooter::new(format!(
            "Página {} de {} • Sayu Music",
            queue_page.current_page, queue_page.total_pages
        )))
        .timestamp(Timestamp::now())
}

/// Crea un embed de ayuda con todos los comandos
pub fn create_help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Sayu Music - Comandos")
        .color(colors::INFO_BLUE)
        .description("Las posiciones de la cola empiezan en 1")
        .field(
            "🎵 Reproducción",
            "• `/play <canción>` - Busca en YouTube o reproduce una URL\n\
            • `/speak <archivo>` - Reproduce un archivo del servidor\n\
            • `/pause` - Pausa la reproducción\n\
            • `/resume` - Reanuda la reproducción\n\
            • `/skip` - Salta a la siguiente canción\n\
            • `/nowplaying` - Muestra la canción actual",
            false,
        )
        .field(
            "📜 Cola",
            "• `/queue [página]` - Muestra la cola\n\
            • `/jump <posición>` - Salta a una posición\n\
            • `/remove <posición>` - Quita una canción\n\
            • `/loop <modo>` - Configura repetición\n\
            • `/clear` - Detiene y limpia la cola",
            false,
        )
        .field(
            "🔊 Audio y conexión",
            "• `/volume [nivel]` - Ajusta el volumen (0-100)\n\
            • `/join` - Conecta al canal de voz\n\
            • `/leave` - Desconecta del canal\n\
            • `/help` - Muestra esta ayuda",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_volume_embed(volume: f32) -> CreateEmbed {
    CreateEmbed::default()
        .title("🔊 Volumen")
        .description(format!(
            "{} **{}%**",
            create_volume_bar(volume),
            (volume * 100.0).round() as u32
        ))
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea una barra visual de volumen
fn create_volume_bar(volume: f32) -> String {
    let segments = 20;
    let filled = ((volume.clamp(0.0, 1.0) * segments as f32).round() as usize).min(segments);
    let empty = segments - filled;

    format!("`[{}{}]`", "█".repeat(filled), "▒".repeat(empty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    #[test]
    fn queue_pages() {
        assert_eq!(
            QueuePage::new(25, 2, 10),
            QueuePage {
                start: 10,
                end: 20,
                current_page: 2,
                total_pages: 3
            }
        );
        assert_eq!(QueuePage::new(25, 9, 10).start, 20);
        assert_eq!(QueuePage::new(25, 9, 10).end, 25);
        assert_eq!(QueuePage::new(0, 1, 10).total_pages, 1);
        assert_eq!(QueuePage::new(5, 0, 10).current_page, 1);
    }

    #[test]
    fn volume_bar_fills_proportionally() {
        assert_eq!(create_volume_bar(0.0), format!("`[{}]`", "▒".repeat(20)));
        assert_eq!(create_volume_bar(1.0), format!("`[{}]`", "█".repeat(20)));
        assert_eq!(
            create_volume_bar(0.5),
            format!("`[{}{}]`", "█".repeat(10), "▒".repeat(10))
        );
    }

    #[test]
    fn only_some_events_are_announced() {
        let track = TrackRequest::new(UserId::new(1), "Song", "https://youtu.be/abc");

        assert!(embed_for_event(&PlayerEvent::NowPlaying(track.clone())).is_some());
        assert!(embed_for_event(&PlayerEvent::Failed {
            track: track.clone(),
            reason: "boom".into()
        })
        .is_some());
        assert!(embed_for_event(&PlayerEvent::Idle).is_some());
        assert!(embed_for_event(&PlayerEvent::Queued(track.clone())).is_none());
        assert!(embed_for_event(&PlayerEvent::Finished(track)).is_none());
        assert!(embed_for_event(&PlayerEvent::Cleared).is_none());
    }
}
