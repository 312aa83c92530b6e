use anyhow::Result;
use serenity::model::id::UserId;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    audio::{player::GuildPlayer, queue::TrackRequest},
    error::PlayerResult,
    sources::TrackResolver,
};

/// Tiempo máximo que `shutdown` espera a que se entreguen los anuncios
const ANNOUNCER_DRAIN: Duration = Duration::from_secs(2);

/// Reproductor de una guild junto a la tarea que anuncia sus eventos.
///
/// La tarea de anuncios termina sola cuando el reproductor desaparece y ya
/// entregó todos sus eventos; nunca se aborta.
pub struct GuildSession {
    pub player: Arc<GuildPlayer>,
    announcer: JoinHandle<()>,
}

impl GuildSession {
    pub fn new(player: Arc<GuildPlayer>, announcer: JoinHandle<()>) -> Self {
        Self { player, announcer }
    }

    /// Resuelve `query` y la agrega a la cola. Devuelve el track y su
    /// posición (desde 1). Si la resolución falla la cola no cambia.
    pub async fn request(
        &self,
        resolver: &dyn TrackResolver,
        query: &str,
        requested_by: UserId,
        max_queue_size: usize,
    ) -> Result<(TrackRequest, usize)> {
        if self.player.queue_snapshot().len() >= max_queue_size {
            anyhow::bail!("La cola está llena (máximo {} canciones)", max_queue_size);
        }

        let track = resolver.resolve(query).await?.into_request(requested_by);
        self.player.enqueue(track.clone());

        let position = self.player.queue_snapshot().len();
        info!(
            "➕ {} agregado en posición {} (guild {})",
            track.title,
            position,
            self.player.guild_id()
        );
        Ok((track, position))
    }

    /// Limpia la cola, sale del canal de voz y espera a que el anunciador
    /// procese los últimos eventos (por ejemplo, borrar el mensaje de
    /// "reproduciendo").
    pub async fn shutdown(self) -> PlayerResult<()> {
        let Self { player, announcer } = self;
        let guild_id = player.guild_id();

        let result = player.reset().await;
        drop(player);

        if tokio::time::timeout(ANNOUNCER_DRAIN, announcer).await.is_err() {
            debug!("Anuncios de guild {} siguen pendientes, se completarán en segundo plano", guild_id);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            events::EventSender,
            player::PlayerSettings,
            voice::{testing::FakeTransport, VoiceSession},
        },
        bot::announcer::{Announcer, MockMessageSink},
        error::PlayerError,
        sources::{MockTrackResolver, ResolvedTrack},
        storage::JsonStorage,
    };
    use mockall::predicate::eq;
    use serenity::model::id::{ChannelId, GuildId, MessageId};

    fn session() -> GuildSession {
        let transport = FakeTransport::connected();
        let voice = Arc::new(VoiceSession::new(transport, 0.1));
        let (events, _rx) = EventSender::channel();
        let player = GuildPlayer::new(GuildId::new(1), voice, events, PlayerSettings::default());
        GuildSession::new(player, tokio::spawn(async {}))
    }

    #[tokio::test]
    async fn resolved_track_is_queued() {
        let session = session();
        let mut resolver = MockTrackResolver::new();
        resolver
            .expect_resolve()
            .with(eq("lofi"))
            .times(1)
            .returning(|_| {
                Ok(ResolvedTrack {
                    title: "Lofi".into(),
                    locator: "https://youtu.be/lofi".into(),
                    is_file: false,
                })
            });

        let (track, position) = session
            .request(&resolver, "lofi", UserId::new(3), 10)
            .await
            .unwrap();

        assert_eq!(track.title, "Lofi");
        assert_eq!(track.requested_by, UserId::new(3));
        assert_eq!(position, 1);
        assert_eq!(session.player.queue_snapshot().len(), 1);
    }

    #[tokio::test]
    async fn unresolvable_query_leaves_queue_untouched() {
        let session = session();
        let mut resolver = MockTrackResolver::new();
        resolver.expect_resolve().returning(|query| {
            Err(PlayerError::TrackUnresolvable {
                query: query.to_string(),
                reason: "sin resultados".into(),
            })
        });

        let err = session
            .request(&resolver, "???", UserId::new(3), 10)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PlayerError>(),
            Some(PlayerError::TrackUnresolvable { .. })
        ));
        assert!(session.player.queue_snapshot().is_empty());
    }

    #[tokio::test]
    async fn full_queue_rejects_before_resolving() {
        let session = session();
        let mut resolver = MockTrackResolver::new();
        resolver.expect_resolve().times(1).returning(|_| {
            Ok(ResolvedTrack {
                title: "A".into(),
                locator: "a".into(),
                is_file: true,
            })
        });

        session
            .request(&resolver, "a.mp3", UserId::new(3), 1)
            .await
            .unwrap();
        assert!(session
            .request(&resolver, "b.mp3", UserId::new(3), 1)
            .await
            .is_err());
        assert_eq!(session.player.queue_snapshot().len(), 1);
    }

    #[tokio::test]
    async fn shutdown_retires_now_playing_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path().to_path_buf(), 0.1).await.unwrap();
        storage.set_last_text_channel(1, 9).await.unwrap();
        storage.replace_playing_message(1, Some(77)).await.unwrap();
        let storage = Arc::new(tokio::sync::Mutex::new(storage));

        let mut sink = MockMessageSink::new();
        sink.expect_delete()
            .with(eq(ChannelId::new(9)), eq(MessageId::new(77)))
            .times(1)
            .returning(|_, _| Ok(()));
        sink.expect_send().returning(|_, _| Ok(MessageId::new(100)));

        let transport = FakeTransport::connected();
        let voice = Arc::new(VoiceSession::new(transport.clone(), 0.1));
        let (events, rx) = EventSender::channel();
        let player = GuildPlayer::new(GuildId::new(1), voice, events, PlayerSettings::default());
        let announcer = Announcer::new(GuildId::new(1), sink, storage.clone());
        let session = GuildSession::new(player, tokio::spawn(announcer.run(rx)));

        session.shutdown().await.unwrap();

        assert!(transport.has_left());
        let settings = storage.lock().await.guild_settings(1).await.unwrap();
        assert_eq!(settings.last_playing_message, None);
    }
}
