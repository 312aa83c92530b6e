use anyhow::Result;
use async_trait::async_trait;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    http::Http,
    model::id::{ChannelId, GuildId, MessageId},
};
use std::sync::Arc;
use tokio::sync::{mpsc::UnboundedReceiver, Mutex};
use tracing::{debug, warn};

use crate::{audio::events::PlayerEvent, storage::JsonStorage, ui::embeds};

/// Destino de los anuncios de una guild
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, channel_id: ChannelId, embed: CreateEmbed) -> Result<MessageId>;
    async fn delete(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()>;
}

/// Envía los anuncios por la API HTTP de Discord
pub struct HttpSink(pub Arc<Http>);

#[async_trait]
impl MessageSink for HttpSink {
    async fn send(&self, channel_id: ChannelId, embed: CreateEmbed) -> Result<MessageId> {
        let message = channel_id
            .send_message(&self.0, CreateMessage::new().embed(embed))
            .await?;
        Ok(message.id)
    }

    async fn delete(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()> {
        channel_id.delete_message(&self.0, message_id).await?;
        Ok(())
    }
}

/// Publica los eventos del reproductor en el último canal de texto usado
/// y retira el mensaje de "reproduciendo" cuando la canción termina.
pub struct Announcer<S> {
    guild_id: GuildId,
    sink: S,
    storage: Arc<Mutex<JsonStorage>>,
}

impl<S: MessageSink> Announcer<S> {
    pub fn new(guild_id: GuildId, sink: S, storage: Arc<Mutex<JsonStorage>>) -> Self {
        Self {
            guild_id,
            sink,
            storage,
        }
    }

    /// Consume eventos en orden hasta que el reproductor desaparece
    pub async fn run(self, mut events: UnboundedReceiver<PlayerEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle(&event).await {
                let title = event.track().map_or("-", |track| track.title.as_str());
                warn!(
                    "⚠️ No se pudo anunciar {} ({}) en guild {}: {:?}",
                    event.kind(),
                    title,
                    self.guild_id,
                    e
                );
            }
        }

        debug!("📪 Anuncios cerrados para guild {}", self.guild_id);
    }

    pub async fn handle(&self, event: &PlayerEvent) -> Result<()> {
        if matches!(event, PlayerEvent::Finished(_) | PlayerEvent::Cleared) {
            return self.retire_playing_message().await;
        }

        let Some(embed) = embeds::embed_for_event(event) else {
            return Ok(());
        };

        let Some(channel_id) = self.announce_channel().await? else {
            debug!("Sin canal de anuncios en guild {}", self.guild_id);
            return Ok(());
        };

        let message_id = self.sink.send(channel_id, embed).await?;

        if let PlayerEvent::NowPlaying(_) = event {
            let previous = self
                .storage
                .lock()
                .await
                .replace_playing_message(self.guild_id.get(), Some(message_id.get()))
                .await?;

            if let Some(previous) = previous {
                self.delete_quietly(channel_id, MessageId::new(previous)).await;
            }
        }

        Ok(())
    }

    async fn announce_channel(&self) -> Result<Option<ChannelId>> {
        let settings = self
            .storage
            .lock()
            .await
            .guild_settings(self.guild_id.get())
            .await?;
        Ok(settings.last_text_channel.map(ChannelId::new))
    }

    async fn retire_playing_message(&self) -> Result<()> {
        let (previous, channel) = {
            let mut storage = self.storage.lock().await;
            let channel = storage
                .guild_settings(self.guild_id.get())
                .await?
                .last_text_channel;
            let previous = storage
                .replace_playing_message(self.guild_id.get(), None)
                .await?;
            (previous, channel)
        };

        if let (Some(message), Some(channel)) = (previous, channel) {
            self.delete_quietly(ChannelId::new(channel), MessageId::new(message))
                .await;
        }

        Ok(())
    }

    /// El mensaje puede haber sido borrado a mano
    async fn delete_quietly(&self, channel_id: ChannelId, message_id: MessageId) {
        if let Err(e) = self.sink.delete(channel_id, message_id).await {
            debug!("No se pudo borrar el mensaje {}: {:?}", message_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::queue::TrackRequest;
    use mockall::predicate::eq;
    use serenity::model::id::UserId;

    const GUILD: u64 = 5;
    const CHANNEL: u64 = 9;

    async fn storage(dir: &tempfile::TempDir, channel: Option<u64>) -> Arc<Mutex<JsonStorage>> {
        let mut storage = JsonStorage::new(dir.path().to_path_buf(), 0.1).await.unwrap();
        if let Some(channel) = channel {
            storage.set_last_text_channel(GUILD, channel).await.unwrap();
        }
        Arc::new(Mutex::new(storage))
    }

    fn track() -> TrackRequest {
        TrackRequest::new(UserId::new(1), "Song", "https://youtu.be/abc")
    }

    #[tokio::test]
    async fn now_playing_message_is_removed_when_track_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir, Some(CHANNEL)).await;

        let mut sink = MockMessageSink::new();
        sink.expect_send()
            .withf(|channel, _| *channel == ChannelId::new(CHANNEL))
            .times(1)
            .returning(|_, _| Ok(MessageId::new(55)));
        sink.expect_delete()
            .with(eq(ChannelId::new(CHANNEL)), eq(MessageId::new(55)))
            .times(1)
            .returning(|_, _| Ok(()));

        let announcer = Announcer::new(GuildId::new(GUILD), sink, storage.clone());
        announcer.handle(&PlayerEvent::NowPlaying(track())).await.unwrap();
        announcer.handle(&PlayerEvent::Finished(track())).await.unwrap();

        let settings = storage.lock().await.guild_settings(GUILD).await.unwrap();
        assert_eq!(settings.last_playing_message, None);
    }

    #[tokio::test]
    async fn nothing_is_sent_without_a_text_channel() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir, None).await;

        let mut sink = MockMessageSink::new();
        sink.expect_send().never();
        sink.expect_delete().never();

        let announcer = Announcer::new(GuildId::new(GUILD), sink, storage);
        announcer.handle(&PlayerEvent::NowPlaying(track())).await.unwrap();
        announcer.handle(&PlayerEvent::Cleared).await.unwrap();
    }

    #[tokio::test]
    async fn queued_and_finished_without_message_send_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir, Some(CHANNEL)).await;

        let mut sink = MockMessageSink::new();
        sink.expect_send().never();
        sink.expect_delete().never();

        let announcer = Announcer::new(GuildId::new(GUILD), sink, storage);
        announcer.handle(&PlayerEvent::Queued(track())).await.unwrap();
        announcer.handle(&PlayerEvent::Finished(track())).await.unwrap();
    }

    #[tokio::test]
    async fn failed_delete_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir, Some(CHANNEL)).await;
        storage
            .lock()
            .await
            .replace_playing_message(GUILD, Some(77))
            .await
            .unwrap();

        let mut sink = MockMessageSink::new();
        sink.expect_delete()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("Unknown Message")));

        let announcer = Announcer::new(GuildId::new(GUILD), sink, storage);
        assert!(announcer.handle(&PlayerEvent::Cleared).await.is_ok());
    }

    #[tokio::test]
    async fn run_delivers_events_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir, Some(CHANNEL)).await;

        let mut seq = mockall::Sequence::new();
        let mut sink = MockMessageSink::new();
        sink.expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(MessageId::new(1)));
        sink.expect_delete()
            .with(eq(ChannelId::new(CHANNEL)), eq(MessageId::new(1)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        sink.expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(MessageId::new(2)));

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(PlayerEvent::NowPlaying(track())).unwrap();
        tx.send(PlayerEvent::Finished(track())).unwrap();
        tx.send(PlayerEvent::Idle).unwrap();
        drop(tx);

        Announcer::new(GuildId::new(GUILD), sink, storage).run(rx).await;
    }
}
