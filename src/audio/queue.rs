use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::fmt;
use tracing::{debug, info};

use crate::error::{PlayerError, PlayerResult};

/// Una canción pedida por un usuario. Inmutable una vez creada.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRequest {
    pub requested_by: UserId,
    pub title: String,
    /// URL de la fuente o ruta local si `is_file` es verdadero
    pub locator: String,
    pub is_file: bool,
    pub added_at: DateTime<Utc>,
}

impl TrackRequest {
    pub fn new(requested_by: UserId, title: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            requested_by,
            title: title.into(),
            locator: locator.into(),
            is_file: false,
            added_at: Utc::now(),
        }
    }

    pub fn local_file(requested_by: UserId, title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            is_file: true,
            ..Self::new(requested_by, title, path)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl LoopMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" | "none" => Some(Self::Off),
            "track" => Some(Self::Track),
            "queue" => Some(Self::Queue),
            _ => None,
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopMode::Off => write!(f, "off"),
            LoopMode::Track => write!(f, "track"),
            LoopMode::Queue => write!(f, "queue"),
        }
    }
}

/// Cola de canciones de una guild. El orden de inserción es el orden de
/// reproducción; las canciones ya reproducidas se quedan en la cola.
#[derive(Debug, Default, Clone)]
pub struct TrackQueue {
    items: Vec<TrackRequest>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un track al final de la cola
    pub fn enqueue(&mut self, item: TrackRequest) {
        info!("➕ Agregado a la cola: {}", item.title);
        self.items.push(item);
    }

    /// Elimina el track en `index`, desplazando los siguientes una posición
    pub fn remove_at(&mut self, index: usize) -> PlayerResult<TrackRequest> {
        if index >= self.items.len() {
            return Err(PlayerError::OutOfRange {
                index,
                len: self.items.len(),
            });
        }

        let removed = self.items.remove(index);
        debug!("❌ Track eliminado en posición {}: {}", index, removed.title);
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn peek(&self) -> Option<&TrackRequest> {
        self.items.first()
    }

    pub fn item_at(&self, index: usize) -> Option<&TrackRequest> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[TrackRequest] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> TrackRequest {
        TrackRequest::new(UserId::new(1), title, format!("https://example.com/{title}"))
    }

    fn titles(queue: &TrackQueue) -> Vec<&str> {
        queue.items().iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn enqueue_keeps_insertion_order_and_duplicates() {
        let mut queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        queue.enqueue(track("a"));

        assert_eq!(titles(&queue), vec!["a", "b", "a"]);
        assert_eq!(queue.peek().map(|t| t.title.as_str()), Some("a"));
    }

    #[test]
    fn remove_at_shifts_later_items() {
        let mut queue = TrackQueue::new();
        for title in ["a", "b", "c", "d"] {
            queue.enqueue(track(title));
        }

        let removed = queue.remove_at(1).unwrap();

        assert_eq!(removed.title, "b");
        assert_eq!(titles(&queue), vec!["a", "c", "d"]);
        assert_eq!(queue.item_at(1).map(|t| t.title.as_str()), Some("c"));
    }

    #[test]
    fn remove_at_rejects_out_of_range() {
        let mut queue = TrackQueue::new();
        queue.enqueue(track("a"));

        let err = queue.remove_at(1).unwrap_err();
        assert!(matches!(err, PlayerError::OutOfRange { index: 1, len: 1 }));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn empty_queue_accessors() {
        let queue = TrackQueue::new();
        assert!(queue.is_empty());
        assert!(queue.peek().is_none());
        assert!(queue.item_at(0).is_none());
    }

    #[test]
    fn local_file_sets_flag() {
        let item = TrackRequest::local_file(UserId::new(7), "Speak: hola", "/tmp/voice.mp3");
        assert!(item.is_file);
        assert_eq!(item.locator, "/tmp/voice.mp3");
    }

    #[test]
    fn loop_mode_parsing() {
        assert_eq!(LoopMode::parse("track"), Some(LoopMode::Track));
        assert_eq!(LoopMode::parse("none"), Some(LoopMode::Off));
        assert_eq!(LoopMode::parse("shuffle"), None);
        assert_eq!(LoopMode::Queue.to_string(), "queue");
    }
}
