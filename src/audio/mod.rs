//! # Audio Module
//!
//! Per-guild playback for Sayu Music.
//!
//! ## Architecture
//!
//! Three layers, leaves first:
//!
//! ### [`queue`] - Track Queue
//! - Ordered list of [`queue::TrackRequest`]s; insertion order is playback order
//! - Played tracks stay in the queue so loop and jump can reach them
//!
//! ### [`voice`] - Voice Session
//! - Owns one transport connection and at most one playing resource
//! - Readiness and completion are awaited on `watch` channels, never polled
//! - [`voice::VoiceSession::force_stop`] is the only cancellation primitive
//!
//! ### [`player`] - Guild Player
//! - Holds the queue, current index, loop mode and pending jump
//! - Runs a single play cycle task per guild that streams a track, waits for
//!   it to end and picks the next index
//!
//! [`songbird_transport`] plugs songbird in as the voice transport and
//! [`events`] carries notifications out of the player in order.
//!
//! ## Example
//!
//! ```rust,ignore
//! # use std::sync::Arc;
//! # use crate::audio::{events::EventSender, player::*, voice::VoiceSession, queue::TrackRequest};
//! # fn example(voice: Arc<VoiceSession>, guild_id: serenity::all::GuildId, user: serenity::all::UserId) {
//! let (events, _rx) = EventSender::channel();
//! let player = GuildPlayer::new(guild_id, voice, events, PlayerSettings::default());
//!
//! player.enqueue(TrackRequest::new(user, "Song", "https://youtu.be/dQw4w9WgXcQ"));
//! player.skip();
//! # }
//! ```

pub mod events;
pub mod player;
pub mod queue;
pub mod songbird_transport;
pub mod voice;
