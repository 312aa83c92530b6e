pub mod local_file;
pub mod youtube;

use async_trait::async_trait;
use serenity::model::id::UserId;

use crate::{audio::queue::TrackRequest, error::PlayerResult};

pub use local_file::LocalFileResolver;
pub use youtube::YouTubeClient;

/// Convierte lo que escribe el usuario en algo reproducible
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> PlayerResult<ResolvedTrack>;
}

/// Resultado de resolver una búsqueda
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    pub title: String,
    pub locator: String,
    pub is_file: bool,
}

impl ResolvedTrack {
    pub fn into_request(self, requested_by: UserId) -> TrackRequest {
        if self.is_file {
            TrackRequest::local_file(requested_by, self.title, self.locator)
        } else {
            TrackRequest::new(requested_by, self.title, self.locator)
        }
    }
}
