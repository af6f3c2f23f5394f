//! Typed access to the REST backend.
//!
//! One method per entity operation; each maps to exactly one HTTP request and
//! never retries. Implementations hand back canonical model values only, so
//! wire-shape quirks stop at this boundary.

#[cfg(feature = "http")]
mod http;
pub mod wire;

#[cfg(feature = "http")]
pub use http::HttpRemoteStore;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::RemoteError;
use crate::model::{ChannelUser, Comment, Playlist, PlaylistDraft, PlaylistPatch, Tweet};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Page/limit pagination as the backend understands it (1-based pages).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn first(limit: u32) -> Self {
        Self { page: 1, limit }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::first(10)
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_comments(&self, video_id: &str, page: Option<Page>) -> Result<Vec<Comment>, RemoteError>;
    async fn add_comment(&self, video_id: &str, content: &str) -> Result<Comment, RemoteError>;
    async fn update_comment(&self, id: &str, content: &str) -> Result<Option<Comment>, RemoteError>;
    async fn delete_comment(&self, id: &str) -> Result<(), RemoteError>;

    async fn list_replies(&self, parent_id: &str) -> Result<Vec<Comment>, RemoteError>;
    async fn add_reply(&self, parent_id: &str, content: &str) -> Result<Comment, RemoteError>;
    async fn update_reply(&self, parent_id: &str, id: &str, content: &str) -> Result<Option<Comment>, RemoteError>;
    async fn delete_reply(&self, parent_id: &str, id: &str) -> Result<(), RemoteError>;

    async fn list_tweets(&self, user_id: &str, page: Page) -> Result<Vec<Tweet>, RemoteError>;
    async fn add_tweet(&self, content: &str) -> Result<Tweet, RemoteError>;
    async fn update_tweet(&self, id: &str, content: &str) -> Result<Option<Tweet>, RemoteError>;
    async fn delete_tweet(&self, id: &str) -> Result<(), RemoteError>;

    async fn list_subscribers(&self, channel_id: &str) -> Result<Vec<ChannelUser>, RemoteError>;
    async fn list_subscribed_channels(&self, channel_id: &str) -> Result<Vec<ChannelUser>, RemoteError>;
    /// Flips the viewer's subscription to `user_id`. `Some` carries the new
    /// state when the backend reports it; `None` is a bare acknowledgement.
    async fn toggle_subscription(&self, user_id: &str) -> Result<Option<bool>, RemoteError>;

    async fn list_playlists(&self, user_id: &str) -> Result<Vec<Playlist>, RemoteError>;
    async fn get_playlist(&self, id: &str) -> Result<Playlist, RemoteError>;
    async fn create_playlist(&self, draft: &PlaylistDraft) -> Result<Playlist, RemoteError>;
    async fn update_playlist(&self, id: &str, patch: &PlaylistPatch) -> Result<Option<Playlist>, RemoteError>;
    async fn delete_playlist(&self, id: &str) -> Result<(), RemoteError>;
}

/// Rejects blank ids before anything goes on the wire.
pub fn require_id<'a>(what: &str, id: &'a str) -> Result<&'a str, RemoteError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(RemoteError::Validation(format!("{what} id is required")));
    }
    Ok(trimmed)
}
