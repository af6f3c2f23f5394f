use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use serde_json::Value;

use super::wire::{self, ContentBody, Envelope, PlaylistBody};
use super::{require_id, Page, RemoteStore};
use crate::config::ClientConfig;
use crate::error::RemoteError;
use crate::model::{ChannelUser, Comment, Playlist, PlaylistDraft, PlaylistPatch, Tweet};

/// `RemoteStore` over the backend's REST API.
///
/// Requests are credentialed: the cookie jar keeps whatever session cookie
/// the backend sets, and a bearer token is attached once one is known.
pub struct HttpRemoteStore {
    client: Client,
    base: Url,
    token: RwLock<Option<String>>,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let mut base = Url::parse(base_url).map_err(|e| RemoteError::Validation(format!("invalid base url {base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(RemoteError::Validation(format!("invalid base url {base_url}")));
        }
        // a trailing slash would leave an empty segment before the endpoint path
        if let Ok(mut segments) = base.path_segments_mut() {
            segments.pop_if_empty();
        }
        let client = Client::builder().cookie_store(true).timeout(timeout).build()?;
        Ok(Self { client, base, token: RwLock::new(None) })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, RemoteError> {
        Self::new(&config.base_url, Duration::from_secs(config.request_timeout_secs))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.url(segments);
        debug!("{method} {url}");
        let builder = self.client.request(method, url);
        match self.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value, RemoteError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            debug!("request failed with status {status}");
            return Err(RemoteError::from_status(status.as_u16(), wire::error_message(&body)));
        }
        Envelope::decode(&body)?.into_data()
    }

    async fn get(&self, segments: &[&str]) -> Result<Value, RemoteError> {
        self.send(self.request(Method::GET, segments)).await
    }

    async fn delete(&self, segments: &[&str]) -> Result<(), RemoteError> {
        self.send(self.request(Method::DELETE, segments)).await.map(|_| ())
    }

    async fn with_body<B: Serialize + Sync>(&self, method: Method, segments: &[&str], body: &B) -> Result<Value, RemoteError> {
        self.send(self.request(method, segments).json(body)).await
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn list_comments(&self, video_id: &str, page: Option<Page>) -> Result<Vec<Comment>, RemoteError> {
        let video_id = require_id("video", video_id)?;
        let mut builder = self.request(Method::GET, &["comments", "get-all-comments", video_id]);
        if let Some(page) = page {
            builder = builder.query(&page);
        }
        wire::list(self.send(builder).await?)
    }

    async fn add_comment(&self, video_id: &str, content: &str) -> Result<Comment, RemoteError> {
        let video_id = require_id("video", video_id)?;
        wire::one(self.with_body(Method::POST, &["comments", "add-comment", video_id], &ContentBody { content }).await?)
    }

    async fn update_comment(&self, id: &str, content: &str) -> Result<Option<Comment>, RemoteError> {
        let id = require_id("comment", id)?;
        wire::optional(self.with_body(Method::PATCH, &["comments", "update-comment", id], &ContentBody { content }).await?)
    }

    async fn delete_comment(&self, id: &str) -> Result<(), RemoteError> {
        let id = require_id("comment", id)?;
        self.delete(&["comments", "delete-comment", id]).await
    }

    async fn list_replies(&self, parent_id: &str) -> Result<Vec<Comment>, RemoteError> {
        let parent_id = require_id("comment", parent_id)?;
        wire::list(self.get(&["comments", parent_id, "replies"]).await?)
    }

    async fn add_reply(&self, parent_id: &str, content: &str) -> Result<Comment, RemoteError> {
        let parent_id = require_id("comment", parent_id)?;
        let data = self.with_body(Method::POST, &["comments", parent_id, "replies"], &ContentBody { content }).await?;
        let mut reply: Comment = wire::one(data)?;
        if reply.parent_comment.is_none() {
            reply.parent_comment = Some(parent_id.to_string());
        }
        Ok(reply)
    }

    async fn update_reply(&self, parent_id: &str, id: &str, content: &str) -> Result<Option<Comment>, RemoteError> {
        let parent_id = require_id("comment", parent_id)?;
        let id = require_id("reply", id)?;
        wire::optional(self.with_body(Method::PATCH, &["comments", parent_id, "replies", id], &ContentBody { content }).await?)
    }

    async fn delete_reply(&self, parent_id: &str, id: &str) -> Result<(), RemoteError> {
        let parent_id = require_id("comment", parent_id)?;
        let id = require_id("reply", id)?;
        self.delete(&["comments", parent_id, "replies", id]).await
    }

    async fn list_tweets(&self, user_id: &str, page: Page) -> Result<Vec<Tweet>, RemoteError> {
        let user_id = require_id("user", user_id)?;
        let builder = self.request(Method::GET, &["tweets", "get-all-tweets", user_id]).query(&page);
        wire::list(self.send(builder).await?)
    }

    async fn add_tweet(&self, content: &str) -> Result<Tweet, RemoteError> {
        wire::one(self.with_body(Method::POST, &["tweets", "add-tweet"], &ContentBody { content }).await?)
    }

    async fn update_tweet(&self, id: &str, content: &str) -> Result<Option<Tweet>, RemoteError> {
        let id = require_id("tweet", id)?;
        wire::optional(self.with_body(Method::PATCH, &["tweets", "update-tweet", id], &ContentBody { content }).await?)
    }

    async fn delete_tweet(&self, id: &str) -> Result<(), RemoteError> {
        let id = require_id("tweet", id)?;
        self.delete(&["tweets", "delete-tweet", id]).await
    }

    async fn list_subscribers(&self, channel_id: &str) -> Result<Vec<ChannelUser>, RemoteError> {
        let channel_id = require_id("channel", channel_id)?;
        wire::list(self.get(&["subscriptions", "get-channel-subscribers", channel_id]).await?)
    }

    async fn list_subscribed_channels(&self, channel_id: &str) -> Result<Vec<ChannelUser>, RemoteError> {
        let channel_id = require_id("channel", channel_id)?;
        wire::list(self.get(&["subscriptions", "get-subscribed-channels", channel_id]).await?)
    }

    async fn toggle_subscription(&self, user_id: &str) -> Result<Option<bool>, RemoteError> {
        let user_id = require_id("user", user_id)?;
        let path = ["subscriptions", "toggle-subscription", user_id];
        let data = self.with_body(Method::PATCH, &path, &serde_json::json!({})).await?;
        Ok(wire::subscription_state(&data))
    }

    async fn list_playlists(&self, user_id: &str) -> Result<Vec<Playlist>, RemoteError> {
        let user_id = require_id("user", user_id)?;
        wire::list(self.get(&["users", user_id, "playlists"]).await?)
    }

    async fn get_playlist(&self, id: &str) -> Result<Playlist, RemoteError> {
        let id = require_id("playlist", id)?;
        wire::one(self.get(&["playlists", id]).await?)
    }

    async fn create_playlist(&self, draft: &PlaylistDraft) -> Result<Playlist, RemoteError> {
        if draft.name.trim().is_empty() {
            return Err(RemoteError::Validation("playlist name is required".into()));
        }
        wire::one(self.with_body(Method::POST, &["playlists"], &PlaylistBody::from(draft)).await?)
    }

    async fn update_playlist(&self, id: &str, patch: &PlaylistPatch) -> Result<Option<Playlist>, RemoteError> {
        let id = require_id("playlist", id)?;
        wire::optional(self.with_body(Method::PATCH, &["playlists", id], &PlaylistBody::from(patch)).await?)
    }

    async fn delete_playlist(&self, id: &str) -> Result<(), RemoteError> {
        let id = require_id("playlist", id)?;
        self.delete(&["playlists", id]).await
    }
}
