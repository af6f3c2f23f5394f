use std::sync::Arc;

use log::info;
use thiserror::Error;

use crate::cache::SharedCache;
use crate::config::ConfigError;
use crate::controller::{CommentThread, PlaylistLibrary, PlaylistVideos, SubscriptionContext, SubscriptionList, TweetFeed};
use crate::error::RemoteError;
use crate::remote::{Page, RemoteStore};
use crate::session::{SessionAction, SessionError, SessionHandle};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Everything one application session shares: the backend, the entity
/// cache and the viewer's identity. Controllers are built from it.
#[derive(Clone)]
pub struct AppContext {
    remote: Arc<dyn RemoteStore>,
    cache: SharedCache,
    session: SessionHandle,
    tweet_page: Page,
}

impl AppContext {
    pub fn new(remote: Arc<dyn RemoteStore>, session: SessionHandle) -> Self {
        Self { remote, cache: SharedCache::new(), session, tweet_page: Page::default() }
    }

    pub fn with_tweet_page(mut self, page: Page) -> Self {
        self.tweet_page = page;
        self
    }

    /// Builds an HTTP-backed context from configuration, hydrating the
    /// persisted session if one is configured. The bearer token follows
    /// every session change.
    #[cfg(feature = "http")]
    pub fn connect(config: &crate::config::ClientConfig) -> Result<Self, ContextError> {
        config.validate()?;
        let http = Arc::new(crate::remote::HttpRemoteStore::from_config(config)?);
        let session = match &config.session_path {
            Some(path) => SessionHandle::open(crate::session::SessionStore::new(path))?,
            None => SessionHandle::ephemeral(),
        };
        let token_sink = http.clone();
        session.subscribe(move |state| token_sink.set_token(state.access_token.clone()));
        info!("connected to {}", http.base_url());
        Ok(Self::new(http, session).with_tweet_page(Page::first(config.tweet_page_size)))
    }

    pub fn remote(&self) -> Arc<dyn RemoteStore> {
        self.remote.clone()
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn tweet_page(&self) -> Page {
        self.tweet_page
    }

    pub fn comment_thread(&self, video_id: impl Into<String>) -> CommentThread {
        CommentThread::new(self, video_id)
    }

    pub fn tweet_feed(&self, user_id: impl Into<String>) -> TweetFeed {
        TweetFeed::new(self, user_id)
    }

    pub fn subscription_list(&self, channel_id: impl Into<String>, context: SubscriptionContext) -> SubscriptionList {
        SubscriptionList::new(self, channel_id, context)
    }

    pub fn playlist_library(&self, user_id: impl Into<String>) -> PlaylistLibrary {
        PlaylistLibrary::new(self, user_id)
    }

    pub fn playlist_videos(&self, playlist_id: impl Into<String>) -> PlaylistVideos {
        PlaylistVideos::new(self, playlist_id)
    }

    /// Drops every cached entity and the session.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.cache.with(|cache| cache.clear());
        self.session.dispatch(SessionAction::Clear)?;
        info!("logged out");
        Ok(())
    }
}
