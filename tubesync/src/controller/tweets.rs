use std::sync::Arc;

use super::{non_empty, ListController, ListView, Placement};
use crate::cache::CacheKey;
use crate::context::AppContext;
use crate::error::ControllerError;
use crate::model::{local_id, EntityKind, Tweet, TweetPatch, UserSummary};
use crate::remote::{Page, RemoteStore};
use crate::session::SessionHandle;

/// Tweets of one user, newest first.
pub struct TweetFeed {
    remote: Arc<dyn RemoteStore>,
    session: SessionHandle,
    user_id: String,
    page: Page,
    list: ListController<Tweet>,
}

impl TweetFeed {
    pub fn new(ctx: &AppContext, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let key = CacheKey::new(EntityKind::Tweet, user_id.clone());
        Self {
            remote: ctx.remote(),
            session: ctx.session().clone(),
            page: ctx.tweet_page(),
            list: ListController::new(key, ctx.cache().clone(), ctx.session().clone()),
            user_id,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn list(&self) -> &ListController<Tweet> {
        &self.list
    }

    pub fn view(&self) -> ListView<Tweet> {
        self.list.view()
    }

    pub async fn mount(&self) -> Result<(), ControllerError> {
        self.list.mount(self.remote.list_tweets(&self.user_id, self.page)).await
    }

    pub async fn refresh(&self) -> Result<(), ControllerError> {
        self.list.refresh(self.remote.list_tweets(&self.user_id, self.page)).await
    }

    pub fn unmount(&self) {
        self.list.unmount();
    }

    pub async fn post(&self, content: &str) -> Result<Tweet, ControllerError> {
        let content = non_empty(content)?;
        let owner = self.session.user().unwrap_or_else(|| UserSummary::from_id(self.user_id.as_str()));
        let local = Tweet::new_local(local_id(), content.clone(), owner);
        self.list.create(local, Placement::Head, self.remote.add_tweet(&content)).await
    }

    pub async fn edit(&self, id: &str, content: &str) -> Result<Option<Tweet>, ControllerError> {
        let content = non_empty(content)?;
        let patch = TweetPatch { content: Some(content.clone()) };
        self.list.update(id, patch, self.remote.update_tweet(id, &content)).await
    }

    pub async fn save_edit(&self, id: &str) -> Result<Option<Tweet>, ControllerError> {
        self.list.save_edit(id, |content| async move { self.remote.update_tweet(id, &content).await }).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, ControllerError> {
        self.list.delete(id, self.remote.delete_tweet(id)).await
    }
}
